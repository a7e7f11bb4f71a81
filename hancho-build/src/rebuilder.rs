/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Decides, given a task's resolved input/output path lists, whether the
//! command needs to run. Generalises `ninja-builder`'s `CachingMTimeRebuilder`
//! / `DiskDirtyCache` (single mtime per path, cached for the run) from
//! ninja's single/multi-output *keys* to Hancho's flat `in_*`/`out_*` lists:
//! there is no `Key::Multi`, so the "compare the oldest output against the
//! newest input" fold happens directly over the output list instead of
//! through a cached multi-key dirtiness entry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use hancho_metrics::scoped_metric;

use hancho_tasks::ResolvedIo;

use crate::depfile::{parse_depfile, DepfileFormat};
use crate::error::RebuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mtime {
    Modified(SystemTime),
    DoesNotExist,
}

pub trait DiskInterface {
    fn modified(&self, path: &str) -> std::io::Result<SystemTime>;
}

#[derive(Debug, Default)]
pub struct SystemDiskInterface;

impl DiskInterface for SystemDiskInterface {
    fn modified(&self, path: &str) -> std::io::Result<SystemTime> {
        scoped_metric!("stat");
        std::fs::metadata(Path::new(path))?.modified()
    }
}

/// Caches each path's mtime for the lifetime of a run, so that a file shared
/// between several tasks (as an input to one and an output of another, say)
/// is only stat'd once.
#[derive(Debug)]
pub struct MtimeCache<Disk: DiskInterface> {
    disk: Disk,
    cache: RefCell<HashMap<String, Mtime>>,
}

impl<Disk: DiskInterface> MtimeCache<Disk> {
    pub fn new(disk: Disk) -> Self {
        MtimeCache {
            disk,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn mtime(&self, path: &str) -> Result<Mtime, RebuildError> {
        if let Some(m) = self.cache.borrow().get(path) {
            return Ok(*m);
        }
        let mtime = match self.disk.modified(path) {
            Ok(t) => Mtime::Modified(t),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Mtime::DoesNotExist,
            Err(e) => {
                return Err(RebuildError::Stat {
                    path: path.to_string(),
                    source: e,
                })
            }
        };
        self.cache.borrow_mut().insert(path.to_string(), mtime);
        Ok(mtime)
    }
}

pub fn default_mtime_cache() -> MtimeCache<SystemDiskInterface> {
    MtimeCache::new(SystemDiskInterface)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Rebuild { reason: String },
    Skip,
}

/// Runs the six-step rebuild-decision algorithm against already-resolved
/// inputs/outputs. `depfile_format` selects how `io.depfile` (if present) is
/// parsed; a missing or unreadable depfile contributes no extra
/// dependencies rather than erroring.
pub fn decide<Disk: DiskInterface>(
    io: &ResolvedIo,
    force: bool,
    depfile_format: DepfileFormat,
    cache: &MtimeCache<Disk>,
) -> Result<Decision, RebuildError> {
    if force {
        return Ok(Decision::Rebuild {
            reason: "force flag".to_string(),
        });
    }

    for output in &io.outputs {
        if cache.mtime(output)? == Mtime::DoesNotExist {
            return Ok(Decision::Rebuild {
                reason: format!("{} is missing", output),
            });
        }
    }

    if io.inputs.is_empty() && !io.outputs.is_empty() {
        return Ok(Decision::Rebuild {
            reason: "always rebuild a target with no inputs".to_string(),
        });
    }

    let t_out = io
        .outputs
        .iter()
        .map(|o| cache.mtime(o))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|m| match m {
            Mtime::Modified(t) => t,
            Mtime::DoesNotExist => unreachable!("checked for missing outputs above"),
        })
        .min();

    let t_out = match t_out {
        Some(t) => t,
        None => return Ok(Decision::Skip), // no outputs at all: nothing to compare against.
    };

    for input in &io.inputs {
        if let Mtime::Modified(t_in) = cache.mtime(input)? {
            if t_in > t_out {
                return Ok(Decision::Rebuild {
                    reason: format!("{} has changed", input),
                });
            }
        }
    }

    if let Some(depfile) = &io.depfile {
        let deps = parse_depfile(depfile, depfile_format);
        for dep in &deps {
            if let Mtime::Modified(t_dep) = cache.mtime(dep)? {
                if t_dep > t_out {
                    return Ok(Decision::Rebuild {
                        reason: format!("a dependency in {} has changed", depfile),
                    });
                }
            }
        }
    }

    Ok(Decision::Skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::time::Duration;

    struct MockDisk {
        mtimes: StdRefCell<HashMap<String, SystemTime>>,
    }

    impl DiskInterface for MockDisk {
        fn modified(&self, path: &str) -> std::io::Result<SystemTime> {
            self.mtimes
                .borrow()
                .get(path)
                .copied()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "mock"))
        }
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn mock(files: &[(&str, u64)]) -> MtimeCache<MockDisk> {
        let mut m = HashMap::new();
        for (p, t) in files {
            m.insert(p.to_string(), at(*t));
        }
        MtimeCache::new(MockDisk {
            mtimes: StdRefCell::new(m),
        })
    }

    fn io(inputs: &[&str], outputs: &[&str]) -> ResolvedIo {
        ResolvedIo {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            depfile: None,
        }
    }

    #[test]
    fn force_always_rebuilds() {
        let cache = mock(&[("a.c", 1), ("a.o", 100)]);
        let decision = decide(&io(&["a.c"], &["a.o"]), true, DepfileFormat::Gcc, &cache).unwrap();
        assert_eq!(
            decision,
            Decision::Rebuild {
                reason: "force flag".to_string()
            }
        );
    }

    #[test]
    fn missing_output_rebuilds() {
        let cache = mock(&[("a.c", 1)]);
        let decision =
            decide(&io(&["a.c"], &["a.o"]), false, DepfileFormat::Gcc, &cache).unwrap();
        assert!(matches!(decision, Decision::Rebuild { .. }));
    }

    #[test]
    fn no_inputs_always_rebuilds() {
        let cache = mock(&[("a.o", 100)]);
        let decision = decide(&io(&[], &["a.o"]), false, DepfileFormat::Gcc, &cache).unwrap();
        assert_eq!(
            decision,
            Decision::Rebuild {
                reason: "always rebuild a target with no inputs".to_string()
            }
        );
    }

    #[test]
    fn newer_input_rebuilds() {
        let cache = mock(&[("a.c", 200), ("a.o", 100)]);
        let decision =
            decide(&io(&["a.c"], &["a.o"]), false, DepfileFormat::Gcc, &cache).unwrap();
        assert!(matches!(decision, Decision::Rebuild { .. }));
    }

    #[test]
    fn older_input_skips() {
        let cache = mock(&[("a.c", 1), ("a.o", 100)]);
        let decision =
            decide(&io(&["a.c"], &["a.o"]), false, DepfileFormat::Gcc, &cache).unwrap();
        assert_eq!(decision, Decision::Skip);
    }

    #[test]
    fn equal_mtime_is_not_newer() {
        let cache = mock(&[("a.c", 100), ("a.o", 100)]);
        let decision =
            decide(&io(&["a.c"], &["a.o"]), false, DepfileFormat::Gcc, &cache).unwrap();
        assert_eq!(decision, Decision::Skip);
    }

    #[test]
    fn dirty_depfile_dependency_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let depfile_path = dir.path().join("a.d");
        std::fs::write(&depfile_path, "a.o: header.h\n").unwrap();

        let cache = mock(&[("a.c", 1), ("a.o", 100), ("header.h", 300)]);
        let mut resolved = io(&["a.c"], &["a.o"]);
        resolved.depfile = Some(depfile_path.to_string_lossy().into_owned());

        let decision = decide(&resolved, false, DepfileFormat::Gcc, &cache).unwrap();
        assert!(matches!(decision, Decision::Rebuild { .. }));
    }

    #[test]
    fn unreadable_depfile_is_not_fatal() {
        let cache = mock(&[("a.c", 1), ("a.o", 100)]);
        let mut resolved = io(&["a.c"], &["a.o"]);
        resolved.depfile = Some("/nonexistent/missing.d".to_string());
        let decision = decide(&resolved, false, DepfileFormat::Gcc, &cache).unwrap();
        assert_eq!(decision, Decision::Skip);
    }
}
