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

//! Loads one entry script and, recursively, everything it includes: each
//! `[[include]]` is either a plain loader call (the child's filtered
//! exported Config optionally bound under `as`) or a subrepo loader call
//! (same, plus the child's `build_root` is rewritten to isolate its build
//! output). Every `[[task]]` table found along the way is merged onto its
//! module's Config and queued into the shared `Tasks` registry — this is
//! the host-object "callable entry" of §6.2, collapsed into "a task table
//! in the file is an entry call" since this format has no expression
//! syntax to invoke one explicitly.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use hancho_config::{Config, Value};
use hancho_tasks::Tasks;

use crate::error::ScriptError;
use crate::fields::{module_fields, RootPaths};
use crate::file::{table_to_config, HanchoFile};

/// Loads `root_file` and every file it transitively includes, queuing every
/// task found into `tasks`. `build_tag` seeds the root module's `build_tag`
/// field (typically `"debug"`/`"release"`, or from a CLI flag); `overrides`
/// is the CLI's folded `--key=value` passthrough, merged as the outermost
/// layer so every module in the run inherits it.
pub fn load_root(
    root_file: &Path,
    build_tag: &str,
    overrides: &Config,
    tasks: &Tasks,
) -> Result<Rc<Config>, ScriptError> {
    let root = RootPaths::new(root_file, build_tag).map_err(|e| ScriptError::Io(root_file.to_path_buf(), e))?;
    let root_layer = Rc::new(Config::merge(None, [overrides])?);
    load_module(root_file, Some(root_layer), &root, None, tasks)
}

/// Loads one module file. `parent` is the Config chain it should fall
/// through to (the includer's module Config, or the CLI-overrides layer for
/// the root file). `inherited_build_root` is `Some` only when a subrepo
/// loader is isolating this module's build output.
fn load_module(
    path: &Path,
    parent: Option<Rc<Config>>,
    root: &RootPaths,
    inherited_build_root: Option<&str>,
    tasks: &Tasks,
) -> Result<Rc<Config>, ScriptError> {
    let text = std::fs::read_to_string(path).map_err(|e| ScriptError::Io(path.to_path_buf(), e))?;
    let file: HanchoFile =
        toml::from_str(&text).map_err(|e| ScriptError::Parse(path.to_path_buf(), Box::new(e)))?;

    let mod_path =
        hancho_paths::abs_path(&path.to_string_lossy()).map_err(|e| ScriptError::Io(path.to_path_buf(), e))?;
    let auto = module_fields(root, &mod_path, inherited_build_root);
    let mut own = table_to_config(&file.config);

    // Includes are resolved before this module's own tasks are built, so a
    // `[[task]]` entry can reference a bound include's fields (`{lib.cc}`).
    for inc in &file.includes {
        let inc_path = resolve_include_path(path, &inc.path);
        let provisional = Rc::new(Config::merge(parent.clone(), [&auto, &own])?);

        let child_build_root = match &inc.subrepo {
            Some(name) => {
                let base = provisional
                    .get("build_root")
                    .and_then(|v| v.as_str().map(|s| s.to_string()))
                    .unwrap_or_default();
                Some(format!("{}/{}", base, name))
            }
            None => None,
        };

        let exported = load_module(&inc_path, Some(provisional), root, child_build_root.as_deref(), tasks)?;

        if let Some(name) = &inc.as_name {
            own.set(name.clone(), Value::Config(filtered_export(&exported)));
        }
    }

    let module_config = Rc::new(Config::merge(parent, [&auto, &own])?);

    for task_table in &file.tasks {
        let task_layer = table_to_config(task_table);
        let merged = Config::merge(Some(module_config.clone()), [&task_layer])?;
        tasks.create(merged);
    }

    Ok(module_config)
}

/// Resolves an include's `path` relative to the including file's own
/// directory, matching how a C `#include "..."` or Python relative import
/// resolves — not the process's current working directory.
fn resolve_include_path(including_file: &Path, relative: &str) -> PathBuf {
    let base = including_file.parent().unwrap_or_else(|| Path::new("."));
    base.join(relative)
}

/// A loaded module's exported Config, per §6.2: "with private/underscore-
/// prefixed names filtered out". Only the module's own fields are kept
/// (not its parent chain) — an includer binding this under a name gets
/// exactly what that file itself defined, not everything it happened to
/// inherit.
fn filtered_export(config: &Config) -> Config {
    let mut out = Config::empty();
    for (k, v) in config.fields() {
        if !k.starts_with('_') {
            out.set(k.to_string(), v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hancho_config::Value;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_tasks_from_a_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            dir.path(),
            "build.hancho.toml",
            r#"
                [config]
                cc = "gcc"

                [[task]]
                desc = "compile"
                command = "{cc} -c a.c"
            "#,
        );
        let tasks = Tasks::new();
        let overrides = Config::empty();
        load_root(&root, "debug", &overrides, &tasks).unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn include_binds_filtered_child_config_under_its_name() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "lib/build.hancho.toml",
            r#"
                [config]
                cc = "clang"
                _private = "hidden"
            "#,
        );
        let root = write(
            dir.path(),
            "build.hancho.toml",
            r#"
                [[include]]
                path = "lib/build.hancho.toml"
                as = "lib"

                [[task]]
                desc = "use lib cc"
                command = "{lib.cc} -c a.c"
            "#,
        );
        let tasks = Tasks::new();
        let overrides = Config::empty();
        let module = load_root(&root, "debug", &overrides, &tasks).unwrap();

        match module.get("lib") {
            Some(Value::Config(lib)) => {
                assert_eq!(lib.get("cc").unwrap().as_str(), Some("clang"));
                assert!(lib.get("_private").is_none());
            }
            other => panic!("expected bound lib Config, got {:?}", other),
        }
    }

    #[test]
    fn subrepo_include_isolates_build_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "vendor/foo/build.hancho.toml",
            r#"
                [[task]]
                desc = "vendor build"
                command = "true"
            "#,
        );
        let root = write(
            dir.path(),
            "build.hancho.toml",
            r#"
                [[include]]
                path = "vendor/foo/build.hancho.toml"
                subrepo = "foo"
            "#,
        );
        let tasks = Tasks::new();
        let overrides = Config::empty();
        load_root(&root, "debug", &overrides, &tasks).unwrap();

        assert_eq!(tasks.len(), 1);
        let vendor_task = tasks.get(0).unwrap();
        let build_dir = vendor_task.config.get("build_dir").unwrap();
        assert!(build_dir.as_str().unwrap().contains("/build/foo/"));
    }

    #[test]
    fn overrides_layer_is_visible_to_every_module() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            dir.path(),
            "build.hancho.toml",
            r#"
                [[task]]
                desc = "uses override"
                command = "{opt_level}"
            "#,
        );
        let tasks = Tasks::new();
        let mut overrides = Config::empty();
        overrides.set("opt_level", Value::Str("-O2".to_string()));
        load_root(&root, "debug", &overrides, &tasks).unwrap();

        let task = tasks.get(0).unwrap();
        assert_eq!(task.config.get("opt_level").unwrap().as_str(), Some("-O2"));
    }
}
