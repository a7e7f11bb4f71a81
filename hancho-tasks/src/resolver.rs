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

//! Normalises a Task's `in_*`/`out_*` fields into ordered, absolute path
//! lists: flattens nested sequences, drops `None`s, awaits Task promises
//! used as inputs, and re-expands/re-flattens template strings.

use hancho_config::{Config, Value};

use crate::error::ResolveError;

/// The resolved input/output file lists and depfile path for a Task, ready
/// for the rebuild-decision engine.
#[derive(Debug, Default, Clone)]
pub struct ResolvedIo {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub depfile: Option<String>,
}

/// Resolves every `in_*` and `out_*` field on `task_config`, in field
/// insertion order. A failure resolving an `in_*` Task promise surfaces as
/// [`ResolveError::UpstreamFailed`] — the caller (the scheduler) treats that
/// specially, as cancellation rather than an ordinary task failure.
pub async fn resolve_io(task_config: &Config) -> Result<ResolvedIo, ResolveError> {
    let task_dir = crate::fields::task_dir(task_config);
    // §3.4: build_dir is "prepended to every relative out_* path". Falls
    // back to task_dir for tasks that never got one (e.g. built directly
    // through the Rust API rather than via a loaded module), so a bare
    // Task still resolves its outputs somewhere rather than erroring.
    let out_base = crate::fields::build_dir(task_config).unwrap_or_else(|| task_dir.clone());

    let in_fields: Vec<Value> = task_config
        .fields_with_prefix("in_")
        .map(|(_, v)| v.clone())
        .collect();
    let out_fields: Vec<Value> = task_config
        .fields_with_prefix("out_")
        .map(|(_, v)| v.clone())
        .collect();

    let mut inputs = Vec::new();
    for v in &in_fields {
        inputs.extend(resolve_value(v, task_config, &task_dir).await?);
    }

    let mut outputs = Vec::new();
    for v in &out_fields {
        outputs.extend(resolve_value(v, task_config, &out_base).await?);
    }

    let depfile = match task_config.get("depfile") {
        Some(Value::Str(s)) => {
            let expanded = hancho_config::expand_str(&s, task_config)?;
            if expanded.is_empty() {
                None
            } else {
                Some(expanded)
            }
        }
        Some(Value::Null) | None => None,
        Some(other) => return Err(ResolveError::Unsupported(other.type_name().to_string())),
    };

    Ok(ResolvedIo {
        inputs,
        outputs,
        depfile,
    })
}

/// Resolves one field's value to zero or more absolute path strings.
/// Template strings are expanded then split on whitespace, mirroring how
/// expansion already joins list values by a single space (§3.2) — so a
/// template that expands to `"a.o b.o"` contributes two paths, the same as
/// if it had been written as a two-element list. A relative path is made
/// absolute against `base` (the task's `task_dir` for `in_*` fields, its
/// `build_dir` for `out_*` fields — see `resolve_io`), not the process's
/// current directory, so a task can be constructed from any module
/// regardless of where the `hancho` binary happens to be running.
///
/// Boxed by hand rather than via a recursion-helper crate: `Value::List`
/// nesting in practice is shallow (one or two levels from a glob-of-globs),
/// so a single manual `Box::pin` at the recursive call site is simpler than
/// pulling in another dependency for it.
fn resolve_value<'a>(
    v: &'a Value,
    config: &'a Config,
    base: &'a str,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<String>, ResolveError>> + 'a>> {
    Box::pin(async move {
        match v {
            Value::Null => Ok(Vec::new()),
            Value::Str(s) => {
                let expanded = hancho_config::expand_str(s, config)?;
                Ok(expanded
                    .split_whitespace()
                    .map(|p| to_absolute(p, base))
                    .collect())
            }
            Value::Task(promise) => promise.outputs().await.map_err(ResolveError::UpstreamFailed),
            Value::List(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(resolve_value(item, config, base).await?);
                }
                Ok(out)
            }
            other => Err(ResolveError::Unsupported(other.type_name().to_string())),
        }
    })
}

fn to_absolute(path: &str, base: &str) -> String {
    let joined = hancho_paths::join_path(base, path);
    hancho_paths::abs_path(&joined).unwrap_or(joined)
}
