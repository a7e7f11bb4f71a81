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

//! Runs a Task's resolved `command` field. Generalises `ninja-builder`'s
//! `CommandTask` (`tokio::process::Command`, captured `Output`,
//! `CommandTaskError::{SpawnFailed,CommandFailed}`) from a single shell
//! string to Hancho's three command shapes: a shell string, a sequential
//! list of them, and a Rust closure registered through the host API.

use std::path::Path;
use std::rc::Rc;

use hancho_config::{Callable, Config, Value};

use crate::error::CommandError;

pub enum ResolvedCommand {
    Shell(String),
    Sequence(Vec<String>),
    Callback(Rc<dyn Callable>),
}

/// The outcome of running a resolved command: captured stdout/stderr/exit
/// code, plus an optional replacement output list (only a `Callback` ever
/// sets this — per §4.6, "if the callable mutates out_*, the new list is
/// honored").
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub return_code: Option<i32>,
    pub replacement_outputs: Option<Vec<String>>,
}

/// Reads `config`'s `command` field. Assumes templates in it have already
/// been expanded against `config` by the caller (the scheduler expands the
/// whole Config before making the rebuild decision).
pub fn resolved_command(config: &Config) -> Result<Option<ResolvedCommand>, CommandError> {
    let expand = |s: String| -> Result<String, CommandError> {
        hancho_config::expand_str(&s, config)
            .map_err(|e| CommandError::CallbackFailed(e.to_string()))
    };

    match config.get("command") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Str(s)) => Ok(Some(ResolvedCommand::Shell(expand(s)?))),
        Some(Value::List(items)) => {
            let mut cmds = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Str(s) => cmds.push(expand(s)?),
                    other => {
                        return Err(CommandError::CallbackFailed(format!(
                            "command list element must be a string, got {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Some(ResolvedCommand::Sequence(cmds)))
        }
        Some(Value::Callable(c)) => Ok(Some(ResolvedCommand::Callback(c))),
        Some(other) => Err(CommandError::CallbackFailed(format!(
            "command field must be a string, list of strings, or callable, got {}",
            other.type_name()
        ))),
    }
}

/// Runs one resolved command under `task_dir`. Ensures each referenced
/// output's parent directory exists first, mirroring the teacher's
/// `CommandTask::run_command`. `task_config` is only used by the
/// `Callback` case, which is invoked with the Task (per §4.6) in the form
/// of its own Config.
pub async fn run(
    cmd: &ResolvedCommand,
    task_dir: &str,
    outputs: &[String],
    task_config: &Config,
) -> Result<RunOutcome, CommandError> {
    for output in outputs {
        if let Some(dir) = Path::new(output).parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir).map_err(CommandError::SpawnFailed)?;
            }
        }
    }

    match cmd {
        ResolvedCommand::Shell(s) => run_one(s, task_dir).await,
        ResolvedCommand::Sequence(cmds) => {
            let mut last = RunOutcome::default();
            for c in cmds {
                last = run_one(c, task_dir).await?;
            }
            Ok(last)
        }
        ResolvedCommand::Callback(callback) => run_callback(callback.as_ref(), task_config),
    }
}

async fn run_one(shell_command: &str, task_dir: &str) -> Result<RunOutcome, CommandError> {
    let output = tokio::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(shell_command)
        .current_dir(task_dir)
        .output()
        .await
        .map_err(CommandError::SpawnFailed)?;

    if !output.status.success() {
        return Err(CommandError::NonZeroExit {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }

    Ok(RunOutcome {
        stdout: output.stdout,
        stderr: output.stderr,
        return_code: output.status.code(),
        replacement_outputs: None,
    })
}

/// Invokes a `Callable` command "with the Task" (§4.6): the task's own
/// Config, reflecting its resolved `in_*`/`out_*`/reserved fields, is
/// passed as the callback's sole positional argument. A callback that
/// wants to register further tasks (§5's re-entrancy case) does so by
/// having captured an `Rc<Tasks>` of its own when it was constructed —
/// `Callable` can't carry one directly, since `hancho-config` (where the
/// trait lives) has no dependency on `hancho-tasks`.
fn run_callback(callback: &dyn Callable, task_config: &Config) -> Result<RunOutcome, CommandError> {
    match callback.call(&[Value::Config(task_config.clone())], &[]) {
        Ok(Value::List(items)) => {
            let replacement: Vec<String> = items
                .into_iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect();
            Ok(RunOutcome {
                replacement_outputs: Some(replacement),
                return_code: Some(0),
                ..Default::default()
            })
        }
        Ok(_) => Ok(RunOutcome {
            return_code: Some(0),
            ..Default::default()
        }),
        Err(e) => Err(CommandError::CallbackFailed(e.to_string())),
    }
}
