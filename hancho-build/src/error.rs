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

use thiserror::Error;

/// Failures consulting the mtime cache while making a rebuild decision.
/// Malformed depfiles are *not* represented here — per the design notes,
/// those are warnings, so `parse_gcc_depfile`/`parse_msvc_depfile` return an
/// empty dependency list rather than an error.
#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("error checking mtime of '{path}': {source}")]
    Stat {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn command: {0}")]
    SpawnFailed(#[from] std::io::Error),
    #[error("command exited with {code:?}")]
    NonZeroExit {
        code: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    #[error("callback failed: {0}")]
    CallbackFailed(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Rebuild(#[from] RebuildError),
    #[error(transparent)]
    Resolve(#[from] hancho_tasks::ResolveError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("{0}")]
    Io(String),
}
