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

/// Failures normalising a Task's `in_*`/`out_*` fields into path lists.
/// `UpstreamFailed` is special: it means the *current* task should become
/// CANCELLED, not FAILED — the scheduler matches on it rather than
/// surfacing it as an ordinary task failure.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Expansion(#[from] hancho_config::ExpansionError),
    #[error("{0}")]
    UpstreamFailed(String),
    #[error("cannot use a {0} value in an in_*/out_* field")]
    Unsupported(String),
    #[error("{0}")]
    Io(String),
}
