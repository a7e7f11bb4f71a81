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

//! The mtime rebuild-decision engine, the two depfile parsers, the
//! job-slot scheduler, and the subprocess/callback command runner.

mod command;
mod depfile;
mod error;
mod rebuilder;
mod scheduler;

#[cfg(test)]
mod property_tests;

pub use command::{resolved_command, run as run_command, RunOutcome, ResolvedCommand};
pub use depfile::{parse_depfile, DepfileFormat};
pub use error::{BuildError, CommandError, RebuildError};
pub use rebuilder::{decide, default_mtime_cache, Decision, DiskInterface, Mtime, MtimeCache, SystemDiskInterface};
pub use scheduler::{Report, Scheduler, SchedulerOptions};
