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

//! A Task's lifecycle, the `Tasks` registry that owns every task created
//! during a run (including ones created mid-run by another task's
//! callback), and the `in_*`/`out_*` dependency resolver that turns a
//! Task's Config fields into ordered path lists.

mod error;
mod fields;
mod registry;
mod resolver;
mod task;

pub use error::ResolveError;
pub use fields::{build_dir, depformat, force, job_count, task_dir, DepFormat};
pub use registry::Tasks;
pub use resolver::{resolve_io, ResolvedIo};
pub use task::{Task, TaskHandle, TaskOutcome, TaskState};
