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

//! The concrete, minimal stand-in for "whatever language is used to write
//! build scripts": a `.hancho.toml` document loaded into a `Tasks` registry.
//! Ninja's own build files are declarative, so there is no analogous
//! scripting host to generalise here — this crate is new, built to exercise
//! the host-facing interface (a callable entry, a loader, a subrepo loader,
//! the auto-populated Config fields) against the in-scope crates.

mod error;
mod fields;
mod file;
mod loader;

pub use error::ScriptError;
pub use fields::{module_fields, RootPaths};
pub use file::{table_to_config, HanchoFile, IncludeEntry};
pub use loader::load_root;
