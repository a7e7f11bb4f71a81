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

//! The prototype-chained `Config` and its recursive `{...}` template
//! expander: the data model every Task closes over.

mod config;
mod error;
mod expr;
mod template;
mod value;

pub use config::Config;
pub use error::{ConfigError, EvalError, ExpansionError};
pub use template::{enable_trace, expand_str, expand_str_bounded, expand_value, DEFAULT_MAX_DEPTH, DEFAULT_MAX_SIZE};
pub use value::{Callable, OutputPromise, Value};
