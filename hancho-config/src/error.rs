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

/// Failures constructing or merging a `Config`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parent chain forms a cycle")]
    ParentCycle,
}

/// Failures evaluating a single `{...}` expression segment.
///
/// `NameError` is special: the template expander treats it as "leave this
/// segment as literal text" rather than propagating it, so a Config can hold
/// templates that only resolve in a child's context.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    NameError(String),
    #[error("'{0}' is not callable")]
    NotCallable(String),
    #[error("wrong number of arguments to '{0}': expected {1}, got {2}")]
    Arity(String, usize, usize),
    #[error("type error: {0}")]
    TypeError(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("syntax error in expression: {0}")]
    Syntax(String),
    #[error("{0}")]
    Callable(String),
}

/// Failures expanding a template string against a `Config`.
#[derive(Debug, Error)]
pub enum ExpansionError {
    #[error("expansion loop: recursion depth exceeded {0} while expanding {1:?}")]
    DepthExceeded(usize, String),
    #[error("expansion loop: result grew beyond {0} bytes while expanding {1:?}")]
    SizeExceeded(usize, String),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
