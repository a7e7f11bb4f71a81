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

use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::EvalError;

/// A Task's eventual output-file list, as seen from `hancho-config`.
///
/// `hancho-config` has no dependency on `hancho-tasks` (it's the other way
/// around), so a Task held inside a `Config` field is stored behind this
/// trait object instead of a concrete type. `hancho-tasks::TaskHandle`
/// implements it. Hancho's scheduler is a single-threaded cooperative
/// coordinator (a `tokio::task::LocalSet`, same as the task bodies below),
/// so this is `Rc`-shared and `?Send`, not `Arc`/`Send`.
#[async_trait(?Send)]
pub trait OutputPromise: fmt::Debug {
    /// Waits for the task to finish and returns its resolved, absolute
    /// output paths. `Err` means the task failed or was cancelled.
    async fn outputs(&self) -> Result<Vec<String>, String>;

    /// A short label used when a promise needs to be stringified before it
    /// has resolved (e.g. debug output, error messages).
    fn label(&self) -> String;
}

/// A value reachable from the Config chain that expressions can call.
pub trait Callable: fmt::Debug {
    fn call(&self, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, EvalError>;

    /// Name used in error messages (`"<name> is not callable"`, etc).
    fn name(&self) -> &str;
}

/// One Config field's value. Mirrors the dynamic value model a Config-based
/// build description needs: scalars, nested Configs, ordered sequences,
/// callables, and task promises.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Config(Config),
    Task(Rc<dyn OutputPromise>),
    Callable(Rc<dyn Callable>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Config(c) => c.fmt(f),
            Value::Task(t) => write!(f, "<task {}>", t.label()),
            Value::Callable(c) => write!(f, "<callable {}>", c.name()),
        }
    }
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Config(_) | Value::Task(_) | Value::Callable(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Config(_) => "Config",
            Value::Task(_) => "Task",
            Value::Callable(_) => "callable",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
