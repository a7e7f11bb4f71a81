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

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use hancho_config::{Config, OutputPromise, Value};
use tokio::sync::watch;

/// Where a Task is in its lifecycle. Transitions are driven entirely by the
/// scheduler (`hancho-build`); scripts only ever see a Task to pass it as
/// another Task's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    AwaitingInputs,
    Running,
    Succeeded,
    Failed,
    Skipped,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Skipped | TaskState::Cancelled
        )
    }
}

/// What a Task's promise resolves to. `Succeeded` and `Skipped` both carry
/// the resolved output list — from a downstream task's point of view a
/// skipped (up to date) task is just as usable a dependency as one that
/// actually ran.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Succeeded(Vec<String>),
    Skipped(Vec<String>),
    Failed(String),
    Cancelled,
}

/// A unit of work: a Config (its expansion context), lifecycle state, the
/// captured result of running (or skipping) its command, and a promise
/// other tasks can await to use its outputs as their own inputs.
pub struct Task {
    pub id: usize,
    pub config: Config,
    state: RefCell<TaskState>,
    tx: watch::Sender<Option<TaskOutcome>>,
    rx: watch::Receiver<Option<TaskOutcome>>,
    pub resolved_inputs: RefCell<Vec<String>>,
    pub resolved_outputs: RefCell<Vec<String>>,
    pub stdout: RefCell<Vec<u8>>,
    pub stderr: RefCell<Vec<u8>>,
    pub return_code: RefCell<Option<i32>>,
    pub reason: RefCell<Option<String>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("desc", &self.description())
            .finish()
    }
}

impl Task {
    pub fn new(id: usize, config: Config) -> Rc<Task> {
        let (tx, rx) = watch::channel(None);
        Rc::new(Task {
            id,
            config,
            state: RefCell::new(TaskState::Pending),
            tx,
            rx,
            resolved_inputs: RefCell::new(Vec::new()),
            resolved_outputs: RefCell::new(Vec::new()),
            stdout: RefCell::new(Vec::new()),
            stderr: RefCell::new(Vec::new()),
            return_code: RefCell::new(None),
            reason: RefCell::new(None),
        })
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    pub fn set_state(&self, state: TaskState) {
        *self.state.borrow_mut() = state;
    }

    pub fn set_reason(&self, reason: impl Into<String>) {
        *self.reason.borrow_mut() = Some(reason.into());
    }

    /// The task's `desc` field, expanded if possible, falling back to a
    /// numbered placeholder. Used for the scheduler's status banner and in
    /// `TaskHandle`'s debug/label output.
    pub fn description(&self) -> String {
        match self.config.get("desc") {
            Some(Value::Str(s)) => hancho_config::expand_str(&s, &self.config).unwrap_or(s),
            _ => format!("task #{}", self.id),
        }
    }

    /// A handle other tasks can hold as an `in_*` promise without owning
    /// the Task itself.
    pub fn handle(self: &Rc<Self>) -> TaskHandle {
        TaskHandle {
            id: self.id,
            label: self.description(),
            rx: self.rx.clone(),
        }
    }

    /// Transitions to a terminal state and fulfils the promise. Idempotent
    /// guard against double-completion is the caller's responsibility (the
    /// scheduler only ever calls this once per task).
    pub fn complete(&self, outcome: TaskOutcome) {
        let state = match &outcome {
            TaskOutcome::Succeeded(_) => TaskState::Succeeded,
            TaskOutcome::Skipped(_) => TaskState::Skipped,
            TaskOutcome::Failed(_) => TaskState::Failed,
            TaskOutcome::Cancelled => TaskState::Cancelled,
        };
        self.set_state(state);
        let _ = self.tx.send(Some(outcome));
    }
}

/// A Task's eventual output list, as held by another Task's `in_*` field.
/// Implements [`hancho_config::OutputPromise`] so it can live inside a
/// `Value::Task`.
#[derive(Clone)]
pub struct TaskHandle {
    id: usize,
    label: String,
    rx: watch::Receiver<Option<TaskOutcome>>,
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskHandle(#{}, {:?})", self.id, self.label)
    }
}

#[async_trait(?Send)]
impl OutputPromise for TaskHandle {
    async fn outputs(&self) -> Result<Vec<String>, String> {
        let mut rx = self.rx.clone();
        loop {
            if let Some(outcome) = rx.borrow().clone() {
                return match outcome {
                    TaskOutcome::Succeeded(paths) | TaskOutcome::Skipped(paths) => Ok(paths),
                    TaskOutcome::Failed(msg) => Err(msg),
                    TaskOutcome::Cancelled => Err(format!("{} was cancelled", self.label)),
                };
            }
            if rx.changed().await.is_err() {
                return Err(format!("{} was dropped before completing", self.label));
            }
        }
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_resolves_once_task_completes() {
        let task = Task::new(0, Config::empty());
        let handle = task.handle();
        task.complete(TaskOutcome::Succeeded(vec!["out.o".to_string()]));
        assert_eq!(handle.outputs().await.unwrap(), vec!["out.o".to_string()]);
    }

    #[tokio::test]
    async fn handle_surfaces_upstream_failure() {
        let task = Task::new(0, Config::empty());
        let handle = task.handle();
        task.complete(TaskOutcome::Failed("boom".to_string()));
        assert_eq!(handle.outputs().await.unwrap_err(), "boom");
    }

    #[tokio::test]
    async fn handle_awaits_completion_that_happens_later() {
        let task = Task::new(0, Config::empty());
        let handle = task.handle();
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let waiter = tokio::task::spawn_local(async move { handle.outputs().await });
                tokio::task::yield_now().await;
                task.complete(TaskOutcome::Skipped(vec!["cached.o".to_string()]));
                assert_eq!(waiter.await.unwrap().unwrap(), vec!["cached.o".to_string()]);
            })
            .await;
    }
}
