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

//! The live set of Tasks for one run. Unlike a build graph computed once up
//! front, `Tasks` accepts new tasks created mid-run — a task's own command
//! callback may call back into the host script to register further tasks
//! (reading a generated file list, say) — so the scheduler drains `pending`
//! in a loop rather than iterating a fixed graph once.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use hancho_config::Config;

use crate::task::{Task, TaskOutcome};

/// Owns every Task created during a run and the queue of ones the
/// scheduler hasn't yet picked up for dispatch.
pub struct Tasks {
    next_id: Cell<usize>,
    all: RefCell<Vec<Rc<Task>>>,
    pending: RefCell<VecDeque<usize>>,
}

impl Tasks {
    pub fn new() -> Tasks {
        Tasks {
            next_id: Cell::new(0),
            all: RefCell::new(Vec::new()),
            pending: RefCell::new(VecDeque::new()),
        }
    }

    /// Registers a new Task with `config`, queuing it for the scheduler to
    /// pick up on its next drain of `take_pending`. Safe to call from
    /// inside a running task's own command callback — `Tasks` only ever
    /// grows.
    pub fn create(&self, config: Config) -> Rc<Task> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let task = Task::new(id, config);
        self.all.borrow_mut().push(task.clone());
        self.pending.borrow_mut().push_back(id);
        task
    }

    /// Drains every task queued since the last call, in creation order.
    /// The scheduler calls this once per dispatch iteration so that tasks
    /// created by a callback running *during* that iteration are picked up
    /// on the next one rather than lost.
    pub fn take_pending(&self) -> Vec<Rc<Task>> {
        let ids: Vec<usize> = self.pending.borrow_mut().drain(..).collect();
        let all = self.all.borrow();
        ids.into_iter().map(|id| all[id].clone()).collect()
    }

    /// Prunes a task out of the run before the scheduler ever picks it up —
    /// used by target filtering to drop everything outside the requested
    /// subset. A no-op once the task has already been drained by
    /// `take_pending` (it's the scheduler's to finish at that point).
    pub fn cancel_pending(&self, id: usize) {
        let mut pending = self.pending.borrow_mut();
        if let Some(pos) = pending.iter().position(|&p| p == id) {
            pending.remove(pos);
            if let Some(task) = self.all.borrow().get(id) {
                task.complete(TaskOutcome::Cancelled);
            }
        }
    }

    pub fn get(&self, id: usize) -> Option<Rc<Task>> {
        self.all.borrow().get(id).cloned()
    }

    pub fn all(&self) -> Vec<Rc<Task>> {
        self.all.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.all.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every registered task has reached a terminal state. The
    /// scheduler's drain loop exits once this holds and `pending` is also
    /// empty.
    pub fn all_terminal(&self) -> bool {
        self.all.borrow().iter().all(|t| t.state().is_terminal())
    }
}

impl Default for Tasks {
    fn default() -> Tasks {
        Tasks::new()
    }
}
