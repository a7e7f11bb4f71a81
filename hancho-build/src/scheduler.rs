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

//! The job-slot scheduler. Generalises `ninja-builder`'s `ParallelTopoScheduler`
//! (a precomputed `petgraph` DAG walked in topological order, with a
//! `BuildState` tracking ready/waiting/finished node sets) into a form that
//! supports tasks created *during* a run: rather than building the whole
//! graph up front, dependency edges are promises (`hancho_tasks::TaskHandle`)
//! discovered lazily when a task resolves its own `in_*` fields, and the
//! `Tasks` registry's pending queue is drained in a loop so a task's own
//! command callback can register more tasks mid-run.
//!
//! A unit-capacity `tokio::sync::Semaphore` becomes a *counting* one from
//! which a task reserves `job_count` permits (capped at the pool's total
//! capacity, since requesting more than that would block forever).

use std::rc::Rc;

use console::Term;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::seq::SliceRandom;
use tokio::sync::Semaphore;

use hancho_tasks::{Task, TaskOutcome, TaskState, Tasks};

use crate::command::{self, ResolvedCommand};
use crate::rebuilder::{decide, Decision, DiskInterface, MtimeCache};

/// Tallies of how a run went, per §4.7's final report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub started: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

impl Report {
    /// Zero iff there were no failures and nothing was cancelled as a
    /// consequence of one.
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 && self.cancelled == 0 {
            0
        } else {
            1
        }
    }
}

pub struct SchedulerOptions {
    pub job_slots: usize,
    pub shuffle: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        SchedulerOptions {
            job_slots: num_cpus::get(),
            shuffle: false,
            dry_run: false,
            verbose: false,
            quiet: false,
        }
    }
}

pub struct Scheduler<Disk: DiskInterface> {
    jobs: Rc<Semaphore>,
    total_permits: usize,
    mtime_cache: Rc<MtimeCache<Disk>>,
    options: SchedulerOptions,
}

impl<Disk: DiskInterface + 'static> Scheduler<Disk> {
    pub fn new(options: SchedulerOptions, mtime_cache: MtimeCache<Disk>) -> Self {
        // `-j 0` means unbounded; model it as a semaphore large enough that
        // no realistic task count will exhaust it.
        let total_permits = if options.job_slots == 0 {
            usize::MAX / 2
        } else {
            options.job_slots
        };
        Scheduler {
            jobs: Rc::new(Semaphore::new(total_permits)),
            total_permits,
            mtime_cache: Rc::new(mtime_cache),
            options,
        }
    }

    /// Drives every task in `tasks` (plus any it creates along the way) to
    /// a terminal state and returns the final tally.
    pub async fn run(&self, tasks: &Tasks) -> Report {
        let mut rng = rand::thread_rng();
        let mut in_flight = FuturesUnordered::new();
        let mut report = Report::default();
        let total = Rc::new(std::cell::Cell::new(0usize));
        let finished = Rc::new(std::cell::Cell::new(0usize));
        let term = Rc::new(Term::stdout());

        loop {
            let mut newly_pending = tasks.take_pending();
            if !newly_pending.is_empty() {
                if self.options.shuffle {
                    newly_pending.shuffle(&mut rng);
                }
                for task in newly_pending {
                    total.set(total.get() + 1);
                    report.started += 1;
                    let jobs = self.jobs.clone();
                    let total_permits = self.total_permits;
                    let mtime_cache = self.mtime_cache.clone();
                    let dry_run = self.options.dry_run;
                    let verbose = self.options.verbose;
                    let quiet = self.options.quiet;
                    let total_count = total.clone();
                    let finished_count = finished.clone();
                    let term = term.clone();
                    in_flight.push(tokio::task::spawn_local(async move {
                        run_one(
                            task,
                            jobs,
                            total_permits,
                            mtime_cache,
                            dry_run,
                            verbose,
                            quiet,
                            total_count,
                            finished_count,
                            term,
                        )
                        .await
                    }));
                }
                continue;
            }

            if in_flight.is_empty() {
                break;
            }

            if let Some(outcome) = in_flight.next().await {
                if let Ok(outcome) = outcome {
                    tally(&mut report, outcome);
                }
            }
        }

        report
    }
}

fn tally(report: &mut Report, outcome: TaskOutcome) {
    match outcome {
        TaskOutcome::Succeeded(_) => report.succeeded += 1,
        TaskOutcome::Skipped(_) => report.skipped += 1,
        TaskOutcome::Failed(_) => report.failed += 1,
        TaskOutcome::Cancelled => report.cancelled += 1,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one<Disk: DiskInterface>(
    task: Rc<Task>,
    jobs: Rc<Semaphore>,
    total_permits: usize,
    mtime_cache: Rc<MtimeCache<Disk>>,
    dry_run: bool,
    verbose: bool,
    quiet: bool,
    total: Rc<std::cell::Cell<usize>>,
    finished: Rc<std::cell::Cell<usize>>,
    term: Rc<Term>,
) -> TaskOutcome {
    task.set_state(TaskState::AwaitingInputs);

    let outcome = execute(&task, dry_run, &mtime_cache, &jobs, total_permits).await;

    finished.set(finished.get() + 1);
    if !quiet {
        print_status(&term, &task, &outcome, finished.get(), total.get(), verbose);
    }

    task.complete(outcome.clone());
    outcome
}

/// Resolves inputs (awaiting any upstream `TaskHandle` promises), decides
/// whether a rebuild is needed, and only then — immediately before a
/// command actually runs — reserves job-pool permits. Permits must not be
/// held while awaiting an upstream promise: two tasks each holding the
/// only free slot while waiting on one another (or a job-hog task that
/// reserves the whole pool before its own inputs are even ready) would
/// deadlock, and a task would report `Running` before its upstream
/// actually finished, which §8's `A.finish_time <= B.start_time` forbids.
async fn execute<Disk: DiskInterface>(
    task: &Task,
    dry_run: bool,
    mtime_cache: &MtimeCache<Disk>,
    jobs: &Semaphore,
    total_permits: usize,
) -> TaskOutcome {
    let io = match hancho_tasks::resolve_io(&task.config).await {
        Ok(io) => io,
        Err(hancho_tasks::ResolveError::UpstreamFailed(msg)) => {
            task.set_reason(format!("upstream task failed: {}", msg));
            return TaskOutcome::Cancelled;
        }
        Err(e) => return TaskOutcome::Failed(e.to_string()),
    };

    *task.resolved_inputs.borrow_mut() = io.inputs.clone();
    *task.resolved_outputs.borrow_mut() = io.outputs.clone();

    let force = hancho_tasks::force(&task.config);
    let depformat = match hancho_tasks::depformat(&task.config) {
        hancho_tasks::DepFormat::Gcc => crate::depfile::DepfileFormat::Gcc,
        hancho_tasks::DepFormat::Msvc => crate::depfile::DepfileFormat::Msvc,
    };

    let decision = decide(&io, force, depformat, mtime_cache);

    let decision = match decision {
        Ok(d) => d,
        Err(e) => return TaskOutcome::Failed(e.to_string()),
    };

    match decision {
        Decision::Skip => {
            task.set_reason("up to date");
            TaskOutcome::Skipped(io.outputs)
        }
        Decision::Rebuild { reason } => {
            task.set_reason(reason);

            if dry_run {
                return TaskOutcome::Succeeded(io.outputs);
            }

            let requested = hancho_tasks::job_count(&task.config).max(1) as usize;
            let permits = requested.min(total_permits).max(1) as u32;
            let _permit = jobs.acquire_many(permits).await.expect("semaphore never closed");
            task.set_state(TaskState::Running);

            let task_dir = hancho_tasks::task_dir(&task.config);
            if let Some(build_dir) = hancho_tasks::build_dir(&task.config) {
                let _ = std::fs::create_dir_all(&build_dir);
            }

            let resolved = match command::resolved_command(&task.config) {
                Ok(Some(c)) => c,
                Ok(None) => return TaskOutcome::Succeeded(io.outputs),
                Err(e) => return TaskOutcome::Failed(e.to_string()),
            };

            run_command(task, &resolved, &task_dir, io.outputs).await
        }
    }
}

async fn run_command(task: &Task, resolved: &ResolvedCommand, task_dir: &str, outputs: Vec<String>) -> TaskOutcome {
    match command::run(resolved, task_dir, &outputs, &task.config).await {
        Ok(outcome) => {
            *task.stdout.borrow_mut() = outcome.stdout;
            *task.stderr.borrow_mut() = outcome.stderr;
            *task.return_code.borrow_mut() = outcome.return_code;
            let final_outputs = outcome.replacement_outputs.unwrap_or(outputs);
            TaskOutcome::Succeeded(final_outputs)
        }
        Err(e) => {
            if let crate::error::CommandError::NonZeroExit { stdout, stderr, .. } = &e {
                *task.stdout.borrow_mut() = stdout.clone();
                *task.stderr.borrow_mut() = stderr.clone();
            }
            TaskOutcome::Failed(e.to_string())
        }
    }
}

fn print_status(term: &Term, task: &Task, outcome: &TaskOutcome, finished: usize, total: usize, verbose: bool) {
    let banner = format!("[{}/{}] {}", finished, total, task.description());
    let _ = term.write_line(&banner);
    if verbose {
        if let Some(reason) = task.reason.borrow().as_ref() {
            let _ = term.write_line(&format!("  reason: {}", reason));
        }
    }
    if let TaskOutcome::Failed(msg) = outcome {
        let _ = term.write_line(&format!("  FAILED: {}", msg));
        let stderr = task.stderr.borrow();
        if !stderr.is_empty() {
            let _ = term.write_line(&String::from_utf8_lossy(&stderr));
        }
    }
}
