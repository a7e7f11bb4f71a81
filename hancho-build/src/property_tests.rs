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

//! Property test for the job-hog scheduling invariant (a task reserving
//! more slots than the pool's total capacity must still run, holding every
//! permit, without deadlocking the rest of the queue).

use proptest::prelude::*;

use hancho_config::{Config, Value};
use hancho_tasks::Tasks;

use crate::rebuilder::default_mtime_cache;
use crate::scheduler::{Report, Scheduler, SchedulerOptions};

fn run_with_job_counts(capacity: usize, job_counts: Vec<i64>) -> (Report, usize) {
    let tasks = Tasks::new();
    for jc in &job_counts {
        let mut c = Config::empty();
        c.set("job_count", Value::Int(*jc));
        tasks.create(c);
    }

    let options = SchedulerOptions {
        job_slots: capacity,
        shuffle: false,
        dry_run: false,
        verbose: false,
        quiet: true,
    };
    let scheduler = Scheduler::new(options, default_mtime_cache());

    let local = tokio::task::LocalSet::new();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let report = local.block_on(&rt, scheduler.run(&tasks));
    (report, job_counts.len())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// 500 ordinary tasks, one hog requesting far more than the pool holds,
    /// then 500 more ordinary tasks. Every task must still reach a terminal
    /// state — the hog is capped to the pool's total capacity rather than
    /// deadlocking waiting for permits that will never exist.
    #[test]
    fn job_hog_never_deadlocks_the_queue(capacity in 1usize..6, hog_position in 0usize..1000) {
        let mut job_counts: Vec<i64> = std::iter::repeat(1).take(500).collect();
        let insert_at = hog_position.min(job_counts.len());
        job_counts.insert(insert_at, (capacity as i64) * 10);
        job_counts.extend(std::iter::repeat(1).take(500));

        let (report, total) = run_with_job_counts(capacity, job_counts);
        prop_assert_eq!(report.started, total);
        prop_assert_eq!(report.skipped, total);
        prop_assert_eq!(report.failed, 0);
        prop_assert_eq!(report.cancelled, 0);
    }

    #[test]
    fn small_pool_with_single_hog_requesting_everything(capacity in 1usize..4) {
        let job_counts = vec![capacity as i64, 1, 1, 1];
        let (report, total) = run_with_job_counts(capacity, job_counts);
        prop_assert_eq!(report.started, total);
        prop_assert_eq!(report.skipped, total);
    }
}
