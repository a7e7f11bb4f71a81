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

//! Top-level orchestrator: load the entry script, apply `-C`/overrides/
//! target filtering, drive the scheduler, and report the final tally.
//! Generalises `ninja::run` (`Config` struct, `FileLoader`, drive to
//! completion, final report) the same way `hancho-build` generalises
//! `ninja-builder`: a regex target filter replaces ninja's explicit
//! `description_to_tasks_with_start`, since there's no precomputed graph to
//! walk from a requested node.

use std::path::PathBuf;

use anyhow::Context;
use regex::Regex;

use hancho_build::{default_mtime_cache, Report, Scheduler, SchedulerOptions};
use hancho_config::{Config, Value};
use hancho_tasks::Tasks;

#[derive(Debug, Clone)]
pub struct CliConfig {
    /// `-C`: change to this directory before doing anything else.
    pub execution_dir: Option<String>,
    /// `-f`: entry script path, default `build.hancho`.
    pub root_file: String,
    /// `-j`: parallel job slots. `None` derives from available CPUs;
    /// `Some(0)` is unbounded.
    pub job_slots: Option<usize>,
    pub verbose: bool,
    pub quiet: bool,
    /// `-n`: make rebuild decisions but skip running subprocesses.
    pub dry_run: bool,
    /// `-d`: dump per-callsite wall-clock stats at the end of the run.
    pub debug: bool,
    pub force: bool,
    /// `--trace`: print every template expansion step to stderr.
    pub trace: bool,
    /// `-s`/`--shuffle`: dispatch newly-pending tasks in random order.
    pub shuffle: bool,
    pub use_color: bool,
    /// Optional target-regex, matched against each task's `desc`/`out_*`.
    pub target: Option<String>,
    /// Unrecognized `--key=value` flags, folded into the global Config as
    /// string overrides.
    pub overrides: Vec<(String, String)>,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            execution_dir: None,
            root_file: "build.hancho".to_string(),
            job_slots: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            debug: false,
            force: false,
            trace: false,
            shuffle: false,
            use_color: true,
            target: None,
            overrides: Vec::new(),
        }
    }
}

/// Runs one build. Returns the process exit code Hancho should report
/// (0 on full success, non-zero if any task failed or was cancelled).
pub fn run(config: CliConfig) -> anyhow::Result<i32> {
    if let Some(dir) = &config.execution_dir {
        std::env::set_current_dir(dir).with_context(|| format!("changing to {} for -C", dir))?;
    }

    if config.debug {
        hancho_metrics::enable();
    }
    if config.trace {
        hancho_config::enable_trace();
    }
    if !config.use_color {
        console::set_colors_enabled(false);
    }

    let overrides = build_overrides(&config);
    let tasks = Tasks::new();
    let root_path = PathBuf::from(&config.root_file);
    hancho_script::load_root(&root_path, "debug", &overrides, &tasks)
        .with_context(|| format!("loading {}", config.root_file))?;

    if let Some(pattern) = &config.target {
        filter_to_targets(&tasks, pattern)?;
    }

    let job_slots = config.job_slots.unwrap_or_else(num_cpus::get);
    let options = SchedulerOptions {
        job_slots,
        shuffle: config.shuffle,
        dry_run: config.dry_run,
        verbose: config.verbose,
        quiet: config.quiet,
    };
    let scheduler = Scheduler::new(options, default_mtime_cache());

    let local = tokio::task::LocalSet::new();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting the single-threaded scheduler runtime")?;
    let report: Report = local.block_on(&rt, scheduler.run(&tasks));

    if config.debug {
        hancho_metrics::dump();
    }
    if !config.quiet {
        print_summary(&report);
    }

    Ok(report.exit_code())
}

fn build_overrides(config: &CliConfig) -> Config {
    let mut overrides = Config::empty();
    overrides.set("force", Value::Bool(config.force));
    // `-j` sizes the scheduler's whole job pool (`job_slots`, passed
    // straight to `SchedulerOptions` below) — it must not also become a
    // global `job_count` override, or every task would reserve the
    // entire pool for itself and the build would run strictly serially.
    for (key, value) in &config.overrides {
        overrides.set(key.clone(), Value::Str(value.clone()));
    }
    overrides
}

/// Prunes every task whose `desc` and `out_*` fields all fail to match
/// `pattern`. Matches against each field's raw (possibly still-templated)
/// text if expansion fails, so a malformed template elsewhere doesn't block
/// filtering the one task actually requested. This is a direct per-task
/// filter, not a transitive "build this and everything it depends on" walk
/// — §6.2's entry-script format links tasks by matching file paths, not by
/// in-process promises the filter could trace back through.
fn filter_to_targets(tasks: &Tasks, pattern: &str) -> anyhow::Result<()> {
    let re = Regex::new(pattern).with_context(|| format!("invalid target regex {:?}", pattern))?;
    for task in tasks.all() {
        if !task_matches(&task, &re) {
            tasks.cancel_pending(task.id);
        }
    }
    Ok(())
}

fn task_matches(task: &hancho_tasks::Task, re: &Regex) -> bool {
    if re.is_match(&task.description()) {
        return true;
    }
    for (_, value) in task.config.fields_with_prefix("out_") {
        if let Value::Str(s) = value {
            let candidate = hancho_config::expand_str(s, &task.config).unwrap_or_else(|_| s.clone());
            if re.is_match(&candidate) {
                return true;
            }
        }
    }
    false
}

fn print_summary(report: &Report) {
    let term = console::Term::stdout();
    let _ = term.write_line(&format!(
        "{} succeeded, {} skipped, {} failed, {} cancelled",
        report.succeeded, report.skipped, report.failed, report.cancelled
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_filter_prunes_non_matching_tasks() {
        let tasks = Tasks::new();
        let mut a = Config::empty();
        a.set("desc", Value::Str("compile a.c".into()));
        a.set("out_obj", Value::Str("a.o".into()));
        tasks.create(a);

        let mut b = Config::empty();
        b.set("desc", Value::Str("compile b.c".into()));
        b.set("out_obj", Value::Str("b.o".into()));
        tasks.create(b);

        filter_to_targets(&tasks, "a\\.o$").unwrap();

        assert_eq!(tasks.get(0).unwrap().state(), hancho_tasks::TaskState::Pending);
        assert_eq!(tasks.get(1).unwrap().state(), hancho_tasks::TaskState::Cancelled);
    }

    #[test]
    fn default_cli_config_targets_the_conventional_entry_file() {
        let config = CliConfig::default();
        assert_eq!(config.root_file, "build.hancho");
        assert_eq!(config.job_slots, None);
    }
}
