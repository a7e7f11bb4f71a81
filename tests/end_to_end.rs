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

//! End-to-end scenarios driven against the real `hancho::run` orchestrator
//! and a `tempdir`, covering the scenarios from §8 that need the full
//! pipeline (entry script -> tasks -> scheduler -> filesystem) rather than
//! a single crate's unit tests. Uses `cp`/shell redirection as a stand-in
//! compiler so the tests don't depend on a C toolchain being installed.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use hancho::CliConfig;
use hancho_build::{default_mtime_cache, Scheduler, SchedulerOptions};
use hancho_config::{Callable, Config, EvalError, Value};
use hancho_tasks::Tasks;

fn write(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn run(root_file: &Path) -> i32 {
    let config = CliConfig {
        root_file: root_file.to_string_lossy().into_owned(),
        quiet: true,
        ..CliConfig::default()
    };
    hancho::run(config).unwrap()
}

fn run_with(root_file: &Path, f: impl FnOnce(&mut CliConfig)) -> i32 {
    let mut config = CliConfig {
        root_file: root_file.to_string_lossy().into_owned(),
        quiet: true,
        ..CliConfig::default()
    };
    f(&mut config);
    hancho::run(config).unwrap()
}

/// Where a module's relative `out_*` paths actually land: `hancho-script`'s
/// auto-populated `build_dir` is `{root_dir}/build/debug/{repo_name}/{rel}`,
/// not the source directory — `repo_name` is the tempdir's own basename and
/// `rel` is the task's module directory relative to the repo root (empty
/// for a task declared directly in the root entry script).
fn build_dir(dir: &Path, rel: &str) -> PathBuf {
    let repo_name = dir.file_name().unwrap().to_string_lossy().into_owned();
    let base = dir.join("build").join("debug").join(repo_name);
    if rel.is_empty() {
        base
    } else {
        base.join(rel)
    }
}

fn touch_older(path: &Path) {
    let now = std::time::SystemTime::now() - Duration::from_secs(3600);
    filetime_set(path, now);
}

fn touch_newer(path: &Path) {
    let now = std::time::SystemTime::now() + Duration::from_secs(3600);
    filetime_set(path, now);
}

/// Sets a file's mtime without pulling in the `filetime` crate for one
/// call: `std::fs::File::set_modified` (stable since Rust 1.75).
fn filetime_set(path: &Path, time: std::time::SystemTime) {
    let file = fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(time).unwrap();
}

#[test]
fn two_file_build_rebuilds_once_then_skips() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", "hello");
    write(
        dir.path(),
        "build.hancho",
        r#"
            [[task]]
            desc = "copy a"
            in_src = "a.txt"
            out_obj = "a.copy"
            command = "cp {in_src} {out_obj}"
        "#,
    );
    let root = dir.path().join("build.hancho");

    let copy = build_dir(dir.path(), "").join("a.copy");

    touch_older(&dir.path().join("a.txt"));
    assert_eq!(run(&root), 0);
    assert!(copy.exists());

    let first_copy_mtime = fs::metadata(&copy).unwrap().modified().unwrap();

    // Second run: nothing changed, the copy should be skipped (not rewritten).
    assert_eq!(run(&root), 0);
    let second_copy_mtime = fs::metadata(&copy).unwrap().modified().unwrap();
    assert_eq!(first_copy_mtime, second_copy_mtime);

    // Touch the source newer than the output: should rebuild.
    touch_newer(&dir.path().join("a.txt"));
    assert_eq!(run(&root), 0);
    let third_copy_mtime = fs::metadata(&copy).unwrap().modified().unwrap();
    assert!(third_copy_mtime >= first_copy_mtime);
}

#[test]
fn depfile_dependency_triggers_rebuild_on_header_change() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.c", "source");
    write(dir.path(), "a.h", "header v1");
    write(
        dir.path(),
        "a.d",
        "a.o: a.c a.h\n",
    );
    write(
        dir.path(),
        "build.hancho",
        r#"
            [[task]]
            desc = "compile a"
            in_src = "a.c"
            out_obj = "a.o"
            depfile = "a.d"
            command = "cp {in_src} {out_obj}"
        "#,
    );
    let root = dir.path().join("build.hancho");

    let obj = build_dir(dir.path(), "").join("a.o");

    touch_older(&dir.path().join("a.c"));
    touch_older(&dir.path().join("a.h"));
    assert_eq!(run(&root), 0);
    let first_mtime = fs::metadata(&obj).unwrap().modified().unwrap();

    // Only the header (tracked via the depfile, not in_*) changes.
    write(dir.path(), "a.h", "header v2");
    touch_newer(&dir.path().join("a.h"));
    assert_eq!(run(&root), 0);
    let second_mtime = fs::metadata(&obj).unwrap().modified().unwrap();
    assert!(second_mtime >= first_mtime);
}

#[test]
fn target_regex_builds_only_the_matching_task() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", "a");
    write(dir.path(), "b.txt", "b");
    write(
        dir.path(),
        "build.hancho",
        r#"
            [[task]]
            desc = "copy a"
            in_src = "a.txt"
            out_obj = "a.copy"
            command = "cp {in_src} {out_obj}"

            [[task]]
            desc = "copy b"
            in_src = "b.txt"
            out_obj = "b.copy"
            command = "cp {in_src} {out_obj}"
        "#,
    );
    let root = dir.path().join("build.hancho");

    let code = run_with(&root, |c| c.target = Some("a\\.copy$".to_string()));
    assert_eq!(code, 0);
    assert!(build_dir(dir.path(), "").join("a.copy").exists());
    assert!(!build_dir(dir.path(), "").join("b.copy").exists());
}

#[test]
fn force_flag_rebuilds_even_when_up_to_date() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", "a");
    write(
        dir.path(),
        "build.hancho",
        r#"
            [[task]]
            desc = "copy a"
            in_src = "a.txt"
            out_obj = "a.copy"
            command = "cp {in_src} {out_obj}"
        "#,
    );
    let root = dir.path().join("build.hancho");

    let copy = build_dir(dir.path(), "").join("a.copy");

    touch_older(&dir.path().join("a.txt"));
    assert_eq!(run(&root), 0);
    let first_mtime = fs::metadata(&copy).unwrap().modified().unwrap();

    std::thread::sleep(Duration::from_millis(10));
    let code = run_with(&root, |c| c.force = true);
    assert_eq!(code, 0);
    let second_mtime = fs::metadata(&copy).unwrap().modified().unwrap();
    assert!(second_mtime >= first_mtime);
}

#[test]
fn failing_command_reports_nonzero_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "build.hancho",
        r#"
            [[task]]
            desc = "always fails"
            out_obj = "never.txt"
            command = "exit 7"
        "#,
    );
    let root = dir.path().join("build.hancho");
    assert_ne!(run(&root), 0);
}

/// Task A's command is a `Callable` that, when invoked, writes the file it
/// was meant to generate and then registers Task B directly against the
/// `Tasks` registry it captured at construction time — the dynamic-graph
/// re-entrancy case from §5, where a task's own command creates further
/// tasks mid-run. Driven directly through the Rust API (not the TOML
/// loader): `hancho-script`'s `[[task]]` format has no expression syntax
/// to declare a callback command inline.
#[derive(Debug)]
struct GenerateThenSpawn {
    tasks: Rc<Tasks>,
    generated_file: PathBuf,
    child_output: PathBuf,
}

impl Callable for GenerateThenSpawn {
    fn call(&self, _args: &[Value], _kwargs: &[(String, Value)]) -> Result<Value, EvalError> {
        fs::write(&self.generated_file, "one.src\n").unwrap();

        let mut child = Config::empty();
        child.set("desc", Value::Str("build from the generated list".into()));
        child.set(
            "out_obj",
            Value::Str(self.child_output.to_string_lossy().into_owned()),
        );
        child.set(
            "command",
            Value::Str(format!("touch {}", self.child_output.display())),
        );
        self.tasks.create(child);

        Ok(Value::Null)
    }

    fn name(&self) -> &str {
        "generate_then_spawn"
    }
}

#[test]
fn dynamic_graph_task_spawns_a_child_task_from_its_own_callback() {
    let dir = tempfile::tempdir().unwrap();
    let generated_file = dir.path().join("generated_list.txt");
    let child_output = dir.path().join("b.out");

    let tasks = Rc::new(Tasks::new());

    let mut parent = Config::empty();
    parent.set("desc", Value::Str("generate the source list".into()));
    parent.set(
        "out_marker",
        Value::Str(generated_file.to_string_lossy().into_owned()),
    );
    parent.set(
        "command",
        Value::Callable(Rc::new(GenerateThenSpawn {
            tasks: tasks.clone(),
            generated_file: generated_file.clone(),
            child_output: child_output.clone(),
        })),
    );
    tasks.create(parent);

    let options = SchedulerOptions {
        job_slots: 2,
        shuffle: false,
        dry_run: false,
        verbose: false,
        quiet: true,
    };
    let scheduler = Scheduler::new(options, default_mtime_cache());

    let local = tokio::task::LocalSet::new();
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let report = local.block_on(&rt, scheduler.run(&tasks));

    assert_eq!(report.failed, 0);
    assert_eq!(report.cancelled, 0);
    assert_eq!(tasks.len(), 2, "the callback's child task must have been queued and run");
    assert!(generated_file.exists());
    assert!(child_output.exists());
}

#[test]
fn include_makes_the_child_modules_tasks_run_too() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lib/src.txt", "lib source");
    write(
        dir.path(),
        "lib/build.hancho.toml",
        r#"
            [[task]]
            desc = "copy lib source"
            in_src = "src.txt"
            out_obj = "src.copy"
            command = "cp {in_src} {out_obj}"
        "#,
    );
    write(
        dir.path(),
        "build.hancho",
        r#"
            [[include]]
            path = "lib/build.hancho.toml"
        "#,
    );
    let root = dir.path().join("build.hancho");
    assert_eq!(run(&root), 0);
    assert!(build_dir(dir.path(), "lib").join("src.copy").exists());
}
