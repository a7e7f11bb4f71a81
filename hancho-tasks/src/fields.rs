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

//! Accessors for the reserved Config fields listed in the fields-with-
//! reserved-semantics table: `job_count`, `force`, `task_dir`, `build_dir`,
//! `depformat`. Each has a documented default so callers never have to
//! special-case an absent field.

use hancho_config::{Config, Value};

pub fn job_count(config: &Config) -> i64 {
    match config.get("job_count") {
        Some(Value::Int(n)) if n >= 1 => n,
        _ => 1,
    }
}

pub fn force(config: &Config) -> bool {
    config.get("force").map(|v| v.is_truthy()).unwrap_or(false)
}

/// Defaults to `"."` — the scheduler always has *some* working directory to
/// run a command in, even for a task that never set `task_dir`.
pub fn task_dir(config: &Config) -> String {
    match config.get("task_dir") {
        Some(Value::Str(s)) => hancho_config::expand_str(&s, config).unwrap_or(s),
        _ => ".".to_string(),
    }
}

pub fn build_dir(config: &Config) -> Option<String> {
    match config.get("build_dir") {
        Some(Value::Str(s)) => Some(hancho_config::expand_str(&s, config).unwrap_or(s)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepFormat {
    Gcc,
    Msvc,
}

/// Defaults to `"gcc"` per the fields table.
pub fn depformat(config: &Config) -> DepFormat {
    match config.get("depformat") {
        Some(Value::Str(s)) if s.eq_ignore_ascii_case("msvc") => DepFormat::Msvc,
        _ => DepFormat::Gcc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent() {
        let c = Config::empty();
        assert_eq!(job_count(&c), 1);
        assert!(!force(&c));
        assert_eq!(task_dir(&c), ".");
        assert_eq!(build_dir(&c), None);
        assert_eq!(depformat(&c), DepFormat::Gcc);
    }

    #[test]
    fn reads_explicit_values() {
        let mut c = Config::empty();
        c.set("job_count", Value::Int(8));
        c.set("force", Value::Bool(true));
        c.set("task_dir", Value::Str("src".into()));
        c.set("depformat", Value::Str("msvc".into()));
        assert_eq!(job_count(&c), 8);
        assert!(force(&c));
        assert_eq!(task_dir(&c), "src");
        assert_eq!(depformat(&c), DepFormat::Msvc);
    }
}
