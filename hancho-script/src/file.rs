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

//! The on-disk shape of a `.hancho.toml` entry script: a `[config]` table of
//! global field overrides, zero or more `[[task]]` tables (each a flat
//! keyword map merged onto the module's Config to build one task), and zero
//! or more `[[include]]` entries pulling in another file.
//!
//! `toml`'s default table is a `BTreeMap`, so keys within one `[config]` or
//! `[[task]]` table come back in alphabetical rather than declared order.
//! This only matters where field order is observable (the accumulated
//! `in_*`/`out_*` list `hancho-tasks`'s resolver builds up), and is noted as
//! a known limitation of this thin stand-in rather than worked around with
//! an order-preserving map just for this one format.

use serde::Deserialize;

use hancho_config::{Config, Value};

#[derive(Debug, Deserialize, Default)]
pub struct HanchoFile {
    #[serde(default)]
    pub config: toml::value::Table,

    #[serde(default, rename = "task")]
    pub tasks: Vec<toml::value::Table>,

    #[serde(default, rename = "include")]
    pub includes: Vec<IncludeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct IncludeEntry {
    /// Path to the included file, relative to this file's own directory.
    pub path: String,

    /// When set, isolates the included module's build under
    /// `build_root/subrepo_name/...` (§6.2's subrepo loader).
    #[serde(default)]
    pub subrepo: Option<String>,

    /// When set, the included module's filtered exported Config is bound
    /// under this name in the including module's own Config (the plain
    /// loader's "returns its exported Config" — TOML has no expression
    /// syntax to bind an import to a local name, so a field name is it).
    #[serde(default, rename = "as")]
    pub as_name: Option<String>,
}

/// Converts one TOML table into a `Config` with no parent, suitable for
/// merging as a layer (`[config]`'s own table, or one `[[task]]` entry).
pub fn table_to_config(table: &toml::value::Table) -> Config {
    let mut c = Config::empty();
    for (k, v) in table {
        c.set(k.clone(), toml_to_value(v));
    }
    c
}

fn toml_to_value(v: &toml::Value) -> Value {
    match v {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(t) => Value::Config(table_to_config(t)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_task_and_include_tables() {
        let src = r#"
            [config]
            cc = "gcc"
            warnings = ["-Wall", "-Wextra"]

            [[task]]
            desc = "compile"
            in_src = "main.c"
            out_obj = "main.o"
            command = "{cc} -c {in_src} -o {out_obj}"

            [[include]]
            path = "lib/build.hancho.toml"
            as = "lib"
        "#;
        let file: HanchoFile = toml::from_str(src).unwrap();
        assert_eq!(file.tasks.len(), 1);
        assert_eq!(file.includes.len(), 1);
        assert_eq!(file.includes[0].as_name.as_deref(), Some("lib"));

        let config = table_to_config(&file.config);
        assert_eq!(config.get("cc").unwrap().as_str(), Some("gcc"));
        assert!(matches!(config.get("warnings"), Some(Value::List(items)) if items.len() == 2));
    }

    #[test]
    fn nested_table_becomes_nested_config() {
        let src = r#"
            [config.toolchain]
            cc = "clang"
        "#;
        let file: HanchoFile = toml::from_str(src).unwrap();
        let config = table_to_config(&file.config);
        match config.get("toolchain") {
            Some(Value::Config(inner)) => {
                assert_eq!(inner.get("cc").unwrap().as_str(), Some("clang"));
            }
            other => panic!("expected nested Config, got {:?}", other),
        }
    }
}
