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

//! The well-known auto-populated Config fields from §6.2's table:
//! `root_dir`/`root_path`/`repo_name`/`repo_dir` are fixed for the whole
//! run; `mod_name`/`mod_dir`/`mod_path` vary per loaded file;
//! `build_root`/`build_tag`/`task_dir`/`build_dir` default from the others
//! but are ordinary Config fields an ancestor's `[config]` section (or a
//! subrepo loader) can override for everything beneath it.

use std::path::Path;

use hancho_config::{Config, Value};

/// Fixed for an entire run, computed once from the root entry script.
#[derive(Debug, Clone)]
pub struct RootPaths {
    pub root_dir: String,
    pub root_path: String,
    pub repo_name: String,
    pub repo_dir: String,
    pub build_tag: String,
}

impl RootPaths {
    pub fn new(root_file: &Path, build_tag: impl Into<String>) -> std::io::Result<RootPaths> {
        let root_path = hancho_paths::abs_path(&root_file.to_string_lossy())?;
        let root_dir = Path::new(&root_path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());
        let repo_name = Path::new(&root_dir)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repo".to_string());
        Ok(RootPaths {
            repo_dir: root_dir.clone(),
            root_dir,
            root_path,
            repo_name,
            build_tag: build_tag.into(),
        })
    }
}

/// Builds the per-module auto-populated layer for the file at `mod_path`,
/// to be merged under that module's own `[config]` table. `build_root`
/// defaults to `{root_dir}/build` and `build_dir` to
/// `{build_root}/{build_tag}/{repo_name}/{rel_path(task_dir, repo_dir)}`,
/// but both fall through the parent chain first — a module whose ancestor
/// already set `build_root` (e.g. a subrepo loader) inherits that value
/// instead of this default, since `Config::merge` only overrides with
/// non-`Null` fields and this layer is merged *under* the ancestor's.
pub fn module_fields(root: &RootPaths, mod_path: &str, inherited_build_root: Option<&str>) -> Config {
    let mod_dir = Path::new(mod_path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    let mod_name = Path::new(mod_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_string());

    let build_root = inherited_build_root
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("{}/build", root.root_dir));
    let task_dir = mod_dir.clone();
    let build_dir = format!(
        "{}/{}/{}/{}",
        build_root,
        root.build_tag,
        root.repo_name,
        hancho_paths::rel_path(&task_dir, &root.repo_dir)
    );

    let mut c = Config::empty();
    c.set("root_dir", Value::Str(root.root_dir.clone()));
    c.set("root_path", Value::Str(root.root_path.clone()));
    c.set("repo_name", Value::Str(root.repo_name.clone()));
    c.set("repo_dir", Value::Str(root.repo_dir.clone()));
    c.set("mod_name", Value::Str(mod_name));
    c.set("mod_dir", Value::Str(mod_dir));
    c.set("mod_path", Value::Str(mod_path.to_string()));
    c.set("build_root", Value::Str(build_root));
    c.set("build_tag", Value::Str(root.build_tag.clone()));
    c.set("task_dir", Value::Str(task_dir));
    c.set("build_dir", Value::Str(build_dir));
    c
}
