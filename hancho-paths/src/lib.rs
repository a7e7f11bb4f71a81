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

//! Path and string helpers the template expander's fixed helper namespace
//! exposes to expressions (`ext`, `stem`, `join_path`, `rel_path`, `abs_path`,
//! `flatten`, `glob`, `swap_ext`). Pure functions over `String`/`Path`, no
//! filesystem access except `glob` and `abs_path`.

use std::path::{Component, Path, PathBuf};

/// Replaces a path's extension. `swap_ext("foo/bar.cpp", ".o") == "foo/bar.o"`.
/// If `new_ext` doesn't start with '.', one is inserted. A path with no
/// extension just gets the new one appended.
pub fn swap_ext(path: &str, new_ext: &str) -> String {
    let new_ext = if new_ext.is_empty() || new_ext.starts_with('.') {
        new_ext.to_string()
    } else {
        format!(".{}", new_ext)
    };
    let p = Path::new(path);
    let stem = p.with_extension("");
    format!("{}{}", stem.to_string_lossy(), new_ext)
}

/// The file extension, including the leading dot, or `""` if there is none.
pub fn ext(path: &str) -> String {
    match Path::new(path).extension() {
        Some(e) => format!(".{}", e.to_string_lossy()),
        None => String::new(),
    }
}

/// The filename without its extension.
pub fn stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Joins a prefix directory onto a path unless the path is already absolute.
pub fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() || Path::new(path).is_absolute() {
        return path.to_string();
    }
    let joined = Path::new(prefix).join(path);
    normalize_lexically(&joined).to_string_lossy().into_owned()
}

/// Lexical `..`/`.` collapsing, without touching the filesystem (so it works
/// for paths that don't exist yet, like a build output).
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `path` relative to `base`, both assumed to already be absolute (or at
/// least comparable). Falls back to `path` unchanged if they share no
/// common prefix (e.g. different drive roots on Windows).
pub fn rel_path(path: &str, base: &str) -> String {
    let path = normalize_lexically(Path::new(path));
    let base = normalize_lexically(Path::new(base));

    let path_components: Vec<_> = path.components().collect();
    let base_components: Vec<_> = base.components().collect();

    let common = path_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 && !base_components.is_empty() {
        return path.to_string_lossy().into_owned();
    }

    let mut out = PathBuf::new();
    for _ in common..base_components.len() {
        out.push("..");
    }
    for component in &path_components[common..] {
        out.push(component.as_os_str());
    }
    if out.as_os_str().is_empty() {
        ".".to_string()
    } else {
        out.to_string_lossy().into_owned()
    }
}

/// Joins `path` onto the process's current working directory if it is not
/// already absolute.
pub fn abs_path(path: &str) -> std::io::Result<String> {
    let p = Path::new(path);
    if p.is_absolute() {
        Ok(normalize_lexically(p).to_string_lossy().into_owned())
    } else {
        let cwd = std::env::current_dir()?;
        Ok(normalize_lexically(&cwd.join(p)).to_string_lossy().into_owned())
    }
}

/// Flattens nested string lists produced by glob/list-valued helpers. Used
/// both by the helper namespace and directly by the `in_*`/`out_*`
/// normaliser in `hancho-tasks`.
pub fn flatten(nested: Vec<Vec<String>>) -> Vec<String> {
    nested.into_iter().flatten().collect()
}

/// A thin wrapper over the `glob` crate: expands a shell glob pattern
/// against the filesystem and returns matching paths, sorted for
/// determinism. Unreadable entries are silently skipped (matching `glob`'s
/// own behavior of yielding only `Ok` paths we can stat).
pub fn glob(pattern: &str) -> Vec<String> {
    let mut matches: Vec<String> = match glob::glob(pattern) {
        Ok(paths) => paths
            .filter_map(Result::ok)
            .map(|p| p.to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    matches.sort();
    matches
}
