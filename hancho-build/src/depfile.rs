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

//! The two depfile shapes the rebuild-decision engine understands: gcc's
//! Makefile-rule output (`-MMD -MF`) and MSVC's structured `/sourceDependencies`
//! JSON. Both parsers treat a missing or malformed file as "no extra
//! dependencies" — a warning, not a fatal error, since a depfile simply
//! doesn't exist yet before the first successful build.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepfileFormat {
    Gcc,
    Msvc,
}

/// Reads and parses `path` according to `format`, returning the list of
/// transitive dependency paths it names. Any I/O or parse failure is
/// swallowed into an empty list, with a warning on stderr.
pub fn parse_depfile(path: &str, format: DepfileFormat) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match format {
            DepfileFormat::Gcc => parse_gcc(&contents),
            DepfileFormat::Msvc => parse_msvc(&contents),
        },
        Err(e) => {
            eprintln!("warning: could not read depfile '{}': {}", path, e);
            Vec::new()
        }
    }
}

/// Parses gcc/clang's `-MMD` Makefile-rule format. Only the first rule's
/// dependency list is used; `\` at end-of-line continues the rule onto the
/// next line, and `\ ` inside a path is a literal space rather than a
/// separator.
fn parse_gcc(contents: &str) -> Vec<String> {
    let joined = join_continuations(contents);
    let first_rule = match joined.lines().next() {
        Some(l) => l,
        None => return Vec::new(),
    };
    let rest = match first_rule.split_once(':') {
        Some((_target, rest)) => rest,
        None => return Vec::new(),
    };
    split_make_words(rest)
}

fn join_continuations(contents: &str) -> String {
    let mut out = String::with_capacity(contents.len());
    for line in contents.lines() {
        if let Some(stripped) = line.strip_suffix('\\') {
            out.push_str(stripped);
            out.push(' ');
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Splits a Makefile dependency list on unescaped whitespace, turning `\ `
/// into a literal space within a path and `\\` into a literal backslash.
fn split_make_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some(' ')) => {
                chars.next();
                current.push(' ');
            }
            '\\' if matches!(chars.peek(), Some('\\')) => {
                chars.next();
                current.push('\\');
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// MSVC's `/sourceDependencies` document, modeled just deep enough to reach
/// `Data.Includes` — the only field the rebuild-decision engine needs out
/// of it. Unknown fields (`Version`, `Data.Source`, ...) are ignored rather
/// than rejected, since this is a read-only consumer of a format MSVC owns.
#[derive(serde::Deserialize)]
struct SourceDependencies {
    #[serde(rename = "Data")]
    data: SourceDependenciesData,
}

#[derive(serde::Deserialize)]
struct SourceDependenciesData {
    #[serde(rename = "Includes", default)]
    includes: Vec<String>,
}

/// Parses MSVC's `/sourceDependencies` JSON document, collecting every path
/// under `Data.Includes`.
fn parse_msvc(contents: &str) -> Vec<String> {
    match serde_json::from_str::<SourceDependencies>(contents) {
        Ok(doc) => doc.data.includes,
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcc_single_line() {
        let src = "foo.o: foo.c foo.h\n";
        assert_eq!(parse_gcc(src), vec!["foo.c", "foo.h"]);
    }

    #[test]
    fn gcc_continuation_lines() {
        let src = "foo.o: foo.c \\\n  foo.h \\\n  bar.h\n";
        assert_eq!(parse_gcc(src), vec!["foo.c", "foo.h", "bar.h"]);
    }

    #[test]
    fn gcc_escaped_space_is_literal() {
        let src = "foo.o: My\\ Documents/foo.h\n";
        assert_eq!(parse_gcc(src), vec!["My Documents/foo.h"]);
    }

    #[test]
    fn gcc_only_first_rule() {
        let src = "foo.o: foo.c\nbar.o: bar.c\n";
        assert_eq!(parse_gcc(src), vec!["foo.c"]);
    }

    #[test]
    fn msvc_includes_list() {
        let src = r#"{"Version":"1.2","Data":{"Source":"foo.cpp","Includes":["c:\\a.h","c:\\b.h"]}}"#;
        assert_eq!(parse_msvc(src), vec!["c:\\a.h", "c:\\b.h"]);
    }

    #[test]
    fn msvc_missing_includes_is_empty() {
        assert!(parse_msvc("{}").is_empty());
    }

    #[test]
    fn missing_file_is_empty_not_error() {
        assert!(parse_depfile("/nonexistent/path.d", DepfileFormat::Gcc).is_empty());
    }
}
