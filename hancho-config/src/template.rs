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

//! Recursive `{...}` template expansion over a [`Config`].

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::error::{EvalError, ExpansionError};
use crate::expr;
use crate::value::Value;

/// Recursion-depth bound before expansion is considered a runaway loop.
pub const DEFAULT_MAX_DEPTH: usize = 100;
/// Size bound (bytes) before expansion is considered a runaway loop.
pub const DEFAULT_MAX_SIZE: usize = 64 * 1024;

/// `--trace` instrumentation: off by default (mirrors `hancho_metrics`'s
/// `enable`/`is_enabled` pair), so the common path pays only an `AtomicBool`
/// load.
static TRACE_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn enable_trace() {
    TRACE_ENABLED.store(true, Ordering::Relaxed);
}

fn trace_enabled() -> bool {
    TRACE_ENABLED.load(Ordering::Relaxed)
}

/// Expands `template` against `config` to a fixed point, using the default
/// depth/size bounds.
pub fn expand_str(template: &str, config: &Config) -> Result<String, ExpansionError> {
    expand_str_bounded(template, config, DEFAULT_MAX_DEPTH, DEFAULT_MAX_SIZE)
}

/// Expands `template` against `config`, re-expanding the result until it
/// stabilizes. A stable result that still contains `{...}` segments (because
/// every name inside failed to resolve) is returned as-is, not an error —
/// that's how a Config can hold templates a child context resolves later.
/// Exceeding `max_depth` recursions or `max_size` bytes is a fatal
/// "expansion loop" error.
pub fn expand_str_bounded(
    template: &str,
    config: &Config,
    max_depth: usize,
    max_size: usize,
) -> Result<String, ExpansionError> {
    let mut current = template.to_string();
    let mut depth = 0usize;
    loop {
        let next = expand_once(&current, config)?;
        if trace_enabled() && next != current {
            eprintln!("expand[{}]: {:?} -> {:?}", depth, current, next);
        }
        if next == current {
            return Ok(next);
        }
        depth += 1;
        if depth > max_depth {
            return Err(ExpansionError::DepthExceeded(max_depth, template.to_string()));
        }
        if next.len() > max_size {
            return Err(ExpansionError::SizeExceeded(max_size, template.to_string()));
        }
        current = next;
    }
}

/// One left-to-right pass: finds balanced `{...}` segments, evaluates each
/// as an expression, and substitutes its stringified result. A segment whose
/// expression fails with a missing-name error is left as literal text.
fn expand_once(s: &str, config: &Config) -> Result<String, ExpansionError> {
    let segments = scan_segments(s);
    if segments.is_empty() {
        return Ok(s.to_string());
    }
    let mut out = String::with_capacity(s.len());
    let mut last = 0usize;
    for (start, end) in segments {
        out.push_str(&s[last..start]);
        let inner = &s[start + 1..end];
        match expr::eval_str(inner, config) {
            Ok(value) => out.push_str(&stringify_value(&value)),
            Err(EvalError::NameError(_)) => out.push_str(&s[start..=end]),
            Err(other) => return Err(ExpansionError::Eval(other)),
        }
        last = end + 1;
    }
    out.push_str(&s[last..]);
    Ok(out)
}

/// Byte ranges `(open_brace_index, close_brace_index)` of each top-level
/// `{...}` segment in `s`, tolerating (and skipping over) brace nesting.
fn scan_segments(s: &str) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        segments.push((start, i));
                    }
                }
            }
            _ => {}
        }
    }
    segments
}

/// Expands a non-string value: a list is expanded element-wise and the
/// result flattened (an element that itself expanded to a list is spliced
/// in); a Config passes through unchanged; other scalars pass through.
pub fn expand_value(v: &Value, config: &Config) -> Result<Value, ExpansionError> {
    match v {
        Value::Str(s) => Ok(Value::Str(expand_str(s, config)?)),
        Value::List(items) => {
            let mut out = Vec::new();
            for item in items {
                match expand_value(item, config)? {
                    Value::List(inner) => out.extend(inner),
                    other => out.push(other),
                }
            }
            Ok(Value::List(out))
        }
        other => Ok(other.clone()),
    }
}

/// Substitutes a value's string form into a template: strings pass through;
/// sequences are flattened, `Null`s dropped, elements stringified and joined
/// by a single space; Configs format to their debug representation.
fn stringify_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Str(s) => s.clone(),
        Value::List(items) => {
            let mut parts = Vec::new();
            flatten_for_stringify(items, &mut parts);
            parts.join(" ")
        }
        Value::Config(c) => format!("{:?}", c),
        Value::Task(t) => format!("<task {}>", t.label()),
        Value::Callable(c) => format!("<callable {}>", c.name()),
    }
}

fn flatten_for_stringify(items: &[Value], out: &mut Vec<String>) {
    for item in items {
        match item {
            Value::Null => {}
            Value::List(inner) => flatten_for_stringify(inner, out),
            other => out.push(stringify_value(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fixed_point_chain() {
        let mut c = Config::empty();
        c.set("a", Value::Str("a{b}".into()));
        c.set("b", Value::Str("b{c}".into()));
        c.set("c", Value::Str("c{d}".into()));
        c.set("d", Value::Str("d{e}".into()));
        c.set("e", Value::Int(1000));

        assert_eq!(expand_str("{a}", &c).unwrap(), "abcd1000");
    }

    #[test]
    fn lazy_fallthrough_resolves_in_child_context() {
        let mut bar = Config::empty();
        bar.set("thing", Value::Str("bear".into()));

        let mut foo = Config::empty();
        foo.set("msg", Value::Str("What's a {bar.thing}?".into()));

        let mut baz = Config::empty();
        baz.set("foo", Value::Config(foo));
        baz.set("bar", Value::Config(bar));

        assert_eq!(expand_str("{foo.msg}", &baz).unwrap(), "What's a bear?");
    }

    #[test]
    fn none_field_expands_to_empty_string() {
        let mut c = Config::empty();
        c.set("a", Value::Null);
        assert_eq!(expand_str("{a}", &c).unwrap(), "");
    }

    #[test]
    fn missing_key_passes_through_literally() {
        let c = Config::empty();
        assert_eq!(expand_str("{missing_key}", &c).unwrap(), "{missing_key}");
    }

    #[test]
    fn expansion_is_a_pure_function_of_template_and_config() {
        let mut c = Config::empty();
        c.set("x", Value::Int(7));
        let t = "value={x}";
        assert_eq!(expand_str(t, &c).unwrap(), expand_str(t, &c).unwrap());
    }

    #[test]
    fn already_expanded_result_is_a_fixed_point() {
        let mut c = Config::empty();
        c.set("x", Value::Int(7));
        let once = expand_str("value={x}", &c).unwrap();
        let twice = expand_str(&once, &c).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn runaway_expansion_hits_depth_bound() {
        let mut c = Config::empty();
        c.set("a", Value::Str("{a}x".into()));
        let err = expand_str_bounded("{a}", &c, 5, 1_000_000).unwrap_err();
        assert!(matches!(err, ExpansionError::DepthExceeded(5, _)));
    }

    #[test]
    fn runaway_expansion_hits_size_bound() {
        let mut c = Config::empty();
        c.set("a", Value::Str("{a}xx".into()));
        let err = expand_str_bounded("{a}", &c, 1_000, 16).unwrap_err();
        assert!(matches!(err, ExpansionError::SizeExceeded(16, _)));
    }

    #[test]
    fn list_is_flattened_and_nones_dropped() {
        let v = Value::List(vec![
            Value::Str("a".into()),
            Value::Null,
            Value::List(vec![Value::Str("b".into()), Value::Int(3)]),
        ]);
        assert_eq!(stringify_value(&v), "a b 3");
    }

    #[test]
    fn expand_value_passes_config_through() {
        let c = Config::empty();
        let nested = Config::with_parent(None).unwrap();
        let v = Value::Config(nested.clone());
        let expanded = expand_value(&v, &c).unwrap();
        assert!(matches!(expanded, Value::Config(_)));
        let _ = Arc::new(nested);
    }
}
