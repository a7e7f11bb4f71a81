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

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::ConfigError;
use crate::value::Value;

/// A prototype-chained mapping from field name to [`Value`].
///
/// Lookup of a key absent from a Config's own fields falls through to its
/// `parent`, and so on, resolving to `None` rather than erroring once the
/// chain is exhausted. Once built, a Config is never mutated in place —
/// `merge` always produces a new one — so a Task that has closed over a
/// Config is safe from later mutation of the configs it was built from.
#[derive(Clone)]
pub struct Config {
    fields: IndexMap<String, Value>,
    parent: Option<Rc<Config>>,
}

impl Config {
    pub fn empty() -> Config {
        Config {
            fields: IndexMap::new(),
            parent: None,
        }
    }

    /// Builds a Config with no fields of its own, chained to `parent`.
    /// Errors if `parent`'s own chain already loops back on itself (a
    /// defensive check: Configs are immutable `Rc` snapshots, so in
    /// practice a cycle can only be introduced by code that hands back a
    /// parent referencing itself, which this catches at construction
    /// rather than as an infinite loop during lookup).
    pub fn with_parent(parent: Option<Rc<Config>>) -> Result<Config, ConfigError> {
        check_acyclic(&parent)?;
        Ok(Config {
            fields: IndexMap::new(),
            parent,
        })
    }

    /// Merges `layers` left to right: the first layer is the base (all of
    /// its fields, including explicit `Null`s, survive unless a later layer
    /// overrides them); each subsequent layer's non-`Null` fields override
    /// the accumulated result, with nested Configs merged recursively and
    /// sequences replaced wholesale. `Config::merge(p, [A, B, C])` is
    /// equivalent to merging `C` onto `Config::merge(p, [A, B])`.
    pub fn merge<'a, I>(parent: Option<Rc<Config>>, layers: I) -> Result<Config, ConfigError>
    where
        I: IntoIterator<Item = &'a Config>,
    {
        check_acyclic(&parent)?;
        let mut fields: IndexMap<String, Value> = IndexMap::new();
        let mut first = true;
        for layer in layers {
            if first {
                fields = layer.fields.clone();
                first = false;
            } else {
                fold_layer(&mut fields, &layer.fields)?;
            }
        }
        Ok(Config { fields, parent })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Resolves `key` by walking this Config then its parent chain.
    /// Returns `None` only once the whole chain is exhausted; an explicit
    /// `Value::Null` stored anywhere in the chain is returned as-is and
    /// does not fall through further, since it is a real (if empty) value.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.fields.get(key) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(key))
    }

    /// This Config's own fields, in insertion order, without walking the
    /// parent chain. Used by the `in_*`/`out_*` field scan, which operates
    /// on a Task's already-merged Config.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn fields_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.fields().filter(move |(k, _)| k.starts_with(prefix))
    }

    pub fn parent(&self) -> Option<&Rc<Config>> {
        self.parent.as_ref()
    }
}

fn fold_layer(
    base: &mut IndexMap<String, Value>,
    incoming: &IndexMap<String, Value>,
) -> Result<(), ConfigError> {
    for (k, v) in incoming.iter() {
        if matches!(v, Value::Null) {
            continue;
        }
        let merged = match (base.get(k), v) {
            (Some(Value::Config(existing)), Value::Config(incoming_cfg)) => {
                let parent = incoming_cfg
                    .parent
                    .clone()
                    .or_else(|| existing.parent.clone());
                Value::Config(Config::merge(parent, [existing, incoming_cfg])?)
            }
            _ => v.clone(),
        };
        base.insert(k.clone(), merged);
    }
    Ok(())
}

fn check_acyclic(parent: &Option<Rc<Config>>) -> Result<(), ConfigError> {
    let mut seen: Vec<*const Config> = Vec::new();
    let mut cur = parent.clone();
    while let Some(c) = cur {
        let ptr = Rc::as_ptr(&c);
        if seen.contains(&ptr) {
            return Err(ConfigError::ParentCycle);
        }
        seen.push(ptr);
        cur = c.parent.clone();
    }
    Ok(())
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_map();
        for (k, v) in self.fields.iter() {
            dbg.entry(k, v);
        }
        dbg.finish()
    }
}
