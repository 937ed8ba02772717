//! Generic collection transforms available as builtin chain verbs.
//!
//! Each transform also exists as a free function so the same operation can
//! be applied outside a chain. Transforms producing a single value return an
//! `Option`; chains turn that into records with [`into_records`].

use crate::error::{Error, Result};
use crate::task::{Record, Records};
use anyhow::Context;
use rand::seq::{IndexedRandom, SliceRandom};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// JavaScript-style truthiness of a record.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Look up a dotted path (`a.b.0`) inside a record.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |cur, key| match cur {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Partial deep comparison: every key in `source` must match in `value`.
pub fn is_match(value: &Value, source: &Value) -> bool {
    match (value, source) {
        (Value::Object(have), Value::Object(want)) => want
            .iter()
            .all(|(k, w)| have.get(k).is_some_and(|h| is_match(h, w))),
        (Value::Array(have), Value::Array(want)) => {
            want.iter().all(|w| have.iter().any(|h| is_match(h, w)))
        }
        _ => value == source,
    }
}

/// How a transform inspects each record.
#[derive(Clone, Default)]
pub enum Iteratee {
    /// The record itself.
    #[default]
    Identity,
    /// The value at a dotted path.
    Property(String),
    /// Whether the record partially matches an object.
    Matches(Value),
    /// Whether the value at a path partially matches.
    MatchesProperty(String, Value),
    Func(Arc<dyn Fn(&Value) -> Value + Send + Sync>),
}

impl Iteratee {
    /// Shorthand form used by textual chain steps:
    ///
    /// - empty: identity
    /// - `{"k": v}`: matches
    /// - `path=value`: matches-property, `value` read as JSON or else a string
    /// - anything else: property path
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Iteratee::Identity;
        }
        if text.starts_with('{') {
            if let Ok(obj @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
                return Iteratee::Matches(obj);
            }
        }
        if let Some((path, raw)) = text.split_once('=') {
            let raw = raw.trim();
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            return Iteratee::MatchesProperty(path.trim().to_string(), value);
        }
        Iteratee::Property(text.to_string())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Iteratee::Func(Arc::new(move |v: &Value| Value::Bool(f(v))))
    }

    pub fn mapper<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Iteratee::Func(Arc::new(f))
    }

    pub fn call(&self, value: &Value) -> Value {
        match self {
            Iteratee::Identity => value.clone(),
            Iteratee::Property(path) => get_path(value, path).cloned().unwrap_or(Value::Null),
            Iteratee::Matches(source) => Value::Bool(is_match(value, source)),
            Iteratee::MatchesProperty(path, source) => {
                Value::Bool(get_path(value, path).is_some_and(|v| is_match(v, source)))
            }
            Iteratee::Func(f) => f(value),
        }
    }

    pub fn test(&self, value: &Value) -> bool {
        truthy(&self.call(value))
    }
}

impl fmt::Debug for Iteratee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Iteratee::Identity => write!(f, "Identity"),
            Iteratee::Property(p) => write!(f, "Property({p:?})"),
            Iteratee::Matches(v) => write!(f, "Matches({v})"),
            Iteratee::MatchesProperty(p, v) => write!(f, "MatchesProperty({p:?}, {v})"),
            Iteratee::Func(_) => write!(f, "Func(..)"),
        }
    }
}

impl From<&str> for Iteratee {
    fn from(text: &str) -> Self {
        Iteratee::parse(text)
    }
}

pub fn filter(records: Records, it: &Iteratee) -> Records {
    records.into_iter().filter(|r| it.test(r)).collect()
}

pub fn reject(records: Records, it: &Iteratee) -> Records {
    records.into_iter().filter(|r| !it.test(r)).collect()
}

pub fn find(records: Records, it: &Iteratee) -> Option<Record> {
    records.into_iter().find(|r| it.test(r))
}

pub fn find_last(records: Records, it: &Iteratee) -> Option<Record> {
    records.into_iter().rev().find(|r| it.test(r))
}

pub fn map(records: Records, it: &Iteratee) -> Records {
    records.iter().map(|r| it.call(r)).collect()
}

/// Coerce a single-value result into records: nothing becomes one `null`,
/// an array is spliced in, anything else is wrapped.
pub fn into_records(value: Option<Record>) -> Records {
    match value {
        None => vec![Value::Null],
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
    }
}

/// Equality key for `uniq`: numbers compare by value, so `1`, `1.0` and
/// `-0` against `0` collapse.
fn uniq_key(value: &Value) -> String {
    match value {
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            // -0 and 0 are the same value
            format!("n:{}", if f == 0.0 { 0.0 } else { f })
        }
        other => other.to_string(),
    }
}

/// Drop repeated records, keeping first occurrences in order.
pub fn uniq(records: Records) -> Records {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(uniq_key(r)))
        .collect()
}

pub fn first(records: Records) -> Option<Record> {
    records.into_iter().next()
}

pub fn last(records: Records) -> Option<Record> {
    records.into_iter().next_back()
}

/// Pick records by position; out-of-range positions yield `null`.
pub fn at(records: &[Record], indices: &[usize]) -> Records {
    indices
        .iter()
        .map(|&i| records.get(i).cloned().unwrap_or(Value::Null))
        .collect()
}

pub fn sample(records: &[Record]) -> Option<Record> {
    records.choose(&mut rand::rng()).cloned()
}

pub fn shuffle(mut records: Records) -> Records {
    records.shuffle(&mut rand::rng());
    records
}

/// Parse `0,2`, `[0, 2]` or a single index.
pub fn parse_indices(text: &str) -> anyhow::Result<Vec<usize>> {
    let text = text.trim();
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text);
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().with_context(|| format!("invalid index {s:?}")))
        .collect()
}

/// The fixed set of builtin chain verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Filter,
    Reject,
    Find,
    FindLast,
    Map,
    Uniq,
    First,
    Last,
    At,
    Sample,
    Shuffle,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Filter,
        Builtin::Reject,
        Builtin::Find,
        Builtin::FindLast,
        Builtin::Map,
        Builtin::Uniq,
        Builtin::First,
        Builtin::Last,
        Builtin::At,
        Builtin::Sample,
        Builtin::Shuffle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Filter => "filter",
            Builtin::Reject => "reject",
            Builtin::Find => "find",
            Builtin::FindLast => "findLast",
            Builtin::Map => "map",
            Builtin::Uniq => "uniq",
            Builtin::First => "first",
            Builtin::Last => "last",
            Builtin::At => "at",
            Builtin::Sample => "sample",
            Builtin::Shuffle => "shuffle",
        }
    }

    /// Accepts the canonical names plus `find_last`.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "find_last" {
            return Some(Builtin::FindLast);
        }
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Apply with a textual argument, as a chain step written `name: options`.
    pub fn apply(self, records: Records, options: &str) -> Result<Records> {
        let out = match self {
            Builtin::Filter => filter(records, &Iteratee::parse(options)),
            Builtin::Reject => reject(records, &Iteratee::parse(options)),
            Builtin::Find => into_records(find(records, &Iteratee::parse(options))),
            Builtin::FindLast => into_records(find_last(records, &Iteratee::parse(options))),
            Builtin::Map => map(records, &Iteratee::parse(options)),
            Builtin::Uniq => uniq(records),
            Builtin::First => into_records(first(records)),
            Builtin::Last => into_records(last(records)),
            Builtin::At => {
                let indices = parse_indices(options).map_err(|e| Error::task(self.name(), e))?;
                at(&records, &indices)
            }
            Builtin::Sample => into_records(sample(&records)),
            Builtin::Shuffle => shuffle(records),
        };
        Ok(out)
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
