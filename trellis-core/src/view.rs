//! View-attribute producers and their merge policy.
//!
//! Several bundles may produce attributes for the same UI part. Their maps
//! are folded left to right in composition order; what happens when two maps
//! share a key is decided by an [`AttrPolicy`], which is plain data:
//!
//! | Strategy | Effect |
//! |---|---|
//! | `Override` | later value replaces earlier |
//! | `Concat` | strings joined in order with a separator |
//! | `Chain` | handlers all invoked in order |
//!
//! A key only one producer sets passes through untouched. A merge that does
//! not apply to the values at hand (a `Concat` key holding a number, say)
//! falls back to `Override`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::instance::ViewScope;
use crate::value::Value;

/// An event handler attribute.
pub type Handler = Arc<dyn Fn(&Value) -> Result<(), BoxError> + Send + Sync>;

/// Produces the attributes of one part. Receives the caller's params.
pub type ViewFn = Arc<dyn Fn(&ViewScope<'_>, &Value) -> Result<AttrMap, BoxError> + Send + Sync>;

/// Attributes of one UI part, in insertion order.
pub type AttrMap = IndexMap<String, AttrValue>;

/// One attribute: a plain value or a handler.
#[derive(Clone)]
pub enum AttrValue {
    Value(Value),
    Handler(Handler),
}

impl AttrValue {
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(f))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Handler(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// Invoke a handler attribute. Plain values do nothing.
    pub fn invoke(&self, event: &Value) -> Result<(), BoxError> {
        match self {
            Self::Handler(handler) => handler(event),
            Self::Value(_) => Ok(()),
        }
    }

    pub fn is_handler(&self) -> bool {
        matches!(self, Self::Handler(_))
    }
}

impl fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::from(value))
    }
}

/// Which keys a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPattern {
    Exact(String),
    Prefix(String),
}

impl KeyPattern {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Exact(name) => key == name,
            Self::Prefix(prefix) => key.starts_with(prefix.as_str()),
        }
    }
}

fn default_separator() -> String {
    " ".to_owned()
}

/// How two values for the same key combine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeStrategy {
    #[default]
    Override,
    Concat {
        #[serde(default = "default_separator")]
        separator: String,
    },
    Chain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrRule {
    pub pattern: KeyPattern,
    pub strategy: MergeStrategy,
}

/// Key classification for attribute merging. The first matching rule wins;
/// unmatched keys use [`MergeStrategy::Override`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrPolicy {
    #[serde(default)]
    pub rules: Vec<AttrRule>,
}

impl AttrPolicy {
    /// A policy where every key is plain.
    pub fn new() -> Self {
        Self::default()
    }

    /// `class` is concatenated, `on*` handlers are chained.
    pub fn conventional() -> Self {
        Self::new()
            .with_rule(
                KeyPattern::Exact("class".into()),
                MergeStrategy::Concat {
                    separator: default_separator(),
                },
            )
            .with_rule(KeyPattern::Prefix("on".into()), MergeStrategy::Chain)
    }

    pub fn with_rule(mut self, pattern: KeyPattern, strategy: MergeStrategy) -> Self {
        self.rules.push(AttrRule { pattern, strategy });
        self
    }

    pub fn classify(&self, key: &str) -> &MergeStrategy {
        static OVERRIDE: MergeStrategy = MergeStrategy::Override;
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(key))
            .map(|rule| &rule.strategy)
            .unwrap_or(&OVERRIDE)
    }

    /// Fold `next` into `base`. Keys keep their first position.
    pub fn merge(&self, base: &mut AttrMap, next: AttrMap) {
        for (key, value) in next {
            let merged = match base.get(&key) {
                Some(earlier) => combine(self.classify(&key), earlier, value),
                None => value,
            };
            base.insert(key, merged);
        }
    }
}

fn combine(strategy: &MergeStrategy, earlier: &AttrValue, later: AttrValue) -> AttrValue {
    match (strategy, earlier, later) {
        (
            MergeStrategy::Concat { separator },
            AttrValue::Value(Value::String(a)),
            AttrValue::Value(Value::String(b)),
        ) => {
            let joined = match (a.is_empty(), b.is_empty()) {
                (true, _) => b,
                (_, true) => a.clone(),
                _ => format!("{a}{separator}{b}"),
            };
            AttrValue::Value(Value::String(joined))
        }
        (MergeStrategy::Chain, AttrValue::Handler(first), AttrValue::Handler(second)) => {
            let first = Arc::clone(first);
            AttrValue::handler(move |event| {
                first(event)?;
                second(event)
            })
        }
        (_, _, later) => later,
    }
}
