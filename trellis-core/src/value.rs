//! Dynamic values and their kinds.
//!
//! Bundles are authored independently, so the data that flows between them
//! (state fields, mutation arguments, derivation outputs) is dynamically typed
//! as [`serde_json::Value`]. Contracts are expressed with [`ValueKind`], which
//! is what composition compares when two bundles declare the same member.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use serde_json::Value;

/// The content of a state container: field name to value, in declaration order.
pub type Record = IndexMap<String, Value>;

/// Positional arguments of a mutation call.
pub type Args = Vec<Value>;

/// Coarse shape of a [`Value`], used in member contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
    /// Matches every value. Compatible with every other kind.
    Any,
}

impl ValueKind {
    /// Kind of a concrete value. Never returns [`ValueKind::Any`].
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Whether a value of this shape may be stored under this kind.
    pub fn accepts(self, value: &Value) -> bool {
        self == Self::Any || self == Self::of(value)
    }

    /// Whether two declared kinds describe the same contract.
    pub fn compatible(self, other: Self) -> bool {
        self == other || self == Self::Any || other == Self::Any
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}
