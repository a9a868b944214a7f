//! State Containers
//!
//! A state container holds one record and a version counter. Every accepted
//! write bumps the version, even when the new record equals the old one;
//! a rejected write leaves both untouched.

use std::fmt;

use parking_lot::RwLock;

use crate::value::{Record, Value};

/// A write to a state container.
pub enum Update<'a> {
    /// Store this record.
    Replace(Record),
    /// Compute the new record from the current one. Runs without the
    /// container locked; mutation bodies are serialized per instance, so no
    /// other call writes in between.
    With(Box<dyn FnOnce(&Record) -> Record + 'a>),
}

impl<'a> Update<'a> {
    pub fn with<F>(f: F) -> Self
    where
        F: FnOnce(&Record) -> Record + 'a,
    {
        Self::With(Box::new(f))
    }

    /// Set a single field, keeping the others.
    pub fn set(field: impl Into<String>, value: Value) -> Self {
        let field = field.into();
        Self::with(move |current| {
            let mut next = current.clone();
            next.insert(field, value);
            next
        })
    }
}

impl fmt::Debug for Update<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(record) => f.debug_tuple("Replace").field(record).finish(),
            Self::With(_) => f.write_str("With(..)"),
        }
    }
}

struct Slot {
    record: Record,
    version: u64,
}

pub(crate) struct StateContainer {
    name: String,
    slot: RwLock<Slot>,
}

impl StateContainer {
    pub(crate) fn new(name: impl Into<String>, initial: Record) -> Self {
        Self {
            name: name.into(),
            slot: RwLock::new(Slot {
                record: initial,
                version: 0,
            }),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn read(&self) -> (Record, u64) {
        let slot = self.slot.read();
        (slot.record.clone(), slot.version)
    }

    /// One field and the container version.
    pub(crate) fn field(&self, field: &str) -> (Option<Value>, u64) {
        let slot = self.slot.read();
        (slot.record.get(field).cloned(), slot.version)
    }

    pub(crate) fn version(&self) -> u64 {
        self.slot.read().version
    }

    /// Apply `update`, check the result with `validate` and commit it.
    /// Returns the new version.
    pub(crate) fn write(
        &self,
        update: Update<'_>,
        validate: impl FnOnce(&Record) -> Result<(), String>,
    ) -> Result<u64, String> {
        let next = match update {
            Update::Replace(record) => record,
            Update::With(f) => {
                let (current, _) = self.read();
                f(&current)
            }
        };
        validate(&next)?;

        let mut slot = self.slot.write();
        slot.record = next;
        slot.version += 1;
        Ok(slot.version)
    }
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(count: i64) -> Record {
        let mut record = Record::new();
        record.insert("count".into(), json!(count));
        record
    }

    #[test]
    fn every_write_bumps_the_version() {
        let container = StateContainer::new("counter", record(0));
        assert_eq!(container.version(), 0);

        container.write(Update::Replace(record(0)), |_| Ok(())).unwrap();
        assert_eq!(container.version(), 1);

        container.write(Update::set("count", json!(3)), |_| Ok(())).unwrap();
        let (current, version) = container.read();
        assert_eq!(current["count"], json!(3));
        assert_eq!(version, 2);
    }

    #[test]
    fn rejected_write_changes_nothing() {
        let container = StateContainer::new("counter", record(1));
        let err = container
            .write(Update::set("count", json!("x")), |_| Err("bad kind".into()))
            .unwrap_err();
        assert_eq!(err, "bad kind");
        assert_eq!(container.read(), (record(1), 0));
    }
}
