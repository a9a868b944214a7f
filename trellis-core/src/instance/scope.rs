//! What derivations, mutation bodies and view producers can see.
//!
//! Every scope knows which bundle the running code came from. State reads
//! are allowed when that bundle owns the state or depends (transitively) on
//! an owner; writes only when it owns it.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use super::{Instance, InstanceConfig, InstanceInner};
use crate::bundle::{DerivationDecl, Input};
use crate::error::{EngineError, Result};
use crate::graph::NodeId;
use crate::intercept::CallOutcome;
use crate::reactive::{InputVersions, Update};
use crate::value::{Args, Record, Value};
use crate::view::AttrValue;

fn foreign_read(bundle: &str, state: &str) -> EngineError {
    EngineError::ForeignRead {
        bundle: bundle.to_owned(),
        state: state.to_owned(),
    }
}

// ----------------------------------------------------------------------------
// Derivations
// ----------------------------------------------------------------------------

/// Read access for a derivation. Every read is recorded as an input of the
/// evaluation.
pub struct DerivationScope<'a> {
    instance: &'a Instance,
    index: usize,
    name: &'a str,
    level: usize,
    origin: &'a str,
    decl: &'a DerivationDecl,
    reads: &'a RefCell<InputVersions>,
}

impl<'a> DerivationScope<'a> {
    pub(crate) fn new(
        instance: &'a Instance,
        index: usize,
        name: &'a str,
        level: usize,
        origin: &'a str,
        decl: &'a DerivationDecl,
        reads: &'a RefCell<InputVersions>,
    ) -> Self {
        Self {
            instance,
            index,
            name,
            level,
            origin,
            decl,
            reads,
        }
    }

    /// Name of the derivation being evaluated.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Bundle whose implementation is running.
    pub fn bundle(&self) -> &str {
        self.origin
    }

    pub fn config(&self) -> &InstanceConfig {
        self.instance.config()
    }

    /// A whole state record.
    pub fn state(&self, state: &str) -> Result<Record> {
        let index = self.readable_state(state)?;
        let (record, version) = self.instance.read_state(index);
        self.record(NodeId::State(index), version);
        Ok(record)
    }

    /// One field of a state record; `null` when the field does not exist.
    pub fn field(&self, state: &str, field: &str) -> Result<Value> {
        let index = self.readable_state(state)?;
        let (value, version) = self.instance.read_field(index, field);
        self.record(NodeId::State(index), version);
        Ok(value.unwrap_or(Value::Null))
    }

    /// Another derivation's value.
    pub fn read(&self, derivation: &str) -> Result<Value> {
        let index = self.instance.derivation_index(derivation)?;
        self.check_declared(|input| matches!(input, Input::Derivation(d) if d == derivation), || {
            Input::derivation(derivation)
        })?;
        let (value, version) = self.instance.derivation_value(index)?;
        self.record(NodeId::Derivation(index), version);
        Ok(value)
    }

    /// Evaluate the implementation this one overrode. Its reads count as
    /// reads of this derivation.
    pub fn read_super(&self) -> Result<Value> {
        self.instance.compute(self.index, self.level + 1, self.reads)
    }

    fn readable_state(&self, state: &str) -> Result<usize> {
        let index = self.instance.state_index(state)?;
        self.check_declared(|input| matches!(input, Input::State(s) if s == state), || {
            Input::state(state)
        })?;
        if !self.instance.can_read_state(self.origin, index) {
            return Err(foreign_read(self.origin, state));
        }
        Ok(index)
    }

    fn check_declared(&self, declares: impl Fn(&Input) -> bool, input: impl FnOnce() -> Input) -> Result<()> {
        match self.decl.inputs() {
            Some(declared) if !declared.iter().any(declares) => Err(EngineError::UndeclaredInput {
                derivation: self.name.to_owned(),
                input: input().to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn record(&self, node: NodeId, version: u64) {
        let mut reads = self.reads.borrow_mut();
        if !reads.iter().any(|(n, _)| *n == node) {
            reads.push((node, version));
        }
    }
}

impl fmt::Debug for DerivationScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivationScope")
            .field("derivation", &self.name)
            .field("bundle", &self.origin)
            .field("level", &self.level)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Mutations
// ----------------------------------------------------------------------------

/// What a mutation body can do.
pub struct MutationScope<'a> {
    instance: &'a Instance,
    index: usize,
    name: &'a str,
    level: usize,
    origin: &'a str,
}

impl<'a> MutationScope<'a> {
    pub(crate) fn new(instance: &'a Instance, index: usize, name: &'a str, level: usize, origin: &'a str) -> Self {
        Self {
            instance,
            index,
            name,
            level,
            origin,
        }
    }

    pub fn mutation(&self) -> &str {
        self.name
    }

    /// Bundle whose implementation is running.
    pub fn bundle(&self) -> &str {
        self.origin
    }

    pub fn config(&self) -> &InstanceConfig {
        self.instance.config()
    }

    pub fn instance(&self) -> &Instance {
        self.instance
    }

    pub fn state(&self, state: &str) -> Result<Record> {
        let index = self.readable_state(state)?;
        Ok(self.instance.read_state(index).0)
    }

    /// One field of a state record; `null` when the field does not exist.
    pub fn get(&self, state: &str, field: &str) -> Result<Value> {
        let index = self.readable_state(state)?;
        Ok(self.instance.read_field(index, field).0.unwrap_or(Value::Null))
    }

    pub fn write(&self, state: &str, update: Update<'_>) -> Result<()> {
        let index = self.instance.state_index(state)?;
        if !self.instance.can_write_state(self.origin, index) {
            return Err(EngineError::ForeignWrite {
                mutation: self.name.to_owned(),
                bundle: self.origin.to_owned(),
                state: state.to_owned(),
            });
        }
        self.instance.write_state(index, update)
    }

    pub fn set(&self, state: &str, field: &str, value: Value) -> Result<()> {
        self.write(state, Update::set(field, value))
    }

    pub fn replace(&self, state: &str, record: Record) -> Result<()> {
        self.write(state, Update::Replace(record))
    }

    pub fn update<F>(&self, state: &str, f: F) -> Result<()>
    where
        F: FnOnce(&Record) -> Record,
    {
        self.write(state, Update::with(f))
    }

    pub fn read(&self, derivation: &str) -> Result<Value> {
        self.instance.read(derivation)
    }

    /// Call another mutation (or this one again). The nested call runs its
    /// own interceptor chain to completion before returning.
    pub fn call(&self, mutation: &str, args: Args) -> Result<CallOutcome> {
        self.instance.call(mutation, args)
    }

    /// Run the implementation this one overrode, without interceptors.
    pub fn call_super(&self, args: Args) -> Result<Value> {
        self.instance.run_body(self.index, self.level + 1, args)
    }

    fn readable_state(&self, state: &str) -> Result<usize> {
        let index = self.instance.state_index(state)?;
        if !self.instance.can_read_state(self.origin, index) {
            return Err(foreign_read(self.origin, state));
        }
        Ok(index)
    }
}

impl fmt::Debug for MutationScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationScope")
            .field("mutation", &self.name)
            .field("bundle", &self.origin)
            .field("level", &self.level)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Views
// ----------------------------------------------------------------------------

/// What a view producer can see: derivations, the state its bundle may read,
/// and handles to mutations.
pub struct ViewScope<'a> {
    instance: &'a Instance,
    origin: &'a str,
    part: &'a str,
}

impl<'a> ViewScope<'a> {
    pub(crate) fn new(instance: &'a Instance, origin: &'a str, part: &'a str) -> Self {
        Self {
            instance,
            origin,
            part,
        }
    }

    pub fn part(&self) -> &str {
        self.part
    }

    pub fn bundle(&self) -> &str {
        self.origin
    }

    pub fn config(&self) -> &InstanceConfig {
        self.instance.config()
    }

    pub fn read(&self, derivation: &str) -> Result<Value> {
        self.instance.read(derivation)
    }

    pub fn state(&self, state: &str) -> Result<Record> {
        let index = self.instance.state_index(state)?;
        if !self.instance.can_read_state(self.origin, index) {
            return Err(foreign_read(self.origin, state));
        }
        Ok(self.instance.read_state(index).0)
    }

    /// A handle that calls `mutation` on this instance later, for example
    /// from an event handler.
    pub fn handle(&self, mutation: &str) -> Result<MutationHandle> {
        self.instance.mutation_index(mutation)?;
        Ok(MutationHandle {
            instance: self.instance.downgrade(),
            mutation: Arc::from(mutation),
        })
    }
}

impl fmt::Debug for ViewScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewScope")
            .field("part", &self.part)
            .field("bundle", &self.origin)
            .finish()
    }
}

/// Calls one mutation on an instance without keeping the instance alive.
#[derive(Clone)]
pub struct MutationHandle {
    instance: Weak<InstanceInner>,
    mutation: Arc<str>,
}

impl MutationHandle {
    pub fn mutation(&self) -> &str {
        &self.mutation
    }

    pub fn call(&self, args: Args) -> Result<CallOutcome> {
        let instance = Instance::upgrade(&self.instance).ok_or(EngineError::InstanceDropped)?;
        instance.call(&self.mutation, args)
    }

    /// A handler attribute calling the mutation with arguments built from the
    /// event. A vetoed call counts as handled.
    pub fn handler<F>(&self, args: F) -> AttrValue
    where
        F: Fn(&Value) -> Args + Send + Sync + 'static,
    {
        let handle = self.clone();
        AttrValue::handler(move |event| {
            handle.call(args(event))?;
            Ok(())
        })
    }
}

impl fmt::Debug for MutationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationHandle")
            .field("mutation", &self.mutation)
            .field("alive", &(self.instance.strong_count() > 0))
            .finish()
    }
}
