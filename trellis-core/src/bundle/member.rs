//! Member declarations.
//!
//! Each kind of bundle member has an explicit descriptor carrying both its
//! implementation and its contract. Composition compares contracts; it never
//! inspects implementations.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::BoxError;
use crate::instance::{DerivationScope, InstanceConfig, MutationScope};
use crate::value::{Args, Record, Value, ValueKind};

/// The namespaces a bundle declares members in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    State,
    Derivation,
    Mutation,
    /// View producers, keyed by part name.
    View,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::State => "state",
            Self::Derivation => "derivation",
            Self::Mutation => "mutation",
            Self::View => "view part",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// State
// ----------------------------------------------------------------------------

type StateInit = Arc<dyn Fn(&InstanceConfig) -> Record + Send + Sync>;

/// Declaration of a state container: its fields, their kinds and defaults.
#[derive(Clone)]
pub struct StateDecl {
    name: String,
    fields: IndexMap<String, (ValueKind, Value)>,
    init: Option<StateInit>,
}

impl StateDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            init: None,
        }
    }

    /// Declare a field with its kind and default value.
    pub fn field(mut self, name: impl Into<String>, kind: ValueKind, default: Value) -> Self {
        self.fields.insert(name.into(), (kind, default));
        self
    }

    /// Compute initial field values from the instance configuration.
    ///
    /// Fields the initializer leaves out keep their defaults.
    pub fn init_with<F>(mut self, init: F) -> Self
    where
        F: Fn(&InstanceConfig) -> Record + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields and their kinds.
    pub fn fields(&self) -> impl Iterator<Item = (&str, ValueKind)> + '_ {
        self.fields.iter().map(|(name, (kind, _))| (name.as_str(), *kind))
    }

    pub(crate) fn initial(&self, config: &InstanceConfig) -> Record {
        let mut record: Record = self
            .fields
            .iter()
            .map(|(name, (_, default))| (name.clone(), default.clone()))
            .collect();

        if let Some(init) = &self.init {
            for (field, value) in init(config) {
                match self.fields.get(&field) {
                    Some((kind, _)) if kind.accepts(&value) => {
                        record.insert(field, value);
                    }
                    Some((kind, _)) => tracing::warn!(
                        state = %self.name,
                        %field,
                        expected = %kind,
                        "initializer produced a value of the wrong kind; keeping default"
                    ),
                    None => tracing::warn!(
                        state = %self.name,
                        %field,
                        "initializer produced an undeclared field; ignoring it"
                    ),
                }
            }
        }

        record
    }

    /// Check a record against the declared fields.
    pub(crate) fn check(&self, record: &Record) -> Result<(), String> {
        for (field, value) in record {
            match self.fields.get(field) {
                None => return Err(format!("undeclared field `{field}`")),
                Some((kind, _)) if !kind.accepts(value) => {
                    return Err(format!(
                        "field `{field}` expects {kind}, got {}",
                        ValueKind::of(value)
                    ))
                }
                Some(_) => {}
            }
        }
        if let Some(missing) = self.fields.keys().find(|name| !record.contains_key(*name)) {
            return Err(format!("missing field `{missing}`"));
        }
        Ok(())
    }

    /// Describe why two declarations are incompatible, if they are.
    pub(crate) fn contract_conflict(&self, other: &StateDecl) -> Option<String> {
        for (field, (kind, _)) in &self.fields {
            match other.fields.get(field) {
                None => return Some(format!("field `{field}` is missing from the later declaration")),
                Some((other_kind, _)) if !kind.compatible(*other_kind) => {
                    return Some(format!("field `{field}` is {kind} vs {other_kind}"))
                }
                Some(_) => {}
            }
        }
        other
            .fields
            .keys()
            .find(|field| !self.fields.contains_key(*field))
            .map(|field| format!("field `{field}` is missing from the earlier declaration"))
    }
}

impl fmt::Debug for StateDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDecl")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("has_init", &self.init.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Derivations
// ----------------------------------------------------------------------------

/// An input a derivation declares explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Input {
    State(String),
    Derivation(String),
}

impl Input {
    pub fn state(name: impl Into<String>) -> Self {
        Self::State(name.into())
    }

    pub fn derivation(name: impl Into<String>) -> Self {
        Self::Derivation(name.into())
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(name) => write!(f, "state `{name}`"),
            Self::Derivation(name) => write!(f, "derivation `{name}`"),
        }
    }
}

type DeriveFn = Arc<dyn Fn(&DerivationScope<'_>) -> Result<Value, BoxError> + Send + Sync>;

/// Declaration of a derivation: a pure, memoized read.
#[derive(Clone)]
pub struct DerivationDecl {
    name: String,
    output: ValueKind,
    inputs: Option<Vec<Input>>,
    compute: DeriveFn,
}

impl DerivationDecl {
    /// A derivation whose inputs are tracked from what each evaluation reads.
    pub fn new<F>(name: impl Into<String>, output: ValueKind, compute: F) -> Self
    where
        F: Fn(&DerivationScope<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            output,
            inputs: None,
            compute: Arc::new(compute),
        }
    }

    /// Declare the inputs up front. Reading anything else becomes an error,
    /// and cycles through declared inputs are caught before the first
    /// evaluation.
    pub fn reads(mut self, inputs: impl IntoIterator<Item = Input>) -> Self {
        self.inputs = Some(inputs.into_iter().collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> ValueKind {
        self.output
    }

    /// Declared inputs, or `None` when inputs are tracked.
    pub fn inputs(&self) -> Option<&[Input]> {
        self.inputs.as_deref()
    }

    pub(crate) fn compute(&self, scope: &DerivationScope<'_>) -> Result<Value, BoxError> {
        (self.compute)(scope)
    }

    pub(crate) fn contract_conflict(&self, other: &DerivationDecl) -> Option<String> {
        (!self.output.compatible(other.output))
            .then(|| format!("output is {} vs {}", self.output, other.output))
    }
}

impl fmt::Debug for DerivationDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivationDecl")
            .field("name", &self.name)
            .field("output", &self.output)
            .field("inputs", &self.inputs)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Mutations
// ----------------------------------------------------------------------------

/// Parameter and return kinds of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Vec<ValueKind>,
    returns: ValueKind,
}

impl Signature {
    pub fn new(params: impl IntoIterator<Item = ValueKind>) -> Self {
        Self {
            params: params.into_iter().collect(),
            returns: ValueKind::Any,
        }
    }

    /// A mutation taking no arguments.
    pub fn nullary() -> Self {
        Self::new([])
    }

    pub fn returns(mut self, kind: ValueKind) -> Self {
        self.returns = kind;
        self
    }

    pub fn params(&self) -> &[ValueKind] {
        &self.params
    }

    pub fn return_kind(&self) -> ValueKind {
        self.returns
    }

    pub(crate) fn check_args(&self, args: &Args) -> Result<(), String> {
        if args.len() != self.params.len() {
            return Err(format!(
                "expected {} argument(s), got {}",
                self.params.len(),
                args.len()
            ));
        }
        for (position, (kind, value)) in self.params.iter().zip(args).enumerate() {
            if !kind.accepts(value) {
                return Err(format!(
                    "argument {position} expects {kind}, got {}",
                    ValueKind::of(value)
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn conflict(&self, other: &Signature) -> Option<String> {
        if self.params.len() != other.params.len() {
            return Some(format!(
                "arity {} vs {}",
                self.params.len(),
                other.params.len()
            ));
        }
        for (position, (a, b)) in self.params.iter().zip(&other.params).enumerate() {
            if !a.compatible(*b) {
                return Some(format!("parameter {position} is {a} vs {b}"));
            }
        }
        (!self.returns.compatible(other.returns))
            .then(|| format!("return is {} vs {}", self.returns, other.returns))
    }
}

type MutateFn = Arc<dyn Fn(&MutationScope<'_>, Args) -> Result<Value, BoxError> + Send + Sync>;

/// Declaration of a mutation entry point.
#[derive(Clone)]
pub struct MutationDecl {
    name: String,
    signature: Signature,
    body: MutateFn,
}

impl MutationDecl {
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&MutationScope<'_>, Args) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn run(&self, scope: &MutationScope<'_>, args: Args) -> Result<Value, BoxError> {
        (self.body)(scope, args)
    }
}

impl fmt::Debug for MutationDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationDecl")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}
