//! Error types.
//!
//! Errors are split by when they can happen. [`CompositionError`] is only ever
//! returned by [`Bundle::define`](crate::Bundle::define) and the composition
//! entry points; once a [`ComposedBundle`](crate::ComposedBundle) exists, it
//! can always be instantiated. [`EngineError`] covers everything that goes
//! wrong while an [`Instance`](crate::Instance) is running.
//!
//! A vetoed mutation is not an error. It is reported as
//! [`CallOutcome::Vetoed`](crate::CallOutcome::Vetoed).

use thiserror::Error;

use crate::bundle::MemberKind;
use crate::intercept::Phase;

/// Error type returned by user callbacks (derivations, mutation bodies,
/// hooks, view producers and attribute handlers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for runtime operations.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Raised while defining or composing bundles.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// A source bundle depends on a bundle that is not in the composition set.
    #[error("bundle `{bundle}` depends on `{dependency}`, which is not part of the composition")]
    MissingDependency { bundle: String, dependency: String },

    /// Two bundles declare the same member with contracts that do not match.
    #[error("{kind} `{name}` is declared by `{earlier}` and `{later}` with incompatible contracts: {detail}")]
    ContractMismatch {
        kind: MemberKind,
        name: String,
        earlier: String,
        later: String,
        detail: String,
    },

    /// An interceptor targets a mutation that no bundle in the set declares.
    #[error("bundle `{bundle}` intercepts unknown mutation `{mutation}`")]
    UnknownHookTarget { bundle: String, mutation: String },

    /// A single bundle declares the same member twice.
    #[error("bundle `{bundle}` declares {kind} `{name}` more than once")]
    DuplicateMember {
        bundle: String,
        kind: MemberKind,
        name: String,
    },

    /// Two distinct bundle definitions share a name.
    #[error("two different bundles are named `{name}`")]
    DuplicateBundle { name: String },

    /// Explicit conflict policy is in effect and a collision was not picked.
    #[error("{kind} `{name}` is declared by {bundles:?} and no pick resolves it")]
    UnresolvedConflict {
        kind: MemberKind,
        name: String,
        bundles: Vec<String>,
    },

    /// A pick names a bundle that does not contribute the member.
    #[error("pick for {kind} `{name}` names `{bundle}`, which does not declare it")]
    InvalidPick {
        kind: MemberKind,
        name: String,
        bundle: String,
    },

    /// A derivation declares an input that does not exist.
    #[error("derivation `{derivation}` declares unknown input {input}")]
    UnknownInput { derivation: String, input: String },

    /// A derivation declares a state input whose owner it does not depend on.
    #[error("derivation `{derivation}` of bundle `{bundle}` reads state `{state}` without depending on its owner")]
    ForeignInput {
        derivation: String,
        bundle: String,
        state: String,
    },
}

/// Raised by a running [`Instance`](crate::Instance).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Derivations depend on each other in a loop.
    #[error("derivation cycle: {}", path.join(" -> "))]
    DerivationCycle { path: Vec<String> },

    /// A hook callback failed. The rest of the chain did not run.
    #[error("{phase} hook on `{mutation}` failed")]
    HookExecution {
        mutation: String,
        phase: Phase,
        #[source]
        source: BoxError,
    },

    /// A mutation body failed.
    #[error("mutation `{mutation}` failed")]
    MutationFailed {
        mutation: String,
        #[source]
        source: BoxError,
    },

    /// A derivation function failed.
    #[error("derivation `{derivation}` failed")]
    DerivationFailed {
        derivation: String,
        #[source]
        source: BoxError,
    },

    /// A view producer failed.
    #[error("view producer for part `{part}` from bundle `{bundle}` failed")]
    ViewFailed {
        part: String,
        bundle: String,
        #[source]
        source: BoxError,
    },

    /// No member of this kind and name exists.
    #[error("unknown {kind} `{name}`")]
    UnknownMember { kind: MemberKind, name: String },

    /// A derivation with declared inputs read something it did not declare.
    #[error("derivation `{derivation}` read undeclared input {input}")]
    UndeclaredInput { derivation: String, input: String },

    /// A bundle read state it neither owns nor depends on.
    #[error("bundle `{bundle}` may not read state `{state}`")]
    ForeignRead { bundle: String, state: String },

    /// A mutation wrote state its bundle did not declare.
    #[error("mutation `{mutation}` of bundle `{bundle}` may not write state `{state}`")]
    ForeignWrite {
        mutation: String,
        bundle: String,
        state: String,
    },

    /// A write did not match the state's declared fields.
    #[error("write to state `{state}` violates its shape: {detail}")]
    ShapeViolation { state: String, detail: String },

    /// Call arguments did not match the mutation's signature.
    #[error("arguments for mutation `{mutation}` do not match its signature: {detail}")]
    ArgumentMismatch { mutation: String, detail: String },

    /// `call_super` or `read_super` was used where nothing was overridden.
    #[error("{kind} `{name}` does not override an earlier implementation")]
    NoOverridden { kind: MemberKind, name: String },

    /// A synchronous call reached an asynchronous hook.
    #[error("mutation `{mutation}` has asynchronous hooks; use call_async")]
    AsyncHookInSyncCall { mutation: String },

    /// A handle outlived the instance it points to.
    #[error("instance has been dropped")]
    InstanceDropped,
}

impl EngineError {
    /// Convert a callback error, keeping engine errors raised further down
    /// (for example by a nested call) instead of wrapping them again.
    pub(crate) fn from_callback(err: BoxError, wrap: impl FnOnce(BoxError) -> EngineError) -> Self {
        match err.downcast::<EngineError>() {
            Ok(engine) => *engine,
            Err(other) => wrap(other),
        }
    }

    pub(crate) fn unknown(kind: MemberKind, name: impl Into<String>) -> Self {
        Self::UnknownMember {
            kind,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_errors_are_wrapped() {
        let err: BoxError = "boom".into();
        let wrapped = EngineError::from_callback(err, |source| EngineError::MutationFailed {
            mutation: "submit".into(),
            source,
        });
        assert!(matches!(wrapped, EngineError::MutationFailed { ref mutation, .. } if mutation == "submit"));
        assert_eq!(wrapped.to_string(), "mutation `submit` failed");
    }

    #[test]
    fn engine_errors_pass_through() {
        let inner = EngineError::DerivationCycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        let err: BoxError = Box::new(inner);
        let passed = EngineError::from_callback(err, |source| EngineError::MutationFailed {
            mutation: "outer".into(),
            source,
        });
        assert_eq!(passed.to_string(), "derivation cycle: a -> b -> a");
    }
}
