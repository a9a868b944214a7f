//! Trellis Core
//!
//! A composition engine for reactive UI behavior. Independently written
//! behavior bundles are combined into one coherent component specification
//! without any bundle knowing another's internals.
//!
//! The crate implements:
//!
//! - Private, versioned state with shape-checked writes
//! - Memoized, pull-based derivations with cycle detection
//! - Mutation entry points wrapped in ordered, vetoable interceptors
//! - Composition with dependency checks, contract checks and deterministic
//!   conflict resolution
//! - Merging of view attributes produced by several bundles
//!
//! # Architecture
//!
//! - `bundle`: bundle descriptors, member declarations, composed bundles
//! - `compose`: the composition engine
//! - `instance`: live instances and the scopes user code runs in
//! - `intercept`: interceptors, hook registry, async calls
//! - `reactive`: state containers, memo cells, evaluation stack, subscribers
//! - `graph`: node ids and declared-edge cycle detection
//! - `view`: attribute maps and the merge policy
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use trellis_core::*;
//!
//! let counter = BundleDescriptor::new("Counter")
//!     .state(StateDecl::new("counter").field("count", ValueKind::Number, json!(0)))
//!     .mutation(MutationDecl::new("increment", Signature::nullary(), |scope, _| {
//!         let count = scope.get("counter", "count")?.as_i64().unwrap_or(0) + 1;
//!         scope.set("counter", "count", json!(count))?;
//!         Ok(json!(count))
//!     }))
//!     .derivation(DerivationDecl::new("doubled", ValueKind::Number, |scope| {
//!         Ok(json!(scope.field("counter", "count")?.as_i64().unwrap_or(0) * 2))
//!     }))
//!     .define()?;
//!
//! let logging = BundleDescriptor::new("Logging")
//!     .depends_on("Counter")
//!     .intercept("increment", Interceptor::after(|_, result, _| {
//!         tracing::info!(%result, "incremented");
//!         Ok(result)
//!     }))
//!     .define()?;
//!
//! let instance = compose([&counter, &logging])?.instantiate(InstanceConfig::default());
//! instance.call("increment", vec![])?;
//! assert_eq!(instance.read("doubled")?, json!(2));
//! ```

pub mod bundle;
pub mod compose;
pub mod error;
pub mod graph;
pub mod instance;
pub mod intercept;
pub mod reactive;
pub mod value;
pub mod view;

pub use bundle::{
    Bundle, BundleDescriptor, BundleRef, ComposedBundle, DerivationDecl, Input, MemberKind, MutationDecl,
    Provenance, Signature, StateDecl,
};
pub use compose::{compose, Composer, ConflictPolicy};
pub use error::{BoxError, CompositionError, EngineError, Result};
pub use instance::{
    DerivationScope, Instance, InstanceConfig, InstanceId, MutationHandle, MutationScope, StateSnapshot,
    ViewScope,
};
pub use intercept::{
    AsyncCall, Before, CallOutcome, CancellationToken, HookContext, HookHandle, HookId, Interceptor, Phase, Veto,
};
pub use reactive::{Change, Subscription, Update};
pub use value::{Args, Record, Value, ValueKind};
pub use view::{AttrMap, AttrPolicy, AttrRule, AttrValue, Handler, KeyPattern, MergeStrategy};

/// Materialize a composed bundle. Same as
/// [`ComposedBundle::instantiate`].
pub fn instantiate(bundle: &ComposedBundle, config: InstanceConfig) -> Instance {
    bundle.instantiate(config)
}
