//! Interception System
//!
//! Interceptors wrap mutation entry points with ordered before/after
//! callbacks.
//!
//! # Execution
//!
//! For `call(name, args)`:
//!
//! 1. Before-callbacks run in registration order. Each returns the
//!    (possibly transformed) arguments or a veto.
//! 2. A veto stops the call. The body and every after-callback are skipped
//!    and the caller gets [`CallOutcome::Vetoed`].
//! 3. The mutation body runs with the final arguments.
//! 4. After-callbacks run in the same order as the before-callbacks, each
//!    transforming the running result.
//!
//! A callback error aborts the remaining chain and is returned as
//! [`EngineError::HookExecution`](crate::EngineError::HookExecution).
//!
//! Callbacks may also be asynchronous; see [`task`] for how concurrent
//! asynchronous calls are ordered.

mod registry;
pub mod task;

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

pub use registry::{HookHandle, HookId};
pub(crate) use registry::HookRegistry;
pub use task::{AsyncCall, CancellationToken};

use crate::error::BoxError;
use crate::instance::Instance;
use crate::value::{Args, Value};

/// The two sides of an interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("before"),
            Self::After => f.write_str("after"),
        }
    }
}

/// What a before-callback decides.
#[derive(Debug, Clone, PartialEq)]
pub enum Before {
    /// Go on with these arguments.
    Continue(Args),
    /// Cancel the call without error.
    Veto(Option<String>),
}

impl Before {
    pub fn veto(reason: impl Into<String>) -> Self {
        Self::Veto(Some(reason.into()))
    }
}

/// A declined call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Veto {
    pub mutation: String,
    pub reason: Option<String>,
}

/// Result of a mutation call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The body ran; this is the result after every after-callback.
    Completed(Value),
    /// A before-callback vetoed. Nothing was written.
    Vetoed(Veto),
    /// A newer asynchronous call on the same entry point started before this
    /// one resolved; this call's result was discarded.
    Superseded,
    /// The call's cancellation token fired.
    Cancelled,
}

impl CallOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_vetoed(&self) -> bool {
        matches!(self, Self::Vetoed(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// What a callback can see of the call it intercepts.
#[derive(Clone)]
pub struct HookContext {
    instance: Instance,
    mutation: Arc<str>,
    cancellation: Option<CancellationToken>,
}

impl HookContext {
    pub(crate) fn new(instance: Instance, mutation: &str, cancellation: Option<CancellationToken>) -> Self {
        Self {
            instance,
            mutation: Arc::from(mutation),
            cancellation,
        }
    }

    /// The instance being called. Hooks may read from it or call other
    /// mutations (those run nested, to completion).
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn mutation(&self) -> &str {
        &self.mutation
    }

    /// Token of the asynchronous call in progress, if any.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }
}

impl fmt::Debug for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("instance", &self.instance.id())
            .field("mutation", &self.mutation)
            .finish()
    }
}

pub type BeforeFn = Arc<dyn Fn(&HookContext, Args) -> Result<Before, BoxError> + Send + Sync>;
pub type AfterFn = Arc<dyn Fn(&HookContext, Value, &Args) -> Result<Value, BoxError> + Send + Sync>;
pub type AsyncBeforeFn =
    Arc<dyn Fn(HookContext, Args) -> BoxFuture<'static, Result<Before, BoxError>> + Send + Sync>;
pub type AsyncAfterFn =
    Arc<dyn Fn(HookContext, Value, Args) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum BeforeHook {
    Sync(BeforeFn),
    Async(AsyncBeforeFn),
}

#[derive(Clone)]
pub(crate) enum AfterHook {
    Sync(AfterFn),
    Async(AsyncAfterFn),
}

/// A `{before?, after?}` pair attached to one mutation.
#[derive(Clone, Default)]
pub struct Interceptor {
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

impl Interceptor {
    /// An interceptor with only a before-callback.
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&HookContext, Args) -> Result<Before, BoxError> + Send + Sync + 'static,
    {
        Self::default().and_before(f)
    }

    /// An interceptor with only an after-callback.
    pub fn after<F>(f: F) -> Self
    where
        F: Fn(&HookContext, Value, &Args) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::default().and_after(f)
    }

    pub fn before_async<F>(f: F) -> Self
    where
        F: Fn(HookContext, Args) -> BoxFuture<'static, Result<Before, BoxError>> + Send + Sync + 'static,
    {
        Self::default().and_before_async(f)
    }

    pub fn after_async<F>(f: F) -> Self
    where
        F: Fn(HookContext, Value, Args) -> BoxFuture<'static, Result<Value, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        Self::default().and_after_async(f)
    }

    pub fn and_before<F>(mut self, f: F) -> Self
    where
        F: Fn(&HookContext, Args) -> Result<Before, BoxError> + Send + Sync + 'static,
    {
        self.before = Some(BeforeHook::Sync(Arc::new(f)));
        self
    }

    pub fn and_after<F>(mut self, f: F) -> Self
    where
        F: Fn(&HookContext, Value, &Args) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.after = Some(AfterHook::Sync(Arc::new(f)));
        self
    }

    pub fn and_before_async<F>(mut self, f: F) -> Self
    where
        F: Fn(HookContext, Args) -> BoxFuture<'static, Result<Before, BoxError>> + Send + Sync + 'static,
    {
        self.before = Some(BeforeHook::Async(Arc::new(f)));
        self
    }

    pub fn and_after_async<F>(mut self, f: F) -> Self
    where
        F: Fn(HookContext, Value, Args) -> BoxFuture<'static, Result<Value, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        self.after = Some(AfterHook::Async(Arc::new(f)));
        self
    }

    pub fn has_phase(&self, phase: Phase) -> bool {
        match phase {
            Phase::Before => self.before.is_some(),
            Phase::After => self.after.is_some(),
        }
    }

    /// Whether either side is asynchronous.
    pub fn is_async(&self) -> bool {
        matches!(self.before, Some(BeforeHook::Async(_))) || matches!(self.after, Some(AfterHook::Async(_)))
    }

    pub(crate) fn before_hook(&self) -> Option<&BeforeHook> {
        self.before.as_ref()
    }

    pub(crate) fn after_hook(&self) -> Option<&AfterHook> {
        self.after.as_ref()
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("before", &self.has_phase(Phase::Before))
            .field("after", &self.has_phase(Phase::After))
            .field("async", &self.is_async())
            .finish()
    }
}
