//! Instances
//!
//! An instance is a composed bundle brought to life: its own state
//! containers, memo cells, live hook registry and subscriber list. Two
//! instances of the same bundle share nothing.
//!
//! # How Calls Work
//!
//! `call(name, args)`:
//!
//! 1. Snapshot the interceptor chain for `name`.
//! 2. Run the before-callbacks; stop on a veto.
//! 3. Run the body. Bodies on one instance never overlap. Writes bump
//!    container versions and are collected for the change notice.
//! 4. Run the after-callbacks.
//! 5. When the outermost call returns, subscribers get one [`Change`].
//!
//! No engine lock is held while a body, hook, derivation or producer runs,
//! so all of them may call back into the instance.
//!
//! # How Reads Work
//!
//! Reads are pull-based. `read(name)` checks the versions recorded by the
//! derivation's last evaluation, bringing derivation inputs up to date
//! first, and only runs the derivation when something moved.

mod scope;

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};

pub use scope::{DerivationScope, MutationHandle, MutationScope, ViewScope};

use crate::bundle::{ComposedBundle, MemberKind};
use crate::error::{BoxError, EngineError, Result};
use crate::graph::{DeclaredGraph, NodeId};
use crate::intercept::task::Generations;
use crate::intercept::{
    AfterHook, AsyncCall, Before, BeforeHook, CallOutcome, CancellationToken, HookContext, HookHandle,
    HookRegistry, Interceptor, Phase, Veto,
};
use crate::reactive::{
    Batch, Change, EvalStack, InputVersions, MemoCell, StateContainer, SubscriberList, Subscription, Update,
};
use crate::value::{Args, Record, Value, ValueKind};
use crate::view::{AttrMap, AttrPolicy};

/// Unique identifier for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-instance configuration.
///
/// ```rust,ignore
/// let config = InstanceConfig::from_json(r#"{
///     "props": { "start": 5 },
///     "attr_policy": { "rules": [
///         { "pattern": { "exact": "class" }, "strategy": { "kind": "concat" } }
///     ] }
/// }"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Handed to state initializers.
    pub props: Record,
    /// How view attributes from several bundles are merged.
    pub attr_policy: AttrPolicy,
}

impl InstanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Replace the props with the fields of a JSON object.
    pub fn with_props(mut self, props: Value) -> Self {
        match props {
            Value::Object(map) => self.props = map.into_iter().collect(),
            other => tracing::warn!(kind = %ValueKind::of(&other), "props must be an object; ignoring them"),
        }
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }

    pub fn with_attr_policy(mut self, policy: AttrPolicy) -> Self {
        self.attr_policy = policy;
        self
    }

    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }
}

/// Contents of a state container at the moment it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub record: Record,
    pub version: u64,
}

impl StateSnapshot {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record.get(field)
    }
}

/// A live instance. Cheap to clone; clones are handles to the same instance.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

pub(crate) struct InstanceInner {
    id: InstanceId,
    bundle: ComposedBundle,
    config: InstanceConfig,
    states: Vec<StateContainer>,
    memos: Vec<MemoCell>,
    graph: DeclaredGraph,
    eval: EvalStack,
    hooks: HookRegistry,
    generations: Generations,
    batch: Batch,
    bodies: ReentrantMutex<()>,
    subscribers: SubscriberList,
}

impl Instance {
    pub(crate) fn new(bundle: ComposedBundle, config: InstanceConfig) -> Self {
        let resolved = bundle.resolved();
        let states = resolved
            .states
            .iter()
            .map(|(name, member)| StateContainer::new(name.clone(), member.decl.initial(&config)))
            .collect();
        let memos = resolved.derivations.keys().map(|_| MemoCell::new()).collect();
        let graph = DeclaredGraph::from_resolved(resolved);
        let hooks = HookRegistry::new(&resolved.interceptors);

        let instance = Self {
            inner: Arc::new(InstanceInner {
                id: InstanceId::new(),
                bundle,
                config,
                states,
                memos,
                graph,
                eval: EvalStack::new(),
                hooks,
                generations: Generations::default(),
                batch: Batch::default(),
                bodies: ReentrantMutex::new(()),
                subscribers: SubscriberList::default(),
            }),
        };
        tracing::debug!(
            instance = %instance.id(),
            bundle = %instance.bundle().name(),
            "instantiated bundle"
        );
        instance
    }

    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    pub fn bundle(&self) -> &ComposedBundle {
        &self.inner.bundle
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Current contents of a state container.
    pub fn state(&self, name: &str) -> Result<StateSnapshot> {
        let index = self.state_index(name)?;
        let (record, version) = self.inner.states[index].read();
        Ok(StateSnapshot { record, version })
    }

    /// Value of a derivation, recomputed only if an input changed.
    pub fn read(&self, derivation: &str) -> Result<Value> {
        let index = self.derivation_index(derivation)?;
        self.derivation_value(index).map(|(value, _)| value)
    }

    /// How many times a derivation has run on this instance.
    pub fn evaluations(&self, derivation: &str) -> Result<u64> {
        let index = self.derivation_index(derivation)?;
        Ok(self.inner.memos[index].evaluations())
    }

    /// Attributes for a UI part: every contributing producer, folded in
    /// composition order with the instance's [`AttrPolicy`].
    pub fn view_attributes(&self, part: &str, params: &Value) -> Result<AttrMap> {
        let producers = self
            .inner
            .bundle
            .resolved()
            .views
            .get(part)
            .ok_or_else(|| EngineError::unknown(MemberKind::View, part))?;

        let mut attrs = AttrMap::new();
        for producer in producers {
            let scope = ViewScope::new(self, &producer.origin, part);
            let produced = (producer.item)(&scope, params).map_err(|err| {
                EngineError::from_callback(err, |source| EngineError::ViewFailed {
                    part: part.to_owned(),
                    bundle: producer.origin.clone(),
                    source,
                })
            })?;
            self.inner.config.attr_policy.merge(&mut attrs, produced);
        }
        Ok(attrs)
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    /// Call a mutation through its interceptor chain.
    ///
    /// Fails with [`EngineError::AsyncHookInSyncCall`] when the chain holds an
    /// asynchronous hook; use [`call_async`](Self::call_async) for those.
    pub fn call(&self, mutation: &str, args: Args) -> Result<CallOutcome> {
        let index = self.mutation_index(mutation)?;
        let chain = self.inner.hooks.chain(mutation);
        if chain.iter().any(Interceptor::is_async) {
            return Err(EngineError::AsyncHookInSyncCall {
                mutation: mutation.to_owned(),
            });
        }
        self.check_args(index, &args)?;

        let _batch = self.inner.batch.enter(&self.inner.subscribers);
        let ctx = HookContext::new(self.clone(), mutation, None);

        let mut args = args;
        for hook in &chain {
            let Some(BeforeHook::Sync(before)) = hook.before_hook() else {
                continue;
            };
            match before(&ctx, args).map_err(|err| hook_error(mutation, Phase::Before, err))? {
                Before::Continue(next) => args = next,
                Before::Veto(reason) => return Ok(self.vetoed(mutation, reason)),
            }
        }
        self.check_args(index, &args)?;

        let mut result = self.run_body(index, 0, args.clone())?;
        for hook in &chain {
            if let Some(AfterHook::Sync(after)) = hook.after_hook() {
                result = after(&ctx, result, &args).map_err(|err| hook_error(mutation, Phase::After, err))?;
            }
        }
        Ok(CallOutcome::Completed(result))
    }

    /// Call a mutation whose chain may contain asynchronous hooks.
    ///
    /// The call starts (and takes its generation) immediately but only makes
    /// progress while the returned future is polled.
    pub fn call_async(&self, mutation: &str, args: Args) -> AsyncCall {
        let token = CancellationToken::new();
        let generation = self.inner.generations.start(mutation);
        let instance = self.clone();
        let mutation = mutation.to_owned();
        let call_token = token.clone();
        let future = async move { instance.run_async(&mutation, args, generation, call_token).await }.boxed();
        AsyncCall::new(token, generation, future)
    }

    async fn run_async(
        &self,
        mutation: &str,
        args: Args,
        generation: u64,
        token: CancellationToken,
    ) -> Result<CallOutcome> {
        let index = self.mutation_index(mutation)?;
        self.check_args(index, &args)?;
        let chain = self.inner.hooks.chain(mutation);
        let ctx = HookContext::new(self.clone(), mutation, Some(token.clone()));

        let mut args = args;
        for hook in &chain {
            if token.is_cancelled() {
                return Ok(self.cancelled(mutation));
            }
            let decision = match hook.before_hook() {
                None => continue,
                Some(BeforeHook::Sync(before)) => before(&ctx, args),
                Some(BeforeHook::Async(before)) => {
                    let pending = before(ctx.clone(), args);
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Ok(self.cancelled(mutation)),
                        decision = pending => decision,
                    }
                }
            };
            match decision.map_err(|err| hook_error(mutation, Phase::Before, err))? {
                Before::Continue(next) => args = next,
                Before::Veto(reason) => return Ok(self.vetoed(mutation, reason)),
            }
        }

        if token.is_cancelled() {
            return Ok(self.cancelled(mutation));
        }
        if !self.inner.generations.is_current(mutation, generation) {
            tracing::debug!(%mutation, generation, "superseded before the body ran");
            return Ok(CallOutcome::Superseded);
        }
        self.check_args(index, &args)?;

        // Only the body is batched; the guard never lives across an await.
        let mut result = {
            let _batch = self.inner.batch.enter(&self.inner.subscribers);
            self.run_body(index, 0, args.clone())?
        };
        for hook in &chain {
            if token.is_cancelled() {
                return Ok(self.cancelled(mutation));
            }
            let next = match hook.after_hook() {
                None => continue,
                Some(AfterHook::Sync(after)) => after(&ctx, result, &args),
                Some(AfterHook::Async(after)) => {
                    let pending = after(ctx.clone(), result, args.clone());
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Ok(self.cancelled(mutation)),
                        next = pending => next,
                    }
                }
            };
            result = next.map_err(|err| hook_error(mutation, Phase::After, err))?;
        }

        if !self.inner.generations.is_current(mutation, generation) {
            tracing::debug!(%mutation, generation, "superseded; discarding result");
            return Ok(CallOutcome::Superseded);
        }
        Ok(CallOutcome::Completed(result))
    }

    // ------------------------------------------------------------------------
    // Hooks and subscribers
    // ------------------------------------------------------------------------

    /// Append a hook to a mutation's chain. It takes effect on the next call.
    pub fn add_hook(&self, mutation: &str, interceptor: Interceptor) -> Result<HookHandle> {
        self.mutation_index(mutation)?;
        let id = self.inner.hooks.register(mutation, interceptor);
        tracing::debug!(instance = %self.id(), %mutation, ?id, "hook added");
        Ok(HookHandle {
            instance: self.id(),
            mutation: mutation.to_owned(),
            id,
        })
    }

    /// Remove a hook added with [`add_hook`](Self::add_hook). Returns whether
    /// it was registered on this instance.
    pub fn remove_hook(&self, handle: &HookHandle) -> bool {
        if handle.instance != self.id() {
            return false;
        }
        let removed = self.inner.hooks.unregister(&handle.mutation, handle.id);
        if removed {
            tracing::debug!(instance = %self.id(), mutation = %handle.mutation, id = ?handle.id, "hook removed");
        }
        removed
    }

    /// Origin of every hook currently chained on `mutation`, in execution
    /// order. `None` marks hooks added at runtime.
    pub fn hook_origins(&self, mutation: &str) -> Vec<Option<String>> {
        self.inner.hooks.origins(mutation)
    }

    /// Be told which state containers changed after each outermost call.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.inner.subscribers.add(callback)
    }

    // ------------------------------------------------------------------------
    // Internals shared with the scopes
    // ------------------------------------------------------------------------

    pub(crate) fn downgrade(&self) -> Weak<InstanceInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<InstanceInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn state_index(&self, name: &str) -> Result<usize> {
        self.inner
            .bundle
            .resolved()
            .states
            .get_index_of(name)
            .ok_or_else(|| EngineError::unknown(MemberKind::State, name))
    }

    pub(crate) fn derivation_index(&self, name: &str) -> Result<usize> {
        self.inner
            .bundle
            .resolved()
            .derivations
            .get_index_of(name)
            .ok_or_else(|| EngineError::unknown(MemberKind::Derivation, name))
    }

    pub(crate) fn mutation_index(&self, name: &str) -> Result<usize> {
        self.inner
            .bundle
            .resolved()
            .mutations
            .get_index_of(name)
            .ok_or_else(|| EngineError::unknown(MemberKind::Mutation, name))
    }

    pub(crate) fn can_read_state(&self, reader: &str, index: usize) -> bool {
        self.inner.bundle.resolved().can_read_state(reader, index)
    }

    pub(crate) fn can_write_state(&self, writer: &str, index: usize) -> bool {
        self.inner.bundle.resolved().can_write_state(writer, index)
    }

    pub(crate) fn read_state(&self, index: usize) -> (Record, u64) {
        self.inner.states[index].read()
    }

    pub(crate) fn read_field(&self, index: usize, field: &str) -> (Option<Value>, u64) {
        self.inner.states[index].field(field)
    }

    /// Validate and commit a write, then queue the change notice.
    pub(crate) fn write_state(&self, index: usize, update: Update<'_>) -> Result<()> {
        let resolved = self.inner.bundle.resolved();
        let Some((name, member)) = resolved.states.get_index(index) else {
            return Err(EngineError::unknown(MemberKind::State, index.to_string()));
        };
        let container = &self.inner.states[index];
        let version = container
            .write(update, |record| member.decl.check(record))
            .map_err(|detail| EngineError::ShapeViolation {
                state: name.clone(),
                detail,
            })?;
        tracing::trace!(state = %container.name(), version, "state written");
        self.inner.batch.mark(name);
        Ok(())
    }

    /// Up-to-date value and version of the derivation at `index`.
    pub(crate) fn derivation_value(&self, index: usize) -> Result<(Value, u64)> {
        let inner = &*self.inner;
        let _frame = inner
            .eval
            .enter(index)
            .map_err(|path| self.cycle_error(&path))?;

        let memo = &inner.memos[index];
        if !memo.cycle_checked() {
            if let Some(path) = inner.graph.find_cycle(index) {
                return Err(self.cycle_error(&path));
            }
            memo.mark_cycle_checked();
        }

        if let Some(cached) = memo.snapshot() {
            if self.inputs_unchanged(&cached.inputs)? {
                tracing::trace!(derivation = %self.derivation_name(index), version = cached.version, "memo hit");
                return Ok((cached.value, cached.version));
            }
        }

        let reads = RefCell::new(InputVersions::new());
        let value = self.compute(index, 0, &reads)?;
        let version = memo.store(value.clone(), reads.into_inner());
        tracing::trace!(
            derivation = %self.derivation_name(index),
            version,
            depth = inner.eval.depth(),
            "recomputed"
        );
        Ok((value, version))
    }

    fn inputs_unchanged(&self, inputs: &InputVersions) -> Result<bool> {
        for &(node, recorded) in inputs {
            let current = match node {
                NodeId::State(index) => self.inner.states[index].version(),
                NodeId::Derivation(index) => self.derivation_value(index)?.1,
            };
            if current != recorded {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Run implementation `level` of a derivation, recording reads into
    /// `reads`.
    pub(crate) fn compute(&self, index: usize, level: usize, reads: &RefCell<InputVersions>) -> Result<Value> {
        let resolved = self.inner.bundle.resolved();
        let Some((name, member)) = resolved.derivations.get_index(index) else {
            return Err(EngineError::unknown(MemberKind::Derivation, index.to_string()));
        };
        let Some((origin, decl)) = member.implementation(level) else {
            return Err(EngineError::NoOverridden {
                kind: MemberKind::Derivation,
                name: name.clone(),
            });
        };

        let scope = DerivationScope::new(self, index, name, level, origin, decl, reads);
        let value = decl.compute(&scope).map_err(|err| {
            EngineError::from_callback(err, |source| EngineError::DerivationFailed {
                derivation: name.clone(),
                source,
            })
        })?;

        let declared = member.decl.output();
        if !declared.accepts(&value) {
            return Err(EngineError::DerivationFailed {
                derivation: name.clone(),
                source: format!("produced {}, declared {declared}", ValueKind::of(&value)).into(),
            });
        }
        Ok(value)
    }

    /// Run implementation `level` of a mutation body, without hooks.
    ///
    /// Bodies on one instance run one at a time. The lock is reentrant, so a
    /// body may call further mutations on its own thread.
    pub(crate) fn run_body(&self, index: usize, level: usize, args: Args) -> Result<Value> {
        let _exclusive = self.inner.bodies.lock();
        let resolved = self.inner.bundle.resolved();
        let Some((name, member)) = resolved.mutations.get_index(index) else {
            return Err(EngineError::unknown(MemberKind::Mutation, index.to_string()));
        };
        let Some((origin, decl)) = member.implementation(level) else {
            return Err(EngineError::NoOverridden {
                kind: MemberKind::Mutation,
                name: name.clone(),
            });
        };

        let scope = MutationScope::new(self, index, name, level, origin);
        let value = decl.run(&scope, args).map_err(|err| {
            EngineError::from_callback(err, |source| EngineError::MutationFailed {
                mutation: name.clone(),
                source,
            })
        })?;

        let declared = member.decl.signature().return_kind();
        if !declared.accepts(&value) {
            return Err(EngineError::MutationFailed {
                mutation: name.clone(),
                source: format!("returned {}, declared {declared}", ValueKind::of(&value)).into(),
            });
        }
        Ok(value)
    }

    fn check_args(&self, index: usize, args: &Args) -> Result<()> {
        let resolved = self.inner.bundle.resolved();
        let Some((name, member)) = resolved.mutations.get_index(index) else {
            return Err(EngineError::unknown(MemberKind::Mutation, index.to_string()));
        };
        member
            .decl
            .signature()
            .check_args(args)
            .map_err(|detail| EngineError::ArgumentMismatch {
                mutation: name.clone(),
                detail,
            })
    }

    fn derivation_name(&self, index: usize) -> &str {
        self.inner
            .bundle
            .resolved()
            .derivations
            .get_index(index)
            .map_or("?", |(name, _)| name.as_str())
    }

    fn cycle_error(&self, path: &[usize]) -> EngineError {
        EngineError::DerivationCycle {
            path: path.iter().map(|&i| self.derivation_name(i).to_owned()).collect(),
        }
    }

    fn vetoed(&self, mutation: &str, reason: Option<String>) -> CallOutcome {
        tracing::debug!(instance = %self.id(), %mutation, ?reason, "call vetoed");
        CallOutcome::Vetoed(Veto {
            mutation: mutation.to_owned(),
            reason,
        })
    }

    fn cancelled(&self, mutation: &str) -> CallOutcome {
        tracing::debug!(instance = %self.id(), %mutation, "call cancelled");
        CallOutcome::Cancelled
    }
}

/// Hook failures are always reported with their phase, including engine
/// errors raised by calls made from inside the hook.
fn hook_error(mutation: &str, phase: Phase, err: BoxError) -> EngineError {
    EngineError::HookExecution {
        mutation: mutation.to_owned(),
        phase,
        source: err,
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.inner.id)
            .field("bundle", &self.inner.bundle.name())
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleDescriptor, DerivationDecl, MutationDecl, Signature, StateDecl};
    use crate::compose;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> ComposedBundle {
        let bundle = BundleDescriptor::new("Counter")
            .state(
                StateDecl::new("counter")
                    .field("count", ValueKind::Number, json!(0))
                    .init_with(|config| {
                        let mut record = Record::new();
                        if let Some(start) = config.prop("start") {
                            record.insert("count".into(), start.clone());
                        }
                        record
                    }),
            )
            .mutation(MutationDecl::new(
                "increment",
                Signature::nullary().returns(ValueKind::Number),
                |scope, _| {
                    let count = scope.get("counter", "count")?.as_i64().unwrap_or(0) + 1;
                    scope.set("counter", "count", json!(count))?;
                    Ok(json!(count))
                },
            ))
            .derivation(DerivationDecl::new("doubled", ValueKind::Number, |scope| {
                let count = scope.field("counter", "count")?.as_i64().unwrap_or(0);
                Ok(json!(count * 2))
            }))
            .define()
            .unwrap();
        compose([&bundle]).unwrap()
    }

    #[test]
    fn config_props_seed_state() {
        let instance = counter().instantiate(InstanceConfig::new().with_props(json!({"start": 4})));
        assert_eq!(instance.state("counter").unwrap().get("count"), Some(&json!(4)));
        assert_eq!(instance.read("doubled").unwrap(), json!(8));
    }

    #[test]
    fn config_loads_from_json() {
        let config = InstanceConfig::from_json(r#"{"props": {"start": 2}}"#).unwrap();
        assert_eq!(config.prop("start"), Some(&json!(2)));
        assert_eq!(config.attr_policy, AttrPolicy::default());
    }

    #[test]
    fn reads_are_memoized_until_state_changes() {
        let instance = counter().instantiate(InstanceConfig::default());
        instance.read("doubled").unwrap();
        instance.read("doubled").unwrap();
        assert_eq!(instance.evaluations("doubled").unwrap(), 1);

        instance.call("increment", vec![]).unwrap();
        assert_eq!(instance.read("doubled").unwrap(), json!(2));
        assert_eq!(instance.evaluations("doubled").unwrap(), 2);
    }

    #[test]
    fn unknown_members_are_errors() {
        let instance = counter().instantiate(InstanceConfig::default());
        assert!(matches!(
            instance.read("tripled"),
            Err(EngineError::UnknownMember { kind: MemberKind::Derivation, .. })
        ));
        assert!(matches!(
            instance.call("decrement", vec![]),
            Err(EngineError::UnknownMember { kind: MemberKind::Mutation, .. })
        ));
        assert!(matches!(
            instance.view_attributes("root", &json!({})),
            Err(EngineError::UnknownMember { kind: MemberKind::View, .. })
        ));
    }

    #[test]
    fn arguments_are_checked_against_the_signature() {
        let instance = counter().instantiate(InstanceConfig::default());
        let err = instance.call("increment", vec![json!(1)]).unwrap_err();
        assert!(matches!(err, EngineError::ArgumentMismatch { .. }));
        assert_eq!(instance.state("counter").unwrap().version, 0);
    }

    #[test]
    fn subscribers_hear_about_each_outer_call() {
        let instance = counter().instantiate(InstanceConfig::default());
        let notices = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&notices);
        let subscription = instance.subscribe(move |change| {
            assert!(change.touches("counter"));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        instance.call("increment", vec![]).unwrap();
        instance.call("increment", vec![]).unwrap();
        assert_eq!(notices.load(Ordering::SeqCst), 2);

        drop(subscription);
        instance.call("increment", vec![]).unwrap();
        assert_eq!(notices.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn hooks_are_per_instance() {
        let bundle = counter();
        let first = bundle.instantiate(InstanceConfig::default());
        let second = bundle.instantiate(InstanceConfig::default());

        let handle = first
            .add_hook("increment", Interceptor::before(|_, _| Ok(Before::veto("frozen"))))
            .unwrap();
        assert!(first.call("increment", vec![]).unwrap().is_vetoed());
        assert!(second.call("increment", vec![]).unwrap().is_completed());

        assert!(!second.remove_hook(&handle));
        assert!(first.remove_hook(&handle));
        assert!(first.call("increment", vec![]).unwrap().is_completed());
    }
}
