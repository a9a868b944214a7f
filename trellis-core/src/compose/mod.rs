//! Composition Engine
//!
//! Composition merges an ordered list of bundles into one
//! [`ComposedBundle`]. Every check happens here, eagerly; nothing is deferred
//! to instantiation or call time.
//!
//! # Algorithm
//!
//! 1. Flatten the inputs into their defined source bundles, in order. A
//!    source that appears more than once is kept at its first position.
//! 2. Verify every declared dependency is present in the flattened set.
//! 3. Merge the state, derivation and mutation namespaces. Same-named members
//!    must have compatible contracts; the conflict policy decides which
//!    implementation is kept, and the others stay reachable as overridden
//!    implementations.
//! 4. Concatenate interceptors per mutation, in bundle order.
//! 5. Collect view producers per part, in bundle order. They are folded at
//!    read time by the instance's [`AttrPolicy`](crate::AttrPolicy).
//!
//! Because composition always works on the flattened source list, composing
//! `[compose([A, B]), C]` and `[A, B, C]` produce the same result.

mod deps;
mod resolve;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub(crate) use resolve::{Contributed, Resolved};

use crate::bundle::{BundleRef, ComposedBundle, MemberKind, SourceBundle};
use crate::error::CompositionError;

/// Member picks: `(kind, name)` to the bundle whose implementation is kept.
pub(crate) type Picks = IndexMap<(MemberKind, String), String>;

/// How same-named members from different bundles are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The later bundle in the list wins.
    #[default]
    LastWins,
    /// Every collision must be resolved with [`Composer::pick`].
    Explicit,
}

/// Configurable composition.
///
/// [`compose`] is `Composer::new().compose(..)`.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    name: Option<String>,
    policy: ConflictPolicy,
    picks: Picks,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the composed bundle. Defaults to the source names joined by `+`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keep `bundle`'s implementation of a member, whatever its position.
    ///
    /// Picks are remembered by the composed bundle and apply again when it is
    /// composed further.
    pub fn pick(mut self, kind: MemberKind, name: impl Into<String>, bundle: impl Into<String>) -> Self {
        self.picks.insert((kind, name.into()), bundle.into());
        self
    }

    pub fn compose<'a, I>(&self, bundles: I) -> Result<ComposedBundle, CompositionError>
    where
        I: IntoIterator,
        I::Item: Into<BundleRef<'a>>,
    {
        let mut sources: Vec<Arc<SourceBundle>> = Vec::new();
        let mut picks = Picks::new();

        for bundle in bundles {
            match bundle.into() {
                BundleRef::Defined(bundle) => push_source(&mut sources, bundle.source())?,
                BundleRef::Composed(composed) => {
                    for source in composed.sources() {
                        push_source(&mut sources, source)?;
                    }
                    for (key, bundle) in composed.picks() {
                        picks.insert(key.clone(), bundle.clone());
                    }
                }
            }
        }
        for (key, bundle) in &self.picks {
            picks.insert(key.clone(), bundle.clone());
        }

        let resolved = resolve::resolve(&sources, self.policy, &picks)?;
        let name = self.name.clone().unwrap_or_else(|| {
            sources
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join("+")
        });

        tracing::debug!(
            bundle = %name,
            sources = sources.len(),
            states = resolved.states.len(),
            derivations = resolved.derivations.len(),
            mutations = resolved.mutations.len(),
            "composed bundle"
        );

        Ok(ComposedBundle::new(name, sources, picks, resolved))
    }
}

/// Compose bundles with the default policy ("last bundle wins").
///
/// ```rust,ignore
/// let app = compose([&counter, &logging])?;
/// let instance = app.instantiate(InstanceConfig::default());
/// ```
pub fn compose<'a, I>(bundles: I) -> Result<ComposedBundle, CompositionError>
where
    I: IntoIterator,
    I::Item: Into<BundleRef<'a>>,
{
    Composer::new().compose(bundles)
}

fn push_source(
    sources: &mut Vec<Arc<SourceBundle>>,
    source: &Arc<SourceBundle>,
) -> Result<(), CompositionError> {
    match sources.iter().find(|s| s.name == source.name) {
        Some(existing) if Arc::ptr_eq(existing, source) => {
            tracing::debug!(bundle = %source.name, "bundle already part of the composition; skipping");
            Ok(())
        }
        Some(_) => Err(CompositionError::DuplicateBundle {
            name: source.name.clone(),
        }),
        None => {
            sources.push(Arc::clone(source));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleDescriptor, DerivationDecl, Input, MutationDecl, Signature, StateDecl};
    use crate::intercept::{Before, Interceptor};
    use crate::value::ValueKind;
    use serde_json::json;

    fn submit(bundle: &str, params: Vec<ValueKind>) -> crate::Bundle {
        BundleDescriptor::new(bundle)
            .mutation(MutationDecl::new("submit", Signature::new(params), |_, _| Ok(json!(null))))
            .define()
            .unwrap()
    }

    #[test]
    fn later_bundle_wins_by_default() {
        let a = submit("A", vec![ValueKind::String]);
        let b = submit("B", vec![ValueKind::Any]);
        let composed = compose([&a, &b]).unwrap();

        let provenance = composed.provenance_of(MemberKind::Mutation, "submit").unwrap();
        assert_eq!(provenance.origin, "B");
        assert_eq!(provenance.overridden.as_slice(), ["A".to_string()]);
        assert_eq!(composed.name(), "A+B");
    }

    #[test]
    fn incompatible_contracts_fail() {
        let a = submit("A", vec![ValueKind::String]);
        let b = submit("B", vec![ValueKind::String, ValueKind::Number]);
        let err = compose([&a, &b]).unwrap_err();
        assert!(matches!(
            err,
            CompositionError::ContractMismatch { kind: MemberKind::Mutation, ref earlier, ref later, .. }
                if earlier == "A" && later == "B"
        ));
    }

    #[test]
    fn explicit_policy_requires_picks() {
        let a = submit("A", vec![]);
        let b = submit("B", vec![]);

        let err = Composer::new()
            .policy(ConflictPolicy::Explicit)
            .compose([&a, &b])
            .unwrap_err();
        assert!(matches!(err, CompositionError::UnresolvedConflict { ref bundles, .. } if bundles == &["A", "B"]));

        let composed = Composer::new()
            .policy(ConflictPolicy::Explicit)
            .pick(MemberKind::Mutation, "submit", "A")
            .compose([&a, &b])
            .unwrap();
        let provenance = composed.provenance_of(MemberKind::Mutation, "submit").unwrap();
        assert_eq!(provenance.origin, "A");
        assert!(provenance.overridden.is_empty());
    }

    #[test]
    fn picks_survive_recomposition() {
        let a = submit("A", vec![]);
        let b = submit("B", vec![]);
        let c = BundleDescriptor::new("C").define().unwrap();

        let ab = Composer::new()
            .pick(MemberKind::Mutation, "submit", "A")
            .compose([&a, &b])
            .unwrap();
        let abc = compose([BundleRef::from(&ab), BundleRef::from(&c)]).unwrap();
        assert_eq!(abc.provenance_of(MemberKind::Mutation, "submit").unwrap().origin, "A");
    }

    #[test]
    fn pick_must_name_a_contributor() {
        let a = submit("A", vec![]);
        let b = submit("B", vec![]);
        let err = Composer::new()
            .pick(MemberKind::Mutation, "submit", "Z")
            .compose([&a, &b])
            .unwrap_err();
        assert!(matches!(err, CompositionError::InvalidPick { ref bundle, .. } if bundle == "Z"));
    }

    #[test]
    fn shared_sources_are_included_once() {
        let base = BundleDescriptor::new("Base")
            .state(StateDecl::new("flags").field("on", ValueKind::Bool, json!(false)))
            .mutation(MutationDecl::new("toggle", Signature::nullary(), |_, _| Ok(json!(null))))
            .intercept("toggle", Interceptor::before(|_, args| Ok(Before::Continue(args))))
            .define()
            .unwrap();
        let left = BundleDescriptor::new("Left").depends_on("Base").define().unwrap();
        let right = BundleDescriptor::new("Right").depends_on("Base").define().unwrap();

        let with_left = compose([&base, &left]).unwrap();
        let with_right = compose([&base, &right]).unwrap();
        let both = compose([&with_left, &with_right]).unwrap();

        assert_eq!(both.source_names(), ["Base", "Left", "Right"]);
        assert_eq!(both.hook_order("toggle"), ["Base"]);
    }

    #[test]
    fn distinct_bundles_may_not_share_a_name() {
        let first = submit("Form", vec![]);
        let second = submit("Form", vec![]);
        let err = compose([&first, &second]).unwrap_err();
        assert!(matches!(err, CompositionError::DuplicateBundle { ref name } if name == "Form"));
    }

    #[test]
    fn hooks_need_a_target() {
        let logging = BundleDescriptor::new("Logging")
            .intercept("increment", Interceptor::after(|_, result, _| Ok(result)))
            .define()
            .unwrap();
        let err = compose([&logging]).unwrap_err();
        assert!(matches!(err, CompositionError::UnknownHookTarget { ref mutation, .. } if mutation == "increment"));
    }

    #[test]
    fn declared_inputs_are_validated() {
        let owner = BundleDescriptor::new("Owner")
            .state(StateDecl::new("secret").field("value", ValueKind::Number, json!(1)))
            .define()
            .unwrap();
        let reader = BundleDescriptor::new("Reader")
            .derivation(
                DerivationDecl::new("peek", ValueKind::Any, |scope| Ok(scope.field("secret", "value")?))
                    .reads([Input::state("secret")]),
            )
            .define()
            .unwrap();
        let err = compose([&owner, &reader]).unwrap_err();
        assert!(matches!(err, CompositionError::ForeignInput { ref state, .. } if state == "secret"));

        let typo = BundleDescriptor::new("Typo")
            .derivation(
                DerivationDecl::new("broken", ValueKind::Any, |_| Ok(json!(null)))
                    .reads([Input::derivation("missing")]),
            )
            .define()
            .unwrap();
        let err = compose([&typo]).unwrap_err();
        assert!(matches!(err, CompositionError::UnknownInput { .. }));
    }

    #[test]
    fn nested_composition_matches_flat_composition() {
        let a = submit("A", vec![ValueKind::Any]);
        let b = submit("B", vec![ValueKind::Number]);
        let c = submit("C", vec![ValueKind::Number]);

        let nested = compose([BundleRef::from(&compose([&a, &b]).unwrap()), BundleRef::from(&c)]).unwrap();
        let flat = compose([&a, &b, &c]).unwrap();

        assert_eq!(nested.provenance(), flat.provenance());
        assert_eq!(nested.name(), flat.name());
    }
}
