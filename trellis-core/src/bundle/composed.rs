//! Composed bundles and provenance.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::{Bundle, MemberKind, Signature, SourceBundle};
use crate::compose::{Picks, Resolved};
use crate::instance::{Instance, InstanceConfig};

/// Where a member of a composed bundle came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub kind: MemberKind,
    pub name: String,
    /// Bundle whose implementation is kept.
    pub origin: String,
    /// Bundles whose declarations were overridden, nearest first.
    pub overridden: SmallVec<[String; 2]>,
}

/// The result of composition.
///
/// A composed bundle is itself composable: composing `[compose([A, B]), C]`
/// gives the same members, hook order and view order as `[A, B, C]`.
#[derive(Clone)]
pub struct ComposedBundle {
    inner: Arc<ComposedInner>,
}

struct ComposedInner {
    name: String,
    sources: Vec<Arc<SourceBundle>>,
    picks: Picks,
    resolved: Resolved,
}

impl ComposedBundle {
    pub(crate) fn new(
        name: String,
        sources: Vec<Arc<SourceBundle>>,
        picks: Picks,
        resolved: Resolved,
    ) -> Self {
        Self {
            inner: Arc::new(ComposedInner {
                name,
                sources,
                picks,
                resolved,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Names of the defined bundles this composition contains, in order.
    pub fn source_names(&self) -> Vec<&str> {
        self.inner.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// Provenance of every state, derivation and mutation member.
    pub fn provenance(&self) -> Vec<Provenance> {
        let resolved = &self.inner.resolved;
        let states = resolved
            .states
            .iter()
            .map(|(name, m)| m.provenance(MemberKind::State, name));
        let derivations = resolved
            .derivations
            .iter()
            .map(|(name, m)| m.provenance(MemberKind::Derivation, name));
        let mutations = resolved
            .mutations
            .iter()
            .map(|(name, m)| m.provenance(MemberKind::Mutation, name));
        states.chain(derivations).chain(mutations).collect()
    }

    /// Provenance of one member.
    pub fn provenance_of(&self, kind: MemberKind, name: &str) -> Option<Provenance> {
        let resolved = &self.inner.resolved;
        match kind {
            MemberKind::State => resolved.states.get(name).map(|m| m.provenance(kind, name)),
            MemberKind::Derivation => resolved.derivations.get(name).map(|m| m.provenance(kind, name)),
            MemberKind::Mutation => resolved.mutations.get(name).map(|m| m.provenance(kind, name)),
            MemberKind::View => None,
        }
    }

    /// Bundles contributing interceptors to `mutation`, in chain order.
    pub fn hook_order(&self, mutation: &str) -> Vec<&str> {
        self.inner
            .resolved
            .interceptors
            .get(mutation)
            .map(|chain| chain.iter().map(|c| c.origin.as_str()).collect())
            .unwrap_or_default()
    }

    /// Bundles contributing producers to `part`, in fold order.
    pub fn view_order(&self, part: &str) -> Vec<&str> {
        self.inner
            .resolved
            .views
            .get(part)
            .map(|producers| producers.iter().map(|c| c.origin.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn state_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.resolved.states.keys().map(String::as_str)
    }

    pub fn derivation_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.resolved.derivations.keys().map(String::as_str)
    }

    pub fn mutation_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.resolved.mutations.keys().map(String::as_str)
    }

    pub fn view_parts(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.resolved.views.keys().map(String::as_str)
    }

    /// Effective signature of a mutation.
    pub fn signature(&self, mutation: &str) -> Option<&Signature> {
        self.inner
            .resolved
            .mutations
            .get(mutation)
            .map(|m| m.decl.signature())
    }

    /// Materialize a fresh, isolated instance.
    pub fn instantiate(&self, config: InstanceConfig) -> Instance {
        Instance::new(self.clone(), config)
    }

    pub(crate) fn resolved(&self) -> &Resolved {
        &self.inner.resolved
    }

    pub(crate) fn sources(&self) -> &[Arc<SourceBundle>] {
        &self.inner.sources
    }

    pub(crate) fn picks(&self) -> &Picks {
        &self.inner.picks
    }
}

impl fmt::Debug for ComposedBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedBundle")
            .field("name", &self.inner.name)
            .field("sources", &self.source_names())
            .field("provenance", &self.provenance())
            .finish()
    }
}

/// Anything that can be passed to [`compose`](crate::compose).
#[derive(Clone, Copy)]
pub enum BundleRef<'a> {
    Defined(&'a Bundle),
    Composed(&'a ComposedBundle),
}

impl<'a> From<&'a Bundle> for BundleRef<'a> {
    fn from(bundle: &'a Bundle) -> Self {
        Self::Defined(bundle)
    }
}

impl<'a> From<&'a ComposedBundle> for BundleRef<'a> {
    fn from(bundle: &'a ComposedBundle) -> Self {
        Self::Composed(bundle)
    }
}

impl BundleRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            Self::Defined(bundle) => bundle.name(),
            Self::Composed(bundle) => bundle.name(),
        }
    }
}
