//! Behavior bundles.
//!
//! A bundle is the packaging unit of behavior: state, derivations, mutations,
//! interceptors and view producers, plus the names of the bundles it depends
//! on. Bundles are immutable once defined and cheap to clone.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use trellis_core::{BundleDescriptor, DerivationDecl, MutationDecl, Signature, StateDecl, ValueKind};
//!
//! let counter = BundleDescriptor::new("Counter")
//!     .state(StateDecl::new("counter").field("count", ValueKind::Number, json!(0)))
//!     .mutation(MutationDecl::new("increment", Signature::nullary(), |scope, _| {
//!         let count = scope.get("counter", "count")?.as_i64().unwrap_or(0);
//!         scope.set("counter", "count", json!(count + 1))?;
//!         Ok(json!(count + 1))
//!     }))
//!     .derivation(DerivationDecl::new("doubled", ValueKind::Number, |scope| {
//!         let count = scope.field("counter", "count")?.as_i64().unwrap_or(0);
//!         Ok(json!(count * 2))
//!     }))
//!     .define()?;
//! ```

mod composed;
mod member;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

pub use composed::{BundleRef, ComposedBundle, Provenance};
pub use member::{DerivationDecl, Input, MemberKind, MutationDecl, Signature, StateDecl};

use crate::error::{BoxError, CompositionError};
use crate::instance::{Instance, InstanceConfig, ViewScope};
use crate::intercept::Interceptor;
use crate::value::Value;
use crate::view::{AttrMap, ViewFn};

/// Builder for a [`Bundle`].
///
/// Members are recorded in the order they are added; that order is what
/// composition preserves.
#[derive(Clone)]
pub struct BundleDescriptor {
    name: String,
    dependencies: Vec<String>,
    states: Vec<StateDecl>,
    derivations: Vec<DerivationDecl>,
    mutations: Vec<MutationDecl>,
    interceptors: Vec<(String, Interceptor)>,
    views: Vec<(String, ViewFn)>,
}

impl BundleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            states: Vec::new(),
            derivations: Vec::new(),
            mutations: Vec::new(),
            interceptors: Vec::new(),
            views: Vec::new(),
        }
    }

    /// Declare that this bundle needs `bundle` to be part of any composition
    /// it is used in. Also grants read access to that bundle's state.
    pub fn depends_on(mut self, bundle: impl Into<String>) -> Self {
        self.dependencies.push(bundle.into());
        self
    }

    pub fn state(mut self, decl: StateDecl) -> Self {
        self.states.push(decl);
        self
    }

    pub fn derivation(mut self, decl: DerivationDecl) -> Self {
        self.derivations.push(decl);
        self
    }

    pub fn mutation(mut self, decl: MutationDecl) -> Self {
        self.mutations.push(decl);
        self
    }

    /// Attach an interceptor to a mutation, which may belong to another bundle.
    pub fn intercept(mut self, mutation: impl Into<String>, interceptor: Interceptor) -> Self {
        self.interceptors.push((mutation.into(), interceptor));
        self
    }

    /// Register the view producer for a UI part.
    pub fn view<F>(mut self, part: impl Into<String>, producer: F) -> Self
    where
        F: Fn(&ViewScope<'_>, &Value) -> Result<AttrMap, BoxError> + Send + Sync + 'static,
    {
        self.views.push((part.into(), Arc::new(producer)));
        self
    }

    /// Shorthand for [`Bundle::define`].
    pub fn define(self) -> Result<Bundle, CompositionError> {
        Bundle::define(self)
    }
}

/// An immutable, defined behavior bundle.
#[derive(Clone)]
pub struct Bundle {
    source: Arc<SourceBundle>,
}

impl Bundle {
    /// Validate a descriptor and freeze it.
    ///
    /// Only checks that need nothing but the bundle itself run here (duplicate
    /// member names). Dependencies and hook targets are checked by
    /// [`compose`](crate::compose).
    pub fn define(descriptor: BundleDescriptor) -> Result<Self, CompositionError> {
        let BundleDescriptor {
            name,
            dependencies,
            states,
            derivations,
            mutations,
            interceptors,
            views,
        } = descriptor;

        let states = index_members(&name, MemberKind::State, states, |d| d.name().to_owned())?;
        let derivations =
            index_members(&name, MemberKind::Derivation, derivations, |d| d.name().to_owned())?;
        let mutations =
            index_members(&name, MemberKind::Mutation, mutations, |d| d.name().to_owned())?;
        let views = index_members(&name, MemberKind::View, views, |(part, _)| part.clone())?
            .into_iter()
            .map(|(part, (_, producer))| (part, producer))
            .collect();

        let mut seen = HashSet::new();
        let dependencies = dependencies
            .into_iter()
            .filter(|dep| seen.insert(dep.clone()))
            .collect();

        tracing::debug!(bundle = %name, "defined bundle");

        Ok(Self {
            source: Arc::new(SourceBundle {
                name,
                dependencies,
                states,
                derivations,
                mutations,
                interceptors,
                views,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.source.dependencies
    }

    /// Compose this bundle on its own and materialize an instance of it.
    ///
    /// Fails like [`compose`](crate::compose) would, e.g. when a dependency
    /// is missing.
    pub fn instantiate(&self, config: InstanceConfig) -> Result<Instance, CompositionError> {
        Ok(crate::compose([self])?.instantiate(config))
    }

    pub(crate) fn source(&self) -> &Arc<SourceBundle> {
        &self.source
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("name", &self.source.name)
            .field("dependencies", &self.source.dependencies)
            .field("states", &self.source.states.keys().collect::<Vec<_>>())
            .field("derivations", &self.source.derivations.keys().collect::<Vec<_>>())
            .field("mutations", &self.source.mutations.keys().collect::<Vec<_>>())
            .field("views", &self.source.views.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The frozen contents of one defined bundle.
pub(crate) struct SourceBundle {
    pub(crate) name: String,
    pub(crate) dependencies: Vec<String>,
    pub(crate) states: IndexMap<String, StateDecl>,
    pub(crate) derivations: IndexMap<String, DerivationDecl>,
    pub(crate) mutations: IndexMap<String, MutationDecl>,
    pub(crate) interceptors: Vec<(String, Interceptor)>,
    pub(crate) views: IndexMap<String, ViewFn>,
}

fn index_members<T>(
    bundle: &str,
    kind: MemberKind,
    members: Vec<T>,
    key: impl Fn(&T) -> String,
) -> Result<IndexMap<String, T>, CompositionError> {
    let mut indexed = IndexMap::with_capacity(members.len());
    for member in members {
        let name = key(&member);
        if indexed.contains_key(&name) {
            return Err(CompositionError::DuplicateMember {
                bundle: bundle.to_owned(),
                kind,
                name,
            });
        }
        indexed.insert(name, member);
    }
    Ok(indexed)
}
