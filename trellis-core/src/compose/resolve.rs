//! Namespace, interceptor and view merging.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::deps::{self, AccessMap};
use super::{ConflictPolicy, Picks};
use crate::bundle::{
    DerivationDecl, Input, MemberKind, MutationDecl, Provenance, SourceBundle, StateDecl,
};
use crate::error::CompositionError;
use crate::intercept::Interceptor;
use crate::view::ViewFn;

/// A member after namespace merging.
pub(crate) struct Member<T> {
    pub(crate) origin: String,
    pub(crate) decl: T,
    /// Overridden implementations, nearest first. Reachable through
    /// `call_super` / `read_super`.
    pub(crate) shadowed: Vec<(String, T)>,
    /// Later declarers passed over by a pick. They keep ownership but no
    /// implementation of theirs runs.
    pub(crate) passed_over: Vec<String>,
}

impl<T> Member<T> {
    /// Implementation at `level`: 0 is the winner, 1 the one it overrode, ...
    pub(crate) fn implementation(&self, level: usize) -> Option<(&str, &T)> {
        if level == 0 {
            Some((self.origin.as_str(), &self.decl))
        } else {
            self.shadowed
                .get(level - 1)
                .map(|(origin, decl)| (origin.as_str(), decl))
        }
    }

    /// Every bundle that declared this member.
    pub(crate) fn owners(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(self.origin.as_str())
            .chain(self.shadowed.iter().map(|(o, _)| o.as_str()))
            .chain(self.passed_over.iter().map(String::as_str))
    }

    pub(crate) fn provenance(&self, kind: MemberKind, name: &str) -> Provenance {
        Provenance {
            kind,
            name: name.to_owned(),
            origin: self.origin.clone(),
            overridden: self.shadowed.iter().map(|(o, _)| o.clone()).collect(),
        }
    }
}

/// An item contributed by one source bundle to an ordered list.
#[derive(Clone)]
pub(crate) struct Contributed<T> {
    pub(crate) origin: String,
    pub(crate) item: T,
}

/// The merged members of a composed bundle.
pub(crate) struct Resolved {
    pub(crate) states: IndexMap<String, Member<StateDecl>>,
    pub(crate) derivations: IndexMap<String, Member<DerivationDecl>>,
    pub(crate) mutations: IndexMap<String, Member<MutationDecl>>,
    pub(crate) interceptors: IndexMap<String, Vec<Contributed<Interceptor>>>,
    pub(crate) views: IndexMap<String, Vec<Contributed<ViewFn>>>,
    pub(crate) access: AccessMap,
}

impl Resolved {
    /// Whether code from `reader` may read the state at `index`.
    pub(crate) fn can_read_state(&self, reader: &str, index: usize) -> bool {
        let Some((_, member)) = self.states.get_index(index) else {
            return false;
        };
        match self.access.get(reader) {
            Some(readable) => member.owners().any(|owner| readable.contains(owner)),
            None => false,
        }
    }

    /// Whether code from `writer` may write the state at `index`.
    pub(crate) fn can_write_state(&self, writer: &str, index: usize) -> bool {
        self.states
            .get_index(index)
            .is_some_and(|(_, member)| member.owners().any(|owner| owner == writer))
    }
}

/// Run every composition step over an already flattened, de-duplicated list
/// of source bundles.
pub(crate) fn resolve(
    sources: &[Arc<SourceBundle>],
    policy: ConflictPolicy,
    picks: &Picks,
) -> Result<Resolved, CompositionError> {
    deps::check_dependencies(sources)?;

    let states = merge_namespace(
        sources,
        MemberKind::State,
        policy,
        picks,
        |s| &s.states,
        StateDecl::contract_conflict,
    )?;
    let derivations = merge_namespace(
        sources,
        MemberKind::Derivation,
        policy,
        picks,
        |s| &s.derivations,
        DerivationDecl::contract_conflict,
    )?;
    let mutations = merge_namespace(
        sources,
        MemberKind::Mutation,
        policy,
        picks,
        |s| &s.mutations,
        |a: &MutationDecl, b: &MutationDecl| a.signature().conflict(b.signature()),
    )?;

    check_picks(picks, &states, &derivations, &mutations)?;

    let mut interceptors: IndexMap<String, Vec<Contributed<Interceptor>>> = IndexMap::new();
    for source in sources {
        for (mutation, interceptor) in &source.interceptors {
            if !mutations.contains_key(mutation) {
                return Err(CompositionError::UnknownHookTarget {
                    bundle: source.name.clone(),
                    mutation: mutation.clone(),
                });
            }
            interceptors
                .entry(mutation.clone())
                .or_default()
                .push(Contributed {
                    origin: source.name.clone(),
                    item: interceptor.clone(),
                });
        }
    }

    let mut views: IndexMap<String, Vec<Contributed<ViewFn>>> = IndexMap::new();
    for source in sources {
        for (part, producer) in &source.views {
            views.entry(part.clone()).or_default().push(Contributed {
                origin: source.name.clone(),
                item: Arc::clone(producer),
            });
        }
    }

    let resolved = Resolved {
        states,
        derivations,
        mutations,
        interceptors,
        views,
        access: deps::access_map(sources),
    };
    check_declared_inputs(&resolved)?;
    Ok(resolved)
}

fn merge_namespace<T: Clone>(
    sources: &[Arc<SourceBundle>],
    kind: MemberKind,
    policy: ConflictPolicy,
    picks: &Picks,
    members: impl Fn(&SourceBundle) -> &IndexMap<String, T>,
    conflict: impl Fn(&T, &T) -> Option<String>,
) -> Result<IndexMap<String, Member<T>>, CompositionError> {
    let mut contributors: IndexMap<String, SmallVec<[(String, T); 2]>> = IndexMap::new();
    for source in sources {
        for (name, decl) in members(source.as_ref()) {
            contributors
                .entry(name.clone())
                .or_default()
                .push((source.name.clone(), decl.clone()));
        }
    }

    let mut merged = IndexMap::with_capacity(contributors.len());
    for (name, mut decls) in contributors {
        // Contracts must agree pairwise, whichever implementation ends up kept.
        for later in 1..decls.len() {
            for earlier in 0..later {
                if let Some(detail) = conflict(&decls[earlier].1, &decls[later].1) {
                    return Err(CompositionError::ContractMismatch {
                        kind,
                        name,
                        earlier: decls[earlier].0.clone(),
                        later: decls[later].0.clone(),
                        detail,
                    });
                }
            }
        }

        let winner = if decls.len() == 1 {
            0
        } else if let Some(picked) = picks.get(&(kind, name.clone())) {
            decls
                .iter()
                .position(|(origin, _)| origin == picked)
                .ok_or_else(|| CompositionError::InvalidPick {
                    kind,
                    name: name.clone(),
                    bundle: picked.clone(),
                })?
        } else {
            match policy {
                ConflictPolicy::LastWins => decls.len() - 1,
                ConflictPolicy::Explicit => {
                    return Err(CompositionError::UnresolvedConflict {
                        kind,
                        name,
                        bundles: decls.into_iter().map(|(origin, _)| origin).collect(),
                    })
                }
            }
        };

        let passed_over: Vec<String> = decls.drain(winner + 1..).map(|(origin, _)| origin).collect();
        let Some((origin, decl)) = decls.pop() else {
            continue;
        };
        let shadowed: Vec<(String, T)> = decls.into_iter().rev().collect();

        if !shadowed.is_empty() || !passed_over.is_empty() {
            tracing::debug!(
                %kind,
                member = %name,
                %origin,
                overridden = ?shadowed.iter().map(|(o, _)| o.as_str()).collect::<Vec<_>>(),
                ?passed_over,
                "resolved member conflict"
            );
        }

        merged.insert(
            name,
            Member {
                origin,
                decl,
                shadowed,
                passed_over,
            },
        );
    }
    Ok(merged)
}

/// Every pick must name a member that exists and a bundle that declares it.
fn check_picks(
    picks: &Picks,
    states: &IndexMap<String, Member<StateDecl>>,
    derivations: &IndexMap<String, Member<DerivationDecl>>,
    mutations: &IndexMap<String, Member<MutationDecl>>,
) -> Result<(), CompositionError> {
    for ((kind, name), bundle) in picks {
        let declared = match kind {
            MemberKind::State => states.get(name).is_some_and(|m| m.owners().any(|o| o == bundle)),
            MemberKind::Derivation => derivations
                .get(name)
                .is_some_and(|m| m.owners().any(|o| o == bundle)),
            MemberKind::Mutation => mutations
                .get(name)
                .is_some_and(|m| m.owners().any(|o| o == bundle)),
            MemberKind::View => false,
        };
        if !declared {
            return Err(CompositionError::InvalidPick {
                kind: *kind,
                name: name.clone(),
                bundle: bundle.clone(),
            });
        }
    }
    Ok(())
}

/// Declared derivation inputs must exist, and state inputs must be readable by
/// the declaring bundle.
fn check_declared_inputs(resolved: &Resolved) -> Result<(), CompositionError> {
    for (name, member) in &resolved.derivations {
        let implementations =
            std::iter::once((&member.origin, &member.decl)).chain(member.shadowed.iter().map(|(o, d)| (o, d)));
        for (origin, decl) in implementations {
            let Some(inputs) = decl.inputs() else {
                continue;
            };
            for input in inputs {
                match input {
                    Input::State(state) => {
                        let Some(index) = resolved.states.get_index_of(state) else {
                            return Err(CompositionError::UnknownInput {
                                derivation: name.clone(),
                                input: input.to_string(),
                            });
                        };
                        if !resolved.can_read_state(origin, index) {
                            return Err(CompositionError::ForeignInput {
                                derivation: name.clone(),
                                bundle: origin.clone(),
                                state: state.clone(),
                            });
                        }
                    }
                    Input::Derivation(derivation) => {
                        if !resolved.derivations.contains_key(derivation) {
                            return Err(CompositionError::UnknownInput {
                                derivation: name.clone(),
                                input: input.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
