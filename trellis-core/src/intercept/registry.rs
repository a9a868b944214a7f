//! Per-instance hook registry.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Interceptor;
use crate::compose::Contributed;
use crate::instance::InstanceId;

/// Unique identifier for a registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl HookId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Returned by [`Instance::add_hook`](crate::Instance::add_hook); pass it to
/// [`Instance::remove_hook`](crate::Instance::remove_hook) to unregister.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookHandle {
    pub(crate) instance: InstanceId,
    pub(crate) mutation: String,
    pub(crate) id: HookId,
}

impl HookHandle {
    pub fn mutation(&self) -> &str {
        &self.mutation
    }

    pub fn id(&self) -> HookId {
        self.id
    }
}

struct HookEntry {
    id: HookId,
    /// Declaring bundle, or `None` for hooks added to the live instance.
    origin: Option<String>,
    interceptor: Interceptor,
}

/// Interceptor chains keyed by mutation name.
///
/// Bundle-declared hooks come first, in composition order; hooks added at
/// runtime follow in the order they were added.
pub(crate) struct HookRegistry {
    chains: RwLock<IndexMap<String, Vec<HookEntry>>>,
}

impl HookRegistry {
    pub(crate) fn new(declared: &IndexMap<String, Vec<Contributed<Interceptor>>>) -> Self {
        let chains = declared
            .iter()
            .map(|(mutation, chain)| {
                let entries = chain
                    .iter()
                    .map(|c| HookEntry {
                        id: HookId::new(),
                        origin: Some(c.origin.clone()),
                        interceptor: c.item.clone(),
                    })
                    .collect();
                (mutation.clone(), entries)
            })
            .collect();
        Self {
            chains: RwLock::new(chains),
        }
    }

    pub(crate) fn register(&self, mutation: &str, interceptor: Interceptor) -> HookId {
        let id = HookId::new();
        self.chains
            .write()
            .entry(mutation.to_owned())
            .or_default()
            .push(HookEntry {
                id,
                origin: None,
                interceptor,
            });
        id
    }

    /// Remove a runtime hook. Bundle-declared hooks cannot be removed.
    pub(crate) fn unregister(&self, mutation: &str, id: HookId) -> bool {
        let mut chains = self.chains.write();
        let Some(chain) = chains.get_mut(mutation) else {
            return false;
        };
        match chain.iter().position(|e| e.id == id && e.origin.is_none()) {
            Some(position) => {
                chain.remove(position);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the chain for one call.
    pub(crate) fn chain(&self, mutation: &str) -> Vec<Interceptor> {
        self.chains
            .read()
            .get(mutation)
            .map(|chain| chain.iter().map(|e| e.interceptor.clone()).collect())
            .unwrap_or_default()
    }

    /// Origins of the current chain; `None` marks a runtime hook.
    pub(crate) fn origins(&self, mutation: &str) -> Vec<Option<String>> {
        self.chains
            .read()
            .get(mutation)
            .map(|chain| chain.iter().map(|e| e.origin.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::Before;

    fn passthrough() -> Interceptor {
        Interceptor::before(|_, args| Ok(Before::Continue(args)))
    }

    #[test]
    fn runtime_hooks_follow_declared_hooks() {
        let mut declared = IndexMap::new();
        declared.insert(
            "submit".to_string(),
            vec![Contributed {
                origin: "Form".to_string(),
                item: passthrough(),
            }],
        );
        let registry = HookRegistry::new(&declared);
        let id = registry.register("submit", passthrough());

        assert_eq!(registry.chain("submit").len(), 2);
        assert_eq!(registry.origins("submit"), [Some("Form".to_string()), None]);

        assert!(registry.unregister("submit", id));
        assert!(!registry.unregister("submit", id));
        assert_eq!(registry.chain("submit").len(), 1);
    }

    #[test]
    fn snapshot_is_independent_of_later_changes() {
        let registry = HookRegistry::new(&IndexMap::new());
        registry.register("toggle", passthrough());
        let snapshot = registry.chain("toggle");
        registry.register("toggle", passthrough());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.chain("toggle").len(), 2);
    }
}
