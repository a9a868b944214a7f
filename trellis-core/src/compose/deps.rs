//! Dependency resolution.
//!
//! Dependencies serve two purposes: they must be satisfied for a composition
//! to succeed, and they are the only edges along which a bundle may read
//! another bundle's state.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::bundle::SourceBundle;
use crate::error::CompositionError;

/// Which bundles each bundle may read from: itself plus its transitive
/// dependencies.
pub(crate) type AccessMap = IndexMap<String, IndexSet<String>>;

/// Fail if any source declares a dependency that is not in the set.
pub(crate) fn check_dependencies(sources: &[Arc<SourceBundle>]) -> Result<(), CompositionError> {
    let present: IndexSet<&str> = sources.iter().map(|s| s.name.as_str()).collect();
    for source in sources {
        if let Some(missing) = source
            .dependencies
            .iter()
            .find(|dep| !present.contains(dep.as_str()))
        {
            return Err(CompositionError::MissingDependency {
                bundle: source.name.clone(),
                dependency: missing.clone(),
            });
        }
    }
    Ok(())
}

/// Transitive closure of the dependency edges, per bundle.
pub(crate) fn access_map(sources: &[Arc<SourceBundle>]) -> AccessMap {
    let edges: IndexMap<&str, &[String]> = sources
        .iter()
        .map(|s| (s.name.as_str(), s.dependencies.as_slice()))
        .collect();

    let mut access = AccessMap::with_capacity(sources.len());
    for source in sources {
        let mut reachable = IndexSet::new();
        let mut queue = VecDeque::from([source.name.as_str()]);
        while let Some(name) = queue.pop_front() {
            if !reachable.insert(name.to_owned()) {
                continue;
            }
            if let Some(deps) = edges.get(name) {
                queue.extend(deps.iter().map(String::as_str));
            }
        }
        access.insert(source.name.clone(), reachable);
    }
    access
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleDescriptor;

    fn sources(defs: &[(&str, Vec<&str>)]) -> Vec<Arc<SourceBundle>> {
        defs.iter()
            .map(|(name, deps)| {
                let descriptor = deps
                    .iter()
                    .fold(BundleDescriptor::new(*name), |d, dep| d.depends_on(*dep));
                descriptor.define().unwrap().source().clone()
            })
            .collect()
    }

    #[test]
    fn missing_dependency_is_reported() {
        let set = sources(&[("Logging", vec!["Counter"])]);
        let err = check_dependencies(&set).unwrap_err();
        assert!(matches!(
            err,
            CompositionError::MissingDependency { ref bundle, ref dependency }
                if bundle == "Logging" && dependency == "Counter"
        ));
    }

    #[test]
    fn dependency_order_does_not_matter() {
        let set = sources(&[("Logging", vec!["Counter"]), ("Counter", vec![])]);
        assert!(check_dependencies(&set).is_ok());
    }

    #[test]
    fn access_is_transitive() {
        let set = sources(&[("Base", vec![]), ("Mid", vec!["Base"]), ("Top", vec!["Mid"])]);
        let access = access_map(&set);
        assert!(access["Top"].contains("Base"));
        assert!(access["Top"].contains("Top"));
        assert!(!access["Base"].contains("Top"));
    }
}
