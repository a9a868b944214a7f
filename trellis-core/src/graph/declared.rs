//! Declared derivation edges and cycle detection.

use smallvec::SmallVec;

use crate::bundle::Input;
use crate::compose::Resolved;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Derivation-to-derivation edges taken from explicit input declarations.
///
/// Tracked derivations contribute no edges here; their cycles are caught
/// while evaluating.
#[derive(Debug, Default)]
pub struct DeclaredGraph {
    edges: Vec<SmallVec<[usize; 4]>>,
}

impl DeclaredGraph {
    /// Edges of every implementation of every derivation, overridden ones
    /// included, since they can be reached through `read_super`.
    pub(crate) fn from_resolved(resolved: &Resolved) -> Self {
        let edges = resolved
            .derivations
            .values()
            .map(|member| {
                let mut targets: SmallVec<[usize; 4]> = SmallVec::new();
                let implementations =
                    std::iter::once(&member.decl).chain(member.shadowed.iter().map(|(_, decl)| decl));
                for decl in implementations {
                    for input in decl.inputs().unwrap_or_default() {
                        if let Input::Derivation(name) = input {
                            if let Some(index) = resolved.derivations.get_index_of(name) {
                                if !targets.contains(&index) {
                                    targets.push(index);
                                }
                            }
                        }
                    }
                }
                targets
            })
            .collect();
        Self { edges }
    }

    pub fn from_edges(edges: Vec<Vec<usize>>) -> Self {
        Self {
            edges: edges.into_iter().map(SmallVec::from_vec).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Depth-first walk from `start` with a visiting set. Returns the first
    /// cycle found, as a path whose first and last nodes are equal.
    pub fn find_cycle(&self, start: usize) -> Option<Vec<usize>> {
        if start >= self.edges.len() {
            return None;
        }
        let mut marks = vec![Mark::Unvisited; self.edges.len()];
        // (node, next edge to follow)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::Visiting;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            match self.edges[node].get(top.1).copied() {
                Some(target) => {
                    top.1 += 1;
                    match marks.get(target).copied() {
                        Some(Mark::Unvisited) => {
                            marks[target] = Mark::Visiting;
                            stack.push((target, 0));
                        }
                        Some(Mark::Visiting) => {
                            let from = stack.iter().position(|&(n, _)| n == target).unwrap_or(0);
                            let mut path: Vec<usize> = stack[from..].iter().map(|&(n, _)| n).collect();
                            path.push(target);
                            return Some(path);
                        }
                        Some(Mark::Done) | None => {}
                    }
                }
                None => {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acyclic_graph_has_no_cycle() {
        // 0 -> 1 -> 2, 0 -> 2
        let graph = DeclaredGraph::from_edges(vec![vec![1, 2], vec![2], vec![]]);
        for start in 0..graph.len() {
            assert_eq!(graph.find_cycle(start), None);
        }
    }

    #[test]
    fn cycle_path_is_reported() {
        // 0 -> 1 -> 2 -> 1
        let graph = DeclaredGraph::from_edges(vec![vec![1], vec![2], vec![1]]);
        assert_eq!(graph.find_cycle(0), Some(vec![1, 2, 1]));
    }

    #[test]
    fn self_loop() {
        let graph = DeclaredGraph::from_edges(vec![vec![0]]);
        assert_eq!(graph.find_cycle(0), Some(vec![0, 0]));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        // 0 -> {1, 2} -> 3
        let graph = DeclaredGraph::from_edges(vec![vec![1, 2], vec![3], vec![3], vec![]]);
        assert_eq!(graph.find_cycle(0), None);
    }
}
