//! Graph Nodes

/// Stable identifier of a node in an instance's graph.
///
/// Indices are arena positions: the state's or derivation's position in the
/// composed bundle. They never change for the lifetime of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    State(usize),
    Derivation(usize),
}

impl NodeId {
    pub fn index(self) -> usize {
        match self {
            Self::State(index) | Self::Derivation(index) => index,
        }
    }

    pub fn is_state(self) -> bool {
        matches!(self, Self::State(_))
    }
}
