//! Dependency Graph
//!
//! Nodes are the states and derivations of one instance, addressed by
//! stable arena indices ([`NodeId`]).
//!
//! # Overview
//!
//! Edges come from two places:
//!
//! - Derivations that declare their inputs contribute edges up front. These
//!   are walked with a depth-first search the first time such a derivation
//!   is evaluated, before its function runs.
//! - Derivations that track their inputs only learn their edges by running.
//!   Those edges live in each derivation's memo cell as the version vector of
//!   its last evaluation, and cycles among them are caught by the
//!   instance's evaluation stack.

mod declared;
mod node;

pub use declared::DeclaredGraph;
pub use node::NodeId;
