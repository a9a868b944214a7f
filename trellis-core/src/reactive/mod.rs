//! Reactive Primitives
//!
//! The per-instance machinery behind reads and writes: state containers,
//! memoized derivation cells, the evaluation stack used for cycle detection,
//! and change notification.
//!
//! # Concepts
//!
//! ## State containers
//!
//! A container holds one record and a version. Writes replace the record and
//! bump the version.
//!
//! ## Memo cells
//!
//! A derivation's cache. It remembers the version of every input the last
//! evaluation read and is reused for as long as none of them moved. Nothing
//! is pushed when state changes; staleness is discovered on the next read.
//!
//! ## Subscribers
//!
//! Callbacks told which containers changed after a mutation call. They pull
//! whatever they need from the instance.

mod batch;
mod context;
mod memo;
mod state;
mod subscriber;

pub(crate) use batch::Batch;
pub(crate) use context::EvalStack;
pub(crate) use memo::{InputVersions, MemoCell};
pub(crate) use state::StateContainer;
pub use state::Update;
pub(crate) use subscriber::SubscriberList;
pub use subscriber::{Change, SubscriberId, Subscription};
