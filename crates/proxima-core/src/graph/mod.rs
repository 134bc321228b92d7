//! Graph structures: the proximity graph and the entry tree that seeds it.
//!
//! ```text
//! ┌──────────────────────────────┐      ┌─────────────────────────┐
//! │ ProximityGraph               │      │ EntryTree (VP-tree)     │
//! │  nodes: Vec<GraphNode>       │◄─────│  leaves: sampled ids    │
//! │   adjacency: ArcSwap<Vec<_>> │ seed │  internal: pivot+radius │
//! │   linked: AtomicBool         │      └─────────────────────────┘
//! └──────────────────────────────┘
//! ```

mod entry_tree;
mod node;
mod proximity;

pub use entry_tree::{EntryTree, TreeNode};
pub use node::{Adjacency, GraphNode};
pub use proximity::ProximityGraph;

pub(crate) use entry_tree::TreeImage;
pub(crate) use proximity::GraphReader;

#[cfg(test)]
mod node_tests;
