//! Proximity graph: one [`GraphNode`] per stored object, indexed by id.

use super::node::{Adjacency, GraphNode};
use crate::error::Result;
use crate::ObjectId;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Directed graph over the objects of an index.
///
/// Node `n` describes object id `n`; the node vector grows in lockstep with
/// the object space.
#[derive(Debug, Default)]
pub struct ProximityGraph {
    nodes: RwLock<Vec<GraphNode>>,
    linked: AtomicUsize,
}

impl ProximityGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a graph from persisted `(linked, adjacency)` pairs.
    pub(crate) fn from_parts(nodes: Vec<(bool, Adjacency)>) -> Self {
        let linked = nodes.iter().filter(|(linked, _)| *linked).count();
        Self {
            nodes: RwLock::new(
                nodes
                    .into_iter()
                    .map(|(linked, adjacency)| GraphNode::from_parts(linked, adjacency))
                    .collect(),
            ),
            linked: AtomicUsize::new(linked),
        }
    }

    /// Number of nodes, linked or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of nodes the builder has linked, removed ones included.
    #[must_use]
    pub fn linked_count(&self) -> usize {
        self.linked.load(Ordering::Acquire)
    }

    /// Returns true once at least one node was ever linked.
    #[must_use]
    pub fn has_linked(&self) -> bool {
        self.linked_count() > 0
    }

    /// Reserves room for `additional` nodes so that a following
    /// [`push_unlinked`](Self::push_unlinked) cannot fail.
    pub(crate) fn reserve(&self, additional: usize) -> Result<()> {
        self.nodes.write().try_reserve(additional)?;
        Ok(())
    }

    /// Appends `count` unlinked nodes.
    pub(crate) fn push_unlinked(&self, count: usize) {
        let mut nodes = self.nodes.write();
        nodes.extend((0..count).map(|_| GraphNode::unlinked()));
    }

    /// Owned copy of a node's adjacency list.
    #[must_use]
    pub fn neighbors(&self, id: ObjectId) -> Option<Adjacency> {
        self.read().node(id).map(|node| node.neighbors().to_vec())
    }

    /// Returns true if node `id` exists and is linked.
    #[must_use]
    pub fn is_linked(&self, id: ObjectId) -> bool {
        self.read().node(id).is_some_and(GraphNode::is_linked)
    }

    pub(crate) fn read(&self) -> GraphReader<'_> {
        GraphReader {
            nodes: self.nodes.read(),
            linked: &self.linked,
        }
    }
}

/// Read guard over the node vector.
pub(crate) struct GraphReader<'a> {
    nodes: RwLockReadGuard<'a, Vec<GraphNode>>,
    linked: &'a AtomicUsize,
}

impl GraphReader<'_> {
    #[inline]
    pub(crate) fn node(&self, id: ObjectId) -> Option<&GraphNode> {
        let index = (id as usize).checked_sub(1)?;
        self.nodes.get(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn has_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire) > 0
    }

    /// Marks a node linked exactly once.
    pub(crate) fn mark_linked(&self, id: ObjectId) {
        if let Some(node) = self.node(id) {
            if !node.is_linked() {
                node.mark_linked();
                self.linked.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    /// Iterates over `(id, node)` in id order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (ObjectId, &GraphNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (slot as ObjectId + 1, node))
    }
}
