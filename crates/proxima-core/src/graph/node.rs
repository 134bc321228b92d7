//! Graph node with a copy-on-write adjacency list.
//!
//! Readers take a snapshot (`Arc<Vec<_>>`) of the list and never see a
//! half-applied edit. Writers serialize on the node's own mutex, copy the
//! current list, edit the copy and publish it with a single atomic swap.

use crate::result::ObjectDistance;
use crate::ObjectId;
use arc_swap::{ArcSwap, Guard};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Adjacency list, ascending by (distance, id).
pub type Adjacency = Vec<ObjectDistance>;

/// One vertex of the proximity graph.
#[derive(Debug)]
pub struct GraphNode {
    adjacency: ArcSwap<Adjacency>,
    linked: AtomicBool,
    writer: Mutex<()>,
}

impl Default for GraphNode {
    fn default() -> Self {
        Self::unlinked()
    }
}

impl GraphNode {
    /// Creates a node that the builder has not processed yet.
    #[must_use]
    pub fn unlinked() -> Self {
        Self::from_parts(false, Vec::new())
    }

    pub(crate) fn from_parts(linked: bool, neighbors: Adjacency) -> Self {
        Self {
            adjacency: ArcSwap::from_pointee(neighbors),
            linked: AtomicBool::new(linked),
            writer: Mutex::new(()),
        }
    }

    /// Returns true once the builder has linked this node.
    #[inline]
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    /// Owned snapshot of the adjacency list.
    #[must_use]
    pub fn neighbors(&self) -> Arc<Adjacency> {
        self.adjacency.load_full()
    }

    /// Cheap snapshot for hot loops; do not hold it across long operations.
    #[inline]
    pub(crate) fn neighbors_guard(&self) -> Guard<Arc<Adjacency>> {
        self.adjacency.load()
    }

    /// Number of edges currently published.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.adjacency.load().len()
    }

    /// Publishes the forward edges of a node being linked.
    pub(crate) fn set_neighbors(&self, neighbors: Adjacency) {
        let _writer = self.writer.lock();
        self.adjacency.store(Arc::new(neighbors));
    }

    /// Inserts a reverse edge, keeping the list sorted and bounded.
    ///
    /// Entries for which `is_live` is false are pruned while the list is
    /// rewritten. When the list exceeds `capacity` its farthest edges are
    /// evicted, which may be the new edge itself. Returns true if `edge`
    /// is present afterwards.
    pub(crate) fn insert_edge(
        &self,
        edge: ObjectDistance,
        capacity: usize,
        is_live: impl Fn(ObjectId) -> bool,
    ) -> bool {
        let _writer = self.writer.lock();
        let current = self.adjacency.load();
        if current.iter().any(|e| e.id == edge.id) {
            return true;
        }

        let mut next: Adjacency = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().copied().filter(|e| is_live(e.id)));
        let position = next.partition_point(|e| *e < edge);
        next.insert(position, edge);
        next.truncate(capacity);
        let kept = position < next.len();

        drop(current);
        self.adjacency.store(Arc::new(next));
        kept
    }

    pub(crate) fn mark_linked(&self) {
        self.linked.store(true, Ordering::Release);
    }
}
