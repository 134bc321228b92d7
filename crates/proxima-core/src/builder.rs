//! Incremental graph construction.
//!
//! Pending objects are linked in steps of `batch_size` ids, ascending:
//!
//! 1. **Search** (parallel): each member of the step searches the graph as
//!    linked so far, restricted to linked live nodes, for its
//!    `edge_size_for_creation` nearest neighbors.
//! 2. **Link** (sequential, id order): the candidates are merged with the
//!    members of the same step that were linked before it, the best become
//!    the node's forward edges, and each target receives a reverse edge.
//!    The node is then marked linked and offered to the entry tree.
//!
//! Phase 1 only reads; the calling thread acquires the read views once and
//! shares them with the workers, so no worker ever queues on a lock a
//! writer is waiting for.

use crate::error::{Error, Result};
use crate::graph::{Adjacency, EntryTree, ProximityGraph};
use crate::object_space::{ObjectSpace, ObjectsReader};
use crate::property::Property;
use crate::result::ObjectDistance;
use crate::search::{SearchContext, SearchParams, SearchScope};
use crate::ObjectId;
use parking_lot::RwLock;
use rayon::prelude::*;
use rayon::ThreadPool;

/// Outcome of one [`Index::build_pending`](crate::Index::build_pending) call.
#[derive(Debug, Default)]
pub struct BuildReport {
    linked: Vec<ObjectId>,
    skipped: Vec<(ObjectId, Error)>,
    dropped: usize,
}

impl BuildReport {
    /// Ids linked by this call, ascending.
    #[must_use]
    pub fn linked(&self) -> &[ObjectId] {
        &self.linked
    }

    /// Number of ids linked by this call.
    #[must_use]
    pub fn linked_count(&self) -> usize {
        self.linked.len()
    }

    /// Ids that failed to link, with the cause. They stay pending.
    #[must_use]
    pub fn skipped(&self) -> &[(ObjectId, Error)] {
        &self.skipped
    }

    /// Pending ids discarded because they were removed before linking.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Returns true if every selected id was linked or dropped.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub(crate) fn merge(&mut self, other: Self) {
        self.linked.extend(other.linked);
        self.skipped.extend(other.skipped);
        self.dropped += other.dropped;
    }
}

/// Links pending nodes into the graph.
pub(crate) struct GraphBuilder<'a> {
    pub(crate) property: &'a Property,
    pub(crate) objects: &'a ObjectSpace,
    pub(crate) graph: &'a ProximityGraph,
    pub(crate) tree: &'a RwLock<EntryTree>,
    pub(crate) pool: &'a ThreadPool,
    pub(crate) batch_size: usize,
}

impl GraphBuilder<'_> {
    /// Links `pending` (ascending ids) step by step.
    pub(crate) fn build(&self, pending: &[ObjectId]) -> BuildReport {
        let mut report = BuildReport::default();
        for (n, step) in pending.chunks(self.batch_size.max(1)).enumerate() {
            let candidates = self.search_step(step);
            let linked = self.link_step(candidates);
            tracing::debug!(
                step = n,
                size = step.len(),
                linked = linked.linked_count(),
                "build step finished"
            );
            report.merge(linked);
        }
        report
    }

    /// Phase 1: neighbor candidates for every member of the step.
    fn search_step(&self, step: &[ObjectId]) -> Vec<(ObjectId, Result<Option<Adjacency>>)> {
        let objects = self.objects.read();
        let graph = self.graph.read();
        let tree = self.tree.read();
        let ctx = SearchContext {
            property: self.property,
            objects: &objects,
            graph: &graph,
            tree: &tree,
        };
        let params = SearchParams::new(self.property.edge_size_for_creation())
            .with_epsilon(self.property.build_epsilon())
            .with_edge_size(0);

        self.pool.install(|| {
            step.par_iter()
                .map(|&id| (id, candidates_for(&ctx, id, &params)))
                .collect()
        })
    }

    /// Phase 2: publishes edges in id order.
    fn link_step(&self, candidates: Vec<(ObjectId, Result<Option<Adjacency>>)>) -> BuildReport {
        let capacity = self.property.edge_size_for_creation();
        let objects = self.objects.read();
        let graph = self.graph.read();
        let mut report = BuildReport::default();
        let mut linked_in_step: Vec<ObjectId> = Vec::new();

        for (id, found) in candidates {
            let mut neighbors = match found {
                Ok(Some(neighbors)) => neighbors,
                Ok(None) => {
                    report.dropped += 1;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(id, error = %err, "graph search for pending node failed");
                    report.skipped.push((id, err));
                    continue;
                }
            };
            let Some(query) = objects.live_view(id) else {
                report.dropped += 1;
                continue;
            };
            let Some(node) = graph.node(id) else {
                report
                    .skipped
                    .push((id, Error::Internal(format!("no graph node for id {id}"))));
                continue;
            };

            let mut merge_failed = None;
            for &earlier in &linked_in_step {
                if !objects.is_live(earlier) {
                    continue;
                }
                match objects.distance_to(query, earlier) {
                    Ok(distance) => neighbors.push(ObjectDistance::new(earlier, distance)),
                    Err(err) => {
                        merge_failed = Some(err);
                        break;
                    }
                }
            }
            if let Some(err) = merge_failed {
                report.skipped.push((id, err));
                continue;
            }
            neighbors.sort_unstable();
            neighbors.dedup_by_key(|e| e.id);
            neighbors.truncate(capacity);

            for edge in &neighbors {
                if let Some(target) = graph.node(edge.id) {
                    target.insert_edge(ObjectDistance::new(id, edge.distance), capacity, |n| {
                        objects.is_live(n)
                    });
                }
            }
            tracing::trace!(id, degree = neighbors.len(), "linked node");
            node.set_neighbors(neighbors);
            graph.mark_linked(id);

            if let Err(err) = self.offer_to_tree(id, &objects) {
                tracing::warn!(id, error = %err, "entry tree insertion failed");
            }
            linked_in_step.push(id);
            report.linked.push(id);
        }
        report
    }

    fn offer_to_tree(&self, id: ObjectId, objects: &ObjectsReader<'_>) -> Result<()> {
        let mut tree = self.tree.write();
        if tree.offer(self.property.tree_sampling_interval()) {
            tree.insert(id, objects)?;
        }
        Ok(())
    }
}

/// Candidates for one pending node; `None` if it was removed meanwhile.
fn candidates_for(
    ctx: &SearchContext<'_>,
    id: ObjectId,
    params: &SearchParams,
) -> Result<Option<Adjacency>> {
    let Some(query) = ctx.objects.live_view(id) else {
        return Ok(None);
    };
    match ctx.search(query, params, SearchScope::Linked) {
        Ok(found) => Ok(Some(found)),
        Err(Error::NotReady) => Ok(Some(Vec::new())),
        Err(err) => Err(err),
    }
}
