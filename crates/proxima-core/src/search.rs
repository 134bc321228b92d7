//! Greedy graph search with epsilon-bounded exploration.
//!
//! # Algorithm
//!
//! 1. Seed the frontier with the entry tree's closest members to the query.
//! 2. Pop the closest unexplored frontier node. Stop when its distance
//!    exceeds the exploration radius: `(1 + epsilon) * radius` while the
//!    result heap has room, `(1 + epsilon) * worst admitted distance` once
//!    it is full.
//! 3. Visit the popped node's first `edge_size` neighbors, skipping
//!    tombstoned ones. Neighbors inside the exploration radius join the
//!    frontier; neighbors inside `radius` are offered to the result heap,
//!    which keeps the `size` smallest `(distance, id)` pairs.
//!
//! Both heaps order by [`ObjectDistance`], so equal distances resolve by
//! ascending id and results are deterministic for a fixed graph.

use crate::error::{Error, Result};
use crate::graph::{EntryTree, GraphReader};
use crate::object_space::ObjectsReader;
use crate::property::Property;
use crate::result::ObjectDistance;
use crate::vector::VectorView;
use crate::ObjectId;
use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Per-query search parameters.
///
/// # Example
///
/// ```rust
/// use proxima_core::SearchParams;
///
/// let params = SearchParams::new(20).with_epsilon(0.2).with_radius(5.0);
/// assert_eq!(params.size(), 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    size: usize,
    epsilon: f32,
    radius: Option<f32>,
    edge_size: Option<usize>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            size: 10,
            epsilon: 0.1,
            radius: None,
            edge_size: None,
        }
    }
}

impl SearchParams {
    /// Parameters returning up to `size` results with default slack.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Sets the exploration slack.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the maximum admissible distance.
    #[must_use]
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Overrides the property's `edge_size_for_search` (0 = every edge).
    #[must_use]
    pub fn with_edge_size(mut self, edges: usize) -> Self {
        self.edge_size = Some(edges);
        self
    }

    /// Requested result count.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Exploration slack.
    #[must_use]
    pub const fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Radius cutoff, `None` meaning unbounded.
    #[must_use]
    pub const fn radius(&self) -> Option<f32> {
        self.radius
    }

    /// Checks the parameters.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a negative or NaN epsilon or radius.
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "epsilon must be a finite value >= 0, got {}",
                self.epsilon
            )));
        }
        if let Some(radius) = self.radius {
            if radius.is_nan() || radius < 0.0 {
                return Err(Error::InvalidArgument(format!(
                    "radius must be >= 0, got {radius}"
                )));
            }
        }
        Ok(())
    }

    fn edge_limit(&self, property: &Property) -> usize {
        match self.edge_size {
            Some(0) => usize::MAX,
            Some(edges) => edges,
            None => property.search_edge_limit(),
        }
    }
}

/// Which nodes a traversal may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchScope {
    /// Every live node; used by queries.
    Live,
    /// Live nodes that are already linked; used by the graph builder.
    Linked,
}

/// Locked views a traversal reads from.
///
/// Acquired in the global lock order: objects, graph, tree.
pub(crate) struct SearchContext<'a> {
    pub(crate) property: &'a Property,
    pub(crate) objects: &'a ObjectsReader<'a>,
    pub(crate) graph: &'a GraphReader<'a>,
    pub(crate) tree: &'a EntryTree,
}

impl SearchContext<'_> {
    #[inline]
    fn usable(&self, id: ObjectId, scope: SearchScope) -> bool {
        match scope {
            SearchScope::Live => self.objects.is_live(id),
            SearchScope::Linked => {
                self.objects.is_live(id) && self.graph.node(id).is_some_and(|n| n.is_linked())
            }
        }
    }

    /// Entry points: tree seeds, or the first usable linked node.
    fn entry_points(
        &self,
        query: VectorView<'_>,
        scope: SearchScope,
    ) -> Result<Vec<ObjectDistance>> {
        let seeds = self.tree.seeds(
            query,
            self.objects,
            self.property.seed_size(),
            |id| self.usable(id, scope),
        )?;
        if !seeds.is_empty() {
            return Ok(seeds);
        }

        let fallback = self
            .graph
            .iter()
            .find(|(id, node)| node.is_linked() && self.usable(*id, scope));
        match fallback {
            Some((id, _)) => Ok(vec![ObjectDistance::new(
                id,
                self.objects.distance_to(query, id)?,
            )]),
            None => Ok(Vec::new()),
        }
    }

    /// Runs one traversal and returns up to `params.size` results,
    /// ascending by `(distance, id)`.
    pub(crate) fn search(
        &self,
        query: VectorView<'_>,
        params: &SearchParams,
        scope: SearchScope,
    ) -> Result<Vec<ObjectDistance>> {
        params.validate()?;
        if !self.graph.has_linked() {
            return Err(Error::NotReady);
        }
        if params.size == 0 {
            return Ok(Vec::new());
        }

        let edge_limit = params.edge_limit(self.property);
        let mut visited: FxHashSet<ObjectId> = FxHashSet::default();
        let mut frontier: BinaryHeap<Reverse<ObjectDistance>> = BinaryHeap::new();
        let mut results = BoundedResults::new(params);

        for seed in self.entry_points(query, scope)? {
            if visited.insert(seed.id) {
                frontier.push(Reverse(seed));
                results.offer(seed);
            }
        }

        let mut expanded = 0usize;
        while let Some(Reverse(current)) = frontier.pop() {
            if !current.distance.is_finite() || current.distance > results.exploration_radius() {
                break;
            }
            let Some(node) = self.graph.node(current.id) else {
                continue;
            };
            expanded += 1;

            let neighbors = node.neighbors_guard();
            for edge in neighbors.iter().take(edge_limit) {
                if !visited.insert(edge.id) || !self.usable(edge.id, scope) {
                    continue;
                }
                let distance = self.objects.distance_to(query, edge.id)?;
                let candidate = ObjectDistance::new(edge.id, distance);
                if distance.is_finite() && distance <= results.exploration_radius() {
                    frontier.push(Reverse(candidate));
                }
                results.offer(candidate);
            }
        }

        tracing::trace!(
            expanded,
            visited = visited.len(),
            found = results.heap.len(),
            "graph search finished"
        );
        Ok(results.heap.into_sorted_vec())
    }
}

/// Max-heap of the best `size` candidates plus the radii derived from it.
struct BoundedResults {
    heap: BinaryHeap<ObjectDistance>,
    size: usize,
    coefficient: f32,
    radius: f32,
}

impl BoundedResults {
    fn new(params: &SearchParams) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(params.size.min(1024) + 1),
            size: params.size,
            coefficient: 1.0 + params.epsilon,
            radius: params.radius.unwrap_or(f32::INFINITY),
        }
    }

    /// `(1 + epsilon)` times the current admission radius.
    #[inline]
    fn exploration_radius(&self) -> f32 {
        self.radius * self.coefficient
    }

    /// Admits `candidate` if it is within the radius. Non-finite distances
    /// are never admitted.
    fn offer(&mut self, candidate: ObjectDistance) {
        if !candidate.distance.is_finite() || candidate.distance > self.radius {
            return;
        }
        self.heap.push(candidate);
        if self.heap.len() > self.size {
            self.heap.pop();
        }
        if self.heap.len() == self.size {
            if let Some(worst) = self.heap.peek() {
                self.radius = self.radius.min(worst.distance);
            }
        }
    }
}
