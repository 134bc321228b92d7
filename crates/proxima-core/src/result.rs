//! Search result values.

use crate::ObjectId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// An object id paired with its distance to some reference vector.
///
/// Ordering is by distance (IEEE 754 total order), then by ascending id, so
/// ties resolve deterministically and the type can key a `BinaryHeap`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObjectDistance {
    /// Object id.
    pub id: ObjectId,
    /// Distance in the index metric.
    pub distance: f32,
}

impl ObjectDistance {
    /// Creates a new pair.
    #[must_use]
    pub const fn new(id: ObjectId, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl PartialEq for ObjectDistance {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ObjectDistance {}

impl PartialOrd for ObjectDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.id.cmp(&other.id))
    }
}

/// Results of one search, ascending by distance then id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    entries: Vec<ObjectDistance>,
}

impl ResultSet {
    /// Builds a result set, sorting the entries.
    #[must_use]
    pub fn from_unsorted(mut entries: Vec<ObjectDistance>) -> Self {
        entries.sort_unstable();
        Self { entries }
    }

    /// Number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the search found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Result at `index`, the closest being 0.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ObjectDistance> {
        self.entries.get(index)
    }

    /// Closest result.
    #[must_use]
    pub fn first(&self) -> Option<&ObjectDistance> {
        self.entries.first()
    }

    /// Iterates over the results in ascending order.
    pub fn iter(&self) -> std::slice::Iter<'_, ObjectDistance> {
        self.entries.iter()
    }

    /// Ids in ascending distance order.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        self.entries.iter().map(|r| r.id).collect()
    }

    /// Borrows the results as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[ObjectDistance] {
        &self.entries
    }

    /// Consumes the set, returning the sorted entries.
    #[must_use]
    pub fn into_vec(self) -> Vec<ObjectDistance> {
        self.entries
    }
}

impl IntoIterator for ResultSet {
    type Item = ObjectDistance;
    type IntoIter = std::vec::IntoIter<ObjectDistance>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ObjectDistance;
    type IntoIter = std::slice::Iter<'a, ObjectDistance>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
