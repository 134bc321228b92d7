//! Index property: the immutable-after-creation configuration of an index.
//!
//! A [`Property`] is created once, tuned through its setters, and copied
//! into the index at create/open time. Dimension and object type are fixed
//! for the lifetime of the index; the other fields are persisted with the
//! index so that a reopened index searches exactly like the saved one.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Element encoding of stored vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectType {
    /// IEEE 754 single-precision components.
    #[default]
    Float,
    /// Unsigned 8-bit components.
    Uint8,
}

impl ObjectType {
    /// Size in bytes of one component.
    #[must_use]
    pub const fn component_size(self) -> usize {
        match self {
            Self::Float => 4,
            Self::Uint8 => 1,
        }
    }

    pub(crate) const fn to_tag(self) -> u8 {
        match self {
            Self::Float => 0,
            Self::Uint8 => 1,
        }
    }

    pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Float),
            1 => Some(Self::Uint8),
            _ => None,
        }
    }
}

/// Distance metric used for every comparison in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceType {
    /// Sum of absolute component differences.
    L1,
    /// Euclidean distance.
    #[default]
    L2,
    /// One minus cosine similarity; zero when either operand has zero norm.
    Angle,
    /// Number of differing bits (Uint8) or components (Float).
    Hamming,
}

/// Configuration of an index.
///
/// # Example
///
/// ```rust
/// use proxima_core::{DistanceType, ObjectType, Property};
///
/// let mut property = Property::new();
/// property
///     .set_dimension(128)
///     .set_object_type(ObjectType::Uint8)
///     .set_distance_type(DistanceType::L1);
/// assert!(property.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    dimension: usize,
    object_type: ObjectType,
    distance_type: DistanceType,
    edge_size_for_creation: usize,
    edge_size_for_search: usize,
    build_epsilon: f32,
    tree_sampling_interval: usize,
    seed_size: usize,
}

impl Default for Property {
    fn default() -> Self {
        Self {
            dimension: 0,
            object_type: ObjectType::Float,
            distance_type: DistanceType::L2,
            edge_size_for_creation: 10,
            edge_size_for_search: 40,
            build_epsilon: 0.1,
            tree_sampling_interval: 1,
            seed_size: 10,
        }
    }
}

impl Property {
    /// Creates a property holding the default values.
    ///
    /// The dimension defaults to 0 and must be set before creating an index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the vector dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Sets the vector dimension.
    pub fn set_dimension(&mut self, dimension: usize) -> &mut Self {
        self.dimension = dimension;
        self
    }

    /// Returns the element encoding.
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Sets the element encoding.
    pub fn set_object_type(&mut self, object_type: ObjectType) -> &mut Self {
        self.object_type = object_type;
        self
    }

    /// Returns the distance metric.
    #[must_use]
    pub const fn distance_type(&self) -> DistanceType {
        self.distance_type
    }

    /// Sets the distance metric.
    pub fn set_distance_type(&mut self, distance_type: DistanceType) -> &mut Self {
        self.distance_type = distance_type;
        self
    }

    /// Returns the target out-degree of a node built by the graph builder.
    #[must_use]
    pub const fn edge_size_for_creation(&self) -> usize {
        self.edge_size_for_creation
    }

    /// Sets the target out-degree used during construction.
    pub fn set_edge_size_for_creation(&mut self, edges: usize) -> &mut Self {
        self.edge_size_for_creation = edges;
        self
    }

    /// Returns the number of edges followed per node during search (0 = all).
    #[must_use]
    pub const fn edge_size_for_search(&self) -> usize {
        self.edge_size_for_search
    }

    /// Sets the number of edges followed per node during search.
    pub fn set_edge_size_for_search(&mut self, edges: usize) -> &mut Self {
        self.edge_size_for_search = edges;
        self
    }

    /// Returns the exploration slack of the builder's internal search.
    #[must_use]
    pub const fn build_epsilon(&self) -> f32 {
        self.build_epsilon
    }

    /// Sets the exploration slack of the builder's internal search.
    pub fn set_build_epsilon(&mut self, epsilon: f32) -> &mut Self {
        self.build_epsilon = epsilon;
        self
    }

    /// Returns K: every Kth linked node is sampled into the entry tree.
    #[must_use]
    pub const fn tree_sampling_interval(&self) -> usize {
        self.tree_sampling_interval
    }

    /// Sets the entry tree sampling interval.
    pub fn set_tree_sampling_interval(&mut self, interval: usize) -> &mut Self {
        self.tree_sampling_interval = interval;
        self
    }

    /// Returns the maximum number of entry points seeded per search.
    #[must_use]
    pub const fn seed_size(&self) -> usize {
        self.seed_size
    }

    /// Sets the maximum number of entry points seeded per search.
    pub fn set_seed_size(&mut self, seeds: usize) -> &mut Self {
        self.seed_size = seeds;
        self
    }

    /// Effective per-node edge budget for search traversal.
    pub(crate) fn search_edge_limit(&self) -> usize {
        if self.edge_size_for_search == 0 {
            usize::MAX
        } else {
            self.edge_size_for_search
        }
    }

    /// Checks that the property can back an index.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidArgument(
                "property.dimension must be positive".to_string(),
            ));
        }
        if self.edge_size_for_creation == 0 {
            return Err(Error::InvalidArgument(
                "property.edge_size_for_creation must be positive".to_string(),
            ));
        }
        if self.tree_sampling_interval == 0 {
            return Err(Error::InvalidArgument(
                "property.tree_sampling_interval must be positive".to_string(),
            ));
        }
        if self.seed_size == 0 {
            return Err(Error::InvalidArgument(
                "property.seed_size must be positive".to_string(),
            ));
        }
        if !self.build_epsilon.is_finite() || self.build_epsilon < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "property.build_epsilon must be a finite value >= 0, got {}",
                self.build_epsilon
            )));
        }
        if u32::try_from(self.dimension).is_err() {
            return Err(Error::InvalidArgument(format!(
                "property.dimension {} does not fit in 32 bits",
                self.dimension
            )));
        }
        Ok(())
    }
}
