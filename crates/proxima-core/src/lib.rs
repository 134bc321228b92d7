//! # Proxima Core
//!
//! Approximate nearest-neighbor search over high-dimensional vectors, built
//! on a proximity graph whose traversals are seeded by a vantage-point
//! entry tree.
//!
//! ## Features
//!
//! - **Incremental growth**: insert now, link into the graph later with
//!   [`Index::build_pending`]; parallel batch construction on `rayon`
//! - **Four metrics**: L1, L2, Angle and Hamming over `f32` or `u8` vectors,
//!   with explicit SIMD kernels
//! - **Tunable search**: `epsilon` trades latency for recall, `radius`
//!   bounds admissible distances
//! - **Concurrent reads**: searches run alongside builds on copy-on-write
//!   adjacency snapshots
//! - **Persistence**: versioned, validated, deterministic on-disk format
//!
//! ## Quick Start
//!
//! ```rust
//! use proxima_core::{DistanceType, Index, Property, SearchParams, Vector};
//!
//! # fn main() -> proxima_core::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let mut property = Property::new();
//! property
//!     .set_dimension(3)
//!     .set_distance_type(DistanceType::L2)
//!     .set_edge_size_for_creation(10);
//!
//! let index = Index::create(dir.path().join("demo"), &property)?;
//! let id = index.insert(&[0.1, 0.2, 0.3])?;
//! index.insert(&[0.9, 0.8, 0.7])?;
//! index.build_pending(0)?;
//!
//! let results = index.search(&[0.1, 0.2, 0.3], 1, 0.1, None)?;
//! assert_eq!(results.first().map(|r| r.id), Some(id));
//!
//! let query = Vector::from(vec![0.9_f32, 0.8, 0.7]);
//! let results = index.search_with(&query, &SearchParams::new(2).with_epsilon(0.2))?;
//! assert_eq!(results.len(), 2);
//!
//! index.save()?;
//! index.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// Casts between ids, counts and on-disk integers are bounds-checked where
// they can overflow.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::doc_markdown)]

mod builder;
pub mod config;
pub mod distance;
pub mod error;
#[cfg(test)]
mod error_tests;
pub mod graph;
mod index;
pub mod object_space;
mod persistence;
pub mod property;
pub mod result;
#[cfg(test)]
mod result_tests;
mod search;
#[cfg(test)]
mod search_tests;
pub mod simd;
#[cfg(test)]
mod simd_tests;
pub mod vector;

/// Identifier of a stored vector.
///
/// Ids are assigned densely from 1 in insertion order and never reused;
/// 0 is never a valid id.
pub type ObjectId = u32;

pub use builder::BuildReport;
pub use config::{ConfigError, ProximaConfig};
pub use error::{Error, ErrorKind, Result};
pub use graph::{EntryTree, ProximityGraph};
pub use index::{Index, IndexStats};
pub use object_space::ObjectSpace;
pub use property::{DistanceType, ObjectType, Property};
pub use result::{ObjectDistance, ResultSet};
pub use search::SearchParams;
pub use vector::{Vector, VectorView};
