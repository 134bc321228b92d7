//! Distance metrics over encoded vectors.
//!
//! All metrics return true distances: lower is closer, zero means identical
//! (or, for `Angle`, co-directional). Search cutoffs (`epsilon`, `radius`)
//! are expressed in these units, so L2 is never left squared.
//!
//! # Element encodings
//!
//! - `Float` vectors go through the explicit SIMD kernels in [`crate::simd`],
//!   which accumulate in `f64`.
//! - `Uint8` vectors accumulate in integers, which is exact.
//!
//! Both paths narrow to `f32` once at the end, saturating at `f32::MAX`, so
//! every distance between finite vectors is finite.

use crate::error::{Error, Result};
use crate::property::DistanceType;
use crate::simd;
use crate::vector::VectorView;

impl DistanceType {
    /// Computes the distance between two vectors of the same encoding.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the encodings differ and
    /// `DimensionMismatch` when the lengths differ.
    #[inline]
    pub fn calculate(self, a: VectorView<'_>, b: VectorView<'_>) -> Result<f32> {
        if a.len() != b.len() {
            return Err(Error::DimensionMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }
        match (a, b) {
            (VectorView::Float(a), VectorView::Float(b)) => Ok(self.calculate_f32(a, b)),
            (VectorView::Uint8(a), VectorView::Uint8(b)) => Ok(self.calculate_u8(a, b)),
            _ => Err(Error::InvalidArgument(format!(
                "cannot compare {:?} with {:?} vectors",
                a.object_type(),
                b.object_type()
            ))),
        }
    }

    /// Float kernel. Slices must have equal length.
    #[must_use]
    pub fn calculate_f32(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L1 => narrow(simd::l1_distance(a, b)),
            Self::L2 => narrow(simd::squared_l2_distance(a, b).sqrt()),
            Self::Angle => {
                let (dot, norm_a, norm_b) = simd::dot_and_norms(a, b);
                angle_from_parts(dot, norm_a, norm_b)
            }
            Self::Hamming => simd::count_differing(a, b),
        }
    }

    /// Byte kernel. Slices must have equal length.
    #[must_use]
    pub fn calculate_u8(self, a: &[u8], b: &[u8]) -> f32 {
        match self {
            Self::L1 => {
                let sum: u64 = a
                    .iter()
                    .zip(b)
                    .map(|(&x, &y)| u64::from(x.abs_diff(y)))
                    .sum();
                narrow(sum as f64)
            }
            Self::L2 => {
                let sum: u64 = a
                    .iter()
                    .zip(b)
                    .map(|(&x, &y)| {
                        let d = u64::from(x.abs_diff(y));
                        d * d
                    })
                    .sum();
                narrow((sum as f64).sqrt())
            }
            Self::Angle => {
                let (mut dot, mut norm_a, mut norm_b) = (0u64, 0u64, 0u64);
                for (&x, &y) in a.iter().zip(b) {
                    let (x, y) = (u64::from(x), u64::from(y));
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                angle_from_parts(dot as f64, norm_a as f64, norm_b as f64)
            }
            Self::Hamming => {
                let bits: u32 = a.iter().zip(b).map(|(&x, &y)| (x ^ y).count_ones()).sum();
                bits as f32
            }
        }
    }
}

/// Narrows an accumulated distance, saturating instead of overflowing.
#[inline]
fn narrow(distance: f64) -> f32 {
    distance.min(f64::from(f32::MAX)) as f32
}

/// `1 - cos(a, b)` from a dot product and squared norms.
///
/// Zero-norm operands have no direction; the distance is defined as 0.
fn angle_from_parts(dot: f64, norm_a: f64, norm_b: f64) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let cosine = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    (1.0 - cosine) as f32
}
