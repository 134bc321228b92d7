//! Explicit SIMD kernels for float vectors, built on `wide::f64x4`.
//!
//! Components are stored as `f32` but accumulate in `f64` lanes: any finite
//! `f32` squares to a finite `f64`, so sums never overflow for realistic
//! dimensions. Each kernel processes four lanes per step and finishes the
//! tail with scalar code. Callers guarantee equal lengths; the kernels
//! assert it.

use wide::f64x4;

const LANES: usize = 4;

#[inline]
fn widen(values: &[f32], offset: usize) -> f64x4 {
    f64x4::from([
        f64::from(values[offset]),
        f64::from(values[offset + 1]),
        f64::from(values[offset + 2]),
        f64::from(values[offset + 3]),
    ])
}

/// Sum of absolute differences.
#[inline]
#[must_use]
pub fn l1_distance(a: &[f32], b: &[f32]) -> f64 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let chunks = a.len() / LANES;
    let mut sum = f64x4::ZERO;
    for i in 0..chunks {
        let offset = i * LANES;
        sum = sum + (widen(a, offset) - widen(b, offset)).abs();
    }

    let mut result = sum.reduce_add();
    for i in chunks * LANES..a.len() {
        result += (f64::from(a[i]) - f64::from(b[i])).abs();
    }
    result
}

/// Squared Euclidean distance.
#[inline]
#[must_use]
pub fn squared_l2_distance(a: &[f32], b: &[f32]) -> f64 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let chunks = a.len() / LANES;
    let mut sum = f64x4::ZERO;
    for i in 0..chunks {
        let offset = i * LANES;
        let diff = widen(a, offset) - widen(b, offset);
        sum = diff.mul_add(diff, sum);
    }

    let mut result = sum.reduce_add();
    for i in chunks * LANES..a.len() {
        let diff = f64::from(a[i]) - f64::from(b[i]);
        result += diff * diff;
    }
    result
}

/// Dot product together with both squared norms, in a single pass.
///
/// Returns `(a·b, |a|², |b|²)`.
#[inline]
#[must_use]
pub fn dot_and_norms(a: &[f32], b: &[f32]) -> (f64, f64, f64) {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let chunks = a.len() / LANES;
    let mut dot = f64x4::ZERO;
    let mut norm_a = f64x4::ZERO;
    let mut norm_b = f64x4::ZERO;
    for i in 0..chunks {
        let offset = i * LANES;
        let va = widen(a, offset);
        let vb = widen(b, offset);
        dot = va.mul_add(vb, dot);
        norm_a = va.mul_add(va, norm_a);
        norm_b = vb.mul_add(vb, norm_b);
    }

    let mut dot = dot.reduce_add();
    let mut norm_a = norm_a.reduce_add();
    let mut norm_b = norm_b.reduce_add();
    for i in chunks * LANES..a.len() {
        let (x, y) = (f64::from(a[i]), f64::from(b[i]));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    (dot, norm_a, norm_b)
}

/// Number of positions whose components differ.
#[inline]
#[must_use]
pub fn count_differing(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");
    a.iter().zip(b).filter(|(x, y)| x != y).count() as f32
}
