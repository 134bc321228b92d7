//! Tests for `simd` module

use super::simd::*;

fn scalar_l1(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (f64::from(x) - f64::from(y)).abs())
        .sum()
}

fn scalar_sq_l2(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (f64::from(x) - f64::from(y)).powi(2))
        .sum()
}

fn sample(len: usize, seed: f32) -> Vec<f32> {
    (0..len).map(|i| ((i as f32 + seed) * 0.37).sin()).collect()
}

#[test]
fn test_kernels_match_scalar_across_lengths() {
    // Lengths around the lane width exercise empty, partial and full chunks.
    for len in [0, 1, 3, 4, 5, 7, 8, 9, 15, 16, 17, 64, 100] {
        let a = sample(len, 1.0);
        let b = sample(len, 2.5);

        assert!((l1_distance(&a, &b) - scalar_l1(&a, &b)).abs() < 1e-4, "l1 len {len}");
        assert!(
            (squared_l2_distance(&a, &b) - scalar_sq_l2(&a, &b)).abs() < 1e-4,
            "l2 len {len}"
        );
    }
}

#[test]
fn test_dot_and_norms() {
    let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
    let b = [9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0];

    let (dot, norm_a, norm_b) = dot_and_norms(&a, &b);

    assert!((dot - 165.0).abs() < 1e-4);
    assert!((norm_a - 285.0).abs() < 1e-4);
    assert!((norm_b - 285.0).abs() < 1e-4);
}

#[test]
fn test_large_components_do_not_overflow() {
    let a = [3.0e38f32, -3.0e38, 1.0e20, 0.0, 2.0e19];
    let b = [-3.0e38f32, 3.0e38, 0.0, 1.0e20, 2.0e19];

    let l1 = l1_distance(&a, &b);
    let sq = squared_l2_distance(&a, &b);
    let (dot, norm_a, norm_b) = dot_and_norms(&a, &b);

    assert!(l1.is_finite() && l1 > 1.1e39);
    assert!(sq.is_finite() && sq > 7.0e77);
    assert!(dot.is_finite() && norm_a.is_finite() && norm_b.is_finite());
}

#[test]
fn test_count_differing() {
    assert_eq!(count_differing(&[1.0, 2.0, 3.0], &[1.0, 2.5, 0.0]), 2.0);
    assert_eq!(count_differing(&[], &[]), 0.0);
}

#[test]
#[should_panic(expected = "Vector dimensions must match")]
fn test_length_mismatch_panics() {
    let _ = l1_distance(&[1.0, 2.0], &[1.0]);
}
