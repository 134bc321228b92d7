//! Recall quality validation for the proximity graph.
//!
//! Recall@k = |retrieved ∩ ground_truth| / k, measured against brute force
//! over the same stored vectors.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test recall_validation -- --nocapture
//! ```

#![allow(clippy::cast_precision_loss)]

use proxima_core::{DistanceType, Index, ObjectId, ObjectType, Property, SearchParams, Vector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tempfile::TempDir;

fn compute_recall(retrieved: &[ObjectId], ground_truth: &[ObjectId], k: usize) -> f64 {
    let k = k.min(ground_truth.len());
    if k == 0 {
        return 0.0;
    }
    let truth: HashSet<_> = ground_truth.iter().take(k).collect();
    let hits = retrieved.iter().take(k).filter(|id| truth.contains(id)).count();
    hits as f64 / k as f64
}

fn random_vectors(rng: &mut StdRng, count: usize, dim: usize) -> Vec<Vec<f64>> {
    (0..count)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

/// Brute-force top `k` over live objects, ordered like search results.
///
/// The query is stored as a temporary object so the index metric does the
/// work; it is removed again before returning.
fn ground_truth(index: &Index, query: &Vector, k: usize) -> Vec<ObjectId> {
    let count = index.len().unwrap() as ObjectId;
    let probe = index.insert_vector(query.clone()).unwrap();
    let mut all: Vec<(f32, ObjectId)> = (1..=count)
        .filter(|&id| index.get_vector(id).is_ok())
        .filter_map(|id| index.distance(probe, id).ok().map(|d| (d, id)))
        .collect();
    index.remove(probe).unwrap();
    all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    all.into_iter().take(k).map(|(_, id)| id).collect()
}

struct Dataset {
    _dir: TempDir,
    index: Index,
    queries: Vec<Vector>,
    truth: Vec<Vec<ObjectId>>,
}

fn dataset(distance: DistanceType, count: usize, dim: usize, k: usize) -> Dataset {
    let dir = TempDir::new().expect("temp dir");
    let mut property = Property::new();
    property
        .set_dimension(dim)
        .set_distance_type(distance)
        .set_edge_size_for_creation(16);
    let index = Index::create(dir.path().join("recall"), &property).expect("create");

    let mut rng = StdRng::seed_from_u64(42);
    index
        .insert_batch(&random_vectors(&mut rng, count, dim))
        .expect("insert");
    let report = index.build_pending(0).expect("build");
    assert!(report.is_complete());

    let queries: Vec<Vector> = random_vectors(&mut rng, 25, dim)
        .iter()
        .map(|q| Vector::encode(q, ObjectType::Float).expect("encode"))
        .collect();
    let truth = queries.iter().map(|q| ground_truth(&index, q, k)).collect();

    Dataset {
        _dir: dir,
        index,
        queries,
        truth,
    }
}

fn mean_recall(data: &Dataset, k: usize, epsilon: f32) -> f64 {
    let params = SearchParams::new(k).with_epsilon(epsilon);
    let total: f64 = data
        .queries
        .iter()
        .zip(&data.truth)
        .map(|(query, truth)| {
            let found = data.index.search_with(query, &params).expect("search");
            compute_recall(&found.ids(), truth, k)
        })
        .sum();
    total / data.queries.len() as f64
}

#[test]
fn test_recall_l2_small_dimension() {
    let data = dataset(DistanceType::L2, 1_000, 8, 10);

    let recall = mean_recall(&data, 10, 0.1);

    println!("L2 d=8 recall@10 (eps 0.1): {recall:.3}");
    assert!(recall >= 0.9, "recall {recall:.3} below 0.9");
}

#[test]
fn test_recall_angle() {
    let data = dataset(DistanceType::Angle, 1_000, 16, 10);

    let recall = mean_recall(&data, 10, 0.2);

    println!("Angle d=16 recall@10 (eps 0.2): {recall:.3}");
    assert!(recall >= 0.8, "recall {recall:.3} below 0.8");
}

#[test]
fn test_recall_does_not_drop_with_epsilon() {
    // Arrange
    let data = dataset(DistanceType::L2, 1_000, 16, 10);

    // Act
    let tight = mean_recall(&data, 10, 0.0);
    let loose = mean_recall(&data, 10, 0.5);
    let exhaustive = mean_recall(&data, 10, 100.0);

    // Assert
    println!("recall@10 eps 0.0: {tight:.3}, 0.5: {loose:.3}, 100: {exhaustive:.3}");
    assert!(loose + 0.02 >= tight);
    assert!(exhaustive >= 0.98, "recall {exhaustive:.3} below 0.98");
    assert!(exhaustive + 0.02 >= loose);
}

#[test]
fn test_recall_survives_removals() {
    let data = dataset(DistanceType::L2, 800, 8, 10);
    for id in (1..=800).step_by(4) {
        data.index.remove(id).unwrap();
    }

    let params = SearchParams::new(10).with_epsilon(0.2);
    let mut total = 0.0;
    for query in &data.queries {
        let truth = ground_truth(&data.index, query, 10);
        let found = data.index.search_with(query, &params).unwrap();
        assert!(found.iter().all(|r| (r.id - 1) % 4 != 0));
        total += compute_recall(&found.ids(), &truth, 10);
    }
    let recall = total / data.queries.len() as f64;

    println!("recall@10 after removing a quarter: {recall:.3}");
    assert!(recall >= 0.8, "recall {recall:.3} below 0.8");
}
