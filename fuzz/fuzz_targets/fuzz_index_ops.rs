//! Fuzz target for sequences of index operations.
//!
//! Drives insert, build, search and remove with arbitrary arguments and
//! checks that results stay sorted, bounded and free of removed ids.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use proxima_core::{DistanceType, Index, Property};
use std::collections::HashSet;

const DIMENSION: usize = 4;

#[derive(Debug, Arbitrary)]
enum Op {
    Insert([i8; DIMENSION]),
    Build(u8),
    Search { query: [i8; DIMENSION], size: u8, epsilon: u8 },
    Remove(u16),
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    metric: u8,
    edges: u8,
    ops: Vec<Op>,
}

fuzz_target!(|scenario: Scenario| {
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let metric = match scenario.metric % 4 {
        0 => DistanceType::L1,
        1 => DistanceType::L2,
        2 => DistanceType::Angle,
        _ => DistanceType::Hamming,
    };
    let mut property = Property::new();
    property
        .set_dimension(DIMENSION)
        .set_distance_type(metric)
        .set_edge_size_for_creation(usize::from(scenario.edges % 16) + 1);
    let Ok(index) = Index::create(dir.path().join("ops"), &property) else {
        return;
    };

    let mut removed = HashSet::new();
    for op in scenario.ops.into_iter().take(256) {
        match op {
            Op::Insert(values) => {
                let values: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();
                let _ = index.insert(&values);
            }
            Op::Build(pool) => {
                let _ = index.build_pending(usize::from(pool));
            }
            Op::Search { query, size, epsilon } => {
                let query: Vec<f64> = query.iter().map(|&v| f64::from(v)).collect();
                let size = usize::from(size);
                if let Ok(results) = index.search(&query, size, f32::from(epsilon) / 64.0, None) {
                    assert!(results.len() <= size);
                    assert!(results.as_slice().windows(2).all(|w| w[0] < w[1]));
                    assert!(results.iter().all(|r| !removed.contains(&r.id)));
                }
            }
            Op::Remove(id) => {
                if index.remove(u32::from(id)).is_ok() {
                    removed.insert(u32::from(id));
                }
            }
        }
    }
});
