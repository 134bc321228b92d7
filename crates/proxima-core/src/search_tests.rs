//! Tests for `search` module

use super::search::*;
use crate::builder::GraphBuilder;
use crate::error::{Error, ErrorKind};
use crate::graph::{EntryTree, ProximityGraph};
use crate::object_space::ObjectSpace;
use crate::property::{DistanceType, Property};
use crate::result::ObjectDistance;
use crate::vector::Vector;
use crate::ObjectId;
use parking_lot::RwLock;

struct Fixture {
    property: Property,
    objects: ObjectSpace,
    graph: ProximityGraph,
    tree: RwLock<EntryTree>,
}

impl Fixture {
    fn new(property: Property, points: &[Vec<f32>]) -> Self {
        let fixture = Self {
            objects: ObjectSpace::new(&property),
            property,
            graph: ProximityGraph::new(),
            tree: RwLock::new(EntryTree::new()),
        };
        for point in points {
            fixture.objects.allocate(Vector::from(point.clone())).unwrap();
        }
        fixture.graph.reserve(points.len()).unwrap();
        fixture.graph.push_unlinked(points.len());
        fixture
    }

    fn l2(dimension: usize, points: &[Vec<f32>]) -> Self {
        let mut property = Property::new();
        property
            .set_dimension(dimension)
            .set_distance_type(DistanceType::L2)
            .set_edge_size_for_creation(6);
        Self::new(property, points)
    }

    fn build_all(&self) {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap();
        let ids: Vec<ObjectId> = (1..=self.objects.len() as ObjectId).collect();
        GraphBuilder {
            property: &self.property,
            objects: &self.objects,
            graph: &self.graph,
            tree: &self.tree,
            pool: &pool,
            batch_size: 16,
        }
        .build(&ids);
    }

    fn search(&self, query: &[f32], params: SearchParams) -> crate::Result<Vec<ObjectDistance>> {
        let objects = self.objects.read();
        let graph = self.graph.read();
        let tree = self.tree.read();
        let ctx = SearchContext {
            property: &self.property,
            objects: &objects,
            graph: &graph,
            tree: &tree,
        };
        let query = Vector::from(query.to_vec());
        ctx.search(query.view(), &params, SearchScope::Live)
    }

    fn brute_force(&self, query: &[f32], k: usize) -> Vec<ObjectId> {
        let query = Vector::from(query.to_vec());
        let reader = self.objects.read();
        let mut all: Vec<ObjectDistance> = (1..=reader.len() as ObjectId)
            .filter(|&id| reader.is_live(id))
            .map(|id| ObjectDistance::new(id, reader.distance_to(query.view(), id).unwrap()))
            .collect();
        all.sort_unstable();
        all.into_iter().take(k).map(|r| r.id).collect()
    }
}

fn five_points() -> Vec<Vec<f32>> {
    vec![
        vec![0.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![5.0, 5.0],
        vec![5.0, 6.0],
    ]
}

/// 400 points on a jittered 20 x 20 grid.
fn grid_points() -> Vec<Vec<f32>> {
    (0..400)
        .map(|i| {
            let x = (i % 20) as f32 + ((i * 7) % 10) as f32 * 0.01;
            let y = (i / 20) as f32 + ((i * 3) % 10) as f32 * 0.01;
            vec![x, y]
        })
        .collect()
}

// =========================================================================
// Parameters
// =========================================================================

#[test]
fn test_params_defaults_and_builders() {
    let params = SearchParams::default();
    assert_eq!(params.size(), 10);
    assert!((params.epsilon() - 0.1).abs() < f32::EPSILON);
    assert!(params.radius().is_none());

    let params = SearchParams::new(3).with_epsilon(0.5).with_radius(2.0);
    assert_eq!(params.size(), 3);
    assert_eq!(params.radius(), Some(2.0));
}

#[test]
fn test_params_validation() {
    assert!(SearchParams::new(1).with_epsilon(-0.1).validate().is_err());
    assert!(SearchParams::new(1).with_epsilon(f32::NAN).validate().is_err());
    assert!(SearchParams::new(1).with_radius(-1.0).validate().is_err());
    assert!(SearchParams::new(1).with_radius(f32::INFINITY).validate().is_ok());
    assert!(SearchParams::new(0).with_epsilon(0.0).validate().is_ok());
}

// =========================================================================
// Traversal
// =========================================================================

#[test]
fn test_search_before_build_is_not_ready() {
    let fixture = Fixture::l2(2, &five_points());

    let err = fixture.search(&[0.0, 0.0], SearchParams::new(2)).unwrap_err();

    assert!(matches!(err, Error::NotReady));
    assert_eq!(err.kind(), ErrorKind::NotReady);
}

#[test]
fn test_five_point_scenario() {
    // Arrange
    let fixture = Fixture::l2(2, &five_points());
    fixture.build_all();

    // Act
    let results = fixture
        .search(&[0.0, 0.0], SearchParams::new(2).with_epsilon(0.1))
        .unwrap();

    // Assert
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], ObjectDistance::new(1, 0.0));
    // (1,0) and (0,1) tie at distance 1; the lower id wins.
    assert_eq!(results[1].id, 2);
    assert!((results[1].distance - 1.0).abs() < 1e-6);
}

#[test]
fn test_size_zero_returns_empty() {
    let fixture = Fixture::l2(2, &five_points());
    fixture.build_all();

    let results = fixture.search(&[0.0, 0.0], SearchParams::new(0)).unwrap();

    assert!(results.is_empty());
}

#[test]
fn test_radius_bounds_results() {
    let fixture = Fixture::l2(2, &five_points());
    fixture.build_all();

    let results = fixture
        .search(&[0.0, 0.0], SearchParams::new(5).with_radius(1.0))
        .unwrap();

    let ids: Vec<ObjectId> = results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_fewer_results_than_size() {
    let fixture = Fixture::l2(2, &five_points());
    fixture.build_all();

    let results = fixture
        .search(&[5.0, 5.0], SearchParams::new(50).with_epsilon(1.0))
        .unwrap();

    assert_eq!(results.len(), 5);
    assert!(results.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_ties_resolve_by_ascending_id() {
    let points = vec![
        vec![9.0, 9.0],
        vec![1.0, 1.0],
        vec![1.0, 1.0],
        vec![1.0, 1.0],
        vec![1.0, 1.0],
    ];
    let fixture = Fixture::l2(2, &points);
    fixture.build_all();

    let results = fixture.search(&[1.0, 1.0], SearchParams::new(2)).unwrap();

    let ids: Vec<ObjectId> = results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn test_removed_objects_are_never_returned() {
    // Arrange
    let fixture = Fixture::l2(2, &grid_points());
    fixture.build_all();
    let victims: Vec<ObjectId> = (1..=400).step_by(3).collect();

    // Act
    for &id in &victims {
        fixture.objects.remove(id).unwrap();
    }

    // Assert
    for query in [[0.0, 0.0], [10.0, 10.0], [19.0, 3.0]] {
        let results = fixture
            .search(&query, SearchParams::new(20).with_epsilon(0.5))
            .unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| !victims.contains(&r.id)));
    }
}

#[test]
fn test_radius_search_over_huge_components_returns_finite_distances() {
    // Arrange
    let mut property = Property::new();
    property
        .set_dimension(2)
        .set_distance_type(DistanceType::Angle)
        .set_edge_size_for_creation(6);
    let fixture = Fixture::new(
        property,
        &[
            vec![1.0e20, 1.0e20],
            vec![1.0e20, 0.0],
            vec![0.0, 1.0e20],
            vec![-1.0e20, 1.0e20],
            vec![3.0e38, 1.0],
        ],
    );
    fixture.build_all();

    // Act
    let results = fixture
        .search(
            &[1.0e20, 1.0e20],
            SearchParams::new(10).with_epsilon(1.0).with_radius(0.5),
        )
        .unwrap();

    // Assert
    assert!(results.iter().all(|r| r.distance.is_finite() && r.distance <= 0.5));
    let mut ids: Vec<ObjectId> = results.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 5]);
}

#[test]
fn test_self_query_finds_itself() {
    let points = grid_points();
    let fixture = Fixture::l2(2, &points);
    fixture.build_all();

    for id in [1usize, 57, 200, 399, 400] {
        let results = fixture
            .search(&points[id - 1], SearchParams::new(1).with_epsilon(0.3))
            .unwrap();
        assert_eq!(results[0].id, id as ObjectId);
        assert_eq!(results[0].distance, 0.0);
    }
}

#[test]
fn test_recall_is_high_and_grows_with_epsilon() {
    let points = grid_points();
    let fixture = Fixture::l2(2, &points);
    fixture.build_all();
    let queries: Vec<[f32; 2]> = (0..30)
        .map(|i| [(i as f32 * 0.63) % 19.0, (i as f32 * 1.37) % 19.0])
        .collect();

    let recall = |epsilon: f32| {
        let mut hits = 0;
        for q in &queries {
            let truth = fixture.brute_force(q, 10);
            let found = fixture
                .search(q, SearchParams::new(10).with_epsilon(epsilon))
                .unwrap();
            hits += found.iter().filter(|r| truth.contains(&r.id)).count();
        }
        hits as f64 / (queries.len() * 10) as f64
    };

    let low = recall(0.0);
    let high = recall(10.0);

    assert!(low >= 0.7, "recall at epsilon 0: {low}");
    assert!((high - 1.0).abs() < f64::EPSILON, "recall at epsilon 10: {high}");
    assert!(high >= low);
}

#[test]
fn test_edge_size_limit_is_honoured() {
    let points = grid_points();
    let fixture = Fixture::l2(2, &points);
    fixture.build_all();

    let narrow = fixture
        .search(&[7.0, 7.0], SearchParams::new(5).with_edge_size(1))
        .unwrap();
    let wide = fixture
        .search(&[7.0, 7.0], SearchParams::new(5).with_edge_size(0))
        .unwrap();

    assert!(!narrow.is_empty());
    assert_eq!(wide.len(), 5);
}

#[test]
fn test_traversal_falls_back_when_every_seed_is_removed() {
    // Arrange
    let mut property = Property::new();
    property
        .set_dimension(2)
        .set_edge_size_for_creation(6)
        .set_tree_sampling_interval(50);
    let fixture = Fixture::new(property, &grid_points());
    fixture.build_all();
    let members: Vec<ObjectId> = {
        let tree = fixture.tree.read();
        (1..=400).filter(|&id| tree.contains(id)).collect()
    };
    assert_eq!(members.len(), 8);

    // Act
    for &id in &members {
        fixture.objects.remove(id).unwrap();
    }
    let results = fixture.search(&[3.0, 3.0], SearchParams::new(3)).unwrap();

    // Assert
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| fixture.objects.is_live(r.id)));
}
