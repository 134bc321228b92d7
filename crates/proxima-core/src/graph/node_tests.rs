//! Tests for `graph::node` and `graph::proximity`

use super::*;
use crate::result::ObjectDistance;
use std::sync::Arc;

fn edge(id: u32, distance: f32) -> ObjectDistance {
    ObjectDistance::new(id, distance)
}

#[test]
fn test_new_node_is_unlinked_and_empty() {
    let node = GraphNode::unlinked();

    assert!(!node.is_linked());
    assert_eq!(node.degree(), 0);
}

#[test]
fn test_insert_edge_keeps_order_and_capacity() {
    // Arrange
    let node = GraphNode::unlinked();
    node.set_neighbors(vec![edge(2, 1.0), edge(3, 3.0)]);

    // Act
    let kept_middle = node.insert_edge(edge(4, 2.0), 3, |_| true);
    let kept_far = node.insert_edge(edge(5, 9.0), 3, |_| true);
    let kept_near = node.insert_edge(edge(6, 0.5), 3, |_| true);

    // Assert
    assert!(kept_middle);
    assert!(!kept_far);
    assert!(kept_near);
    let ids: Vec<u32> = node.neighbors().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![6, 2, 4]);
}

#[test]
fn test_insert_edge_is_idempotent() {
    let node = GraphNode::unlinked();
    node.set_neighbors(vec![edge(2, 1.0)]);

    assert!(node.insert_edge(edge(2, 1.0), 4, |_| true));

    assert_eq!(node.degree(), 1);
}

#[test]
fn test_insert_edge_prunes_tombstoned_neighbors() {
    let node = GraphNode::unlinked();
    node.set_neighbors(vec![edge(2, 1.0), edge(3, 2.0), edge(4, 3.0)]);

    node.insert_edge(edge(5, 2.5), 4, |id| id != 3);

    let ids: Vec<u32> = node.neighbors().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![2, 5, 4]);
}

#[test]
fn test_snapshot_is_unaffected_by_later_writes() {
    let node = GraphNode::unlinked();
    node.set_neighbors(vec![edge(2, 1.0)]);

    let snapshot = node.neighbors();
    node.insert_edge(edge(3, 0.5), 4, |_| true);

    assert_eq!(snapshot.len(), 1);
    assert_eq!(node.degree(), 2);
}

#[test]
fn test_graph_push_and_mark_linked() {
    // Arrange
    let graph = ProximityGraph::new();
    graph.reserve(3).unwrap();
    graph.push_unlinked(3);

    // Act
    {
        let reader = graph.read();
        reader.mark_linked(2);
        reader.mark_linked(2);
    }

    // Assert
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.linked_count(), 1);
    assert!(graph.has_linked());
    assert!(graph.is_linked(2));
    assert!(!graph.is_linked(1));
    assert!(!graph.is_linked(0));
    assert!(graph.neighbors(4).is_none());
}

#[test]
fn test_graph_from_parts_counts_linked() {
    let graph = ProximityGraph::from_parts(vec![
        (true, vec![edge(2, 1.0)]),
        (true, vec![edge(1, 1.0)]),
        (false, Vec::new()),
    ]);

    assert_eq!(graph.linked_count(), 2);
    assert_eq!(graph.neighbors(1).unwrap(), vec![edge(2, 1.0)]);
}

#[test]
fn test_concurrent_reverse_edges_respect_capacity() {
    let node = Arc::new(GraphNode::unlinked());

    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let node = Arc::clone(&node);
            std::thread::spawn(move || {
                for i in 0..50u32 {
                    let id = t * 100 + i + 1;
                    node.insert_edge(edge(id, id as f32), 10, |_| true);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let neighbors = node.neighbors();
    assert_eq!(neighbors.len(), 10);
    assert!(neighbors.windows(2).all(|w| w[0] < w[1]));
    // The ten globally closest edges survive every interleaving.
    let ids: Vec<u32> = neighbors.iter().map(|e| e.id).collect();
    assert_eq!(ids, (1..=10).collect::<Vec<_>>());
}
