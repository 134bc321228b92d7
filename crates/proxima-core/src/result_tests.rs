//! Tests for `result` module

use super::result::*;
use std::collections::BinaryHeap;

#[test]
fn test_order_by_distance_then_id() {
    let mut entries = vec![
        ObjectDistance::new(5, 1.0),
        ObjectDistance::new(2, 1.0),
        ObjectDistance::new(9, 0.5),
    ];

    entries.sort();

    let ids: Vec<u32> = entries.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![9, 2, 5]);
}

#[test]
fn test_max_heap_pops_farthest_then_largest_id() {
    let mut heap: BinaryHeap<ObjectDistance> = [
        ObjectDistance::new(1, 2.0),
        ObjectDistance::new(3, 2.0),
        ObjectDistance::new(2, 0.1),
    ]
    .into_iter()
    .collect();

    assert_eq!(heap.pop().map(|e| e.id), Some(3));
    assert_eq!(heap.pop().map(|e| e.id), Some(1));
    assert_eq!(heap.pop().map(|e| e.id), Some(2));
}

#[test]
fn test_result_set_accessors() {
    // Arrange
    let set = ResultSet::from_unsorted(vec![
        ObjectDistance::new(4, 3.0),
        ObjectDistance::new(1, 0.0),
        ObjectDistance::new(7, 1.5),
    ]);

    // Act & Assert
    assert_eq!(set.len(), 3);
    assert!(!set.is_empty());
    assert_eq!(set.first().map(|r| r.id), Some(1));
    assert_eq!(set.get(2).map(|r| r.id), Some(4));
    assert_eq!(set.ids(), vec![1, 7, 4]);
    assert_eq!(set.iter().count(), 3);
    assert_eq!((&set).into_iter().count(), 3);
    assert_eq!(set.as_slice().len(), 3);
    assert_eq!(set.clone().into_vec().len(), 3);
    assert_eq!(set.into_iter().map(|r| r.id).last(), Some(4));
}

#[test]
fn test_empty_result_set() {
    let set = ResultSet::default();

    assert!(set.is_empty());
    assert!(set.first().is_none());
}

#[test]
fn test_object_distance_serde() {
    let value = ObjectDistance::new(3, 0.25);

    let json = serde_json::to_string(&value).expect("serialize");

    assert_eq!(json, r#"{"id":3,"distance":0.25}"#);
}
