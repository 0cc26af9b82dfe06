//! Packed Freelist Tests
//!
//! Tests for:
//! - Handle uniqueness and stale handle detection
//! - Packing after erase (swap with last, pure truncation)
//! - Capacity limits and contract violations
//! - Iteration order

use std::collections::HashSet;

use lantern::core::{FreelistId, MAX_ELEMENTS, PackedFreelist};

// ============================================================================
// Insert / Contains
// ============================================================================

#[test]
fn inserted_handle_is_contained() {
    let mut list = PackedFreelist::new(8);
    let id = list.insert(42);
    assert!(list.contains(id));
    assert_eq!(list[id], 42);
    assert_eq!(list.len(), 1);
    assert!(!list.is_empty());
    assert_eq!(list.capacity(), 8);
}

#[test]
fn null_id_is_never_contained() {
    let mut list = PackedFreelist::new(4);
    assert!(!list.contains(FreelistId::NULL));
    list.insert("a");
    assert!(!list.contains(FreelistId::NULL));
    assert!(FreelistId::NULL.is_null());
}

#[test]
fn live_handles_are_unique() {
    let mut list = PackedFreelist::new(16);
    let mut live = Vec::new();
    for round in 0..5 {
        for i in 0..8 {
            live.push(list.insert(round * 100 + i));
        }
        // erase every other handle
        let mut keep = Vec::new();
        for (i, id) in live.drain(..).enumerate() {
            if i % 2 == 0 {
                list.erase(id);
            } else {
                keep.push(id);
            }
        }
        live = keep;

        let unique: HashSet<_> = live.iter().copied().collect();
        assert_eq!(unique.len(), live.len());
        assert!(live.iter().all(|id| list.contains(*id)));
    }
}

#[test]
fn out_of_range_slot_is_not_contained() {
    let small = PackedFreelist::<u8>::new(2);
    let mut big = PackedFreelist::new(8);
    let mut id = big.insert(0u8);
    for _ in 0..5 {
        id = big.insert(0);
    }
    assert!(id.slot() >= 2);
    assert!(!small.contains(id));
    assert!(small.get(id).is_none());
}

// ============================================================================
// Stale Handles
// ============================================================================

#[test]
fn erased_handle_stays_stale_after_slot_reuse() {
    let mut list = PackedFreelist::new(1);
    let first = list.insert('a');
    list.erase(first);

    let second = list.insert('b');
    assert_eq!(second.slot(), first.slot());
    assert_ne!(second.generation(), first.generation());
    assert!(!list.contains(first));
    assert!(list.contains(second));
    list.erase(second);

    for _ in 0..100 {
        let id = list.insert('c');
        assert!(!list.contains(first));
        assert!(!list.contains(second));
        list.erase(id);
    }
}

#[test]
fn stale_get_returns_none() {
    let mut list = PackedFreelist::new(4);
    let id = list.insert(String::from("light"));
    assert_eq!(list.erase(id), "light");
    assert!(list.get(id).is_none());
    assert!(list.get_mut(id).is_none());
    assert!(list.packed_index(id).is_none());
}

// ============================================================================
// Packing
// ============================================================================

#[test]
fn scenario_erase_moves_last_into_hole() {
    let mut list = PackedFreelist::new(8);
    let ids: Vec<_> = (0..5).map(|i| list.insert(i * 10)).collect();
    let hole = list.packed_index(ids[2]).unwrap();

    list.erase(ids[2]);

    assert!(!list.contains(ids[2]));
    assert_eq!(list.len(), 4);
    // the element formerly at the last packed position fills the hole
    assert_eq!(list.as_slice()[hole], 40);
    assert_eq!(list.packed_index(ids[4]), Some(hole));
    assert_eq!(list[ids[4]], 40);
}

#[test]
fn erasing_last_is_truncation() {
    let mut list = PackedFreelist::new(8);
    let ids: Vec<_> = (0..3).map(|i| list.insert(i)).collect();
    list.erase(ids[2]);
    assert_eq!(list.as_slice(), &[0, 1]);
    assert_eq!(list.packed_index(ids[0]), Some(0));
    assert_eq!(list.packed_index(ids[1]), Some(1));
    assert_eq!(list.back(), Some(&1));
}

#[test]
fn packed_without_gaps_after_mixed_operations() {
    let mut list = PackedFreelist::new(32);
    let mut live = Vec::new();
    for i in 0..20u32 {
        live.push(list.insert(i));
        if i % 3 == 0 {
            let id = live.remove(live.len() / 2);
            list.erase(id);
        }
    }

    assert_eq!(list.len(), live.len());
    assert_eq!(list.as_slice().len(), live.len());

    let iterated: HashSet<_> = list.ids().collect();
    assert_eq!(iterated.len(), list.len());
    for id in &live {
        assert!(iterated.contains(id));
        let index = list.packed_index(*id).unwrap();
        assert_eq!(list.as_slice()[index], list[*id]);
    }
}

#[test]
fn iter_pairs_ids_with_elements() {
    let mut list = PackedFreelist::new(4);
    let a = list.insert("a");
    let b = list.insert("b");
    let pairs: Vec<_> = list.iter().collect();
    assert_eq!(pairs, vec![(a, &"a"), (b, &"b")]);

    for (_, value) in list.iter_mut() {
        *value = "z";
    }
    assert_eq!(list[a], "z");
}

#[test]
fn clear_invalidates_everything() {
    let mut list = PackedFreelist::new(4);
    let ids: Vec<_> = (0..4).map(|i| list.insert(i)).collect();
    list.clear();
    assert!(list.is_empty());
    assert!(ids.iter().all(|id| !list.contains(*id)));
    // all slots are free again
    for i in 0..4 {
        list.insert(i);
    }
    assert_eq!(list.len(), 4);
}

// ============================================================================
// Contract Violations
// ============================================================================

#[test]
#[should_panic(expected = "out of slots")]
fn insert_beyond_capacity_panics() {
    let mut list = PackedFreelist::new(2);
    list.insert(1);
    list.insert(2);
    list.insert(3);
}

#[test]
#[should_panic(expected = "non contained")]
fn erase_stale_handle_panics() {
    let mut list = PackedFreelist::new(2);
    let id = list.insert(1);
    list.erase(id);
    list.erase(id);
}

#[test]
#[should_panic(expected = "non contained")]
fn index_stale_handle_panics() {
    let mut list = PackedFreelist::new(2);
    let id = list.insert(1);
    list.erase(id);
    let _ = list[id];
}

#[test]
#[should_panic(expected = "at most")]
fn capacity_above_limit_panics() {
    let _ = PackedFreelist::<u8>::new(MAX_ELEMENTS + 1);
}

#[test]
#[should_panic(expected = "capacity of 0")]
fn zero_capacity_panics() {
    let _ = PackedFreelist::<u8>::new(0);
}
