//! The algebraic contracts of change tracking: track/undo inverses,
//! commit clearing, and the merge-strategy law.

mod support;

use std::sync::Arc;

use serde_json::json;
use support::hero;

use entity_cache::{
    ChangeTracker, CollectionAdapter, EntityCollection, EntityKey, EntityUpdate, MergeStrategy,
    UpdateResponse,
};

fn tracker() -> ChangeTracker {
    ChangeTracker::new(support::hero_definition())
}

fn adapter() -> CollectionAdapter {
    CollectionAdapter::new(support::hero_definition())
}

fn collection_of(entities: &[serde_json::Value]) -> Arc<EntityCollection> {
    adapter()
        .add_many(entities, &Arc::new(EntityCollection::new("Hero")))
        .unwrap()
}

#[test]
fn track_add_then_undo_is_identity() {
    let tracker = tracker();
    let adapter = adapter();
    let base = collection_of(&[hero(1, "A")]);

    let added = hero(2, "B");
    let tracked = tracker.track_add_one(&added, &base, None).unwrap();
    let applied = adapter.add_one(&added, &tracked).unwrap();
    let undone = tracker.undo_one(&EntityKey::from(2), &applied);

    assert_eq!(*undone, *base);
}

#[test]
fn track_update_then_undo_restores_the_exact_value() {
    let tracker = tracker();
    let adapter = adapter();
    let base = collection_of(&[hero(1, "A")]);

    let update = EntityUpdate::new(1, json!({ "name": "A2", "power": 9 }));
    let tracked = tracker.track_update_one(&update, &base, None);
    let applied = adapter.update_one(&update, &tracked);
    assert_eq!(
        applied.get(&EntityKey::from(1)),
        Some(&json!({ "id": 1, "name": "A2", "power": 9 }))
    );

    let undone = tracker.undo_one(&EntityKey::from(1), &applied);
    assert_eq!(undone.get(&EntityKey::from(1)), Some(&hero(1, "A")));
    assert!(!undone.has_changes());
}

#[test]
fn track_delete_then_undo_resurrects() {
    let tracker = tracker();
    let adapter = adapter();
    let base = collection_of(&[hero(1, "A"), hero(2, "B")]);

    let key = EntityKey::from(2);
    let tracked = tracker.track_delete_one(&key, &base, None);
    let applied = adapter.remove_one(&key, &tracked);
    assert!(!applied.contains(&key));

    let undone = tracker.undo_one(&key, &applied);
    assert_eq!(*undone, *base);
}

#[test]
fn commit_all_clears_tracking_for_every_change_kind() {
    let tracker = tracker();
    let base = collection_of(&[hero(1, "A"), hero(2, "B")]);

    let tracked = tracker.track_add_one(&hero(3, "C"), &base, None).unwrap();
    let tracked = tracker.track_update_one(
        &EntityUpdate::new(1, json!({ "name": "A2" })),
        &tracked,
        None,
    );
    let tracked = tracker.track_delete_one(&EntityKey::from(2), &tracked, None);
    assert_eq!(tracked.change_state().len(), 3);

    let committed = tracker.commit_all(&tracked);
    assert!(!committed.has_changes());
}

#[test]
fn merge_strategy_law() {
    // A collection with a pending update on key 1: original O, current V.
    let tracker = tracker();
    let adapter = adapter();
    let original = hero(1, "O");
    let update = EntityUpdate::new(1, json!({ "name": "V" }));
    let pending = tracker.track_update_one(&update, &collection_of(&[original]), None);
    let pending = adapter.update_one(&update, &pending);
    let server = hero(1, "R");
    let key = EntityKey::from(1);

    // IgnoreChanges: change state untouched, adapter-level overwrite
    // rules still apply, so the server value lands in the map.
    let merged = tracker
        .merge_query_results(
            std::slice::from_ref(&server),
            &pending,
            Some(MergeStrategy::IgnoreChanges),
        )
        .unwrap();
    assert_eq!(
        merged.change_for(&key).unwrap().original_value,
        Some(hero(1, "O"))
    );
    assert_eq!(merged.get(&key), Some(&server));

    // OverwriteChanges: server value wins, tracking cleared.
    let merged = tracker
        .merge_query_results(
            std::slice::from_ref(&server),
            &pending,
            Some(MergeStrategy::OverwriteChanges),
        )
        .unwrap();
    assert_eq!(merged.get(&key), Some(&server));
    assert!(merged.change_for(&key).is_none());

    // PreserveChanges: local value stays current, server value becomes
    // the original, so a later undo reverts to the latest server state.
    let merged = tracker
        .merge_query_results(
            std::slice::from_ref(&server),
            &pending,
            Some(MergeStrategy::PreserveChanges),
        )
        .unwrap();
    assert_eq!(merged.get(&key), Some(&hero(1, "V")));
    assert_eq!(merged.change_for(&key).unwrap().original_value, Some(server.clone()));

    let undone = tracker.undo_one(&key, &merged);
    assert_eq!(undone.get(&key), Some(&server));
}

#[test]
fn skip_unchanged_updates_are_not_reapplied() {
    let tracker = tracker();
    let adapter = adapter();
    let update = EntityUpdate::new(1, json!({ "name": "V" }));
    let pending = tracker.track_update_one(&update, &collection_of(&[hero(1, "O")]), None);
    let pending = adapter.update_one(&update, &pending);

    let merged = tracker.merge_save_updates(
        &[UpdateResponse::new(1, json!({ "name": "V" }), false)],
        &pending,
        None,
        true,
    );

    assert!(merged.change_for(&EntityKey::from(1)).is_none());
    assert_eq!(merged.get(&EntityKey::from(1)), Some(&hero(1, "V")));
}

#[test]
fn empty_inputs_return_the_identical_collection() {
    let tracker = tracker();
    let base = collection_of(&[hero(1, "A")]);

    assert!(Arc::ptr_eq(
        &base,
        &tracker.track_add_many(&[], &base, None).unwrap()
    ));
    assert!(Arc::ptr_eq(&base, &tracker.track_delete_many(&[], &base, None)));
    assert!(Arc::ptr_eq(&base, &tracker.undo_many(&[], &base)));
    assert!(Arc::ptr_eq(&base, &tracker.commit_many(&[], &base)));
    assert!(Arc::ptr_eq(
        &base,
        &tracker.merge_save_adds(&[], &base, None).unwrap()
    ));
}
