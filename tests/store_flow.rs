//! The full control loop: command → start transition → data service →
//! terminal outcome → new cache state → observers.

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use support::hero;

use entity_cache::{
    Action, AlwaysOnline, CacheAction, CacheOp, CacheStore, ChangeSetBuilder, ChangeType,
    CorrelationId, EntityAction, EntityCache, EntityKey, EntityOp, EntityUpdate,
    InMemoryCacheDataService, PersistenceOrchestrator,
};

fn store_with(seed: Vec<serde_json::Value>) -> (Arc<CacheStore>, Arc<entity_cache::InMemoryDataService>) {
    let (registry, service) = support::hero_services(seed);
    let orchestrator = Arc::new(PersistenceOrchestrator::new(registry, Arc::new(AlwaysOnline)));
    let store = Arc::new(CacheStore::new(&support::definitions(), orchestrator));
    (store, service)
}

#[tokio::test]
async fn query_then_optimistic_update_scenario() {
    let (store, _) = store_with(vec![hero(1, "A")]);

    store
        .execute(Action::Entity(EntityAction::new("Hero", EntityOp::QueryLoad)))
        .await
        .unwrap();
    assert!(store.snapshot().collection("Hero").unwrap().loaded());

    let outcome = store
        .execute(Action::Entity(
            EntityAction::new(
                "Hero",
                EntityOp::SaveUpdateOne { update: EntityUpdate::new(1, json!({ "name": "A2" })) },
            )
            .optimistic(true)
            .with_correlation_id(CorrelationId::new()),
        ))
        .await
        .unwrap();

    let Action::Entity(outcome) = outcome else {
        panic!("expected an entity outcome");
    };
    assert!(matches!(outcome.op, EntityOp::SaveUpdateOneSuccess { .. }));

    let heroes = store.snapshot().collection("Hero").unwrap().clone();
    assert!(!heroes.loading());
    assert!(!heroes.has_changes());
    assert_eq!(heroes.get(&EntityKey::from(1)), Some(&hero(1, "A2")));
}

#[tokio::test]
async fn watchers_see_changes_and_skip_no_ops() {
    let (store, _) = store_with(vec![]);
    let mut watcher = store.watch();
    watcher.mark_unchanged();

    // A no-op transition publishes nothing.
    store
        .dispatch(&Action::Entity(EntityAction::new(
            "Hero",
            EntityOp::SetLoading { loading: false },
        )))
        .unwrap();
    // First reference of a collection is a change even with no entities.
    assert!(watcher.has_changed().unwrap());
    watcher.mark_unchanged();

    store
        .dispatch(&Action::Entity(EntityAction::new(
            "Hero",
            EntityOp::SetLoading { loading: false },
        )))
        .unwrap();
    assert!(!watcher.has_changed().unwrap());

    store
        .dispatch(&Action::Entity(EntityAction::new(
            "Hero",
            EntityOp::AddOne { entity: hero(1, "A") },
        )))
        .unwrap();
    assert!(watcher.has_changed().unwrap());
    assert_eq!(
        watcher.borrow_and_update().collection("Hero").unwrap().len(),
        1
    );
}

#[tokio::test]
async fn deleting_a_never_saved_entity_skips_the_network() {
    let (store, service) = store_with(vec![]);

    store
        .dispatch(&Action::Entity(EntityAction::new(
            "Hero",
            EntityOp::AddOne { entity: hero(1, "draft") },
        )))
        .unwrap();

    let outcome = store
        .execute(Action::Entity(EntityAction::new(
            "Hero",
            EntityOp::SaveDeleteOne { key: EntityKey::from(1) },
        )))
        .await
        .unwrap();

    let Action::Entity(outcome) = outcome else {
        panic!("expected an entity outcome");
    };
    assert!(matches!(outcome.op, EntityOp::SaveDeleteOneSuccess { .. }));
    assert_eq!(service.calls(), 0);

    let heroes = store.snapshot().collection("Hero").unwrap().clone();
    assert!(heroes.is_empty());
    assert!(!heroes.loading());
    assert!(!heroes.has_changes());
}

#[tokio::test]
async fn changeset_save_applies_starts_and_successes() {
    let (mut registry, _service) = support::hero_services(vec![]);
    registry.register_cache_service(Arc::new(InMemoryCacheDataService::new()));
    let orchestrator = Arc::new(PersistenceOrchestrator::new(registry, Arc::new(AlwaysOnline)));
    let store = CacheStore::new(&support::definitions(), orchestrator);

    let changeset = ChangeSetBuilder::new()
        .add("Hero", vec![hero(1, "A")])
        .upsert("Villain", vec![json!({ "id": 9, "name": "V" })])
        .with_tag("bulk")
        .build();

    let outcome = store
        .execute(Action::Cache(
            CacheAction::new(CacheOp::SaveEntities { changeset })
                .optimistic(true)
                .with_correlation_id(CorrelationId::new()),
        ))
        .await
        .unwrap();

    let Action::Cache(outcome) = outcome else {
        panic!("expected a cache outcome");
    };
    assert!(matches!(outcome.op, CacheOp::SaveEntitiesSuccess { .. }));

    let cache = store.snapshot();
    let heroes = cache.collection("Hero").unwrap();
    assert!(!heroes.loading());
    assert!(!heroes.has_changes());
    assert!(heroes.contains(&EntityKey::from(1)));
    let villains = cache.collection("Villain").unwrap();
    assert!(!villains.loading());
    assert!(villains.contains(&EntityKey::from(9)));
}

#[tokio::test]
async fn changeset_cancel_clears_loading_and_leaves_optimistic_state() {
    let (mut registry, _service) = support::hero_services(vec![]);
    registry.register_cache_service(Arc::new(
        InMemoryCacheDataService::new().with_latency(Duration::from_millis(200)),
    ));
    let orchestrator = Arc::new(PersistenceOrchestrator::new(registry, Arc::new(AlwaysOnline)));
    let store = Arc::new(CacheStore::new(&support::definitions(), orchestrator));

    let id = CorrelationId::new();
    let changeset = ChangeSetBuilder::new().add("Hero", vec![hero(1, "A")]).build();
    let command = CacheAction::new(CacheOp::SaveEntities { changeset })
        .optimistic(true)
        .with_correlation_id(id.clone());

    let in_flight = tokio::spawn({
        let store = store.clone();
        async move { store.execute(Action::Cache(command)).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(store.snapshot().collection("Hero").unwrap().loading());

    store
        .execute(Action::Cache(CacheAction::new(CacheOp::SaveEntitiesCancel {
            entity_names: vec!["Hero".to_string()],
            reason: Some("navigated away".to_string()),
        })
        .with_correlation_id(id)))
        .await
        .unwrap();

    let outcome = in_flight.await.unwrap().unwrap();
    let Action::Cache(outcome) = outcome else {
        panic!("expected a cache outcome");
    };
    assert!(matches!(outcome.op, CacheOp::SaveEntitiesCanceled { .. }));

    let heroes = store.snapshot().collection("Hero").unwrap().clone();
    // Loading cleared; the optimistic add is deliberately left in place.
    assert!(!heroes.loading());
    assert!(heroes.contains(&EntityKey::from(1)));
    assert_eq!(
        heroes.change_for(&EntityKey::from(1)).unwrap().change_type,
        ChangeType::Added
    );
}

#[tokio::test]
async fn save_error_outcome_clears_loading_but_not_the_edit() {
    let (store, service) = store_with(vec![hero(1, "A")]);
    store
        .execute(Action::Entity(EntityAction::new("Hero", EntityOp::QueryLoad)))
        .await
        .unwrap();
    service.fail_with(entity_cache::DataServiceError::local("boom"));

    let outcome = store
        .execute(Action::Entity(
            EntityAction::new(
                "Hero",
                EntityOp::SaveUpdateOne { update: EntityUpdate::new(1, json!({ "name": "A2" })) },
            )
            .optimistic(true),
        ))
        .await
        .unwrap();

    let Action::Entity(outcome) = outcome else {
        panic!("expected an entity outcome");
    };
    assert!(matches!(outcome.op, EntityOp::SaveUpdateOneError { .. }));

    let heroes = store.snapshot().collection("Hero").unwrap().clone();
    assert!(!heroes.loading());
    // The optimistic edit and its tracking survive; undo is the caller's
    // compensation tool.
    assert_eq!(heroes.get(&EntityKey::from(1)), Some(&hero(1, "A2")));
    assert!(heroes.has_changes());
}

#[tokio::test]
async fn rehydration_round_trips_through_serde() {
    let (store, _) = store_with(vec![]);
    store
        .dispatch(&Action::Entity(EntityAction::new(
            "Hero",
            EntityOp::AddAll { entities: vec![hero(1, "A"), hero(2, "B")] },
        )))
        .unwrap();
    store
        .dispatch(&Action::Entity(EntityAction::new(
            "Hero",
            EntityOp::UpdateOne { update: EntityUpdate::new(1, json!({ "name": "edited" })) },
        )))
        .unwrap();
    let persisted = serde_json::to_string(&store.snapshot()).unwrap();

    let rehydrated: EntityCache = serde_json::from_str(&persisted).unwrap();
    let (fresh, _) = store_with(vec![]);
    fresh
        .dispatch(&Action::Cache(CacheAction::new(CacheOp::SetEntityCache {
            cache: rehydrated,
        })))
        .unwrap();

    assert_eq!(fresh.snapshot(), store.snapshot());
    // Pending changes survive rehydration and can still be undone.
    fresh
        .dispatch(&Action::Entity(EntityAction::new(
            "Hero",
            EntityOp::UndoOne { key: EntityKey::from(1) },
        )))
        .unwrap();
    assert_eq!(
        fresh.snapshot().collection("Hero").unwrap().get(&EntityKey::from(1)),
        Some(&hero(1, "A"))
    );
}

#[tokio::test]
async fn cache_only_store_stops_after_the_local_transition() {
    let store = CacheStore::cache_only(&support::definitions());
    let outcome = store
        .execute(Action::Entity(EntityAction::new("Hero", EntityOp::QueryAll)))
        .await
        .unwrap();
    let Action::Entity(outcome) = outcome else {
        panic!("expected an entity outcome");
    };
    // No orchestrator: the start action is returned as-is and the
    // collection simply shows loading.
    assert_eq!(outcome.op, EntityOp::QueryAll);
    assert!(store.snapshot().collection("Hero").unwrap().loading());
}
