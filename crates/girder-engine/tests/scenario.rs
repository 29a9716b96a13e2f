//! End-to-end building scenario run against every storage backend

use girder_core::{
    Direction, Entity, EntityFilter, ErrorKind, NewEntity, NewRelationship, PathQuery,
    RelationshipFilter,
};
use girder_engine::{
    DeviceStatus, EngineConfig, GraphEngine, ImpactReason, MetricSnapshot, PropertyMetrics,
    StaticMetrics,
};
use girder_storage::{MemoryStorage, RedbStorage, SqliteStorage, StorageBackend};
use std::sync::Arc;
use tempfile::TempDir;

struct Building {
    b1: Entity,
    f1: Entity,
    r1: Entity,
    d1: Entity,
    d2: Entity,
}

async fn add(engine: &GraphEngine, new: NewEntity) -> Entity {
    engine.entities().create_entity(new).await.unwrap()
}

async fn contains(engine: &GraphEngine, parent: &Entity, child: &Entity) {
    engine
        .relationships()
        .create_relationship(NewRelationship::contains(parent.id, child.id))
        .await
        .unwrap();
}

async fn build(engine: &GraphEngine) -> Building {
    let b1 = add(engine, NewEntity::new("building", "b1")).await;
    let f1 = add(engine, NewEntity::new("floor", "f1")).await;
    let r1 = add(engine, NewEntity::new("room", "r1")).await;
    let d1 = add(
        engine,
        NewEntity::new("device", "d1")
            .with_device_uuid("uuid-d1")
            .with_metadata("status", "online"),
    )
    .await;
    let d2 = add(engine, NewEntity::new("device", "d2").with_device_uuid("uuid-d2")).await;

    contains(engine, &b1, &f1).await;
    contains(engine, &f1, &r1).await;
    contains(engine, &r1, &d1).await;
    contains(engine, &r1, &d2).await;

    Building { b1, f1, r1, d1, d2 }
}

fn backends() -> Vec<(&'static str, Arc<dyn StorageBackend>, Option<TempDir>)> {
    let redb_dir = tempfile::tempdir().unwrap();
    let redb = RedbStorage::open(redb_dir.path().join("graph.redb")).unwrap();
    let sqlite_dir = tempfile::tempdir().unwrap();
    let sqlite = SqliteStorage::open(sqlite_dir.path().join("graph.db")).unwrap();

    vec![
        ("memory", Arc::new(MemoryStorage::new()), None),
        ("redb", Arc::new(redb), Some(redb_dir)),
        ("sqlite", Arc::new(sqlite), Some(sqlite_dir)),
    ]
}

#[tokio::test]
async fn building_scenario_on_every_backend() {
    for (name, storage, _dir) in backends() {
        let engine = GraphEngine::new(storage, EngineConfig::default());
        let b = build(&engine).await;

        let descendants = engine.traversal().get_descendants(&b.b1.id, 10).await.unwrap();
        let depths: Vec<(&str, u32)> = descendants
            .iter()
            .map(|d| (d.entity.name.as_str(), d.depth))
            .collect();
        assert_eq!(
            depths,
            vec![("f1", 1), ("r1", 2), ("d1", 3), ("d2", 3)],
            "{name}"
        );

        let ancestors = engine.traversal().get_ancestors(&b.d1.id, 10).await.unwrap();
        let chain: Vec<_> = ancestors.iter().map(|a| a.entity.id).collect();
        assert_eq!(chain, vec![b.r1.id, b.f1.id, b.b1.id], "{name}");

        let status = engine.analytics().get_building_status(&b.b1.id).await.unwrap();
        assert_eq!(status.floors.len(), 1, "{name}");
        let floor = &status.floors[0];
        assert_eq!(floor.floor.id, b.f1.id);
        assert_eq!(floor.rooms.len(), 1);
        assert_eq!(floor.rooms[0].room.id, b.r1.id);
        let devices: Vec<_> = floor.rooms[0].devices.iter().map(|d| d.device.id).collect();
        assert_eq!(devices, vec![b.d1.id, b.d2.id], "{name}");
        assert_eq!(floor.rooms[0].devices[0].status, DeviceStatus::Online);
        assert_eq!(status.summary.total, 2);
        assert_eq!(status.summary.online, 1);
        assert_eq!(status.summary.unknown, 1);

        let correlated = engine
            .analytics()
            .find_correlated_devices("uuid-d1")
            .await
            .unwrap();
        let correlated: Vec<_> = correlated.iter().map(|e| e.id).collect();
        assert_eq!(correlated, vec![b.d2.id], "{name}");

        let impact = engine.analytics().analyze_impact(&b.r1.id).await.unwrap();
        assert!(impact.contains(&b.d1.id) && impact.contains(&b.d2.id), "{name}");
        assert!(impact
            .impacted
            .iter()
            .all(|i| i.reason == ImpactReason::Contained));

        let locations = engine.analytics().get_device_locations().await.unwrap();
        let d1 = locations.iter().find(|l| l.device.id == b.d1.id).unwrap();
        assert_eq!(d1.display_path(), "b1 / f1 / r1", "{name}");

        let tree = engine
            .traversal()
            .build_hierarchy_tree(&b.b1.id, 10)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tree.size(), 5);
        assert_eq!(tree.height(), 3);
    }
}

#[tokio::test]
async fn children_report_their_parent() {
    for (name, storage, _dir) in backends() {
        let engine = GraphEngine::new(storage, EngineConfig::default());
        let b = build(&engine).await;

        for parent in [&b.b1, &b.f1, &b.r1] {
            for child in engine.traversal().get_children(&parent.id).await.unwrap() {
                let found = engine.traversal().get_parent(&child.id).await.unwrap();
                assert_eq!(found.map(|p| p.id), Some(parent.id), "{name}");
            }
        }
    }
}

#[tokio::test]
async fn deeper_walks_only_add_entities() {
    let engine = GraphEngine::new(Arc::new(MemoryStorage::new()), EngineConfig::default());
    let b = build(&engine).await;

    assert!(engine
        .traversal()
        .get_descendants(&b.b1.id, 0)
        .await
        .unwrap()
        .is_empty());

    let mut previous: Vec<_> = Vec::new();
    for depth in 1..=4 {
        let current: Vec<_> = engine
            .traversal()
            .get_descendants(&b.b1.id, depth)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.entity.id)
            .collect();
        assert!(previous.iter().all(|id| current.contains(id)));
        previous = current;
    }
    assert_eq!(previous.len(), 4);
}

#[tokio::test]
async fn containment_cycles_terminate() {
    for (name, storage, _dir) in backends() {
        let engine = GraphEngine::new(storage, EngineConfig::default());
        let a = add(&engine, NewEntity::new("zone", "A")).await;
        let b = add(&engine, NewEntity::new("zone", "B")).await;
        contains(&engine, &a, &b).await;
        contains(&engine, &b, &a).await;

        let found = engine.traversal().get_descendants(&a.id, 10).await.unwrap();
        assert_eq!(found.len(), 1, "{name}");
        assert_eq!(found[0].entity.id, b.id);

        let up = engine.traversal().get_ancestors(&a.id, 10).await.unwrap();
        assert_eq!(up.len(), 1, "{name}");

        let path = engine
            .traversal()
            .find_path(&PathQuery::new(a.id, a.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.entity_ids(), vec![a.id]);
    }
}

#[tokio::test]
async fn deleting_an_entity_removes_its_edges() {
    for (name, storage, _dir) in backends() {
        let engine = GraphEngine::new(storage, EngineConfig::default());
        let b = build(&engine).await;
        engine
            .entities()
            .set_property(&b.r1.id, "area", 42i64)
            .await
            .unwrap();

        assert!(engine.entities().delete_entity(&b.r1.id).await.unwrap());

        let touching = engine
            .relationships()
            .list_relationships(&RelationshipFilter::for_entity(b.r1.id, Direction::Both))
            .await
            .unwrap();
        assert!(touching.is_empty(), "{name}");

        let all = engine
            .relationships()
            .list_relationships(&RelationshipFilter::all())
            .await
            .unwrap();
        assert_eq!(all.len(), 1, "{name}");
        assert!(engine.traversal().get_parent(&b.d1.id).await.unwrap().is_none());

        let orphans = engine.analytics().find_orphaned_entities().await.unwrap();
        assert_eq!(orphans.len(), 2, "{name}");
    }
}

#[tokio::test]
async fn duplicate_triples_conflict() {
    for (name, storage, _dir) in backends() {
        let engine = GraphEngine::new(storage, EngineConfig::default());
        let b = build(&engine).await;

        let err = engine
            .relationships()
            .create_relationship(NewRelationship::contains(b.b1.id, b.f1.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict, "{name}");

        let err = engine
            .relationships()
            .create_relationship(NewRelationship::contains(b.b1.id, girder_core::EntityId::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "{name}");
    }
}

#[tokio::test]
async fn depth_ceiling_caps_walks() {
    let storage = Arc::new(MemoryStorage::new());
    let engine = GraphEngine::new(storage, EngineConfig::default().with_max_depth(2));
    let b = build(&engine).await;

    let found = engine.traversal().get_descendants(&b.b1.id, 50).await.unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|d| d.depth <= 2));
}

#[tokio::test]
async fn metrics_from_static_and_property_sources() {
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let plain = GraphEngine::new(storage.clone(), EngineConfig::default());
    let b = build(&plain).await;

    let metrics = StaticMetrics::new()
        .with(b.d1.id, MetricSnapshot::new().with_value("temperature", 19.0))
        .with(
            b.d2.id,
            MetricSnapshot::new()
                .with_online(false)
                .with_value("temperature", 23.0),
        );
    let engine = plain.clone().with_metrics(Arc::new(metrics));

    let result = engine.analytics().get_aggregate_metrics(&b.f1.id).await.unwrap();
    assert_eq!(result.entity_count, 4);
    assert_eq!(result.metrics["temperature"].value, 21.0);
    assert_eq!(result.devices.online, 1);
    assert_eq!(result.devices.offline, 1);

    plain
        .entities()
        .set_property(&b.d2.id, "metric.power", 75.0)
        .await
        .unwrap();
    plain
        .entities()
        .set_property(&b.d2.id, "online", true)
        .await
        .unwrap();
    let engine = plain.with_metrics(Arc::new(PropertyMetrics::new(storage)));
    let result = engine.analytics().get_aggregate_metrics(&b.b1.id).await.unwrap();
    assert_eq!(result.metrics["power"].value, 75.0);
    assert_eq!(result.devices.online, 2);

    let err = engine
        .analytics()
        .get_aggregate_metrics(&girder_core::EntityId::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn listing_is_newest_first() {
    let engine = GraphEngine::new(Arc::new(MemoryStorage::new()), EngineConfig::default());
    let first = add(&engine, NewEntity::new("device", "first")).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = add(&engine, NewEntity::new("device", "second")).await;

    let listed = engine
        .entities()
        .list_entities(&EntityFilter::new())
        .await
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}
