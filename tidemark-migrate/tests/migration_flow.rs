//! End-to-end migration flows against the in-memory tenant.

use std::time::Duration;

use pretty_assertions::assert_eq;

use tidemark_migrate::{
    CancellationToken, Direction, ExecutionOutcome, InMemoryRevisionStore, InMemoryTenant,
    MigrationConfig, MigrationEngine, MigrationError, MigrationExecutor, RemoteError,
    RemoteStateReader, RetryPolicy, Revision, RevisionTimeline, SnapshotDiffer, TargetDescriptor,
    TenantClient, TenantPointer,
};
use tidemark_schema::{
    DropdownDefinition, FieldDefinition, FieldValueType, ModelRegistry, SchemaDefinition,
    SchemaKind, Snapshot,
};

fn dough_registry() -> ModelRegistry {
    ModelRegistry::new().with_schema(SchemaDefinition::new(
        "dough",
        "Dough",
        "DGH",
        SchemaKind::Entity,
    ))
}

fn bakery_v1() -> ModelRegistry {
    ModelRegistry::new()
        .with_dropdown(DropdownDefinition::new("Flours", ["Bread", "Rye"]))
        .with_schema(
            SchemaDefinition::new("dough", "Dough", "DGH", SchemaKind::Entity)
                .with_field(FieldDefinition::new("name", "Name", FieldValueType::Text))
                .with_field(
                    FieldDefinition::new("flour", "Flour", FieldValueType::Dropdown)
                        .dropdown("Flours"),
                )
                .with_field(
                    FieldDefinition::new("hydration", "Hydration", FieldValueType::Decimal)
                        .unit("percent"),
                ),
        )
        .with_schema(
            SchemaDefinition::new("starter", "Starter", "STR", SchemaKind::Entity)
                .with_field(FieldDefinition::new("name", "Name", FieldValueType::Text)),
        )
}

fn bakery_v2() -> ModelRegistry {
    let mut dough = SchemaDefinition::new("dough", "Dough", "DOU", SchemaKind::Entity);
    dough.add_field(
        FieldDefinition::new("flour", "Flour", FieldValueType::Dropdown).dropdown("Flours"),
    );
    dough.add_field(FieldDefinition::new("name", "Name", FieldValueType::Text).required(true));
    dough.add_field(
        FieldDefinition::new("hydration", "Hydration", FieldValueType::Decimal).unit("percent"),
    );
    dough.add_field(
        FieldDefinition::new("proof_time", "Proof Time", FieldValueType::Integer).unit("minutes"),
    );

    ModelRegistry::new()
        .with_dropdown(DropdownDefinition::new("Flours", ["Bread", "Rye", "Spelt"]))
        .with_schema(dough)
}

fn engine(tenant: InMemoryTenant) -> MigrationEngine<InMemoryTenant, InMemoryRevisionStore> {
    let config = MigrationConfig::new().retry(
        RetryPolicy::new()
            .max_retries(2)
            .initial_delay(Duration::from_millis(1)),
    );
    MigrationEngine::new(config, tenant, InMemoryRevisionStore::new())
}

#[tokio::test]
async fn dough_scenario_full_cycle() {
    let engine = engine(InMemoryTenant::new());
    let root = engine.bootstrap().await.unwrap();
    assert_eq!(engine.client().pointer().unwrap().revision_id, root.id);

    // Local model declares {Dough}, remote has none: exactly one create.
    let revision = engine.plan(&dough_registry(), "add dough").await.unwrap();
    assert_eq!(revision.operation_count(), 1);
    assert_eq!(revision.forward[0].to_string(), "create schema 'dough' with 0 fields");

    let report = engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.final_pointer, revision.id);
    assert_eq!(engine.client().pointer().unwrap().revision_id, revision.id);
    assert!(engine.client().snapshot().get_schema("dough").is_some());

    let report = engine
        .run(&TargetDescriptor::Root, Direction::Downgrade)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.final_pointer, root.id);

    // The reader reports zero schemas again; the platform merely archived it.
    let surface = RemoteStateReader::new(engine.client()).snapshot().await.unwrap();
    assert_eq!(surface.schemas.len(), 0);
    let retained = RemoteStateReader::new(engine.client())
        .include_archived(true)
        .snapshot()
        .await
        .unwrap();
    assert!(retained.get_schema("dough").unwrap().archived);
}

#[tokio::test]
async fn planning_an_empty_diff_is_rejected() {
    let engine = engine(InMemoryTenant::new());
    engine.bootstrap().await.unwrap();
    engine.plan(&dough_registry(), "add dough").await.unwrap();
    engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();

    let err = engine.plan(&dough_registry(), "no-op").await.unwrap_err();
    assert!(matches!(err, MigrationError::NothingToRevise));
}

#[tokio::test]
async fn plan_is_deterministic() {
    let local = bakery_v1().snapshot().unwrap();
    let remote = Snapshot::new();
    let first = SnapshotDiffer::new(&remote, &local).diff().unwrap();
    let second = SnapshotDiffer::new(&remote, &local).diff().unwrap();
    assert_eq!(first.operations, second.operations);
}

#[tokio::test]
async fn round_trip_restores_previous_state() {
    let engine = engine(InMemoryTenant::new());
    engine.bootstrap().await.unwrap();

    engine.plan(&bakery_v1(), "bakery v1").await.unwrap();
    engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();
    let v1_state = engine.client().snapshot();
    assert_eq!(v1_state, bakery_v1().snapshot().unwrap());

    engine.plan(&bakery_v2(), "bakery v2").await.unwrap();
    let report = engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();
    assert!(report.is_complete());

    let v2_state = engine.client().snapshot();
    assert_eq!(v2_state, bakery_v2().snapshot().unwrap());
    assert_eq!(
        v2_state.get_schema("dough").unwrap().field_order(),
        vec!["flour", "name", "hydration", "proof_time"]
    );
    // Starter was archived, not deleted.
    assert!(
        engine
            .client()
            .raw_snapshot()
            .get_schema("starter")
            .unwrap()
            .archived
    );

    // Walking one revision back restores v1 exactly, field order included.
    let report = engine
        .run(&TargetDescriptor::StepsBack(1), Direction::Downgrade)
        .await
        .unwrap();
    assert!(report.is_complete());

    let restored = engine.client().snapshot();
    assert_eq!(restored, v1_state);
    assert_eq!(
        restored.get_schema("dough").unwrap().field_order(),
        vec!["name", "flour", "hydration"]
    );
}

#[tokio::test]
async fn concurrent_executor_aborts_on_stale_pointer() {
    let tenant = InMemoryTenant::new();
    let root = Revision::root("environment bootstrap");
    tenant
        .write_pointer(&TenantPointer::at(root.id.clone()))
        .await
        .unwrap();

    let empty = Snapshot::new();
    let target = dough_registry().snapshot().unwrap();
    let diff = SnapshotDiffer::new(&empty, &target).diff().unwrap();
    let revision = Revision::new(root.id.clone(), "add dough", &diff.operations);

    let timeline = RevisionTimeline::from_revisions(vec![root, revision.clone()]).unwrap();
    let walk = timeline.walk(timeline.root().id.as_str(), &revision.id).unwrap();

    // Both operators resolved against the same pointer; the first wins.
    let report = MigrationExecutor::new(&tenant).execute(&walk).await.unwrap();
    assert!(report.is_complete());

    let err = MigrationExecutor::new(&tenant).execute(&walk).await.unwrap_err();
    match err {
        MigrationError::PointerDrift { expected, actual } => {
            assert_eq!(expected, walk.expected_start);
            assert_eq!(actual, revision.id);
        }
        other => panic!("unexpected error: {other}"),
    }
    // The losing operator mutated nothing: the schema exists exactly once.
    assert_eq!(tenant.snapshot().schemas.len(), 1);
}

#[tokio::test]
async fn partial_failure_reports_progress_and_holds_pointer() {
    let engine = engine(InMemoryTenant::new());
    engine.bootstrap().await.unwrap(); // mutation 1: pointer write

    let registry = ModelRegistry::new()
        .with_dropdown(DropdownDefinition::new("Flours", ["Rye"]))
        .with_schema(
            SchemaDefinition::new("dough", "Dough", "DGH", SchemaKind::Entity).with_field(
                FieldDefinition::new("flour", "Flour", FieldValueType::Dropdown).dropdown("Flours"),
            ),
        );
    let revision = engine.plan(&registry, "add bakery").await.unwrap();
    assert_eq!(revision.operation_count(), 2);

    // Mutation 2 is the dropdown create; 3 is the schema create.
    engine
        .client()
        .fail_on_call(3, RemoteError::validation("schema quota exceeded"));

    let report = engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();
    match &report.outcome {
        ExecutionOutcome::Failed {
            revision_id,
            operations_applied,
            failed_operation,
            error,
        } => {
            assert_eq!(revision_id, &revision.id);
            assert_eq!(*operations_applied, 1);
            assert!(
                failed_operation
                    .as_ref()
                    .unwrap()
                    .to_string()
                    .contains("create schema 'dough'")
            );
            assert!(!error.is_transient());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // Partial progress remains applied; the pointer never moved.
    assert!(report.applied.is_empty());
    assert!(engine.client().snapshot().get_dropdown("Flours").is_some());
    assert!(engine.client().snapshot().get_schema("dough").is_none());
    assert_eq!(
        engine.client().pointer().unwrap().revision_id,
        report.started_at
    );

    // A retry after the fault resumes from the same revision and completes.
    let report = engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();
    match &report.outcome {
        // The dropdown already exists; the platform rejects the duplicate.
        ExecutionOutcome::Failed { failed_operation, .. } => {
            assert!(
                failed_operation
                    .as_ref()
                    .unwrap()
                    .to_string()
                    .contains("create dropdown")
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn transient_failures_are_retried_with_backoff() {
    let engine = engine(InMemoryTenant::new());
    engine.bootstrap().await.unwrap(); // mutation 1

    engine.plan(&dough_registry(), "add dough").await.unwrap();

    // The schema create (mutation 2) fails twice transiently, then succeeds
    // within the two-retry budget.
    engine
        .client()
        .fail_on_call(2, RemoteError::rate_limited("throttled"));
    engine
        .client()
        .fail_on_call(3, RemoteError::rate_limited("throttled"));

    let report = engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert!(engine.client().snapshot().get_schema("dough").is_some());
}

#[tokio::test]
async fn transient_budget_exhaustion_aborts() {
    let engine = engine(InMemoryTenant::new());
    engine.bootstrap().await.unwrap();
    engine.plan(&dough_registry(), "add dough").await.unwrap();

    // Three transient failures exceed the two-retry budget.
    for call in 2..=4 {
        engine
            .client()
            .fail_on_call(call, RemoteError::rate_limited("throttled"));
    }

    let report = engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();
    match &report.outcome {
        ExecutionOutcome::Failed { error, .. } => assert!(error.is_transient()),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_stops_between_operations() {
    let engine = engine(InMemoryTenant::new());
    let root = engine.bootstrap().await.unwrap();
    engine.plan(&dough_registry(), "add dough").await.unwrap();

    let token: CancellationToken = engine.cancellation_token();
    token.cancel();

    let report = engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();
    assert!(matches!(report.outcome, ExecutionOutcome::Cancelled { .. }));
    assert_eq!(report.final_pointer, root.id);
    assert!(engine.client().snapshot().get_schema("dough").is_none());
}

#[tokio::test]
async fn direction_mismatch_is_rejected() {
    let engine = engine(InMemoryTenant::new());
    engine.bootstrap().await.unwrap();
    engine.plan(&dough_registry(), "add dough").await.unwrap();

    let err = engine
        .run(&TargetDescriptor::Head, Direction::Downgrade)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::DirectionMismatch { .. }));
}

#[tokio::test]
async fn running_to_the_current_position_is_rejected() {
    let engine = engine(InMemoryTenant::new());
    engine.bootstrap().await.unwrap();

    let err = engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::NothingToApply(_)));
}

#[tokio::test]
async fn status_tracks_pending_revisions() {
    let engine = engine(InMemoryTenant::new());
    engine.bootstrap().await.unwrap();

    let status = engine.status().await.unwrap();
    assert!(status.is_current());

    let revision = engine.plan(&dough_registry(), "add dough").await.unwrap();
    let status = engine.status().await.unwrap();
    assert!(!status.is_current());
    assert_eq!(status.pending, vec![revision.id.clone()]);

    engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();
    let status = engine.status().await.unwrap();
    assert!(status.is_current());
    assert_eq!(status.current, revision.id);
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let engine = MigrationEngine::new(
        MigrationConfig::new().dry_run(true),
        InMemoryTenant::new(),
        InMemoryRevisionStore::new(),
    );
    let root = engine.bootstrap().await.unwrap();
    engine.plan(&dough_registry(), "add dough").await.unwrap();

    let report = engine
        .run(&TargetDescriptor::Head, Direction::Upgrade)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert!(report.applied.is_empty());
    assert!(engine.client().snapshot().get_schema("dough").is_none());
    assert_eq!(engine.client().pointer().unwrap().revision_id, root.id);
}
