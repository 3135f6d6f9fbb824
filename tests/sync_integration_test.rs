//! Integration tests for incremental sync runs
//!
//! These tests drive the coordinator against in-memory doubles and check:
//! - Watermarks advance to the run's window end, and only on success
//! - Reruns over an empty window leave no artifacts
//! - Local and remote delivery, including the upload fallback
//! - Failure policies and interruption

mod common;

use common::{ts, MemoryBlobStore, MemorySource, MemoryTable, Workspace};
use std::sync::Arc;
use std::time::Duration;
use tidemark::config::FailurePolicy;
use tidemark::core::sink::Destination;
use tidemark::core::state::store::temp_path;
use tidemark::core::state::WatermarkStore;
use tidemark::core::sync::{RunOutcome, SetupFailureKind, SyncCoordinator};
use tokio::sync::watch;

fn orders_table() -> MemoryTable {
    MemoryTable::new(&["id", "status", "updated_at"])
        .row(
            "2025-01-05T08:00:00",
            &[Some("1"), Some("shipped"), Some("2025-01-05 08:00:00")],
        )
        .row(
            "2025-01-12T09:30:00",
            &[Some("2"), Some("new"), Some("2025-01-12 09:30:00")],
        )
}

async fn coordinator(
    ws: &Workspace,
    source: Arc<MemorySource>,
    destination: Destination,
    policy: FailurePolicy,
) -> (SyncCoordinator, Arc<WatermarkStore>, watch::Sender<bool>) {
    let state = Arc::new(WatermarkStore::load(&ws.state_file, None).await.unwrap());
    let (tx, rx) = watch::channel(false);
    let coordinator = SyncCoordinator::new(
        &ws.sync_config(policy),
        source,
        Arc::clone(&state),
        destination,
        rx,
    );
    (coordinator, state, tx)
}

#[tokio::test]
async fn test_watermark_advances_to_window_end() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"2025-01-01T00:00:00","active":true}]"#);
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", orders_table());

    let (coordinator, state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let run = coordinator
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    assert_eq!(run.outcome(), RunOutcome::Success);
    assert_eq!(run.entities.len(), 1);
    assert!(run.entities[0].success);
    assert_eq!(run.entities[0].row_count, 1);

    let calls = source.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.start, ts("2025-01-01T00:00:00"));
    assert_eq!(calls[0].1.end, ts("2025-01-10T00:00:00"));

    let watermark = state.find("orders").await.unwrap();
    assert_eq!(watermark.last_sync_time, Some(ts("2025-01-10T00:00:00")));
    assert_eq!(
        ws.read_state(),
        "[\n  {\n    \"entity\": \"orders\",\n    \"lastRunTime\": \"2025-01-10T00:00:00\",\n    \"active\": true\n  }\n]"
    );

    let csv = std::fs::read_to_string(ws.export_file("orders__2025-01-01T00-00-00.csv")).unwrap();
    assert_eq!(csv, "id,status,updated_at\n1,shipped,2025-01-05 08:00:00\n");
}

#[tokio::test]
async fn test_rerun_with_same_end_writes_nothing() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"2025-01-01T00:00:00","active":true}]"#);
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", orders_table());

    let (coordinator, state, _tx) = coordinator(
        &ws,
        source,
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let end = ts("2025-01-10T00:00:00");
    coordinator.execute_sync_at(end).await.unwrap();
    let before = ws.export_files();

    let rerun = coordinator.execute_sync_at(end).await.unwrap();

    assert!(rerun.is_successful());
    assert_eq!(rerun.entities[0].row_count, 0);
    assert!(rerun.entities[0].output_location.is_none());
    assert_eq!(ws.export_files(), before);
    assert_eq!(
        state.find("orders").await.unwrap().last_sync_time,
        Some(end)
    );
}

#[tokio::test]
async fn test_consecutive_runs_cover_adjacent_windows() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"2025-01-01T00:00:00","active":true}]"#);
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", orders_table());

    let (coordinator, state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    coordinator
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();
    let second = coordinator
        .execute_sync_at(ts("2025-01-15T00:00:00"))
        .await
        .unwrap();

    assert_eq!(second.entities[0].row_count, 1);
    let calls = source.calls();
    assert_eq!(calls[1].1.start, ts("2025-01-10T00:00:00"));
    assert_eq!(calls[1].1.end, ts("2025-01-15T00:00:00"));

    assert_eq!(
        ws.export_files(),
        vec![
            "orders__2025-01-01T00-00-00.csv",
            "orders__2025-01-10T00-00-00.csv"
        ]
    );
    let csv = std::fs::read_to_string(ws.export_file("orders__2025-01-10T00-00-00.csv")).unwrap();
    assert_eq!(csv, "id,status,updated_at\n2,new,2025-01-12 09:30:00\n");
    assert_eq!(
        state.find("orders").await.unwrap().last_sync_time,
        Some(ts("2025-01-15T00:00:00"))
    );
}

#[tokio::test]
async fn test_inactive_entity_is_untouched() {
    let ws = Workspace::new();
    ws.write_state(
        r#"[
  {"entity":"legacy","lastRunTime":"2024-06-01T00:00:00","active":false},
  {"entity":"orders","lastRunTime":"","active":true}
]"#,
    );
    // No template for the inactive entity
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", orders_table());

    let (coordinator, state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let run = coordinator
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    assert_eq!(run.total, 1);
    assert!(source.calls().iter().all(|(table, _)| table != "legacy"));
    let legacy = state.find("legacy").await.unwrap();
    assert_eq!(legacy.last_sync_time, Some(ts("2024-06-01T00:00:00")));
    assert!(!legacy.active);
}

#[tokio::test]
async fn test_never_synced_entity_uses_lookback() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"","active":true}]"#);
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", MemoryTable::new(&["id"]));

    let (coordinator, _state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    coordinator
        .execute_sync_at(ts("2025-03-01T00:00:00"))
        .await
        .unwrap();

    assert_eq!(source.calls()[0].1.start, ts("2025-01-30T00:00:00"));
}

#[tokio::test]
async fn test_days_back_override() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"","active":true}]"#);
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", MemoryTable::new(&["id"]));

    let (coordinator, _state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    coordinator
        .with_lookback_days(7)
        .execute_sync_at(ts("2025-03-01T00:00:00"))
        .await
        .unwrap();

    assert_eq!(source.calls()[0].1.start, ts("2025-02-22T00:00:00"));
}

#[tokio::test]
async fn test_remote_delivery_uploads_and_removes_staging() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"2025-01-01T00:00:00","active":true}]"#);
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", orders_table());
    let store = MemoryBlobStore::new();

    let (coordinator, _state, _tx) = coordinator(
        &ws,
        source,
        Destination::remote(&ws.export_dir, "crm/", store.clone()),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let run = coordinator
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    let key = "crm/orders/orders__2025-01-01T00-00-00.csv";
    assert_eq!(
        run.entities[0].output_location.as_deref(),
        Some("mem://bucket/crm/orders/orders__2025-01-01T00-00-00.csv")
    );
    assert_eq!(
        store.get(key).unwrap(),
        b"id,status,updated_at\n1,shipped,2025-01-05 08:00:00\n"
    );
    assert!(ws.export_files().is_empty());
}

#[tokio::test]
async fn test_failed_upload_keeps_local_copy_and_commits() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"2025-01-01T00:00:00","active":true}]"#);
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", orders_table());
    let store = MemoryBlobStore::new();
    store.fail_file_uploads(true);

    let (coordinator, state, _tx) = coordinator(
        &ws,
        source,
        Destination::remote(&ws.export_dir, "crm/", store.clone()),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let run = coordinator
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    let result = &run.entities[0];
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("access denied"));

    let staging = ws.export_file("orders__2025-01-01T00-00-00.csv");
    assert!(staging.exists());
    assert_eq!(
        result.output_location.as_deref(),
        Some(staging.display().to_string().as_str())
    );
    assert!(store.keys().is_empty());
    assert_eq!(
        state.find("orders").await.unwrap().last_sync_time,
        Some(ts("2025-01-10T00:00:00"))
    );
}

#[tokio::test]
async fn test_zero_rows_leave_no_local_or_remote_artifact() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"2025-02-01T00:00:00","active":true}]"#);
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", orders_table());
    let store = MemoryBlobStore::new();

    let (coordinator, state, _tx) = coordinator(
        &ws,
        source,
        Destination::remote(&ws.export_dir, "", store.clone()),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let run = coordinator
        .execute_sync_at(ts("2025-02-10T00:00:00"))
        .await
        .unwrap();

    assert!(run.entities[0].success);
    assert_eq!(run.entities[0].row_count, 0);
    assert!(ws.export_files().is_empty());
    assert!(store.keys().is_empty());
    assert_eq!(
        state.find("orders").await.unwrap().last_sync_time,
        Some(ts("2025-02-10T00:00:00"))
    );
}

fn two_entity_workspace() -> (Workspace, Arc<MemorySource>) {
    let ws = Workspace::new();
    ws.write_state(
        r#"[
  {"entity":"accounts","lastRunTime":"2025-01-01T00:00:00","active":true},
  {"entity":"orders","lastRunTime":"2025-01-01T00:00:00","active":true}
]"#,
    );
    ws.write_template("accounts");
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("accounts", MemoryTable::new(&["id"]));
    source.add_table("orders", orders_table());
    source.fail_query("accounts");
    (ws, source)
}

#[tokio::test]
async fn test_stop_on_first_failure_skips_remaining() {
    let (ws, source) = two_entity_workspace();
    let (coordinator, state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let run = coordinator
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    assert_eq!(run.outcome(), RunOutcome::PartialFailure);
    assert_eq!(run.processed, 1);
    assert_eq!(run.failed, 1);
    assert_eq!(run.skipped, 1);
    assert!(run.entities[0].error.as_deref().unwrap().contains("broken"));
    assert_eq!(source.calls().len(), 1);

    for name in ["accounts", "orders"] {
        assert_eq!(
            state.find(name).await.unwrap().last_sync_time,
            Some(ts("2025-01-01T00:00:00"))
        );
    }
    assert!(ws.export_files().is_empty());
}

#[tokio::test]
async fn test_continue_and_report_all_runs_every_entity() {
    let (ws, source) = two_entity_workspace();
    let (coordinator, state, _tx) = coordinator(
        &ws,
        source,
        Destination::local(&ws.export_dir),
        FailurePolicy::ContinueAndReportAll,
    )
    .await;

    let run = coordinator
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    assert_eq!(run.outcome(), RunOutcome::PartialFailure);
    assert_eq!(run.processed, 2);
    assert_eq!(run.success, 1);
    assert_eq!(run.failed, 1);
    assert_eq!(run.skipped, 0);

    assert_eq!(
        state.find("accounts").await.unwrap().last_sync_time,
        Some(ts("2025-01-01T00:00:00"))
    );
    assert_eq!(
        state.find("orders").await.unwrap().last_sync_time,
        Some(ts("2025-01-10T00:00:00"))
    );
}

#[tokio::test]
async fn test_missing_template_fails_entity() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"","active":true}]"#);
    let source = MemorySource::new();

    let (coordinator, state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let run = coordinator
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    assert!(!run.entities[0].success);
    assert!(run.entities[0]
        .error
        .as_deref()
        .unwrap()
        .contains("Template error"));
    assert!(source.calls().is_empty());
    assert!(state.find("orders").await.unwrap().last_sync_time.is_none());
}

#[tokio::test]
async fn test_iteration_failure_discards_partial_output() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"2025-01-01T00:00:00","active":true}]"#);
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", orders_table());
    source.fail_after("orders", 1);

    let (coordinator, state, _tx) = coordinator(
        &ws,
        source,
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let run = coordinator
        .execute_sync_at(ts("2025-01-20T00:00:00"))
        .await
        .unwrap();

    let result = &run.entities[0];
    assert!(!result.success);
    assert_eq!(result.row_count, 1);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("Row iteration failed"));
    assert!(ws.export_files().is_empty());
    assert_eq!(
        state.find("orders").await.unwrap().last_sync_time,
        Some(ts("2025-01-01T00:00:00"))
    );
}

#[tokio::test]
async fn test_shutdown_interrupts_run_without_commit() {
    let ws = Workspace::new();
    ws.write_state(
        r#"[
  {"entity":"accounts","lastRunTime":"2025-01-01T00:00:00","active":true},
  {"entity":"orders","lastRunTime":"2025-01-01T00:00:00","active":true}
]"#,
    );
    ws.write_template("accounts");
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("accounts", orders_table());
    source.add_table("orders", orders_table());
    source.hang_after("accounts", 1);

    let (coordinator, state, tx) = coordinator(
        &ws,
        source,
        Destination::local(&ws.export_dir),
        FailurePolicy::ContinueAndReportAll,
    )
    .await;

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    });

    let run = coordinator
        .execute_sync_at(ts("2025-01-20T00:00:00"))
        .await
        .unwrap();

    assert!(run.interrupted);
    assert_eq!(run.outcome(), RunOutcome::PartialFailure);
    assert!(run.setup_failure.is_none());
    assert_eq!(run.processed, 1);
    assert_eq!(run.skipped, 1);
    assert!(run.entities[0]
        .error
        .as_deref()
        .unwrap()
        .contains("Cancelled"));
    assert!(ws.export_files().is_empty());
    for name in ["accounts", "orders"] {
        assert_eq!(
            state.find(name).await.unwrap().last_sync_time,
            Some(ts("2025-01-01T00:00:00"))
        );
    }
}

#[tokio::test]
async fn test_run_deadline_times_out() {
    let ws = Workspace::new();
    ws.write_state(r#"[{"entity":"orders","lastRunTime":"2025-01-01T00:00:00","active":true}]"#);
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("orders", orders_table());
    source.hang_after("orders", 0);

    let (coordinator, state, _tx) = coordinator(
        &ws,
        source,
        Destination::local(&ws.export_dir),
        FailurePolicy::ContinueAndReportAll,
    )
    .await;

    let run = coordinator
        .with_run_timeout(Duration::from_millis(50))
        .execute_sync_at(ts("2025-01-20T00:00:00"))
        .await
        .unwrap();

    assert!(run.interrupted);
    assert!(run.entities[0]
        .error
        .as_deref()
        .unwrap()
        .contains("Timed out"));
    assert!(ws.export_files().is_empty());
    assert_eq!(
        state.find("orders").await.unwrap().last_sync_time,
        Some(ts("2025-01-01T00:00:00"))
    );
}

#[tokio::test]
async fn test_entity_filter() {
    let (ws, source) = two_entity_workspace();
    let (coordinator, _state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let run = coordinator
        .with_entities(vec!["orders".to_string()])
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    assert_eq!(run.total, 1);
    assert!(run.is_successful());
    assert_eq!(source.calls().len(), 1);
    assert_eq!(source.calls()[0].0, "orders");
}

#[tokio::test]
async fn test_entity_filter_rejects_unknown_names() {
    let (ws, source) = two_entity_workspace();
    let (coordinator, _state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    let run = coordinator
        .with_entities(vec!["orders".to_string(), "invoices".to_string()])
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    assert_eq!(run.outcome(), RunOutcome::Fatal);
    let failure = run.setup_failure.as_ref().unwrap();
    assert_eq!(failure.kind, SetupFailureKind::Configuration);
    assert!(failure.message.contains("invoices"));
    assert!(run.entities.is_empty());
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn test_unreachable_source_fails_run_before_any_entity() {
    let (ws, source) = two_entity_workspace();
    source.set_unreachable();
    let (coordinator, state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::ContinueAndReportAll,
    )
    .await;

    let run = coordinator
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    assert_eq!(run.outcome(), RunOutcome::Fatal);
    assert!(!run.is_successful());
    let failure = run.setup_failure.as_ref().unwrap();
    assert_eq!(failure.kind, SetupFailureKind::Connectivity);
    assert!(failure.message.contains("connection refused"));
    assert_eq!(run.total, 2);
    assert_eq!(run.processed, 0);
    assert!(source.calls().is_empty());
    assert_eq!(
        state.find("orders").await.unwrap().last_sync_time,
        Some(ts("2025-01-01T00:00:00"))
    );
}

#[tokio::test]
async fn test_commit_failure_reports_output_and_stops_run() {
    let ws = Workspace::new();
    let initial = r#"[
  {"entity":"accounts","lastRunTime":"2025-01-01T00:00:00","active":true},
  {"entity":"orders","lastRunTime":"2025-01-01T00:00:00","active":true}
]"#;
    ws.write_state(initial);
    ws.write_template("accounts");
    ws.write_template("orders");
    let source = MemorySource::new();
    source.add_table("accounts", orders_table());
    source.add_table("orders", orders_table());

    let (coordinator, state, _tx) = coordinator(
        &ws,
        Arc::clone(&source),
        Destination::local(&ws.export_dir),
        FailurePolicy::StopOnFirstFailure,
    )
    .await;

    // The state file cannot be replaced while a directory sits at its temp path
    std::fs::create_dir(temp_path(&ws.state_file)).unwrap();

    let run = coordinator
        .execute_sync_at(ts("2025-01-10T00:00:00"))
        .await
        .unwrap();

    assert_eq!(run.outcome(), RunOutcome::PartialFailure);
    assert_eq!(run.processed, 1);
    assert_eq!(run.failed, 1);
    assert_eq!(run.skipped, 1);
    assert_eq!(source.calls().len(), 1);

    let result = &run.entities[0];
    assert_eq!(result.entity, "accounts");
    assert!(!result.success);
    assert_eq!(result.row_count, 1);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("commit watermark"));

    let output = ws.export_file("accounts__2025-01-01T00-00-00.csv");
    assert!(output.exists());
    assert_eq!(
        result.output_location.as_deref(),
        Some(output.display().to_string().as_str())
    );

    assert_eq!(ws.read_state(), initial);
    assert_eq!(
        state.find("accounts").await.unwrap().last_sync_time,
        Some(ts("2025-01-01T00:00:00"))
    );
}
