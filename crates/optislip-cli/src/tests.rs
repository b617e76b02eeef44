use std::path::PathBuf;

use clap::Parser;
use optislip_core::models::QueueStats;
use optislip_core::sync::DispatchSummary;
use optislip_core::{SyncRequest, SyncStatus};
use serde_json::json;

use crate::cli::{Cli, Commands, OwnerArgs, QueueCommands, StatusFilter};
use crate::commands::account::{create_owner, create_sub_user, load_account};
use crate::commands::common::{
    format_item_lines, format_relative_time, format_stats_lines, format_timestamp, parse_item_id,
    parse_payload, resolve_db_path,
};
use crate::commands::queue::{dispatch, enqueue, format_summary, list_items};
use crate::commands::records::{format_order_line, list_expenses, list_orders};
use crate::dispatch_options;
use crate::error::CliError;

fn owner(id: &str) -> OwnerArgs {
    OwnerArgs {
        owner: Some(id.to_string()),
        sub_user: None,
    }
}

fn sub_user(id: &str) -> OwnerArgs {
    OwnerArgs {
        owner: None,
        sub_user: Some(id.to_string()),
    }
}

fn expense_request(amount: i64) -> SyncRequest {
    SyncRequest {
        endpoint: Some("/api/expenses".to_string()),
        method: Some("POST".to_string()),
        data: Some(json!({"amount": amount, "category": "Marketing"})),
        ..SyncRequest::default()
    }
}

#[test]
fn cli_parses_queue_add() {
    let cli = Cli::try_parse_from([
        "optislip",
        "--db-path",
        "/tmp/q.db",
        "queue",
        "add",
        "--owner",
        "shop-1",
        "--endpoint",
        "/api/orders",
        "--method",
        "DELETE",
        "--data",
        r#"{"_id":"o-1"}"#,
    ])
    .unwrap();

    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/q.db")));
    let Commands::Queue {
        command: QueueCommands::Add {
            owner, method, data, ..
        },
    } = cli.command
    else {
        panic!("expected queue add");
    };
    assert_eq!(owner.owner.as_deref(), Some("shop-1"));
    assert_eq!(method, "DELETE");
    assert_eq!(data.as_deref(), Some(r#"{"_id":"o-1"}"#));
}

#[test]
fn cli_requires_exactly_one_owner_flag() {
    assert!(Cli::try_parse_from(["optislip", "queue", "stats"]).is_err());
    assert!(Cli::try_parse_from([
        "optislip",
        "queue",
        "stats",
        "--owner",
        "a",
        "--sub-user",
        "b"
    ])
    .is_err());
    assert!(Cli::try_parse_from(["optislip", "queue", "stats", "--sub-user", "b"]).is_ok());
}

#[test]
fn cli_parses_status_filter() {
    let cli = Cli::try_parse_from([
        "optislip", "queue", "list", "--owner", "a", "--status", "failed",
    ])
    .unwrap();
    let Commands::Queue {
        command: QueueCommands::List { status, .. },
    } = cli.command
    else {
        panic!("expected queue list");
    };
    assert_eq!(status, Some(StatusFilter::Failed));
    assert_eq!(status.map(SyncStatus::from), Some(SyncStatus::Failed));
}

#[test]
fn explicit_db_path_wins() {
    let path = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(path.clone())), path);
}

#[test]
fn parse_payload_reports_bad_json() {
    assert_eq!(parse_payload(None).unwrap(), None);
    assert_eq!(
        parse_payload(Some(r#"{"amount": 3}"#)).unwrap(),
        Some(json!({"amount": 3}))
    );
    assert!(matches!(
        parse_payload(Some("{amount")),
        Err(CliError::InvalidPayload(_))
    ));
}

#[test]
fn parse_item_id_rejects_garbage() {
    assert!(matches!(
        parse_item_id("not-a-uuid"),
        Err(CliError::InvalidItemId(_))
    ));
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn summary_and_stats_render_counts() {
    assert_eq!(format_summary(&DispatchSummary::default()), "No pending syncs");
    let summary = DispatchSummary {
        processed: 3,
        successful: 2,
        failed: 1,
        skipped: 0,
    };
    assert_eq!(
        format_summary(&summary),
        "processed=3 successful=2 failed=1 skipped=0"
    );

    let lines = format_stats_lines(&QueueStats {
        pending: 1,
        total: 1,
        ..QueueStats::default()
    });
    assert_eq!(lines.len(), 5);
    assert!(lines[0].ends_with('1'));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "multi_thread")]
async fn enqueue_then_dispatch_through_commands() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("optislip.db");

    let item = enqueue(&owner("shop-1"), expense_request(50), &db_path)
        .await
        .unwrap();
    assert_eq!(item.status, SyncStatus::Pending);

    let lines = format_item_lines(std::slice::from_ref(&item), item.created_at);
    assert!(lines[0].contains("pending"));
    assert!(lines[0].contains("/api/expenses"));

    let summary = dispatch(&owner("shop-1"), dispatch_options(50, false), &db_path)
        .await
        .unwrap();
    assert_eq!(summary.successful, 1);

    let completed = list_items(&owner("shop-1"), Some(SyncStatus::Completed), 10, &db_path)
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, item.id);
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "multi_thread")]
async fn sub_user_commands_use_owner_queue() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("optislip.db");

    let user = create_owner("shop@example.com", "Shop", None, Some("shop-1"), &db_path)
        .await
        .unwrap();
    let clerk = create_sub_user(&user.id, "clerk", "clerk@example.com", None, &db_path)
        .await
        .unwrap();

    let item = enqueue(&sub_user(&clerk.id), expense_request(7), &db_path)
        .await
        .unwrap();
    assert_eq!(item.owner_id, "shop-1");

    let account = load_account("shop-1", &db_path).await.unwrap();
    assert_eq!(account.sub_users.len(), 1);
    assert_eq!(account.sub_users[0].username, "clerk");

    let error = enqueue(&sub_user("ghost"), expense_request(1), &db_path)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        CliError::Core(optislip_core::Error::Ownership(_))
    ));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "multi_thread")]
async fn sub_user_requires_existing_owner() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("optislip.db");

    let error = create_sub_user("nobody", "clerk", "clerk@example.com", None, &db_path)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::OwnerNotFound(_)));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "multi_thread")]
async fn records_show_replayed_orders() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("optislip.db");

    let request = SyncRequest {
        endpoint: Some("/api/orders".to_string()),
        method: Some("POST".to_string()),
        data: Some(json!({
            "_id": "order-7",
            "patientName": "Lata",
            "whatsappNumber": "+91777",
            "totalAmount": 1200,
            "advance": 200,
            "balance": 1000,
            "deliveryDate": "2024-08-15"
        })),
        ..SyncRequest::default()
    };
    enqueue(&owner("shop-1"), request, &db_path).await.unwrap();
    dispatch(&owner("shop-1"), dispatch_options(50, false), &db_path)
        .await
        .unwrap();

    let orders = list_orders(&owner("shop-1"), 10, &db_path).await.unwrap();
    assert_eq!(orders.len(), 1);
    let line = format_order_line(&orders[0]);
    assert!(line.starts_with("order-7"), "{line}");
    assert!(line.contains("Lata"));
    assert!(line.contains("balance=1000.00"));

    assert!(list_expenses(&owner("shop-1"), 10, &db_path)
        .await
        .unwrap()
        .is_empty());
}
