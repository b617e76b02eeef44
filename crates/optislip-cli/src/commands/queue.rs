use std::path::Path;

use optislip_core::services::SyncOptions;
use optislip_core::sync::{DispatchSummary, OwnerDispatch};
use optislip_core::util::fingerprint;
use optislip_core::{SyncItem, SyncRequest, SyncStatus};

use crate::cli::OwnerArgs;
use crate::commands::common::{
    format_item_details, format_item_lines, format_stats_lines, open_database, parse_item_id,
    resolve_owner, sync_service,
};
use crate::error::CliError;

pub async fn list_items(
    owner: &OwnerArgs,
    status: Option<SyncStatus>,
    limit: usize,
    db_path: &Path,
) -> Result<Vec<SyncItem>, CliError> {
    let db = open_database(db_path).await?;
    let context = resolve_owner(&db, owner).await?;
    Ok(db.list_sync_items(&context.owner_id, status, limit).await?)
}

pub async fn run_queue_list(
    owner: &OwnerArgs,
    status: Option<SyncStatus>,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let items = list_items(owner, status, limit, db_path).await?;
    print_items(&items, as_json)
}

pub async fn run_queue_pending(
    owner: &OwnerArgs,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let context = resolve_owner(&db, owner).await?;
    let items = db.list_pending(&context.owner_id).await?;
    print_items(&items, as_json)
}

pub async fn run_queue_show(owner: &OwnerArgs, id: &str, db_path: &Path) -> Result<(), CliError> {
    let item_id = parse_item_id(id)?;
    let db = open_database(db_path).await?;
    let context = resolve_owner(&db, owner).await?;
    let item = sync_service(db, SyncOptions::default())
        .get(&context.owner_id, &item_id)
        .await?;

    for line in format_item_details(&item)? {
        println!("{line}");
    }
    Ok(())
}

pub async fn enqueue(
    owner: &OwnerArgs,
    request: SyncRequest,
    db_path: &Path,
) -> Result<SyncItem, CliError> {
    let db = open_database(db_path).await?;
    let context = resolve_owner(&db, owner).await?;
    let service = sync_service(db, SyncOptions::default());
    Ok(service.enqueue(&context.owner_id, request).await?)
}

pub async fn run_queue_add(
    owner: &OwnerArgs,
    request: SyncRequest,
    db_path: &Path,
) -> Result<(), CliError> {
    let item = enqueue(owner, request, db_path).await?;
    println!("{}", item.id);
    Ok(())
}

pub async fn dispatch(
    owner: &OwnerArgs,
    options: SyncOptions,
    db_path: &Path,
) -> Result<DispatchSummary, CliError> {
    let db = open_database(db_path).await?;
    let context = resolve_owner(&db, owner).await?;
    let summary = sync_service(db, options).dispatch(&context.owner_id).await?;
    tracing::debug!(owner = fingerprint(&context.owner_id), "CLI dispatch finished");
    Ok(summary)
}

pub async fn run_queue_dispatch(
    owner: &OwnerArgs,
    options: SyncOptions,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let summary = dispatch(owner, options, db_path).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", format_summary(&summary));
    }
    Ok(())
}

pub async fn run_queue_dispatch_all(
    max_owners: usize,
    options: SyncOptions,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let passes: Vec<OwnerDispatch> = sync_service(db, options).dispatch_all(max_owners).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&passes)?);
        return Ok(());
    }
    if passes.is_empty() {
        println!("No pending syncs.");
        return Ok(());
    }
    for pass in &passes {
        println!("{}  {}", pass.owner_id, format_summary(&pass.summary));
    }
    Ok(())
}

pub async fn run_queue_clear(owner: &OwnerArgs, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let context = resolve_owner(&db, owner).await?;
    let deleted = sync_service(db, SyncOptions::default())
        .clear_queue(&context.owner_id)
        .await?;
    println!("Deleted {deleted} sync item(s)");
    Ok(())
}

pub async fn run_queue_stats(
    owner: &OwnerArgs,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let context = resolve_owner(&db, owner).await?;
    let stats = db.queue_stats(&context.owner_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for line in format_stats_lines(&stats) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_summary(summary: &DispatchSummary) -> String {
    if summary.processed == 0 && summary.skipped == 0 {
        return "No pending syncs".to_string();
    }
    format!(
        "processed={} successful={} failed={} skipped={}",
        summary.processed, summary.successful, summary.failed, summary.skipped
    )
}

fn print_items(items: &[SyncItem], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No sync items.");
        return Ok(());
    }
    let now = chrono::Utc::now().timestamp_millis();
    for line in format_item_lines(items, now) {
        println!("{line}");
    }
    Ok(())
}
