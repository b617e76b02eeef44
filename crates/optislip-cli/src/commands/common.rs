use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use optislip_core::models::QueueStats;
use optislip_core::services::{DatabaseService, SyncOptions, SyncService};
use optislip_core::{IdentityResolver, OwnerContext, Principal, SyncItem, SyncItemId, SystemClock};
use serde_json::Value;

use crate::cli::OwnerArgs;
use crate::error::CliError;

/// Longest endpoint shown in table output before truncation.
const ENDPOINT_WIDTH: usize = 28;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("OPTISLIP_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("optislip")
        .join("optislip.db")
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path.to_path_buf()).await?)
}

pub fn sync_service(db: DatabaseService, options: SyncOptions) -> SyncService {
    SyncService::new(db, Arc::new(SystemClock), options)
}

/// Map `--owner` / `--sub-user` to the root owner.
pub async fn resolve_owner(
    db: &DatabaseService,
    args: &OwnerArgs,
) -> Result<OwnerContext, CliError> {
    let principal = match (&args.owner, &args.sub_user) {
        (_, Some(sub_user)) => Principal::sub_user(sub_user.trim()),
        (Some(owner), None) => Principal::owner(owner.trim()),
        (None, None) => return Err(CliError::EmptyField("--owner")),
    };
    Ok(IdentityResolver::new(db.clone()).resolve(&principal).await?)
}

pub fn parse_item_id(id: &str) -> Result<SyncItemId, CliError> {
    id.trim()
        .parse::<SyncItemId>()
        .map_err(|_| CliError::InvalidItemId(id.to_string()))
}

pub fn parse_payload(data: Option<&str>) -> Result<Option<Value>, CliError> {
    data.map(|raw| {
        serde_json::from_str::<Value>(raw).map_err(|error| CliError::InvalidPayload(error.to_string()))
    })
    .transpose()
}

pub fn normalize_required(value: &str, field: &'static str) -> Result<String, CliError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

pub fn format_item_lines(items: &[SyncItem], now_ms: i64) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let short_id = item.id.to_string().chars().take(13).collect::<String>();
            let mut line = format!(
                "{short_id}  {:<10} {:<6} {:<width$} attempts={}/{} created {}",
                item.status.as_str(),
                item.method.as_str(),
                truncate(&item.endpoint, ENDPOINT_WIDTH),
                item.attempts,
                item.max_attempts,
                format_relative_time(item.created_at, now_ms),
                width = ENDPOINT_WIDTH,
            );
            if let Some(next_retry_at) = item.next_retry_at {
                line.push_str(&format!(" retry at {}", format_timestamp(next_retry_at)));
            }
            if let Some(error) = item.last_error.as_deref() {
                line.push_str(&format!(" error=\"{error}\""));
            }
            line
        })
        .collect()
}

pub fn format_item_details(item: &SyncItem) -> Result<Vec<String>, CliError> {
    let mut lines = vec![
        format!("id:           {}", item.id),
        format!("endpoint:     {}", item.endpoint),
        format!("method:       {}", item.method),
        format!("status:       {}", item.status),
        format!("attempts:     {}/{}", item.attempts, item.max_attempts),
        format!("priority:     {}", item.priority),
        format!("created:      {}", format_timestamp(item.created_at)),
        format!("updated:      {}", format_timestamp(item.updated_at)),
    ];
    if let Some(device) = item.device_origin.as_deref() {
        lines.push(format!("device:       {device}"));
    }
    if let Some(next_retry_at) = item.next_retry_at {
        lines.push(format!("next retry:   {}", format_timestamp(next_retry_at)));
    }
    if let Some(error) = item.last_error.as_deref() {
        lines.push(format!("last error:   {error}"));
    }
    lines.push(format!("data:         {}", serde_json::to_string(&item.payload)?));
    if let Some(result) = item.last_result.as_ref() {
        lines.push(format!("last result:  {}", serde_json::to_string(result)?));
    }
    Ok(lines)
}

pub fn format_stats_lines(stats: &QueueStats) -> Vec<String> {
    vec![
        format!("pending:    {}", stats.pending),
        format!("processing: {}", stats.processing),
        format!("completed:  {}", stats.completed),
        format!("failed:     {}", stats.failed),
        format!("total:      {}", stats.total),
    ]
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    out.push_str("...");
    out
}
