//! Optislip CLI - administer the offline sync queue from the terminal
//!
//! Works directly against a local database file: inspect queues, queue
//! mutations, trigger dispatch passes and seed accounts.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use optislip_core::services::SyncOptions;
use optislip_core::sync::DispatchConfig;
use optislip_core::SyncRequest;

use crate::cli::{AccountCommands, Cli, Commands, QueueCommands, RecordCommands};
use crate::commands::account::{
    run_account_create_owner, run_account_create_sub_user, run_account_show,
};
use crate::commands::common::{parse_payload, resolve_db_path};
use crate::commands::queue::{
    run_queue_add, run_queue_clear, run_queue_dispatch, run_queue_dispatch_all, run_queue_list,
    run_queue_pending, run_queue_show, run_queue_stats,
};
use crate::commands::records::{run_records_expenses, run_records_orders};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "optislip=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Queue { command } => match command {
            QueueCommands::List {
                owner,
                status,
                limit,
                json,
            } => run_queue_list(&owner, status.map(Into::into), limit, json, &db_path).await?,
            QueueCommands::Pending { owner, json } => {
                run_queue_pending(&owner, json, &db_path).await?;
            }
            QueueCommands::Show { owner, id } => run_queue_show(&owner, &id, &db_path).await?,
            QueueCommands::Add {
                owner,
                endpoint,
                method,
                data,
                device_id,
                priority,
                max_attempts,
            } => {
                let request = SyncRequest {
                    endpoint: Some(endpoint),
                    method: Some(method),
                    data: parse_payload(data.as_deref())?,
                    device_id,
                    priority,
                    max_attempts,
                };
                run_queue_add(&owner, request, &db_path).await?;
            }
            QueueCommands::Dispatch {
                owner,
                batch_limit,
                fail_fast,
                json,
            } => {
                let options = dispatch_options(batch_limit, fail_fast);
                run_queue_dispatch(&owner, options, json, &db_path).await?;
            }
            QueueCommands::DispatchAll {
                max_owners,
                batch_limit,
                json,
            } => {
                let options = dispatch_options(batch_limit, false);
                run_queue_dispatch_all(max_owners, options, json, &db_path).await?;
            }
            QueueCommands::Clear { owner } => run_queue_clear(&owner, &db_path).await?,
            QueueCommands::Stats { owner, json } => {
                run_queue_stats(&owner, json, &db_path).await?;
            }
        },
        Commands::Account { command } => match command {
            AccountCommands::CreateOwner {
                email,
                name,
                phone,
                id,
            } => {
                run_account_create_owner(
                    &email,
                    &name,
                    phone.as_deref(),
                    id.as_deref(),
                    &db_path,
                )
                .await?;
            }
            AccountCommands::CreateSubUser {
                owner,
                username,
                email,
                id,
            } => {
                run_account_create_sub_user(&owner, &username, &email, id.as_deref(), &db_path)
                    .await?;
            }
            AccountCommands::Show { id, json } => run_account_show(&id, json, &db_path).await?,
        },
        Commands::Records { command } => match command {
            RecordCommands::Expenses { owner, limit, json } => {
                run_records_expenses(&owner, limit, json, &db_path).await?;
            }
            RecordCommands::Orders { owner, limit, json } => {
                run_records_orders(&owner, limit, json, &db_path).await?;
            }
        },
    }

    Ok(())
}

fn dispatch_options(batch_limit: usize, fail_fast_on_permanent: bool) -> SyncOptions {
    SyncOptions {
        dispatch: DispatchConfig {
            batch_limit: batch_limit.max(1),
            fail_fast_on_permanent,
            ..DispatchConfig::default()
        },
        ..SyncOptions::default()
    }
}
