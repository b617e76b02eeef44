use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use optislip_core::SyncStatus;

#[derive(Parser)]
#[command(name = "optislip")]
#[command(about = "Inspect and drive the Optislip offline sync queue")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and operate on an owner's sync queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Seed and inspect owner and sub-user accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Inspect records that replays have written
    Records {
        #[command(subcommand)]
        command: RecordCommands,
    },
}

/// Whose queue a command acts on
#[derive(Args, Debug, Clone)]
pub struct OwnerArgs {
    /// Root owner id
    #[arg(
        long,
        value_name = "ID",
        conflicts_with = "sub_user",
        required_unless_present = "sub_user"
    )]
    pub owner: Option<String>,
    /// Act as this sub-user; the queue of its owner is used
    #[arg(long, value_name = "ID")]
    pub sub_user: Option<String>,
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List queued items
    List {
        #[command(flatten)]
        owner: OwnerArgs,
        /// Only items in this status
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
        /// Number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List pending and in-flight items in replay order
    Pending {
        #[command(flatten)]
        owner: OwnerArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one item with its payload and last result
    Show {
        #[command(flatten)]
        owner: OwnerArgs,
        /// Sync item id
        id: String,
    },
    /// Queue a mutation
    Add {
        #[command(flatten)]
        owner: OwnerArgs,
        /// Target endpoint, e.g. /api/expenses
        #[arg(long)]
        endpoint: String,
        /// CREATE, UPDATE, DELETE (or POST, PUT, PATCH)
        #[arg(long)]
        method: String,
        /// JSON payload
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
        /// Originating device id
        #[arg(long, value_name = "ID")]
        device_id: Option<String>,
        /// Higher values replay first
        #[arg(long)]
        priority: Option<i64>,
        /// Attempt budget before the item fails
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Run a dispatch pass
    Dispatch {
        #[command(flatten)]
        owner: OwnerArgs,
        /// Items replayed per pass
        #[arg(long, default_value = "50")]
        batch_limit: usize,
        /// Fail unknown endpoints and invalid methods without retrying
        #[arg(long)]
        fail_fast: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one pass for every owner with eligible items
    DispatchAll {
        /// Owners visited
        #[arg(long, default_value = "100")]
        max_owners: usize,
        /// Items replayed per pass
        #[arg(long, default_value = "50")]
        batch_limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every queued item of the owner
    Clear {
        #[command(flatten)]
        owner: OwnerArgs,
    },
    /// Per-status item counts
    Stats {
        #[command(flatten)]
        owner: OwnerArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a root owner account
    CreateOwner {
        /// Account email
        #[arg(long)]
        email: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Phone number
        #[arg(long)]
        phone: Option<String>,
        /// Explicit id (generated when omitted)
        #[arg(long, value_name = "ID")]
        id: Option<String>,
    },
    /// Create a sub-user acting for an owner
    CreateSubUser {
        /// Owner the sub-user belongs to
        #[arg(long, value_name = "ID")]
        owner: String,
        /// Login name
        #[arg(long)]
        username: String,
        /// Sub-user email
        #[arg(long)]
        email: String,
        /// Explicit id (generated when omitted)
        #[arg(long, value_name = "ID")]
        id: Option<String>,
    },
    /// Show an owner's profile and sub-users
    Show {
        /// Owner id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Most recent expenses of an owner
    Expenses {
        #[command(flatten)]
        owner: OwnerArgs,
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Most recent orders of an owner
    Orders {
        #[command(flatten)]
        owner: OwnerArgs,
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusFilter {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl From<StatusFilter> for SyncStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Pending => Self::Pending,
            StatusFilter::Processing => Self::Processing,
            StatusFilter::Completed => Self::Completed,
            StatusFilter::Failed => Self::Failed,
        }
    }
}
