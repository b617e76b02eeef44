use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] optislip_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("--data is not valid JSON: {0}")]
    InvalidPayload(String),
    #[error("Invalid sync item id: {0}")]
    InvalidItemId(String),
    #[error("Owner not found: {0}")]
    OwnerNotFound(String),
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
}
