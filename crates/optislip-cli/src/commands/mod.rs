pub mod account;
pub mod common;
pub mod queue;
pub mod records;
