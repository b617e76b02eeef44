//! Database layer for Optislip

mod account_repository;
mod connection;
mod expense_repository;
mod migrations;
mod order_repository;
mod queue_repository;

pub use account_repository::{AccountRepository, LibSqlAccountRepository};
pub use connection::Database;
pub use expense_repository::{ExpenseRepository, LibSqlExpenseRepository};
pub use order_repository::{LibSqlOrderRepository, OrderRepository};
pub use queue_repository::{LibSqlQueueRepository, QueueRepository};
