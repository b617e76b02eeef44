use std::path::Path;

use optislip_core::models::{Expense, Order};

use crate::cli::OwnerArgs;
use crate::commands::common::{format_timestamp, open_database, resolve_owner};
use crate::error::CliError;

pub async fn list_expenses(
    owner: &OwnerArgs,
    limit: usize,
    db_path: &Path,
) -> Result<Vec<Expense>, CliError> {
    let db = open_database(db_path).await?;
    let context = resolve_owner(&db, owner).await?;
    Ok(db.list_expenses(&context.owner_id, limit).await?)
}

pub async fn list_orders(
    owner: &OwnerArgs,
    limit: usize,
    db_path: &Path,
) -> Result<Vec<Order>, CliError> {
    let db = open_database(db_path).await?;
    let context = resolve_owner(&db, owner).await?;
    Ok(db.list_orders(&context.owner_id, limit).await?)
}

pub async fn run_records_expenses(
    owner: &OwnerArgs,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let expenses = list_expenses(owner, limit, db_path).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&expenses)?);
        return Ok(());
    }
    if expenses.is_empty() {
        println!("No expenses.");
    }
    for expense in &expenses {
        println!("{}", format_expense_line(expense));
    }
    Ok(())
}

pub async fn run_records_orders(
    owner: &OwnerArgs,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let orders = list_orders(owner, limit, db_path).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&orders)?);
        return Ok(());
    }
    if orders.is_empty() {
        println!("No orders.");
    }
    for order in &orders {
        println!("{}", format_order_line(order));
    }
    Ok(())
}

pub fn format_expense_line(expense: &Expense) -> String {
    let mut line = format!(
        "{}  {:>10.2}  {}  {}",
        expense.id,
        expense.amount,
        expense.category,
        format_timestamp(expense.date)
    );
    if !expense.description.is_empty() {
        line.push_str(&format!("  {}", expense.description));
    }
    line
}

pub fn format_order_line(order: &Order) -> String {
    let mut line = format!(
        "{}  {:<9} {}  total={:.2} balance={:.2} delivery {}",
        order.id,
        order.status.as_str(),
        order.patient_name,
        order.total_amount,
        order.balance,
        format_timestamp(order.delivery_date)
    );
    if order.archived {
        line.push_str("  (archived)");
    }
    line
}
