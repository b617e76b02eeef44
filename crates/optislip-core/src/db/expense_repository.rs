//! Expense repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use libsql::{params, Connection, Row};

use crate::error::Result;
use crate::models::{Expense, RecordId};

const EXPENSE_COLUMNS: &str =
    "id, owner_id, amount, category, date, description, created_at, updated_at";

/// Trait for expense storage operations
///
/// Lookups are always scoped to the owning shop.
#[allow(async_fn_in_trait)]
pub trait ExpenseRepository {
    async fn insert(&self, expense: &Expense) -> Result<()>;

    async fn get(&self, id: &RecordId, owner_id: &str) -> Result<Option<Expense>>;

    /// Overwrite a stored expense; returns false when it no longer exists
    async fn update(&self, expense: &Expense) -> Result<bool>;

    async fn delete(&self, id: &RecordId, owner_id: &str) -> Result<bool>;

    /// Newest first
    async fn list(&self, owner_id: &str, limit: usize) -> Result<Vec<Expense>>;
}

/// libSQL implementation of `ExpenseRepository`
pub struct LibSqlExpenseRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlExpenseRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_expense(row: &Row) -> Result<Expense> {
        let id: String = row.get(0)?;
        let category: String = row.get(3)?;
        Ok(Expense {
            id: RecordId::from(id),
            owner_id: row.get(1)?,
            amount: row.get(2)?,
            category: category.parse()?,
            date: row.get(4)?,
            description: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl ExpenseRepository for LibSqlExpenseRepository<'_> {
    async fn insert(&self, expense: &Expense) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO expenses (id, owner_id, amount, category, date, description,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    expense.id.as_str(),
                    expense.owner_id.as_str(),
                    expense.amount,
                    expense.category.as_str(),
                    expense.date,
                    expense.description.as_str(),
                    expense.created_at,
                    expense.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &RecordId, owner_id: &str) -> Result<Option<Expense>> {
        let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1 AND owner_id = ?2");
        let mut rows = self
            .conn
            .query(&sql, params![id.as_str(), owner_id])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_expense(&row)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, expense: &Expense) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE expenses
                 SET amount = ?3, category = ?4, date = ?5, description = ?6, updated_at = ?7
                 WHERE id = ?1 AND owner_id = ?2",
                params![
                    expense.id.as_str(),
                    expense.owner_id.as_str(),
                    expense.amount,
                    expense.category.as_str(),
                    expense.date,
                    expense.description.as_str(),
                    expense.updated_at
                ],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn delete(&self, id: &RecordId, owner_id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM expenses WHERE id = ?1 AND owner_id = ?2",
                params![id.as_str(), owner_id],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn list(&self, owner_id: &str, limit: usize) -> Result<Vec<Expense>> {
        let sql = format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE owner_id = ?1
             ORDER BY date DESC, created_at DESC
             LIMIT ?2"
        );
        let mut rows = self
            .conn
            .query(&sql, params![owner_id, limit as i64])
            .await?;
        let mut expenses = Vec::new();
        while let Some(row) = rows.next().await? {
            expenses.push(Self::parse_expense(&row)?);
        }
        Ok(expenses)
    }
}
