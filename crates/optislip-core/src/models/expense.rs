//! Shop expense records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{timestamp, RecordId};
use crate::error::{Error, Result};

/// Expense categories a shop can book against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Salary,
    #[serde(rename = "Frame Vendors")]
    FrameVendors,
    #[serde(rename = "Lens Vendor")]
    LensVendor,
    #[serde(rename = "Box Vendor")]
    BoxVendor,
    Marketing,
    Accessories,
    #[serde(rename = "Repair and Maintenance")]
    RepairAndMaintenance,
    #[serde(rename = "New Asset Purchase")]
    NewAssetPurchase,
}

impl ExpenseCategory {
    pub const ALL: [Self; 8] = [
        Self::Salary,
        Self::FrameVendors,
        Self::LensVendor,
        Self::BoxVendor,
        Self::Marketing,
        Self::Accessories,
        Self::RepairAndMaintenance,
        Self::NewAssetPurchase,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Salary => "Salary",
            Self::FrameVendors => "Frame Vendors",
            Self::LensVendor => "Lens Vendor",
            Self::BoxVendor => "Box Vendor",
            Self::Marketing => "Marketing",
            Self::Accessories => "Accessories",
            Self::RepairAndMaintenance => "Repair and Maintenance",
            Self::NewAssetPurchase => "New Asset Purchase",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown expense category: {s}")))
    }
}

/// A stored expense, owned by one shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(alias = "_id")]
    pub id: RecordId,
    pub owner_id: String,
    pub amount: f64,
    pub category: ExpenseCategory,
    #[serde(with = "timestamp")]
    pub date: i64,
    #[serde(default)]
    pub description: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Expense {
    pub fn validate(&self) -> Result<()> {
        validate_amount(self.amount)
    }
}

/// Fields a client supplies when creating an expense
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDraft {
    pub amount: f64,
    pub category: ExpenseCategory,
    #[serde(default, with = "timestamp::option")]
    pub date: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ExpenseDraft {
    /// Build a new expense for `owner_id`, defaulting the date to `now`.
    pub fn into_expense(self, owner_id: &str, now: i64) -> Result<Expense> {
        let expense = Expense {
            id: RecordId::generate(),
            owner_id: owner_id.to_string(),
            amount: self.amount,
            category: self.category,
            date: self.date.unwrap_or(now),
            description: self.description.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        expense.validate()?;
        Ok(expense)
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidInput(format!(
            "amount must be a non-negative number, got {amount}"
        )));
    }
    Ok(())
}
