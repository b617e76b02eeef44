//! Resource kinds addressable by queued mutations

use serde::{Deserialize, Serialize};

/// Logical resource collection a sync item targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Expenses,
    Orders,
    Profile,
}

impl ResourceKind {
    /// Resolve the resource from a queued endpoint.
    ///
    /// Matches the first path segment exactly (after an optional `api/`
    /// prefix), so `/api/expenses/123` resolves but `/api/expensesArchive`
    /// does not.
    pub fn from_endpoint(endpoint: &str) -> Option<Self> {
        let path = endpoint.trim().split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());
        let mut first = segments.next()?;
        if first.eq_ignore_ascii_case("api") {
            first = segments.next()?;
        }

        match first.to_ascii_lowercase().as_str() {
            "expenses" => Some(Self::Expenses),
            "orders" => Some(Self::Orders),
            "user" | "profile" => Some(Self::Profile),
            _ => None,
        }
    }

    /// Singular display name used in replay error messages.
    pub const fn record_label(self) -> &'static str {
        match self {
            Self::Expenses => "Expense",
            Self::Orders => "Order",
            Self::Profile => "User",
        }
    }
}
