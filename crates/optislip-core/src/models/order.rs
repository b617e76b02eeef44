//! Optician orders

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{timestamp, RecordId};
use crate::error::{Error, Result};

/// Order progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
}

impl OrderStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(Error::InvalidInput(format!("Unknown order status: {other}"))),
        }
    }
}

/// Lens prescription for one eye
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EyePrescription {
    #[serde(default)]
    pub sph: Option<f64>,
    #[serde(default)]
    pub cyl: Option<f64>,
    #[serde(default)]
    pub axis: Option<f64>,
}

/// A stored order, owned by one shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id")]
    pub id: RecordId,
    pub owner_id: String,
    pub patient_name: String,
    pub whatsapp_number: String,
    #[serde(default)]
    pub frame_details: Option<String>,
    #[serde(default)]
    pub lens_type: Option<String>,
    pub total_amount: f64,
    pub advance: f64,
    pub balance: f64,
    #[serde(with = "timestamp")]
    pub delivery_date: i64,
    #[serde(default)]
    pub right_eye: Option<EyePrescription>,
    #[serde(default)]
    pub left_eye: Option<EyePrescription>,
    #[serde(default)]
    pub add_input: Option<String>,
    #[serde(default)]
    pub important_note: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn validate(&self) -> Result<()> {
        if self.patient_name.trim().is_empty() {
            return Err(Error::InvalidInput("patientName is required".into()));
        }
        if self.whatsapp_number.trim().is_empty() {
            return Err(Error::InvalidInput("whatsappNumber is required".into()));
        }
        for (field, value) in [
            ("totalAmount", self.total_amount),
            ("advance", self.advance),
            ("balance", self.balance),
        ] {
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!("{field} must be a number")));
            }
        }
        Ok(())
    }
}

/// Fields a client supplies when creating an order
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub patient_name: String,
    pub whatsapp_number: String,
    #[serde(default)]
    pub frame_details: Option<String>,
    #[serde(default)]
    pub lens_type: Option<String>,
    pub total_amount: f64,
    pub advance: f64,
    pub balance: f64,
    #[serde(with = "timestamp")]
    pub delivery_date: i64,
    #[serde(default)]
    pub right_eye: Option<EyePrescription>,
    #[serde(default)]
    pub left_eye: Option<EyePrescription>,
    #[serde(default)]
    pub add_input: Option<String>,
    #[serde(default)]
    pub important_note: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub archived: bool,
}

impl OrderDraft {
    /// Build the stored order. Keeps a client-assigned id when one is given.
    pub fn into_order(self, id: Option<RecordId>, owner_id: &str, now: i64) -> Result<Order> {
        let order = Order {
            id: id.unwrap_or_else(RecordId::generate),
            owner_id: owner_id.to_string(),
            patient_name: self.patient_name,
            whatsapp_number: self.whatsapp_number,
            frame_details: self.frame_details,
            lens_type: self.lens_type,
            total_amount: self.total_amount,
            advance: self.advance,
            balance: self.balance,
            delivery_date: self.delivery_date,
            right_eye: self.right_eye,
            left_eye: self.left_eye,
            add_input: self.add_input,
            important_note: self.important_note,
            status: self.status,
            archived: self.archived,
            created_at: now,
            updated_at: now,
        };
        order.validate()?;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft_json() -> serde_json::Value {
        json!({
            "patientName": "Asha",
            "whatsappNumber": "+911234567890",
            "totalAmount": 2500,
            "advance": 500,
            "balance": 2000,
            "deliveryDate": "2024-05-10",
            "rightEye": {"sph": -1.25, "cyl": -0.5, "axis": 90}
        })
    }

    #[test]
    fn test_draft_into_order() {
        let draft: OrderDraft = serde_json::from_value(draft_json()).unwrap();
        let order = draft.into_order(None, "owner-1", 42).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(!order.archived);
        assert_eq!(order.right_eye.and_then(|eye| eye.axis), Some(90.0));
        assert_eq!(order.left_eye, None);
        assert_eq!(order.created_at, 42);
    }

    #[test]
    fn test_draft_keeps_client_id() {
        let draft: OrderDraft = serde_json::from_value(draft_json()).unwrap();
        let order = draft
            .into_order(Some(RecordId::from("665f1c2e9b1e8a0012345678")), "owner-1", 42)
            .unwrap();
        assert_eq!(order.id.as_str(), "665f1c2e9b1e8a0012345678");
    }

    #[test]
    fn test_draft_requires_patient_name() {
        let mut value = draft_json();
        value.as_object_mut().unwrap().remove("patientName");
        assert!(serde_json::from_value::<OrderDraft>(value).is_err());
    }

    #[test]
    fn test_blank_patient_name_is_invalid() {
        let mut value = draft_json();
        value["patientName"] = json!("   ");
        let draft: OrderDraft = serde_json::from_value(value).unwrap();
        assert!(draft.into_order(None, "owner-1", 0).is_err());
    }

    #[test]
    fn test_status_rejects_unknown() {
        let mut value = draft_json();
        value["status"] = json!("shipped");
        assert!(serde_json::from_value::<OrderDraft>(value).is_err());
    }
}
