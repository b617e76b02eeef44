//! Owner accounts and their delegated sub-users

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root owner account; also the profile resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub is_admin: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Delegated identity that acts on behalf of one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubUser {
    pub id: String,
    pub owner_id: String,
    pub username: String,
    pub email: String,
    pub created_at: i64,
}

/// Profile changes accepted from a sync payload.
///
/// Only `name`, `email` and `phone` are honored, and only when they are
/// non-empty strings. Everything else in the payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        let field = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            name: field("name"),
            email: field("email"),
            phone: field("phone"),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }

    /// Apply the accepted fields to `user`.
    pub fn apply(self, user: &mut User, now: i64) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(phone) = self.phone {
            user.phone = Some(phone);
        }
        user.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> User {
        User {
            id: "owner-1".into(),
            email: "shop@example.com".into(),
            name: "Shop".into(),
            phone: None,
            is_admin: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_profile_update_ignores_unknown_fields() {
        let payload = json!({"name": "New Shop", "isAdmin": true, "id": "other"});
        let update = ProfileUpdate::from_payload(payload.as_object().unwrap());
        assert_eq!(update.name.as_deref(), Some("New Shop"));
        assert_eq!(update.email, None);

        let mut user = user();
        update.apply(&mut user, 10);
        assert_eq!(user.name, "New Shop");
        assert!(!user.is_admin);
        assert_eq!(user.id, "owner-1");
        assert_eq!(user.updated_at, 10);
    }

    #[test]
    fn test_profile_update_skips_empty_and_non_string_values() {
        let payload = json!({"name": "", "email": 42, "phone": "555-0101"});
        let update = ProfileUpdate::from_payload(payload.as_object().unwrap());
        assert_eq!(update.name, None);
        assert_eq!(update.email, None);
        assert_eq!(update.phone.as_deref(), Some("555-0101"));
        assert!(!update.is_empty());
        assert!(ProfileUpdate::from_payload(&Map::new()).is_empty());
    }
}
