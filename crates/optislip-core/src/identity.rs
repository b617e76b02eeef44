//! Maps an authenticated caller to the root owner its queue belongs to.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::services::DatabaseService;
use crate::util::normalize_text_option;

/// Authenticated caller, as carried by a verified token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub is_sub_user: bool,
    #[serde(default)]
    pub sub_user_id: Option<String>,
}

impl Principal {
    /// A root owner acting for itself
    pub fn owner(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_sub_user: false,
            sub_user_id: None,
        }
    }

    /// A delegated sub-user
    pub fn sub_user(sub_user_id: impl Into<String>) -> Self {
        Self {
            user_id: String::new(),
            is_sub_user: true,
            sub_user_id: Some(sub_user_id.into()),
        }
    }
}

/// Resolved identity every queue operation is scoped by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerContext {
    /// Root owner; never a sub-user
    pub owner_id: String,
    pub is_sub_identity: bool,
    /// The identity that actually made the request
    pub actor_id: String,
}

/// Resolves principals against the account tables
#[derive(Clone)]
pub struct IdentityResolver {
    db: DatabaseService,
}

impl IdentityResolver {
    pub const fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    pub async fn resolve(&self, principal: &Principal) -> Result<OwnerContext> {
        if !principal.is_sub_user {
            let owner_id = normalize_text_option(Some(principal.user_id.clone()))
                .ok_or_else(|| Error::Ownership("Missing user id".into()))?;
            return Ok(OwnerContext {
                actor_id: owner_id.clone(),
                owner_id,
                is_sub_identity: false,
            });
        }

        let sub_user_id = normalize_text_option(principal.sub_user_id.clone())
            .ok_or_else(|| Error::Ownership("Sub-user not found".into()))?;
        let sub_user = self
            .db
            .get_sub_user(&sub_user_id)
            .await?
            .ok_or_else(|| Error::Ownership("Sub-user not found".into()))?;

        Ok(OwnerContext {
            owner_id: sub_user.owner_id,
            is_sub_identity: true,
            actor_id: sub_user.id,
        })
    }
}
