//! Owner and sub-user account repository

use libsql::{params, Connection, Row};

use crate::error::Result;
use crate::models::{SubUser, User};

/// Trait for account storage operations
#[allow(async_fn_in_trait)]
pub trait AccountRepository {
    async fn create_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    /// Persist profile fields; returns false when the user no longer exists
    async fn update_user(&self, user: &User) -> Result<bool>;

    async fn create_sub_user(&self, sub_user: &SubUser) -> Result<()>;

    async fn get_sub_user(&self, id: &str) -> Result<Option<SubUser>>;

    async fn list_sub_users(&self, owner_id: &str) -> Result<Vec<SubUser>>;
}

/// libSQL implementation of `AccountRepository`
pub struct LibSqlAccountRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlAccountRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_user(row: &Row) -> Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            phone: row.get(3)?,
            is_admin: row.get::<i64>(4)? != 0,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn parse_sub_user(row: &Row) -> Result<SubUser> {
        Ok(SubUser {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            username: row.get(2)?,
            email: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl AccountRepository for LibSqlAccountRepository<'_> {
    async fn create_user(&self, user: &User) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO users (id, email, name, phone, is_admin, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id.as_str(),
                    user.email.as_str(),
                    user.name.as_str(),
                    user.phone.clone(),
                    i64::from(user.is_admin),
                    user.created_at,
                    user.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, email, name, phone, is_admin, created_at, updated_at
                 FROM users WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_user(&self, user: &User) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE users SET email = ?2, name = ?3, phone = ?4, updated_at = ?5 WHERE id = ?1",
                params![
                    user.id.as_str(),
                    user.email.as_str(),
                    user.name.as_str(),
                    user.phone.clone(),
                    user.updated_at
                ],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn create_sub_user(&self, sub_user: &SubUser) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sub_users (id, owner_id, username, email, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    sub_user.id.as_str(),
                    sub_user.owner_id.as_str(),
                    sub_user.username.as_str(),
                    sub_user.email.as_str(),
                    sub_user.created_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_sub_user(&self, id: &str) -> Result<Option<SubUser>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, owner_id, username, email, created_at FROM sub_users WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_sub_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_sub_users(&self, owner_id: &str) -> Result<Vec<SubUser>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, owner_id, username, email, created_at FROM sub_users
                 WHERE owner_id = ?1 ORDER BY created_at ASC",
                params![owner_id],
            )
            .await?;
        let mut sub_users = Vec::new();
        while let Some(row) = rows.next().await? {
            sub_users.push(Self::parse_sub_user(&row)?);
        }
        Ok(sub_users)
    }
}
