//! Order repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use libsql::{params, Connection, Row};

use crate::error::Result;
use crate::models::{EyePrescription, Order, RecordId};

const ORDER_COLUMNS: &str = "id, owner_id, patient_name, whatsapp_number, frame_details, \
     lens_type, total_amount, advance, balance, delivery_date, right_eye, left_eye, add_input, \
     important_note, status, archived, created_at, updated_at";

/// Trait for order storage operations, scoped to the owning shop
#[allow(async_fn_in_trait)]
pub trait OrderRepository {
    async fn insert(&self, order: &Order) -> Result<()>;

    async fn get(&self, id: &RecordId, owner_id: &str) -> Result<Option<Order>>;

    /// Whether any shop already holds an order with this id.
    async fn exists(&self, id: &RecordId) -> Result<bool>;

    async fn update(&self, order: &Order) -> Result<bool>;

    async fn delete(&self, id: &RecordId, owner_id: &str) -> Result<bool>;

    async fn list(&self, owner_id: &str, limit: usize) -> Result<Vec<Order>>;
}

/// libSQL implementation of `OrderRepository`
pub struct LibSqlOrderRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlOrderRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_order(row: &Row) -> Result<Order> {
        let id: String = row.get(0)?;
        let status: String = row.get(14)?;
        Ok(Order {
            id: RecordId::from(id),
            owner_id: row.get(1)?,
            patient_name: row.get(2)?,
            whatsapp_number: row.get(3)?,
            frame_details: row.get(4)?,
            lens_type: row.get(5)?,
            total_amount: row.get(6)?,
            advance: row.get(7)?,
            balance: row.get(8)?,
            delivery_date: row.get(9)?,
            right_eye: decode_eye(row.get(10)?)?,
            left_eye: decode_eye(row.get(11)?)?,
            add_input: row.get(12)?,
            important_note: row.get(13)?,
            status: status.parse()?,
            archived: row.get::<i64>(15)? != 0,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }
}

fn encode_eye(eye: Option<&EyePrescription>) -> Result<Option<String>> {
    Ok(eye.map(serde_json::to_string).transpose()?)
}

fn decode_eye(raw: Option<String>) -> Result<Option<EyePrescription>> {
    Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
}

impl OrderRepository for LibSqlOrderRepository<'_> {
    async fn insert(&self, order: &Order) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO orders (id, owner_id, patient_name, whatsapp_number, frame_details,
                    lens_type, total_amount, advance, balance, delivery_date, right_eye, left_eye,
                    add_input, important_note, status, archived, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18)",
                params![
                    order.id.as_str(),
                    order.owner_id.as_str(),
                    order.patient_name.as_str(),
                    order.whatsapp_number.as_str(),
                    order.frame_details.clone(),
                    order.lens_type.clone(),
                    order.total_amount,
                    order.advance,
                    order.balance,
                    order.delivery_date,
                    encode_eye(order.right_eye.as_ref())?,
                    encode_eye(order.left_eye.as_ref())?,
                    order.add_input.clone(),
                    order.important_note.clone(),
                    order.status.as_str(),
                    i64::from(order.archived),
                    order.created_at,
                    order.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &RecordId, owner_id: &str) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1 AND owner_id = ?2");
        let mut rows = self
            .conn
            .query(&sql, params![id.as_str(), owner_id])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_order(&row)?)),
            None => Ok(None),
        }
    }

    async fn exists(&self, id: &RecordId) -> Result<bool> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM orders WHERE id = ?1", params![id.as_str()])
            .await?;
        Ok(rows.next().await?.is_some())
    }

    async fn update(&self, order: &Order) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE orders
                 SET patient_name = ?3, whatsapp_number = ?4, frame_details = ?5, lens_type = ?6,
                     total_amount = ?7, advance = ?8, balance = ?9, delivery_date = ?10,
                     right_eye = ?11, left_eye = ?12, add_input = ?13, important_note = ?14,
                     status = ?15, archived = ?16, updated_at = ?17
                 WHERE id = ?1 AND owner_id = ?2",
                params![
                    order.id.as_str(),
                    order.owner_id.as_str(),
                    order.patient_name.as_str(),
                    order.whatsapp_number.as_str(),
                    order.frame_details.clone(),
                    order.lens_type.clone(),
                    order.total_amount,
                    order.advance,
                    order.balance,
                    order.delivery_date,
                    encode_eye(order.right_eye.as_ref())?,
                    encode_eye(order.left_eye.as_ref())?,
                    order.add_input.clone(),
                    order.important_note.clone(),
                    order.status.as_str(),
                    i64::from(order.archived),
                    order.updated_at
                ],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn delete(&self, id: &RecordId, owner_id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM orders WHERE id = ?1 AND owner_id = ?2",
                params![id.as_str(), owner_id],
            )
            .await?;
        Ok(rows == 1)
    }

    async fn list(&self, owner_id: &str, limit: usize) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE owner_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2"
        );
        let mut rows = self
            .conn
            .query(&sql, params![owner_id, limit as i64])
            .await?;
        let mut orders = Vec::new();
        while let Some(row) = rows.next().await? {
            orders.push(Self::parse_order(&row)?);
        }
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{OrderDraft, OrderStatus};
    use serde_json::json;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn order(owner: &str) -> Order {
        let draft: OrderDraft = serde_json::from_value(json!({
            "patientName": "Ravi",
            "whatsappNumber": "+91000",
            "totalAmount": 1200,
            "advance": 200,
            "balance": 1000,
            "deliveryDate": 1_700_000_000_000_i64,
            "leftEye": {"sph": 0.75}
        }))
        .unwrap();
        draft.into_order(None, owner, 100).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_roundtrips_nested_fields() {
        let db = setup().await;
        let repo = LibSqlOrderRepository::new(db.connection());

        let stored = order("owner-1");
        repo.insert(&stored).await.unwrap();

        let fetched = repo.get(&stored.id, "owner-1").await.unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(fetched.left_eye.and_then(|eye| eye.sph), Some(0.75));
        assert!(repo.get(&stored.id, "owner-2").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_status_and_archive() {
        let db = setup().await;
        let repo = LibSqlOrderRepository::new(db.connection());

        let mut stored = order("owner-1");
        repo.insert(&stored).await.unwrap();
        stored.status = OrderStatus::Completed;
        stored.archived = true;
        assert!(repo.update(&stored).await.unwrap());

        let fetched = repo.get(&stored.id, "owner-1").await.unwrap().unwrap();
        assert_eq!(fetched.status, OrderStatus::Completed);
        assert!(fetched.archived);
        assert_eq!(repo.list("owner-1", 10).await.unwrap().len(), 1);

        assert!(repo.delete(&stored.id, "owner-1").await.unwrap());
        assert!(!repo.delete(&stored.id, "owner-1").await.unwrap());
    }
}
