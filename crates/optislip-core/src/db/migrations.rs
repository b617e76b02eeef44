//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
pub(crate) const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = current_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &V1_STATEMENTS).await?;
    }
    if version < 2 {
        apply(conn, 2, &V2_STATEMENTS).await?;
    }

    Ok(())
}

/// Get the current schema version
pub async fn current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: accounts and the sync queue
const V1_STATEMENTS: [&str; 9] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name TEXT NOT NULL,
        phone TEXT,
        is_admin INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sub_users (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        username TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sub_users_owner ON sub_users(owner_id)",
    "CREATE TABLE IF NOT EXISTS sync_queue (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        owner_id TEXT NOT NULL,
        endpoint TEXT NOT NULL CHECK (length(trim(endpoint)) > 0),
        method TEXT NOT NULL CHECK (method IN ('CREATE', 'UPDATE', 'DELETE')),
        payload TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(payload)),
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
        attempts INTEGER NOT NULL DEFAULT 0,
        max_attempts INTEGER NOT NULL DEFAULT 5 CHECK (max_attempts >= 1),
        last_error TEXT,
        last_result TEXT,
        device_origin TEXT,
        priority INTEGER NOT NULL DEFAULT 0,
        next_retry_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        CHECK (attempts >= 0 AND attempts <= max_attempts)
    )",
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_owner_status ON sync_queue(owner_id, status, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_retry ON sync_queue(status, next_retry_at)",
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_owner_endpoint ON sync_queue(owner_id, endpoint)",
    "INSERT INTO schema_version (version) VALUES (1)",
];

/// Version 2: resource collections replayed from the queue
const V2_STATEMENTS: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS expenses (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        amount REAL NOT NULL CHECK (amount >= 0),
        category TEXT NOT NULL,
        date INTEGER NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_expenses_owner ON expenses(owner_id, date DESC)",
    "CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        patient_name TEXT NOT NULL,
        whatsapp_number TEXT NOT NULL,
        frame_details TEXT,
        lens_type TEXT,
        total_amount REAL NOT NULL,
        advance REAL NOT NULL,
        balance REAL NOT NULL,
        delivery_date INTEGER NOT NULL,
        right_eye TEXT,
        left_eye TEXT,
        add_input TEXT,
        important_note TEXT,
        status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'completed')),
        archived INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_orders_owner ON orders(owner_id, created_at DESC)",
    "INSERT INTO schema_version (version) VALUES (2)",
];

/// Run one migration's statements in a transaction and record the version.
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so statements run one at a time
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = ?1
                )",
                [name],
            )
            .await
            .unwrap();

        rows.next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = current_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let version = current_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_all_tables_created() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        for table in ["users", "sub_users", "sync_queue", "expenses", "orders"] {
            assert!(table_exists(&conn, table).await, "missing table {table}");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_queue_rejects_bad_shapes() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let insert = "INSERT INTO sync_queue
            (id, owner_id, endpoint, method, payload, attempts, max_attempts, created_at, updated_at)
            VALUES (?1, 'owner', ?2, ?3, ?4, ?5, 5, 0, 0)";

        let bad_method = conn
            .execute(insert, libsql::params!["a", "/api/orders", "GET", "{}", 0])
            .await;
        assert!(bad_method.is_err());

        let bad_json = conn
            .execute(insert, libsql::params!["b", "/api/orders", "CREATE", "{nope", 0])
            .await;
        assert!(bad_json.is_err());

        let blank_endpoint = conn
            .execute(insert, libsql::params!["c", "  ", "CREATE", "{}", 0])
            .await;
        assert!(blank_endpoint.is_err());

        let too_many_attempts = conn
            .execute(insert, libsql::params!["d", "/api/orders", "CREATE", "{}", 6])
            .await;
        assert!(too_many_attempts.is_err());

        let ok = conn
            .execute(insert, libsql::params!["e", "/api/orders", "CREATE", "{}", 0])
            .await;
        assert!(ok.is_ok());
    }
}
