//! SQLite implementation of the server storage traits

use crate::connection::{connect, DatabaseConfig, DbPool};
use crate::database;
use crate::items::{row_to_item, ItemRow, ITEM_COLUMNS};
use crate::migrations::run_migrations;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};
use vaultsync_core::{Item, UserData};
use vaultsync_server::{
    SessionId, SessionRecord, Storage, StorageError, StorageResult, UserId, UserRecord,
    UserTransaction,
};

/// Persistent [`Storage`] backed by a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: DbPool,
}

impl SqliteStorage {
    /// Wraps an already migrated pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Connects and brings the schema up to date
    pub async fn open(config: DatabaseConfig) -> StorageResult<Self> {
        let pool = connect(config).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn uuid_column<T, E: std::fmt::Display>(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
    parse: fn(&str) -> Result<T, E>,
) -> StorageResult<T> {
    let raw: String = row
        .try_get(column)
        .map_err(|e| StorageError::Corrupted(format!("Missing {}: {}", column, e)))?;
    parse(&raw).map_err(|e| StorageError::Corrupted(format!("Invalid {}: {}", column, e)))
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> StorageResult<UserRecord> {
    let data_version: i64 = row
        .try_get("data_version")
        .map_err(|e| database("Missing data version", e))?;
    Ok(UserRecord {
        id: uuid_column(row, "id", UserId::from_string)?,
        login: row.try_get("login").map_err(|e| database("Missing login", e))?,
        password_hash: row
            .try_get("password_hash")
            .map_err(|e| database("Missing password hash", e))?,
        data_version: data_version as u64,
    })
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> StorageResult<SessionRecord> {
    let logged_out: i64 = row
        .try_get("logged_out")
        .map_err(|e| database("Missing logged_out", e))?;
    Ok(SessionRecord {
        id: uuid_column(row, "id", SessionId::from_string)?,
        user_id: uuid_column(row, "user_id", UserId::from_string)?,
        refresh_token: row
            .try_get("refresh_token")
            .map_err(|e| database("Missing refresh token", e))?,
        logged_out: logged_out != 0,
    })
}

fn ensure_affected(
    result: sqlx::sqlite::SqliteQueryResult,
    what: impl FnOnce() -> String,
) -> StorageResult<()> {
    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound(what()));
    }
    Ok(())
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_user(&self, login: &str, password_hash: &str) -> StorageResult<UserRecord> {
        let record = UserRecord {
            id: UserId::new(),
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            data_version: 0,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, login, password_hash, data_version, created_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.login)
        .bind(&record.password_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::AlreadyExists(format!("user {}", login))
            }
            other => database("Failed to create user", other),
        })?;

        Ok(record)
    }

    async fn user_by_login(&self, login: &str) -> StorageResult<UserRecord> {
        let row = sqlx::query(
            "SELECT id, login, password_hash, data_version FROM users WHERE login = ?",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database("Failed to fetch user", e))?
        .ok_or_else(|| StorageError::NotFound(format!("user {}", login)))?;

        row_to_user(&row)
    }

    async fn create_session(&self, user_id: UserId) -> StorageResult<SessionRecord> {
        let record = SessionRecord {
            id: SessionId::new(),
            user_id,
            refresh_token: String::new(),
            logged_out: false,
        };

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, refresh_token, logged_out, created_at)
            VALUES (?, ?, '', 0, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(user_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StorageError::NotFound(format!("user {}", user_id))
            }
            other => database("Failed to create session", other),
        })?;

        Ok(record)
    }

    async fn session(&self, id: SessionId) -> StorageResult<SessionRecord> {
        let row = sqlx::query(
            "SELECT id, user_id, refresh_token, logged_out FROM sessions WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database("Failed to fetch session", e))?
        .ok_or_else(|| StorageError::NotFound(format!("session {}", id)))?;

        row_to_session(&row)
    }

    async fn update_session_token(
        &self,
        id: SessionId,
        refresh_token: &str,
    ) -> StorageResult<()> {
        let result = sqlx::query("UPDATE sessions SET refresh_token = ? WHERE id = ?")
            .bind(refresh_token)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| database("Failed to update session", e))?;
        ensure_affected(result, || format!("session {}", id))
    }

    async fn close_session(&self, id: SessionId) -> StorageResult<()> {
        let result = sqlx::query("UPDATE sessions SET logged_out = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| database("Failed to close session", e))?;
        ensure_affected(result, || format!("session {}", id))
    }

    async fn data_version(&self, user_id: UserId) -> StorageResult<u64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT data_version FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database("Failed to fetch data version", e))?;

        version
            .map(|v| v as u64)
            .ok_or_else(|| StorageError::NotFound(format!("user {}", user_id)))
    }

    async fn user_data(&self, user_id: UserId) -> StorageResult<UserData> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database("Failed to start read", e))?;

        let version: Option<i64> = sqlx::query_scalar("SELECT data_version FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| database("Failed to fetch data version", e))?;
        let version = version.ok_or_else(|| StorageError::NotFound(format!("user {}", user_id)))?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM items WHERE user_id = ? ORDER BY created_at",
            ITEM_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| database("Failed to fetch items", e))?;

        tx.commit()
            .await
            .map_err(|e| database("Failed to finish read", e))?;

        let items = rows
            .iter()
            .map(row_to_item)
            .collect::<StorageResult<Vec<Item>>>()?;
        Ok(UserData::new(version as u64, items))
    }

    async fn begin(&self, user_id: UserId) -> StorageResult<Box<dyn UserTransaction>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database("Failed to start transaction", e))?;

        // Takes the write lock before anything is read
        let result = sqlx::query("UPDATE users SET data_version = data_version WHERE id = ?")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| database("Failed to lock user", e))?;
        ensure_affected(result, || format!("user {}", user_id))?;

        Ok(Box::new(SqliteTransaction { tx, user_id }))
    }
}

/// One sqlx transaction over a user's items
struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
    user_id: UserId,
}

#[async_trait]
impl UserTransaction for SqliteTransaction {
    async fn data_version(&mut self) -> StorageResult<u64> {
        let version: i64 = sqlx::query_scalar("SELECT data_version FROM users WHERE id = ?")
            .bind(self.user_id.to_string())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| database("Failed to fetch data version", e))?;
        Ok(version as u64)
    }

    async fn create_item(&mut self, item: &Item) -> StorageResult<()> {
        let row = ItemRow::from_item(item)?;
        let created_at = row.created_at.unwrap_or_else(|| Utc::now().to_rfc3339());

        sqlx::query(
            r#"
            INSERT INTO items (user_id, id, version, kind, payload, meta, created_at, deleted_at)
            VALUES (?, ?, 1, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(self.user_id.to_string())
        .bind(item.id.as_string())
        .bind(row.kind)
        .bind(row.payload)
        .bind(row.meta)
        .bind(created_at)
        .bind(row.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::AlreadyExists(format!("item {}", item.id))
            }
            other => database("Failed to create item", other),
        })?;

        Ok(())
    }

    async fn update_item(&mut self, item: &Item) -> StorageResult<()> {
        let row = ItemRow::from_item(item)?;

        let result = sqlx::query(
            r#"
            UPDATE items SET
                version = version + 1, kind = ?, payload = ?, meta = ?, deleted_at = ?
            WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(row.kind)
        .bind(row.payload)
        .bind(row.meta)
        .bind(row.deleted_at)
        .bind(self.user_id.to_string())
        .bind(item.id.as_string())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| database("Failed to update item", e))?;

        ensure_affected(result, || format!("item {}", item.id))
    }

    async fn delete_item(&mut self, item: &Item) -> StorageResult<()> {
        let deleted_at = item.deleted_at.unwrap_or_else(Utc::now).to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE items SET
                version = version + 1, kind = NULL, payload = NULL, meta = '', deleted_at = ?
            WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(deleted_at)
        .bind(self.user_id.to_string())
        .bind(item.id.as_string())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| database("Failed to delete item", e))?;

        ensure_affected(result, || format!("item {}", item.id))
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<u64> {
        let version: i64 = sqlx::query_scalar(
            "UPDATE users SET data_version = data_version + 1 WHERE id = ? RETURNING data_version",
        )
        .bind(self.user_id.to_string())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| database("Failed to bump data version", e))?;

        self.tx
            .commit()
            .await
            .map_err(|e| database("Failed to commit", e))?;
        Ok(version as u64)
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| database("Failed to roll back", e))
    }
}
