#[cfg(feature = "database")]
use async_trait::async_trait;
#[cfg(feature = "database")]
use chrono::{DateTime, Utc};
#[cfg(feature = "database")]
use sqlx::{migrate::MigrateDatabase, Row, SqlitePool};
#[cfg(feature = "database")]
use tracing::info;

#[cfg(feature = "database")]
use crate::store::{validate_key, KeyValueStore, PipelineRecord, PipelineStore, StoreError};

#[cfg(feature = "database")]
/// SQLite-backed pipeline and session storage
pub struct SqliteStore {
    pool: SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteStore {
    /// Open (creating if needed) the database, optionally running migrations
    pub async fn new(database_url: &str, max_connections: u32, auto_migrate: bool) -> Result<Self, StoreError> {
        if let Some(parent) = database_url
            .strip_prefix("sqlite://")
            .and_then(|path| std::path::Path::new(path).parent())
        {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        if !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

#[cfg(feature = "database")]
fn parse_timestamp(pkey: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRecord {
            key: pkey.to_string(),
            reason: format!("bad timestamp '{raw}': {e}"),
        })
}

#[cfg(feature = "database")]
#[async_trait]
impl PipelineStore for SqliteStore {
    async fn get(&self, pkey: &str) -> Result<Option<PipelineRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT pkey, app_name, data, created, updated
            FROM pipeline
            WHERE pkey = ?1
            "#,
        )
        .bind(pkey)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let pkey: String = row.get("pkey");
        let created: String = row.get("created");
        let updated: String = row.get("updated");
        Ok(Some(PipelineRecord {
            created: parse_timestamp(&pkey, &created)?,
            updated: parse_timestamp(&pkey, &updated)?,
            app_name: row.get("app_name"),
            data: row.get("data"),
            pkey,
        }))
    }

    async fn put(&self, record: PipelineRecord) -> Result<(), StoreError> {
        validate_key(&record.pkey)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO pipeline (pkey, app_name, data, created, updated)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&record.pkey)
        .bind(&record.app_name)
        .bind(&record.data)
        .bind(record.created.to_rfc3339())
        .bind(record.updated.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, pkey: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM pipeline WHERE pkey = ?1")
            .bind(pkey)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn keys_for_app(&self, app_name: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT pkey FROM pipeline WHERE app_name = ?1 ORDER BY pkey ASC")
            .bind(app_name)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.get("pkey")).collect())
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get("value")))
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO store (key, value) VALUES (?1, ?2)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM store ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }
}
