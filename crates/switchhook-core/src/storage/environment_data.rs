//! PostgreSQL repository for environment samples.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{is_valid_table_name, EnvironmentRepository};
use crate::{
    error::{CoreError, Result},
    models::EnvironmentData,
};

/// Repository writing [`EnvironmentData`] rows to a configurable table.
///
/// Rows are keyed by `(device_id, recorded_at)`.
#[derive(Debug, Clone)]
pub struct PgEnvironmentRepository {
    pool: Arc<PgPool>,
    table: String,
}

impl PgEnvironmentRepository {
    /// Creates a repository writing to `table`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if `table` is not a plain SQL
    /// identifier.
    pub fn new(pool: Arc<PgPool>, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            return Err(CoreError::InvalidInput(format!("invalid table name: {table:?}")));
        }
        Ok(Self { pool, table })
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Returns the table this repository writes to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the sample table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        let ddl = format!(
            r"
            CREATE TABLE IF NOT EXISTS {table} (
                device_id TEXT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL,
                temperature DOUBLE PRECISION NOT NULL CHECK (temperature BETWEEN -50 AND 60),
                humidity DOUBLE PRECISION NOT NULL CHECK (humidity BETWEEN 0 AND 100),
                brightness DOUBLE PRECISION NOT NULL CHECK (brightness BETWEEN 0 AND 100),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (device_id, recorded_at)
            )
            ",
            table = self.table
        );

        sqlx::query(&ddl).execute(&*self.pool).await?;
        Ok(())
    }

    /// Inserts a sample, replacing any existing row with the same key.
    pub async fn upsert(&self, data: &EnvironmentData) -> Result<()> {
        let sql = format!(
            r"
            INSERT INTO {table} (device_id, recorded_at, temperature, humidity, brightness, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (device_id, recorded_at) DO UPDATE
            SET temperature = EXCLUDED.temperature,
                humidity = EXCLUDED.humidity,
                brightness = EXCLUDED.brightness,
                created_at = EXCLUDED.created_at
            ",
            table = self.table
        );

        sqlx::query(&sql)
            .bind(data.device_id())
            .bind(data.timestamp())
            .bind(data.temperature())
            .bind(data.humidity())
            .bind(data.brightness())
            .execute(&*self.pool)
            .await?;

        debug!(device_id = %data.device_id(), table = %self.table, "Environment sample stored");
        Ok(())
    }
}

#[async_trait]
impl EnvironmentRepository for PgEnvironmentRepository {
    async fn save(&self, data: &EnvironmentData) -> Result<()> {
        self.upsert(data).await
    }

    async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repository_rejects_unsafe_table_names() {
        let pool = Arc::new(PgPool::connect_lazy("postgresql://test").unwrap());

        assert!(PgEnvironmentRepository::new(pool.clone(), "environment_data").is_ok());
        assert!(matches!(
            PgEnvironmentRepository::new(pool, "samples; --"),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
