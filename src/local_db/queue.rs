//! # Offline Queue Persistence
//!
//! Stores pending operations in the `offline_queue` table. Rows are read
//! back in creation order; `seq` breaks ties between operations created in
//! the same instant.

use sqlx::Row;
use uuid::Uuid;

use crate::local_db::{parse_timestamp, parse_uuid, LocalDatabase, Result};
use crate::offline::queue::{HttpVerb, Operation, OperationKind};

impl LocalDatabase {
    /// Add an operation to the offline queue, removing `superseded` rows in
    /// the same transaction
    pub async fn add_to_offline_queue(
        &self,
        operation: &Operation,
        superseded: &[Uuid],
    ) -> Result<()> {
        let data = serde_json::to_string(&operation.payload)
            .map_err(|e| sqlx::Error::Protocol(format!("JSON serialization error: {}", e)))?;

        let mut tx = self.pool().begin().await?;

        for id in superseded {
            sqlx::query("DELETE FROM offline_queue WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT INTO offline_queue
                (id, operation_type, plan_id, resource_path, verb, data, created_at, retry_count, last_attempt, error_message)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(operation.id.to_string())
        .bind(operation.kind.as_str())
        .bind(operation.plan_id.to_string())
        .bind(&operation.resource_path)
        .bind(operation.verb.as_str())
        .bind(&data)
        .bind(operation.created_at.to_rfc3339())
        .bind(i64::from(operation.retry_count))
        .bind(operation.last_attempt.map(|t| t.to_rfc3339()))
        .bind(operation.last_error.as_deref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// Load every queued operation in creation order
    ///
    /// Rows with an unknown operation type or verb are skipped with a warning.
    pub async fn load_operations(&self) -> Result<Vec<Operation>> {
        let rows = sqlx::query(
            "SELECT id, operation_type, plan_id, resource_path, verb, data, created_at,
                    retry_count, last_attempt, error_message
             FROM offline_queue
             ORDER BY created_at ASC, seq ASC",
        )
        .fetch_all(self.pool())
        .await?;

        let mut operations = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let operation_type: String = row.try_get("operation_type")?;
            let verb: String = row.try_get("verb")?;

            let (Some(kind), Some(verb)) = (OperationKind::parse(&operation_type), HttpVerb::parse(&verb))
            else {
                tracing::warn!("[DB] Skipping queued operation {} with unknown type {}", id, operation_type);
                continue;
            };

            let data: String = row.try_get("data")?;
            let payload =
                serde_json::from_str(&data).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            let created_at: String = row.try_get("created_at")?;
            let retry_count: i64 = row.try_get("retry_count")?;
            let last_attempt: Option<String> = row.try_get("last_attempt")?;
            let plan_id: String = row.try_get("plan_id")?;

            operations.push(Operation {
                id: parse_uuid(&id)?,
                kind,
                plan_id: parse_uuid(&plan_id)?,
                resource_path: row.try_get("resource_path")?,
                verb,
                payload,
                created_at: parse_timestamp(&created_at)?,
                retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
                last_attempt: last_attempt.as_deref().map(parse_timestamp).transpose()?,
                last_error: row.try_get("error_message")?,
            });
        }

        Ok(operations)
    }

    /// Delete a confirmed or dropped operation
    pub async fn complete_operation(&self, operation_id: &Uuid) -> Result<()> {
        sqlx::query("DELETE FROM offline_queue WHERE id = ?")
            .bind(operation_id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Replace a queued operation's request body
    pub async fn update_operation_payload(&self, operation: &Operation) -> Result<()> {
        let data = serde_json::to_string(&operation.payload)
            .map_err(|e| sqlx::Error::Protocol(format!("JSON serialization error: {}", e)))?;

        sqlx::query("UPDATE offline_queue SET data = ? WHERE id = ?")
            .bind(&data)
            .bind(operation.id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Persist an operation's retry bookkeeping
    pub async fn update_operation_retry(&self, operation: &Operation) -> Result<()> {
        sqlx::query(
            "UPDATE offline_queue SET
                retry_count = ?,
                last_attempt = ?,
                error_message = ?
             WHERE id = ?",
        )
        .bind(i64::from(operation.retry_count))
        .bind(operation.last_attempt.map(|t| t.to_rfc3339()))
        .bind(operation.last_error.as_deref())
        .bind(operation.id.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
