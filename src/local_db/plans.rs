//! Plan and contact snapshot persistence.
//!
//! Each record is stored as its JSON body keyed by id; `status` and
//! `check_in_deadline` are duplicated into columns for inspection.

use sqlx::Row;
use uuid::Uuid;

use crate::local_db::{LocalDatabase, Result};
use crate::shared::{EmergencyContact, FloatPlan};

fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| sqlx::Error::Protocol(format!("JSON serialization error: {}", e)))
}

fn decode<T: serde::de::DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

impl LocalDatabase {
    /// Insert or replace one plan
    pub async fn save_plan(&self, plan: &FloatPlan) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO float_plans (id, status, check_in_deadline, data, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(plan.id.to_string())
        .bind(plan.status.as_str())
        .bind(plan.check_in_deadline.to_rfc3339())
        .bind(encode(plan)?)
        .bind(plan.updated_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Delete one plan; deleting a missing plan is a no-op
    pub async fn delete_plan(&self, plan_id: &Uuid) -> Result<()> {
        sqlx::query("DELETE FROM float_plans WHERE id = ?")
            .bind(plan_id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Load every stored plan
    pub async fn load_plans(&self) -> Result<Vec<FloatPlan>> {
        let rows = sqlx::query("SELECT data FROM float_plans ORDER BY check_in_deadline ASC")
            .fetch_all(self.pool())
            .await?;

        rows.iter()
            .map(|row| {
                let data: String = row.try_get("data")?;
                decode(&data)
            })
            .collect()
    }

    /// Replace the whole plan snapshot atomically
    pub async fn replace_plans(&self, plans: &[FloatPlan]) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM float_plans").execute(&mut *tx).await?;
        for plan in plans {
            sqlx::query(
                "INSERT INTO float_plans (id, status, check_in_deadline, data, updated_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(plan.id.to_string())
            .bind(plan.status.as_str())
            .bind(plan.check_in_deadline.to_rfc3339())
            .bind(encode(plan)?)
            .bind(plan.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }

    /// Load every cached emergency contact
    pub async fn load_contacts(&self) -> Result<Vec<EmergencyContact>> {
        let rows = sqlx::query("SELECT data FROM emergency_contacts")
            .fetch_all(self.pool())
            .await?;

        rows.iter()
            .map(|row| {
                let data: String = row.try_get("data")?;
                decode(&data)
            })
            .collect()
    }

    /// Replace the whole contact snapshot atomically
    pub async fn replace_contacts(&self, contacts: &[EmergencyContact]) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM emergency_contacts").execute(&mut *tx).await?;
        for contact in contacts {
            sqlx::query("INSERT INTO emergency_contacts (id, data) VALUES (?, ?)")
                .bind(contact.id.to_string())
                .bind(encode(contact)?)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }
}
