//! # Plan Store
//!
//! In-memory view of every known float plan and emergency contact, backed
//! by the local database. Readers are public; writers are crate-private so
//! that only the lifecycle controller and reconciliation can change state.
//!
//! Writes persist first and update memory second, so a storage failure
//! leaves the in-memory view unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::local_db::{self, LocalDatabase};
use crate::shared::{EmergencyContact, EscalationStage, FloatPlan};

#[derive(Debug)]
pub struct PlanStore {
    plans: RwLock<HashMap<Uuid, FloatPlan>>,
    contacts: RwLock<Vec<EmergencyContact>>,
    db: Arc<LocalDatabase>,
}

impl PlanStore {
    /// Load the persisted snapshot
    pub async fn open(db: Arc<LocalDatabase>) -> local_db::Result<Self> {
        let plans = db.load_plans().await?;
        let contacts = db.load_contacts().await?;
        tracing::info!(
            "[DB] Loaded {} plans and {} contacts",
            plans.len(),
            contacts.len()
        );
        Ok(Self {
            plans: RwLock::new(plans.into_iter().map(|p| (p.id, p)).collect()),
            contacts: RwLock::new(contacts),
            db,
        })
    }

    /// All plans ordered by check-in deadline
    pub async fn list(&self) -> Vec<FloatPlan> {
        let mut plans: Vec<FloatPlan> = self.plans.read().await.values().cloned().collect();
        plans.sort_by(|a, b| {
            a.check_in_deadline
                .cmp(&b.check_in_deadline)
                .then_with(|| a.id.cmp(&b.id))
        });
        plans
    }

    pub async fn get(&self, plan_id: &Uuid) -> Option<FloatPlan> {
        self.plans.read().await.get(plan_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.plans.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plans.read().await.is_empty()
    }

    /// Active plans past their deadline at `now`
    pub async fn overdue_plans(&self, now: DateTime<Utc>) -> Vec<FloatPlan> {
        self.list()
            .await
            .into_iter()
            .filter(|plan| plan.is_overdue(now))
            .collect()
    }

    /// Active plans past their deadline with the escalation stage each has
    /// reached at `now`
    pub async fn escalations(&self, now: DateTime<Utc>) -> Vec<(FloatPlan, EscalationStage)> {
        self.list()
            .await
            .into_iter()
            .filter_map(|plan| match plan.escalation_stage(now) {
                Some(EscalationStage::OnSchedule) | None => None,
                Some(stage) => Some((plan, stage)),
            })
            .collect()
    }

    pub async fn contacts(&self) -> Vec<EmergencyContact> {
        self.contacts.read().await.clone()
    }

    pub async fn contact(&self, contact_id: &Uuid) -> Option<EmergencyContact> {
        self.contacts
            .read()
            .await
            .iter()
            .find(|c| c.id == *contact_id)
            .cloned()
    }

    pub(crate) async fn upsert(&self, plan: FloatPlan) -> local_db::Result<()> {
        let mut plans = self.plans.write().await;
        self.db.save_plan(&plan).await?;
        plans.insert(plan.id, plan);
        Ok(())
    }

    pub(crate) async fn remove(&self, plan_id: &Uuid) -> local_db::Result<Option<FloatPlan>> {
        let mut plans = self.plans.write().await;
        self.db.delete_plan(plan_id).await?;
        Ok(plans.remove(plan_id))
    }

    /// Replace the plan slice wholesale
    pub(crate) async fn replace_plans(&self, replacement: Vec<FloatPlan>) -> local_db::Result<()> {
        let mut plans = self.plans.write().await;
        self.db.replace_plans(&replacement).await?;
        *plans = replacement.into_iter().map(|p| (p.id, p)).collect();
        Ok(())
    }

    /// Replace the contact slice wholesale
    pub(crate) async fn replace_contacts(
        &self,
        replacement: Vec<EmergencyContact>,
    ) -> local_db::Result<()> {
        let mut contacts = self.contacts.write().await;
        self.db.replace_contacts(&replacement).await?;
        *contacts = replacement;
        Ok(())
    }
}
