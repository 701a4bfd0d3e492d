//! Float Plan Data Structure
//!
//! A float plan is the safety record for one trip: where the vessel is going,
//! who is aboard, and when the skipper promises to check in. If that deadline
//! passes without a check-in, the plan's emergency contacts are escalated.
//!
//! # Status vs. derived conditions
//!
//! Only [`PlanStatus`] is stored. "Overdue" and the escalation stage are
//! computed from the status and the deadline at read time, so they can never
//! drift out of sync with the clock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::SharedError;

/// Stored lifecycle status of a float plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Being drafted; no deadline armed
    Draft,
    /// Trip underway; deadline armed
    Active,
    /// Trip resolved by a check-in
    CheckedIn,
}

impl PlanStatus {
    /// Stable lowercase name, used for storage and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Active => "active",
            PlanStatus::CheckedIn => "checked_in",
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an Active plan sits on the escalation timeline.
///
/// Never persisted; see [`FloatPlan::escalation_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationStage {
    /// Deadline not yet reached
    OnSchedule,
    /// Past the deadline, still inside the grace period
    Overdue,
    /// Grace period elapsed; the primary contact is being alerted
    PrimaryAlerted,
    /// Primary did not respond within the escalation wait
    SecondaryEscalated,
}

/// Details the skipper supplies when checking in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckInReport {
    /// Free-form notes ("back at the dock, all well")
    pub notes: Option<String>,
    /// Latitude/longitude at check-in time, if known
    pub position: Option<(f64, f64)>,
}

/// An emergency contact referenced by float plans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergencyContact {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

/// The safety record for one trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FloatPlan {
    /// Unique plan identifier
    pub id: Uuid,
    /// Vessel name
    pub vessel_name: String,
    /// Departure point
    pub departure: String,
    /// Destination
    pub destination: String,
    /// Free-form route description
    pub route_notes: Option<String>,
    /// Number of people aboard
    pub persons_aboard: u32,
    /// Stored lifecycle status
    pub status: PlanStatus,
    /// When the skipper promised to check in
    pub check_in_deadline: DateTime<Utc>,
    /// Minutes after the deadline before the primary contact is alerted
    pub grace_period_minutes: i64,
    /// Minutes after the primary alert before the secondary contact is escalated
    pub escalation_wait_minutes: i64,
    /// When the skipper last checked in
    pub last_check_in: Option<DateTime<Utc>>,
    /// Report captured with the last check-in
    pub check_in_report: Option<CheckInReport>,
    /// Primary emergency contact
    pub primary_contact_id: Option<Uuid>,
    /// Secondary emergency contact
    pub secondary_contact_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FloatPlan {
    /// Create a new draft plan with default grace and escalation windows.
    pub fn new(vessel_name: impl Into<String>, check_in_deadline: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            vessel_name: vessel_name.into(),
            departure: String::new(),
            destination: String::new(),
            route_notes: None,
            persons_aboard: 1,
            status: PlanStatus::Draft,
            check_in_deadline,
            grace_period_minutes: 30,
            escalation_wait_minutes: 60,
            last_check_in: None,
            check_in_report: None,
            primary_contact_id: None,
            secondary_contact_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the plan is Active and past its deadline at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PlanStatus::Active && now > self.check_in_deadline
    }

    /// When the primary contact gets alerted.
    pub fn primary_alert_at(&self) -> DateTime<Utc> {
        self.check_in_deadline + Duration::minutes(self.grace_period_minutes)
    }

    /// When the secondary contact gets escalated.
    pub fn escalation_at(&self) -> DateTime<Utc> {
        self.primary_alert_at() + Duration::minutes(self.escalation_wait_minutes)
    }

    /// Escalation stage at `now`; `None` unless the plan is Active.
    pub fn escalation_stage(&self, now: DateTime<Utc>) -> Option<EscalationStage> {
        if self.status != PlanStatus::Active {
            return None;
        }
        let stage = if now <= self.check_in_deadline {
            EscalationStage::OnSchedule
        } else if now <= self.primary_alert_at() {
            EscalationStage::Overdue
        } else if now <= self.escalation_at() {
            EscalationStage::PrimaryAlerted
        } else {
            EscalationStage::SecondaryEscalated
        };
        Some(stage)
    }

    /// Validate user-editable fields.
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.vessel_name.trim().is_empty() {
            return Err(SharedError::validation("vessel_name", "Vessel name cannot be empty"));
        }
        if self.grace_period_minutes < 0 {
            return Err(SharedError::validation(
                "grace_period_minutes",
                "Grace period cannot be negative",
            ));
        }
        if self.escalation_wait_minutes < 0 {
            return Err(SharedError::validation(
                "escalation_wait_minutes",
                "Escalation wait cannot be negative",
            ));
        }
        Ok(())
    }
}

/// Free function form of [`FloatPlan::is_overdue`] for UI readers.
pub fn is_overdue(plan: &FloatPlan, now: DateTime<Utc>) -> bool {
    plan.is_overdue(now)
}

/// A partial edit of a plan's user-editable fields.
///
/// `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanEdit {
    pub vessel_name: Option<String>,
    pub departure: Option<String>,
    pub destination: Option<String>,
    pub route_notes: Option<String>,
    pub persons_aboard: Option<u32>,
    pub check_in_deadline: Option<DateTime<Utc>>,
    pub grace_period_minutes: Option<i64>,
    pub escalation_wait_minutes: Option<i64>,
    pub primary_contact_id: Option<Uuid>,
    pub secondary_contact_id: Option<Uuid>,
}

impl PlanEdit {
    /// Apply the edit to `plan`, returning whether the deadline moved.
    pub fn apply_to(&self, plan: &mut FloatPlan) -> bool {
        if let Some(v) = &self.vessel_name {
            plan.vessel_name = v.clone();
        }
        if let Some(v) = &self.departure {
            plan.departure = v.clone();
        }
        if let Some(v) = &self.destination {
            plan.destination = v.clone();
        }
        if let Some(v) = &self.route_notes {
            plan.route_notes = Some(v.clone());
        }
        if let Some(v) = self.persons_aboard {
            plan.persons_aboard = v;
        }
        if let Some(v) = self.grace_period_minutes {
            plan.grace_period_minutes = v;
        }
        if let Some(v) = self.escalation_wait_minutes {
            plan.escalation_wait_minutes = v;
        }
        if let Some(v) = self.primary_contact_id {
            plan.primary_contact_id = Some(v);
        }
        if let Some(v) = self.secondary_contact_id {
            plan.secondary_contact_id = Some(v);
        }
        match self.check_in_deadline {
            Some(deadline) if deadline != plan.check_in_deadline => {
                plan.check_in_deadline = deadline;
                true
            }
            _ => false,
        }
    }
}
