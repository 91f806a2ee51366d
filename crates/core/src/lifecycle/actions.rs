use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::requisition::{Requisition, RequisitionStatus};
use crate::domain::user::{Role, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionAction {
    Approve,
    Reject,
    Process,
    Complete,
}

impl TransitionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionAction::Approve => "approve",
            TransitionAction::Reject => "reject",
            TransitionAction::Process => "process",
            TransitionAction::Complete => "complete",
        }
    }

    /// Minimum role rank allowed to trigger this action.
    pub fn required_role(self) -> Role {
        match self {
            TransitionAction::Approve | TransitionAction::Reject => Role::Manager,
            TransitionAction::Process | TransitionAction::Complete => Role::Admin,
        }
    }

    pub fn target_status(self) -> RequisitionStatus {
        match self {
            TransitionAction::Approve => RequisitionStatus::Approved,
            TransitionAction::Reject => RequisitionStatus::Rejected,
            TransitionAction::Process => RequisitionStatus::Processing,
            TransitionAction::Complete => RequisitionStatus::Completed,
        }
    }
}

impl std::fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition attempt by a resolved actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionRequest {
    pub action: TransitionAction,
    pub actor_id: UserId,
    pub actor_role: Role,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// Side-effect fields a transition writes together with the new status.
/// `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionFields {
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<UserId>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub processing_notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: RequisitionStatus,
    pub to: RequisitionStatus,
    pub action: TransitionAction,
    pub fields: TransitionFields,
}

impl TransitionOutcome {
    /// Applies the new status and its dependent fields in one step, so a
    /// record can never end up with a status detached from its audit
    /// fields.
    pub fn apply_to(&self, requisition: &mut Requisition, now: DateTime<Utc>) {
        requisition.status = self.to;

        if let Some(approved_by) = &self.fields.approved_by {
            requisition.approved_by = Some(approved_by.clone());
        }
        if let Some(approved_at) = self.fields.approved_at {
            requisition.approved_at = Some(approved_at);
        }
        if let Some(rejected_by) = &self.fields.rejected_by {
            requisition.rejected_by = Some(rejected_by.clone());
        }
        if let Some(rejected_at) = self.fields.rejected_at {
            requisition.rejected_at = Some(rejected_at);
        }
        if let Some(rejection_reason) = &self.fields.rejection_reason {
            requisition.rejection_reason = Some(rejection_reason.clone());
        }
        if let Some(processing_notes) = &self.fields.processing_notes {
            requisition.processing_notes = Some(processing_notes.clone());
        }

        requisition.updated_at = now;
    }
}
