use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::requisition::{Requisition, RequisitionStatus};
use crate::domain::user::Role;
use crate::lifecycle::actions::{
    TransitionAction, TransitionFields, TransitionOutcome, TransitionRequest,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid requisition transition from {from} to {to}")]
    IllegalTransition { from: RequisitionStatus, to: RequisitionStatus },
    #[error("role {actor_role} may not {action} a requisition (requires {required_role} or higher)")]
    Authorization { action: TransitionAction, actor_role: Role, required_role: Role },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("requisitions can only be deleted while draft (current status {status})")]
    DeleteRestricted { status: RequisitionStatus },
}

/// The only sanctioned way to change a requisition's status. Callers never
/// write status or its dependent audit fields directly; they ask the
/// authority to evaluate a transition and persist the produced outcome.
///
/// Checks run in a fixed order: actor role, then state legality, then
/// input validation. A failure at any step leaves the record untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleAuthority;

impl LifecycleAuthority {
    pub fn evaluate(
        &self,
        requisition: &Requisition,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let required_role = request.action.required_role();
        if !request.actor_role.satisfies(required_role) {
            return Err(LifecycleError::Authorization {
                action: request.action,
                actor_role: request.actor_role,
                required_role,
            });
        }

        let to = request.action.target_status();
        if !requisition.can_transition_to(to) {
            return Err(LifecycleError::IllegalTransition { from: requisition.status, to });
        }

        let fields = match request.action {
            TransitionAction::Approve => TransitionFields {
                approved_by: Some(request.actor_id.clone()),
                approved_at: Some(now),
                processing_notes: trimmed(request.notes.as_deref()),
                ..TransitionFields::default()
            },
            TransitionAction::Reject => {
                let Some(reason) = trimmed(request.reason.as_deref()) else {
                    return Err(LifecycleError::Validation(
                        "rejection reason is required".to_string(),
                    ));
                };
                TransitionFields {
                    rejected_by: Some(request.actor_id.clone()),
                    rejected_at: Some(now),
                    rejection_reason: Some(reason),
                    ..TransitionFields::default()
                }
            }
            TransitionAction::Process => TransitionFields {
                processing_notes: append_notes(
                    requisition.processing_notes.as_deref(),
                    request.notes.as_deref(),
                ),
                ..TransitionFields::default()
            },
            TransitionAction::Complete => TransitionFields::default(),
        };

        Ok(TransitionOutcome { from: requisition.status, to, action: request.action, fields })
    }

    /// Deletion is scoped to drafts; anything already submitted stays on
    /// record.
    pub fn authorize_delete(&self, requisition: &Requisition) -> Result<(), LifecycleError> {
        if requisition.status != RequisitionStatus::Draft {
            return Err(LifecycleError::DeleteRestricted { status: requisition.status });
        }
        Ok(())
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(ToString::to_string)
}

fn append_notes(existing: Option<&str>, addition: Option<&str>) -> Option<String> {
    let addition = trimmed(addition)?;
    match existing.map(str::trim).filter(|notes| !notes.is_empty()) {
        Some(notes) => Some(format!("{notes}\n{addition}")),
        None => Some(addition),
    }
}
