use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequisitionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequisitionStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Processing,
    Completed,
}

impl RequisitionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequisitionStatus::Draft => "draft",
            RequisitionStatus::Pending => "pending",
            RequisitionStatus::Approved => "approved",
            RequisitionStatus::Rejected => "rejected",
            RequisitionStatus::Processing => "processing",
            RequisitionStatus::Completed => "completed",
        }
    }

    /// Terminal states have no outgoing edges in the lifecycle graph.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequisitionStatus::Rejected | RequisitionStatus::Completed)
    }
}

impl std::str::FromStr for RequisitionStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(RequisitionStatus::Draft),
            "pending" => Ok(RequisitionStatus::Pending),
            "approved" => Ok(RequisitionStatus::Approved),
            "rejected" => Ok(RequisitionStatus::Rejected),
            "processing" => Ok(RequisitionStatus::Processing),
            "completed" => Ok(RequisitionStatus::Completed),
            other => Err(DomainError::Validation(format!("unknown requisition status `{other}`"))),
        }
    }
}

impl std::fmt::Display for RequisitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line item owned by its parent requisition. The id exists for display
/// purposes only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub estimated_cost: Decimal,
    pub justification: String,
}

impl RequisitionItem {
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.estimated_cost
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requisition {
    pub id: RequisitionId,
    pub title: String,
    pub description: String,
    pub items: Vec<RequisitionItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_cost: Decimal,
    pub status: RequisitionStatus,
    pub created_by: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Requisition {
    /// The authoritative total: the sum of per-item quantity x estimated
    /// cost. Stored totals must always equal this.
    pub fn computed_total(items: &[RequisitionItem]) -> Decimal {
        items.iter().map(RequisitionItem::line_total).sum()
    }

    /// Record-level invariants, checked after load and before persist.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        if self.items.is_empty() {
            return Err(DomainError::InvariantViolation(
                "requisition must carry at least one item".to_string(),
            ));
        }
        if self.total_cost != Self::computed_total(&self.items) {
            return Err(DomainError::InvariantViolation(format!(
                "total cost {} does not match item sum {}",
                self.total_cost,
                Self::computed_total(&self.items)
            )));
        }
        if self.approved_by.is_some() && self.rejected_by.is_some() {
            return Err(DomainError::InvariantViolation(
                "requisition cannot carry both approvedBy and rejectedBy".to_string(),
            ));
        }
        if self.status == RequisitionStatus::Rejected
            && self.rejection_reason.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(DomainError::InvariantViolation(
                "rejected requisition must carry a rejection reason".to_string(),
            ));
        }
        Ok(())
    }

    pub fn can_transition_to(&self, next: RequisitionStatus) -> bool {
        use RequisitionStatus::{Approved, Completed, Draft, Pending, Processing, Rejected};

        matches!(
            (self.status, next),
            (Draft | Pending, Approved)
                | (Draft | Pending, Rejected)
                | (Approved, Processing)
                | (Processing, Completed)
        )
    }
}

/// Input shape for requisition creation. Any caller-supplied total is
/// ignored; the total is recomputed from the items.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequisition {
    pub title: String,
    pub description: String,
    pub items: Vec<NewRequisitionItem>,
    pub created_by: String,
    #[serde(default)]
    pub status: Option<RequisitionStatus>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequisitionItem {
    pub name: String,
    pub description: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub estimated_cost: Decimal,
    pub justification: String,
}

impl NewRequisition {
    /// Trims free-text fields and rejects shapes the store must never
    /// accept: empty title/description, no items, malformed items, or an
    /// entry status outside draft|pending.
    pub fn validate(&mut self) -> Result<(), DomainError> {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        self.created_by = self.created_by.trim().to_string();

        if self.title.is_empty() {
            return Err(DomainError::Validation("title is required".to_string()));
        }
        if self.description.is_empty() {
            return Err(DomainError::Validation("description is required".to_string()));
        }
        if self.created_by.is_empty() {
            return Err(DomainError::Validation("createdBy is required".to_string()));
        }
        if self.items.is_empty() {
            return Err(DomainError::Validation(
                "requisition must carry at least one item".to_string(),
            ));
        }
        for (index, item) in self.items.iter_mut().enumerate() {
            item.validate()
                .map_err(|error| DomainError::Validation(format!("item {}: {error}", index + 1)))?;
        }
        match self.status {
            None | Some(RequisitionStatus::Draft) | Some(RequisitionStatus::Pending) => {}
            Some(other) => {
                return Err(DomainError::Validation(format!(
                    "requisitions cannot be created in status `{other}`"
                )));
            }
        }

        Ok(())
    }

    pub fn entry_status(&self) -> RequisitionStatus {
        self.status.unwrap_or(RequisitionStatus::Draft)
    }
}

impl NewRequisitionItem {
    fn validate(&mut self) -> Result<(), DomainError> {
        self.name = self.name.trim().to_string();
        self.description = self.description.trim().to_string();
        self.justification = self.justification.trim().to_string();

        if self.name.is_empty() {
            return Err(DomainError::Validation("name is required".to_string()));
        }
        if self.description.is_empty() {
            return Err(DomainError::Validation("description is required".to_string()));
        }
        if self.quantity < 1 {
            return Err(DomainError::Validation("quantity must be at least 1".to_string()));
        }
        if self.estimated_cost < Decimal::ZERO {
            return Err(DomainError::Validation("estimated cost cannot be negative".to_string()));
        }
        if self.justification.is_empty() {
            return Err(DomainError::Validation("justification is required".to_string()));
        }

        Ok(())
    }
}
