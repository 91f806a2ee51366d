use thiserror::Error;

use crate::lifecycle::LifecycleError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use crate::domain::requisition::RequisitionStatus;
    use crate::errors::DomainError;
    use crate::lifecycle::LifecycleError;

    #[test]
    fn lifecycle_errors_convert_transparently() {
        let error: DomainError = LifecycleError::IllegalTransition {
            from: RequisitionStatus::Completed,
            to: RequisitionStatus::Pending,
        }
        .into();

        assert!(error.to_string().contains("completed"));
        assert!(error.to_string().contains("pending"));
    }
}
