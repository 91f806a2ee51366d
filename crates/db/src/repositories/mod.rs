use async_trait::async_trait;
use thiserror::Error;

use reqflow_core::domain::requisition::{Requisition, RequisitionId, RequisitionStatus};
use reqflow_core::domain::user::{User, UserId};

pub mod memory;
pub mod requisition;
pub mod user;

pub use memory::{InMemoryRequisitionRepository, InMemoryUserRepository};
pub use requisition::SqlRequisitionRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    /// Whether the underlying failure was a unique-constraint violation
    /// (duplicate username or email on user creation).
    pub fn is_unique_violation(&self) -> bool {
        match self {
            RepositoryError::Database(sqlx::Error::Database(error)) => {
                matches!(error.kind(), sqlx::error::ErrorKind::UniqueViolation)
            }
            _ => false,
        }
    }
}

#[async_trait]
pub trait RequisitionRepository: Send + Sync {
    async fn create(&self, requisition: &Requisition) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        id: &RequisitionId,
    ) -> Result<Option<Requisition>, RepositoryError>;

    /// Lists records, optionally filtered by creator equality. Creator
    /// equality is the only supported predicate.
    async fn list(&self, created_by: Option<&UserId>) -> Result<Vec<Requisition>, RepositoryError>;

    /// Writes the new status together with its dependent fields, guarded
    /// by the expected current status. Returns false when the guard missed
    /// (record gone or concurrently transitioned).
    async fn apply_transition(
        &self,
        requisition: &Requisition,
        expected: RequisitionStatus,
    ) -> Result<bool, RepositoryError>;

    /// Replaces title, description, and items while the record is still
    /// draft or pending. Never touches status or its audit fields. Returns
    /// false when the record is missing or already past editing.
    async fn update_content(&self, requisition: &Requisition) -> Result<bool, RepositoryError>;

    /// Removes a record and its items. Returns false when nothing matched.
    async fn delete(&self, id: &RequisitionId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User, password_hash: &str) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;

    /// Resolves a login email to the profile plus its stored password
    /// hash.
    async fn find_by_email(&self, email: &str)
        -> Result<Option<(User, String)>, RepositoryError>;

    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
}
