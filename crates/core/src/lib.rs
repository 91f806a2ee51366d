pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;

pub use auth::{hash_password, verify_password, AuthError};
pub use domain::requisition::{
    NewRequisition, NewRequisitionItem, Requisition, RequisitionId, RequisitionItem,
    RequisitionStatus,
};
pub use domain::user::{NewUser, Role, User, UserId};
pub use errors::DomainError;
pub use lifecycle::{
    LifecycleAuthority, LifecycleError, TransitionAction, TransitionFields, TransitionOutcome,
    TransitionRequest,
};
