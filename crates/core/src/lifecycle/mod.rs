pub mod actions;
pub mod engine;

pub use actions::{TransitionAction, TransitionFields, TransitionOutcome, TransitionRequest};
pub use engine::{LifecycleAuthority, LifecycleError};
