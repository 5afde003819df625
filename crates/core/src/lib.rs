pub mod config;
pub mod domain;
pub mod errors;
pub mod permissions;

pub use domain::submission::{LoaForm, LoaStatus, LoaSubmission, ReviewDecision, UserId};
pub use errors::{ApplicationError, DomainError, ErrorDisposition};
pub use permissions::{AccessDecision, Permission, RolePolicy};
