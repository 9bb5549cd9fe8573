//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, credentials, error types and the
//! state machine trait that form the vocabulary of the chat core.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthToken, CredentialStore};
pub use errors::ValidationError;
pub use ids::{ChatId, ItemId, MessageId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
