//! Domain layer containing the chat model and its invariants.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, credentials, errors)
//! - `chat` - Chats, messages, events, typing state and timelines

pub mod chat;
pub mod foundation;
