//! Market Chat - Real-time chat client core for the marketplace.
//!
//! Maintains the live connection to the messaging backend, fans inbound
//! events out to local subscribers, and reconciles REST snapshots with the
//! live stream so the view never duplicates or loses messages.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
