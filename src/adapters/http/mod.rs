//! HTTP adapter - REST client for chat snapshots.
//!
//! Used for initial state and as the send path while the live channel is down.

mod dto;
mod snapshot_client;

pub use snapshot_client::{HttpSnapshotClient, HttpSnapshotConfig};
