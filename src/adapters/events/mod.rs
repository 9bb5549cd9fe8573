//! Event fan-out adapters.
//!
//! - `EventRegistry` - Synchronous, in-process registry keyed by event kind

mod registry;

pub use registry::{DispatchOutcome, EventRegistry, Subscription, SubscriptionId};
