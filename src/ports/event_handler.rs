//! EventHandler port - Interface for local subscribers of chat events.
//!
//! Handlers register with the event registry for one [`EventKind`] and are
//! invoked synchronously for every matching event.

use thiserror::Error;

use crate::domain::chat::{ChatEvent, EventKind};

/// A handler failed while processing an event.
///
/// Contained by the registry: logged, never propagated to the transport and
/// never stops delivery to other handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{handler} failed on {kind}: {message}")]
pub struct DispatchError {
    pub handler: String,
    pub kind: EventKind,
    pub message: String,
}

impl DispatchError {
    pub fn new(handler: impl Into<String>, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Handler for processing chat events.
///
/// Implementations should be:
/// - **Quick** - dispatch is synchronous on the session's event loop
/// - **Isolated** - errors and panics don't affect other handlers
///
/// # Example
///
/// ```ignore
/// struct UnreadBadge { /* ... */ }
///
/// impl EventHandler for UnreadBadge {
///     fn handle(&self, event: &ChatEvent) -> Result<(), DispatchError> {
///         // update badge...
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "UnreadBadge"
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Process an event.
    fn handle(&self, event: &ChatEvent) -> Result<(), DispatchError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Adapts a closure into an [`EventHandler`].
pub struct FnHandler<F> {
    name: &'static str,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&ChatEvent) + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&ChatEvent) + Send + Sync,
{
    fn handle(&self, event: &ChatEvent) -> Result<(), DispatchError> {
        (self.f)(event);
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
