//! ConnectionManager - Sole owner of the live channel.
//!
//! # State machine
//!
//! ```text
//! Disconnected ──connect──► Connecting ──open ok──► Connected
//!      ▲                        │                       │
//!      └────open failed─────────┘                       │
//!      └────disconnect() / backend closed link──────────┘
//! ```
//!
//! Every transition is published as `ConnectionChanged` through the event
//! registry and on a `watch` channel. There is no automatic retry.
//!
//! Inbound events are pumped from the link into the registry by one task
//! per link, preserving arrival order. A generation counter ties the pump
//! and any in-flight handshake to the link they belong to, so a stale link
//! can never flip the state of a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::adapters::events::EventRegistry;
use crate::domain::chat::{ChatEvent, ConnectionState};
use crate::domain::foundation::{AuthToken, CredentialStore};
use crate::ports::{ActionSink, ClientAction, Transport, TransportLink};

use super::errors::ChatError;

enum Channel {
    Idle,
    Opening {
        generation: u64,
    },
    Open {
        generation: u64,
        sink: Box<dyn ActionSink>,
        pump: JoinHandle<()>,
    },
}

impl Channel {
    fn is_generation(&self, expected: u64) -> bool {
        match self {
            Channel::Idle => false,
            Channel::Opening { generation } | Channel::Open { generation, .. } => {
                *generation == expected
            }
        }
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    registry: EventRegistry,
    credentials: Arc<CredentialStore>,
    channel: Mutex<Channel>,
    state: watch::Sender<ConnectionState>,
    generation: AtomicU64,
}

impl Inner {
    fn channel(&self) -> MutexGuard<'_, Channel> {
        self.channel.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publishes a state change. Never called with the channel lock held.
    fn transition(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::info!(state = %next, "Connection state changed");
            self.registry.dispatch(&ChatEvent::ConnectionChanged(next));
        }
    }

    fn link_closed(&self, generation: u64) {
        let previous = {
            let mut channel = self.channel();
            if !channel.is_generation(generation) {
                return;
            }
            std::mem::replace(&mut *channel, Channel::Idle)
        };
        if let Channel::Open { sink, .. } = previous {
            sink.close();
        }
        tracing::warn!(generation, "Live channel closed by backend");
        self.transition(ConnectionState::Disconnected);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let channel = self.channel.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Channel::Open { sink, pump, .. } = std::mem::replace(channel, Channel::Idle) {
            pump.abort();
            sink.close();
        }
    }
}

/// Owns the single transport connection of a client session.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: EventRegistry,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                transport,
                registry,
                credentials,
                channel: Mutex::new(Channel::Idle),
                state,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Opens the live channel with the given credential.
    ///
    /// A no-op while already connecting or connected. Failure is reported
    /// through the state (back to `Disconnected`), never retried.
    pub async fn connect(&self, token: AuthToken) -> ConnectionState {
        let generation = {
            let mut channel = self.inner.channel();
            if !matches!(*channel, Channel::Idle) {
                tracing::debug!("connect() ignored, channel already active");
                return self.state();
            }
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *channel = Channel::Opening { generation };
            generation
        };

        self.inner.credentials.set(token.clone());
        self.inner.transition(ConnectionState::Connecting);

        match self.inner.transport.open(&token).await {
            Ok(link) => self.install(link, generation),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open live channel");
                let abandoned = {
                    let mut channel = self.inner.channel();
                    if channel.is_generation(generation) {
                        *channel = Channel::Idle;
                        true
                    } else {
                        false
                    }
                };
                if abandoned {
                    self.inner.transition(ConnectionState::Disconnected);
                }
            }
        }

        self.state()
    }

    fn install(&self, link: TransportLink, generation: u64) {
        let TransportLink { sink, events } = link;
        let (ready_tx, ready_rx) = oneshot::channel();

        {
            let mut channel = self.inner.channel();
            if !channel.is_generation(generation) {
                // disconnect() won the race against the handshake
                drop(channel);
                sink.close();
                return;
            }
            let pump = tokio::spawn(pump_events(
                Arc::downgrade(&self.inner),
                self.inner.registry.clone(),
                events,
                ready_rx,
                generation,
            ));
            *channel = Channel::Open {
                generation,
                sink,
                pump,
            };
        }

        self.inner.transition(ConnectionState::Connected);
        let _ = ready_tx.send(());

        // A disconnect() between install and the publish above must win
        if !self.inner.channel().is_generation(generation) {
            self.inner.transition(ConnectionState::Disconnected);
        }
    }

    /// Tears the live channel down.
    ///
    /// Idempotent: when already disconnected nothing happens and no event is
    /// published. A handshake still in flight is abandoned.
    pub fn disconnect(&self) {
        let previous = std::mem::replace(&mut *self.inner.channel(), Channel::Idle);
        match previous {
            Channel::Idle => return,
            Channel::Opening { .. } => {}
            Channel::Open { sink, pump, .. } => {
                pump.abort();
                sink.close();
            }
        }
        self.inner.transition(ConnectionState::Disconnected);
    }

    /// Hands an action to the open link.
    ///
    /// Fails with [`ChatError::NotConnected`] when no link is open; nothing
    /// was sent in that case. A link that fails while accepting the action
    /// yields a 503 request failure; the action may or may not have left.
    pub fn emit(&self, action: ClientAction) -> Result<(), ChatError> {
        let channel = self.inner.channel();
        match &*channel {
            Channel::Open { sink, .. } => {
                let chat_id = action.chat_id().clone();
                let event = action.event_name();
                sink.submit(action).map_err(|e| {
                    tracing::warn!(chat_id = %chat_id, event, error = %e, "Live send failed");
                    ChatError::connection_lost(&e)
                })
            }
            _ => Err(ChatError::NotConnected),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.inner.registry
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.inner.credentials
    }
}

async fn pump_events(
    inner: Weak<Inner>,
    registry: EventRegistry,
    mut events: mpsc::UnboundedReceiver<ChatEvent>,
    ready: oneshot::Receiver<()>,
    generation: u64,
) {
    // Hold events until Connected has been published
    let _ = ready.await;

    while let Some(event) = events.recv().await {
        if let ChatEvent::TransportError(e) = &event {
            tracing::debug!(message = %e.message, "Backend reported an error");
        }
        registry.dispatch(&event);
    }

    if let Some(inner) = inner.upgrade() {
        inner.link_closed(generation);
    }
}
