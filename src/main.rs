//! # market-chat
//!
//! Demo client: connects as the configured user, loads the chat list, joins
//! every chat and logs live events until Ctrl-C.

use anyhow::Context;
use tracing::{info, warn};

use market_chat::application::ChatClient;
use market_chat::config::AppConfig;
use market_chat::domain::chat::{ChatEvent, ConnectionState, EventKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Load configuration
    // -----------------------------------------------------------------------
    let config = AppConfig::load().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    // -----------------------------------------------------------------------
    // 2. Initialize tracing (RUST_LOG overrides the configured level)
    // -----------------------------------------------------------------------
    let filter = config.logging.env_filter()?;
    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting market-chat v{}", env!("CARGO_PKG_VERSION"));
    info!(base_url = %config.api.base_url, user = %config.session.user_id, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Build the client and log every event
    // -----------------------------------------------------------------------
    let client = ChatClient::from_config(&config)?;
    let _subscriptions: Vec<_> = EventKind::ALL
        .iter()
        .map(|kind| client.registry().on(*kind, "demo-log", log_event))
        .collect();

    // -----------------------------------------------------------------------
    // 4. Snapshot first, then the live channel
    // -----------------------------------------------------------------------
    let summaries = client.load_chat_list().await?;
    info!(chats = summaries.len(), unread = client.view().total_unread(), "Chat list loaded");

    let state = client.connect_with_stored_token().await?;
    if state != ConnectionState::Connected {
        warn!(?state, "Live channel not available, continuing with snapshots only");
    }

    for summary in &summaries {
        if let Err(e) = client.open_chat(&summary.id).await {
            warn!(chat_id = %summary.id, error = %e, "Failed to open chat");
        }
    }

    // -----------------------------------------------------------------------
    // 5. Run until interrupted
    // -----------------------------------------------------------------------
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutting down");
    client.disconnect();

    Ok(())
}

fn log_event(event: &ChatEvent) {
    match event {
        ChatEvent::ConnectionChanged(state) => info!(?state, "Connection changed"),
        ChatEvent::NewMessage(e) => info!(
            chat_id = %e.chat_id,
            sender = %e.message.sender_id(),
            content = %e.message.content,
            "New message"
        ),
        ChatEvent::ChatNotification(e) => info!(
            chat_id = %e.chat_id,
            sender = e.sender.as_deref().unwrap_or("unknown"),
            "Chat notification"
        ),
        ChatEvent::UserTyping(e) => info!(
            user_id = %e.user_id,
            is_typing = e.is_typing,
            "Typing"
        ),
        ChatEvent::MessagesRead(e) => info!(chat_id = %e.chat_id, read_by = %e.read_by, "Messages read"),
        ChatEvent::TransportError(e) => warn!(message = %e.message, "Backend error"),
    }
}
