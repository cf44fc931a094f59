//! herald demo binary
//!
//! Wires a handler registry for a chat-style `MessageReceived`
//! notification and exercises both fan-out paths: a caller-awaited
//! publish inside one unit-of-work scope, and a batch of fire-and-forget
//! dispatches running in their own scopes.

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use herald::{
    cli::Cli, config::Config, Dispatcher, HandlerRegistry, Notification, NotificationHandler,
    Publisher, Scope,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Span};
use tracing_subscriber::EnvFilter;

/// A chat message arriving from some gateway.
struct MessageReceived {
    channel: String,
    author: String,
    content: String,
}

impl Notification for MessageReceived {
    fn kind(&self) -> &'static str {
        "message_received"
    }

    fn log_scope(&self) -> Option<Span> {
        Some(info_span!(
            "notification",
            kind = self.kind(),
            channel = %self.channel,
            author = %self.author,
        ))
    }
}

/// Writes an audit entry for every message.
struct AuditLogHandler;

#[async_trait]
impl NotificationHandler<MessageReceived> for AuditLogHandler {
    async fn handle(
        &self,
        notification: &MessageReceived,
        _cancellation: &CancellationToken,
    ) -> Result<()> {
        info!(
            chars = notification.content.len(),
            "message recorded in audit log"
        );
        Ok(())
    }
}

/// Per-scope message statistics, resolved through the fan-out's scope so
/// concurrent dispatches never share an accumulator.
#[derive(Default)]
struct MessageStats {
    words: AtomicUsize,
}

struct StatsHandler {
    stats: Arc<MessageStats>,
}

impl StatsHandler {
    fn new(scope: &Scope) -> Self {
        Self {
            stats: scope.get_or_init(MessageStats::default),
        }
    }
}

#[async_trait]
impl NotificationHandler<MessageReceived> for StatsHandler {
    async fn handle(
        &self,
        notification: &MessageReceived,
        _cancellation: &CancellationToken,
    ) -> Result<()> {
        let words = notification.content.split_whitespace().count();
        let total = self.stats.words.fetch_add(words, Ordering::Relaxed) + words;
        metrics::counter!("demo.words_seen").increment(words as u64);
        info!(words, scope_total = total, "message statistics updated");
        Ok(())
    }
}

fn sample_message(author: &str, content: &str) -> MessageReceived {
    MessageReceived {
        channel: "general".to_string(),
        author: author.to_string(),
        content: content.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::builder().parse_lossy(&config.log_level))
        .init();

    info!(
        dispatch_timeout_ms = config.dispatch.dispatch_timeout_ms,
        "herald demo starting"
    );

    let registry = Arc::new(
        HandlerRegistry::builder()
            .subscribe::<MessageReceived, _, _>(|_scope| AuditLogHandler)
            .subscribe::<MessageReceived, _, _>(StatsHandler::new)
            .build(),
    );

    let publisher = Publisher::new(registry.clone());
    let dispatcher = Dispatcher::new(registry.clone(), &config.dispatch);

    // Caller-awaited fan-out: runs within this unit-of-work scope and
    // would fail the whole operation if any handler rejected the message.
    let scope = registry.create_scope();
    publisher
        .publish(
            &scope,
            &sample_message("alice", "hello from the strict path"),
            &CancellationToken::new(),
        )
        .await?;

    // Fire-and-forget fan-outs: each dispatch gets its own fresh scope.
    for content in [
        "first background message",
        "second background message",
        "third background message",
    ] {
        dispatcher.dispatch(sample_message("bob", content), None);
    }

    // Give the background fan-outs a moment to finish before exit.
    tokio::time::sleep(Duration::from_millis(200)).await;
    info!("herald demo complete");
    Ok(())
}
