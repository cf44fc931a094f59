//! Core notification contracts for herald
//!
//! This module defines the fundamental trait contracts that govern how
//! notifications are described and handled. Everything else in the crate
//! (registry, publisher, dispatcher) is built on top of these two traits.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// An immutable event value broadcast to zero or more handlers.
///
/// A notification carries no required state; it only needs to be a
/// distinguishable type, since fan-out is keyed by notification *type*.
/// Implementors may override [`Notification::log_scope`] to attach a
/// tracing span populated with fields drawn from the notification's own
/// state; both the publisher and the dispatcher instrument the entire
/// fan-out with that span when it is present.
pub trait Notification: Send + Sync + 'static {
    /// A short, stable name for this notification type, used in log events
    /// and metrics labels.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// An optional tracing span wrapping the whole fan-out for this
    /// notification instance.
    fn log_scope(&self) -> Option<Span> {
        None
    }
}

/// A unit of logic reacting to one notification type.
///
/// Multiple handlers may be registered for the same notification type; the
/// registry guarantees each fan-out gets its own appropriately-scoped
/// instances, so implementations must not rely on shared mutable state
/// with sibling handlers.
#[async_trait]
pub trait NotificationHandler<N: Notification>: Send + Sync {
    /// Reacts to a single notification.
    ///
    /// The `cancellation` token is cooperative: a handler should check it
    /// at convenient points and return early when it is cancelled. Nothing
    /// forcibly aborts a handler that ignores it.
    async fn handle(
        &self,
        notification: &N,
        cancellation: &CancellationToken,
    ) -> anyhow::Result<()>;
}

/// Errors surfaced by the caller-awaited publish path.
///
/// The background dispatch path never surfaces errors; it logs them
/// instead, since its caller has already returned by the time they occur.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A handler returned an error. Remaining handlers were not invoked.
    #[error("handler {handler} failed while handling {kind}")]
    Handler {
        /// Type name of the failing handler.
        handler: &'static str,
        /// Notification kind being published.
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Handler resolution failed before any handler ran.
    #[error("failed to resolve handlers for {kind}")]
    Resolve {
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The caller's cancellation token fired between handler invocations.
    #[error("publish of {kind} cancelled before all handlers ran")]
    Cancelled { kind: &'static str },
}
