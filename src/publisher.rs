//! Synchronous-style notification fan-out within the caller's scope.
//!
//! `Publish` is the strict half of the fan-out pair: the caller awaits
//! completion, handlers run strictly in registration order, and the first
//! handler failure aborts the rest and propagates. It is meant for call
//! sites where the surrounding unit of work must fail atomically if any
//! listener rejects the notification.

use crate::core::{Notification, PublishError};
use crate::registry::{HandlerRegistry, Scope};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, trace, Instrument, Span};

/// Sequential, caller-awaited fan-out over the caller's current scope.
#[derive(Clone)]
pub struct Publisher {
    registry: Arc<HandlerRegistry>,
}

impl Publisher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Publishes `notification` to every handler registered for `N`,
    /// resolving them from the caller's `scope`.
    ///
    /// Handlers run sequentially in registration order; each is awaited
    /// fully before the next starts. The first handler error aborts the
    /// remaining handlers and is returned to the caller. The caller's
    /// `cancellation` token is honored cooperatively: it is passed to
    /// every handler and checked between invocations, but an in-flight
    /// handler is never forcibly aborted.
    pub async fn publish<N: Notification>(
        &self,
        scope: &Scope,
        notification: &N,
        cancellation: &CancellationToken,
    ) -> Result<(), PublishError> {
        let span = notification.log_scope().unwrap_or_else(Span::none);
        self.fan_out(scope, notification, cancellation)
            .instrument(span)
            .await
    }

    async fn fan_out<N: Notification>(
        &self,
        scope: &Scope,
        notification: &N,
        cancellation: &CancellationToken,
    ) -> Result<(), PublishError> {
        let kind = notification.kind();
        let handlers =
            self.registry
                .resolve::<N>(scope)
                .map_err(|source| PublishError::Resolve { kind, source })?;

        debug!(kind, handlers = handlers.len(), "publishing notification");
        metrics::counter!("herald.publish.notifications").increment(1);

        for handler in handlers {
            if cancellation.is_cancelled() {
                debug!(kind, handler = handler.name, "publish cancelled, skipping remaining handlers");
                return Err(PublishError::Cancelled { kind });
            }

            let handler_span = debug_span!("handler", handler = handler.name);
            async {
                trace!("invoking handler");
                let result = handler.instance.handle(notification, cancellation).await;
                trace!("handler returned");
                result
            }
            .instrument(handler_span)
            .await
            .map_err(|source| {
                metrics::counter!("herald.publish.handler_failures").increment(1);
                PublishError::Handler {
                    handler: handler.name,
                    kind,
                    source,
                }
            })?;
        }

        debug!(kind, "publish complete");
        Ok(())
    }
}
