//! Fire-and-forget notification fan-out in an independent scope.
//!
//! `Dispatch` is the lenient half of the fan-out pair: the caller returns
//! immediately, handlers are resolved from a fresh scope decoupled from
//! the caller's unit of work, and a failing handler is logged and skipped
//! rather than allowed to break its siblings.
//!
//! Timeout semantics are deliberately leaky: when the per-dispatch token
//! fires, the dispatcher stops *waiting* on the in-flight handler and no
//! longer tracks it, but the handler task keeps running on the runtime
//! until it finishes on its own. Cancellation is cooperative only; a
//! handler that ignores its token is never forcibly aborted. Handlers
//! sequenced after expiry are still started with the already-cancelled
//! token so they can observe it and bail out.

use crate::config::DispatcherConfig;
use crate::core::Notification;
use crate::registry::HandlerRegistry;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, trace, warn, Instrument, Span};

/// Background fan-out handle. Cheap to clone; all clones share the same
/// registry and default timeout.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    default_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, config: &DispatcherConfig) -> Self {
        Self {
            registry,
            default_timeout: config.timeout(),
        }
    }

    /// Schedules a fan-out of `notification` and returns immediately.
    ///
    /// `timeout` bounds how long the background fan-out keeps waiting on
    /// handlers; `None` falls back to the configured default, which itself
    /// defaults to waiting indefinitely. Handler failures are logged, not
    /// surfaced; by the time they occur there is no caller left to notify.
    pub fn dispatch<N: Notification>(&self, notification: N, timeout: Option<Duration>) {
        let dispatcher = self.clone();
        // The JoinHandle is dropped on purpose: completion of the fan-out
        // is not linked to the caller's continuation.
        tokio::spawn(async move {
            dispatcher.dispatch_async(notification, timeout).await;
        });
    }

    /// The awaitable form of [`Dispatcher::dispatch`].
    ///
    /// Completes when the fan-out has finished or given up waiting. Never
    /// returns an error: infrastructure failures (scope or handler
    /// resolution) are caught here, logged, and swallowed.
    pub async fn dispatch_async<N: Notification>(
        &self,
        notification: N,
        timeout: Option<Duration>,
    ) {
        let notification = Arc::new(notification);
        let kind = notification.kind();
        let span = notification.log_scope().unwrap_or_else(Span::none);

        if let Err(error) = self
            .fan_out(Arc::clone(&notification), timeout)
            .instrument(span)
            .await
        {
            metrics::counter!("herald.dispatch.failures").increment(1);
            error!(kind, "notification dispatch failed: {error:#}");
        }
    }

    async fn fan_out<N: Notification>(
        &self,
        notification: Arc<N>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let kind = notification.kind();
        let scope = self.registry.create_scope();
        let cancellation = CancellationToken::new();

        let timeout = timeout.or(self.default_timeout);
        let timer = timeout.map(|limit| {
            let token = cancellation.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                token.cancel();
            })
        });

        let handlers = self
            .registry
            .resolve::<N>(&scope)
            .with_context(|| format!("resolving handlers for {kind}"))?;

        debug!(
            kind,
            handlers = handlers.len(),
            scope = scope.id(),
            ?timeout,
            "dispatching notification"
        );
        metrics::counter!("herald.dispatch.notifications").increment(1);

        for handler in handlers {
            let handler_span = debug_span!("handler", handler = handler.name);
            let mut task = {
                let instance = handler.instance;
                let notification = Arc::clone(&notification);
                let token = cancellation.clone();
                tokio::spawn(
                    async move {
                        trace!("invoking handler");
                        instance.handle(notification.as_ref(), &token).await
                    }
                    .instrument(handler_span),
                )
            };

            tokio::select! {
                biased;
                joined = &mut task => match joined {
                    Ok(Ok(())) => {
                        trace!(kind, handler = handler.name, "handler completed");
                    }
                    Ok(Err(error)) => {
                        // Isolation: one failing handler never prevents
                        // its siblings from running.
                        metrics::counter!("herald.dispatch.handler_failures").increment(1);
                        error!(
                            kind,
                            handler = handler.name,
                            "handler failed during dispatch: {error:#}"
                        );
                    }
                    Err(join_error) => {
                        metrics::counter!("herald.dispatch.handler_failures").increment(1);
                        error!(
                            kind,
                            handler = handler.name,
                            "handler panicked during dispatch: {join_error}"
                        );
                    }
                },
                _ = cancellation.cancelled() => {
                    // The handler task keeps running untracked; dropping
                    // the JoinHandle only detaches it.
                    metrics::counter!("herald.dispatch.abandoned_handlers").increment(1);
                    warn!(
                        kind,
                        handler = handler.name,
                        "dispatch gave up waiting on handler"
                    );
                }
            }
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        debug!(kind, cancelled = cancellation.is_cancelled(), "dispatch complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NotificationHandler;
    use async_trait::async_trait;
    use std::time::Instant;

    struct Ping;
    impl Notification for Ping {}

    struct SleepyHandler {
        nap: Duration,
    }

    #[async_trait]
    impl NotificationHandler<Ping> for SleepyHandler {
        async fn handle(&self, _n: &Ping, _c: &CancellationToken) -> anyhow::Result<()> {
            tokio::time::sleep(self.nap).await;
            Ok(())
        }
    }

    fn sleepy_registry(nap: Duration) -> Arc<HandlerRegistry> {
        Arc::new(
            HandlerRegistry::builder()
                .subscribe::<Ping, _, _>(move |_scope| SleepyHandler { nap })
                .build(),
        )
    }

    #[tokio::test]
    async fn default_timeout_bounds_the_wait() {
        let config = DispatcherConfig {
            dispatch_timeout_ms: Some(50),
        };
        let dispatcher = Dispatcher::new(sleepy_registry(Duration::from_secs(30)), &config);

        let started = Instant::now();
        dispatcher.dispatch_async(Ping, None).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn explicit_timeout_overrides_default() {
        // Default would wait 30s; the explicit 50ms must win.
        let config = DispatcherConfig {
            dispatch_timeout_ms: Some(30_000),
        };
        let dispatcher = Dispatcher::new(sleepy_registry(Duration::from_secs(30)), &config);

        let started = Instant::now();
        dispatcher
            .dispatch_async(Ping, Some(Duration::from_millis(50)))
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn no_timeout_waits_for_completion() {
        let dispatcher = Dispatcher::new(
            sleepy_registry(Duration::from_millis(20)),
            &DispatcherConfig::default(),
        );

        // Completes only because the handler itself finishes.
        dispatcher.dispatch_async(Ping, None).await;
    }
}
