//! Common fixtures for the fan-out integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use herald::{Notification, NotificationHandler};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The notification type under test. Carries no state; fan-out is keyed
/// purely by type.
pub struct Ping;

impl Notification for Ping {
    fn kind(&self) -> &'static str {
        "ping"
    }
}

/// Ordered record of handler events, shared between handlers and the
/// test body.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Polls the event log until `predicate` holds or `limit` elapses.
pub async fn wait_for_events<F>(log: &EventLog, limit: Duration, predicate: F) -> bool
where
    F: Fn(&[String]) -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if predicate(&events(log)) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Records `<tag>:start` and `<tag>:end`, with an optional pause between
/// the two so any overlap between sibling handlers becomes visible in
/// the event order.
pub struct RecordingHandler {
    tag: &'static str,
    log: EventLog,
    pause: Duration,
}

impl RecordingHandler {
    pub fn new(tag: &'static str, log: EventLog) -> Self {
        Self::with_pause(tag, log, Duration::ZERO)
    }

    pub fn with_pause(tag: &'static str, log: EventLog, pause: Duration) -> Self {
        Self { tag, log, pause }
    }
}

#[async_trait]
impl NotificationHandler<Ping> for RecordingHandler {
    async fn handle(&self, _n: &Ping, _c: &CancellationToken) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("{}:start", self.tag));
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
        self.log.lock().unwrap().push(format!("{}:end", self.tag));
        Ok(())
    }
}

/// Records its invocation, then fails with the given message.
pub struct FailingHandler {
    tag: &'static str,
    log: EventLog,
    message: &'static str,
}

impl FailingHandler {
    pub fn new(tag: &'static str, log: EventLog, message: &'static str) -> Self {
        Self { tag, log, message }
    }
}

#[async_trait]
impl NotificationHandler<Ping> for FailingHandler {
    async fn handle(&self, _n: &Ping, _c: &CancellationToken) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("{}:fail", self.tag));
        anyhow::bail!("{}", self.message)
    }
}

/// Sleeps for a long time before recording completion; used to probe
/// fire-and-forget and timeout behavior.
pub struct SlowHandler {
    tag: &'static str,
    log: EventLog,
    nap: Duration,
}

impl SlowHandler {
    pub fn new(tag: &'static str, log: EventLog, nap: Duration) -> Self {
        Self { tag, log, nap }
    }
}

#[async_trait]
impl NotificationHandler<Ping> for SlowHandler {
    async fn handle(&self, _n: &Ping, _c: &CancellationToken) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("{}:start", self.tag));
        tokio::time::sleep(self.nap).await;
        self.log.lock().unwrap().push(format!("{}:end", self.tag));
        Ok(())
    }
}

/// Records whether the cancellation token it was handed had already
/// fired when the handler was invoked.
pub struct TokenProbeHandler {
    log: EventLog,
}

impl TokenProbeHandler {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl NotificationHandler<Ping> for TokenProbeHandler {
    async fn handle(&self, _n: &Ping, cancellation: &CancellationToken) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("probe:cancelled={}", cancellation.is_cancelled()));
        Ok(())
    }
}

/// Panics outright; used to prove panic isolation under dispatch.
pub struct PanickingHandler;

#[async_trait]
impl NotificationHandler<Ping> for PanickingHandler {
    async fn handle(&self, _n: &Ping, _c: &CancellationToken) -> anyhow::Result<()> {
        panic!("handler blew up")
    }
}
