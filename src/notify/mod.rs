//! Notification dispatch
//!
//! The [`Dispatcher`] turns [`AlertEvent`]s into [`Notification`]s and hands
//! each one to a [`NotificationTransport`] on its own detached task. The
//! refresh cycle calling [`Dispatcher::dispatch`] never waits for the
//! transport.
//!
//! Delivery is best-effort: a failed or timed out send is logged and
//! counted, never retried. The alert state has already moved on by the time
//! a notification is dispatched, and a failed delivery does not undo it.

pub mod discord;
pub mod message;
pub mod webhook;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::alerts::AlertEvent;
use crate::config::Alert;
use crate::error::DispatchError;

pub use discord::DiscordTransport;
pub use message::{Notification, Severity};
pub use webhook::WebhookTransport;

/// Outbound channel for notifications
///
/// One call per notification, no pooling or batching assumed.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &'static str;

    async fn send(&self, notification: &Notification) -> Result<(), DispatchError>;
}

/// Transport that only writes notifications to the log
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
        match notification.severity {
            Severity::Critical => warn!("{}\n{}", notification.subject, notification.body),
            Severity::Recovered => info!("{}", notification.subject),
        }
        Ok(())
    }
}

/// Build the transport described by the alert configuration
pub fn transport_from_config(alert: Option<&Alert>) -> Arc<dyn NotificationTransport> {
    match alert {
        Some(Alert::Discord(discord)) => Arc::new(DiscordTransport::new(
            discord.url.clone(),
            discord.user_id.clone(),
        )),
        Some(Alert::Webhook(webhook)) => Arc::new(WebhookTransport::new(webhook.url.clone())),
        None => Arc::new(LogTransport),
    }
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Notifications handed to the transport successfully
    pub sent: u64,

    /// Notifications that failed or timed out
    pub failed: u64,

    /// Events dropped by policy (recoveries with `notify_on_recovery` off)
    pub suppressed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    failed: AtomicU64,
    suppressed: AtomicU64,
}

/// Fire-and-forget notification dispatcher
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn NotificationTransport>,
    tasks: TaskTracker,
    timeout: Duration,
    notify_on_recovery: bool,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn NotificationTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            tasks: TaskTracker::new(),
            timeout,
            notify_on_recovery: true,
            counters: Arc::default(),
        }
    }

    /// Whether `Cleared` events produce a recovery notification
    pub fn with_recovery_notifications(mut self, enabled: bool) -> Self {
        self.notify_on_recovery = enabled;
        self
    }

    /// Send a notification for `event` on a detached task
    ///
    /// Returns immediately. Must be called from within a tokio runtime.
    #[instrument(skip_all, fields(component = %event.component_id()))]
    pub fn dispatch(&self, event: &AlertEvent) {
        if !event.is_raised() && !self.notify_on_recovery {
            trace!("recovery notifications disabled, skipping");
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let notification = Notification::from_event(event);
        let transport = Arc::clone(&self.transport);
        let counters = Arc::clone(&self.counters);
        let timeout = self.timeout;

        debug!("dispatching `{}` via {}", notification.subject, transport.name());

        self.tasks.spawn(async move {
            let result = match tokio::time::timeout(timeout, transport.send(&notification)).await {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Timeout(timeout)),
            };

            match result {
                Ok(()) => {
                    counters.sent.fetch_add(1, Ordering::Relaxed);
                    debug!("delivered `{}` via {}", notification.subject, transport.name());
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "failed to deliver `{}` via {}: {e}",
                        notification.subject,
                        transport.name()
                    );
                }
            }
        });
    }

    /// Number of deliveries still running
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every delivery dispatched so far
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            sent: self.counters.sent.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.transport.name())
            .field("timeout", &self.timeout)
            .field("notify_on_recovery", &self.notify_on_recovery)
            .field("in_flight", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{ClearedAlert, RaisedAlert};
    use crate::model::{Component, ComponentId, ComponentKind, Health};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tokio::sync::{Mutex, Semaphore};

    /// Transport that records subjects and can be held back or made to fail
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
        gate: Option<Arc<Semaphore>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationTransport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await;
            }
            if self.fail {
                return Err(DispatchError::Status {
                    status: 500,
                    body: "boom".into(),
                });
            }
            self.sent.lock().await.push(notification.subject.clone());
            Ok(())
        }
    }

    fn raised(id: i64) -> AlertEvent {
        AlertEvent::Raised(RaisedAlert {
            component: Component::new(id, ComponentKind::Compute, format!("kvm-{id}"))
                .with_health(Health::Critical),
            connections: vec![],
            private_cloud: None,
            detected_at: Utc::now(),
        })
    }

    fn cleared(id: i64) -> AlertEvent {
        AlertEvent::Cleared(ClearedAlert {
            id: ComponentId(id),
            name: format!("kvm-{id}"),
            kind: ComponentKind::Compute,
            health: Some(Health::Healthy),
            cleared_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_dispatch_does_not_wait_for_transport() {
        let gate = Arc::new(Semaphore::new(0));
        let transport = Arc::new(RecordingTransport {
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(transport.clone(), Duration::from_secs(5));

        dispatcher.dispatch(&raised(1));
        dispatcher.dispatch(&raised(2));

        // both sends are parked on the gate, dispatch already returned
        assert_eq!(dispatcher.in_flight(), 2);
        assert!(transport.sent.lock().await.is_empty());

        gate.add_permits(2);
        dispatcher.drain().await;

        let mut sent = transport.sent.lock().await.clone();
        sent.sort();
        assert_eq!(sent, vec!["Critical Alert: kvm-1", "Critical Alert: kvm-2"]);
        assert_eq!(dispatcher.stats().sent, 2);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_retried() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(transport, Duration::from_secs(5));

        dispatcher.dispatch(&raised(1));
        dispatcher.drain().await;

        assert_eq!(
            dispatcher.stats(),
            DispatchStats {
                sent: 0,
                failed: 1,
                suppressed: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_transport_times_out() {
        let transport = Arc::new(RecordingTransport {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(transport, Duration::from_millis(50));

        dispatcher.dispatch(&raised(1));
        dispatcher.drain().await;

        assert_eq!(dispatcher.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_recovery_notifications_can_be_disabled() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(transport.clone(), Duration::from_secs(5))
            .with_recovery_notifications(false);

        dispatcher.dispatch(&raised(1));
        dispatcher.dispatch(&cleared(1));
        dispatcher.drain().await;

        assert_eq!(*transport.sent.lock().await, vec!["Critical Alert: kvm-1"]);
        assert_eq!(dispatcher.stats().suppressed, 1);
    }

    #[tokio::test]
    async fn test_log_transport_always_succeeds() {
        let notification = Notification::from_event(&raised(4));
        assert!(LogTransport.send(&notification).await.is_ok());
    }
}
