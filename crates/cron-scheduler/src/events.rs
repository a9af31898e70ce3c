//! Lifecycle events of task executions.
//!
//! Every firing publishes `STARTED` and then exactly one of `COMPLETED` or
//! `FAILED`. Delivery is at-most-once to whoever is listening at publish
//! time; nothing is persisted or replayed.
//!
//! Two ways to listen:
//! - `subscribe()`: a broadcast receiver seeing every event
//! - `watch(task_id, event_type)`: a one-shot listener for a single pair,
//!   removed from the bus when the watch is dropped

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use tracing::trace;

/// Default poll interval of `EventWatch::wait`
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default ceiling used by callers that do not pick one
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(5000);

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CronTaskEventType {
    Started,
    Completed,
    Failed,
}

/// An immutable lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronTaskEvent {
    pub task_id: String,
    pub name: String,
    pub event_type: CronTaskEventType,
    pub timestamp: DateTime<Utc>,
    /// Failure reason, set on `Failed` only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CronTaskEvent {
    pub fn new(task_id: impl Into<String>, name: impl Into<String>, event_type: CronTaskEventType) -> Self {
        Self {
            task_id: task_id.into(),
            name: name.into(),
            event_type,
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn failed(task_id: impl Into<String>, name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(task_id, name, CronTaskEventType::Failed)
        }
    }
}

struct Listener {
    task_id: String,
    event_type: CronTaskEventType,
    observed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

type Listeners = Arc<DashMap<u64, Listener>>;

/// Publish/subscribe hub for `CronTaskEvent`s.
pub struct EventBus {
    sender: broadcast::Sender<CronTaskEvent>,
    listeners: Listeners,
    next_listener_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` bounds how far a slow `subscribe()` receiver may lag
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            listeners: Arc::new(DashMap::new()),
            next_listener_id: AtomicU64::new(0),
        }
    }

    /// Deliver an event to current subscribers and matching watches.
    ///
    /// Returns how many listeners received it.
    pub fn publish(&self, event: CronTaskEvent) -> usize {
        let mut delivered = 0;
        for listener in self.listeners.iter() {
            if listener.task_id == event.task_id && listener.event_type == event.event_type {
                listener.observed.store(true, Ordering::SeqCst);
                listener.notify.notify_one();
                delivered += 1;
            }
        }

        trace!(task_id = %event.task_id, event_type = ?event.event_type, "Publishing event");
        // No receivers is not an error
        delivered + self.sender.send(event).unwrap_or(0)
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CronTaskEvent> {
        self.sender.subscribe()
    }

    /// Start listening for one `(task_id, event_type)` pair.
    ///
    /// Attach the watch before triggering the work it observes; events
    /// published earlier are not seen.
    pub fn watch(&self, task_id: impl Into<String>, event_type: CronTaskEventType) -> EventWatch {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let observed = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());

        self.listeners.insert(
            id,
            Listener {
                task_id: task_id.into(),
                event_type,
                observed: observed.clone(),
                notify: notify.clone(),
            },
        );

        EventWatch {
            id,
            listeners: self.listeners.clone(),
            observed,
            notify,
        }
    }

    /// Watch and wait in one step. Best effort: misses events published
    /// before this call.
    pub async fn expect_event(
        &self,
        task_id: &str,
        event_type: CronTaskEventType,
        max_wait: Duration,
        interval: Duration,
    ) -> bool {
        self.watch(task_id, event_type).wait(max_wait, interval).await
    }

    /// Number of live watches
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Pending observation of a single `(task_id, event_type)` pair.
pub struct EventWatch {
    id: u64,
    listeners: Listeners,
    observed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl EventWatch {
    /// Whether a matching event has been published since the watch was attached
    pub fn observed(&self) -> bool {
        self.observed.load(Ordering::SeqCst)
    }

    /// Wait for the event, re-checking at least every `interval`.
    ///
    /// A zero `max_wait` waits indefinitely. Returns whether the event was observed.
    pub async fn wait(self, max_wait: Duration, interval: Duration) -> bool {
        let deadline = (!max_wait.is_zero()).then(|| Instant::now() + max_wait);
        let interval = if interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };

        loop {
            if self.observed() {
                return true;
            }

            let mut step = interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                step = step.min(deadline - now);
            }

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(step) => {}
            }
        }
    }
}

impl Drop for EventWatch {
    fn drop(&mut self) {
        self.listeners.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watch_observes_matching_event() {
        let bus = EventBus::new();
        let watch = bus.watch("CRJ001", CronTaskEventType::Completed);

        bus.publish(CronTaskEvent::new("CRJ001", "CRJ001", CronTaskEventType::Started));
        assert!(!watch.observed());

        bus.publish(CronTaskEvent::new("other", "other", CronTaskEventType::Completed));
        assert!(!watch.observed());

        assert_eq!(
            bus.publish(CronTaskEvent::new("CRJ001", "CRJ001", CronTaskEventType::Completed)),
            1
        );
        assert!(watch.wait(Duration::from_secs(1), Duration::from_millis(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let bus = EventBus::new();
        let watch = bus.watch("CRJ001", CronTaskEventType::Completed);
        assert!(!watch.wait(DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL).await);
    }

    #[tokio::test]
    async fn test_listener_removed_after_wait() {
        let bus = EventBus::new();
        let watch = bus.watch("t", CronTaskEventType::Failed);
        assert_eq!(bus.listener_count(), 1);

        bus.publish(CronTaskEvent::failed("t", "t", "boom"));
        assert!(watch.wait(Duration::ZERO, Duration::from_millis(10)).await);
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_late_listener_misses_event() {
        let bus = EventBus::new();
        bus.publish(CronTaskEvent::new("t", "t", CronTaskEventType::Completed));

        let found = bus
            .expect_event("t", CronTaskEventType::Completed, Duration::from_millis(50), Duration::from_millis(10))
            .await;
        assert!(!found);
    }

    #[tokio::test]
    async fn test_expect_event_from_other_task() {
        let bus = Arc::new(EventBus::new());
        let watch = bus.watch("t", CronTaskEventType::Completed);

        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish(CronTaskEvent::new("t", "t", CronTaskEventType::Completed));
        });

        assert!(watch.wait(Duration::from_secs(5), Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_subscribe_sees_all_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(CronTaskEvent::new("a", "a", CronTaskEventType::Started));
        bus.publish(CronTaskEvent::failed("a", "a", "boom"));

        assert_eq!(rx.recv().await.unwrap().event_type, CronTaskEventType::Started);
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.event_type, CronTaskEventType::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_event_json_shape() {
        let event = CronTaskEvent::new("CRJ001", "Checksums", CronTaskEventType::Completed);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["taskId"], "CRJ001");
        assert_eq!(json["eventType"], "COMPLETED");
        assert!(json.get("error").is_none());
    }
}
