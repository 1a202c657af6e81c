// ── Live feeds ──
//
// Consumers of the realtime channel: the rolling alert list and the live
// occupancy gauge. Each feed owns its channel subscription, publishes a
// snapshot on a watch channel and rebroadcasts individual events.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use chrono::Utc;
use crowdlens_api::{RealtimeChannel, Subscription};
use futures_util::Stream;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::model::{AlertEvent, OccupancyReading};

/// Most recent alerts kept for display.
pub const ALERT_CAPACITY: usize = 20;

const EVENT_CHANNEL_SIZE: usize = 64;

type Snapshot = Arc<Vec<AlertEvent>>;

// ── Alerts ───────────────────────────────────────────────────────────

/// Newest-first list of the last [`ALERT_CAPACITY`] alerts.
#[derive(Clone)]
pub struct AlertFeed {
    inner: Arc<AlertFeedInner>,
}

struct AlertFeedInner {
    alerts: watch::Sender<Snapshot>,
    events: broadcast::Sender<Arc<AlertEvent>>,
    subscription: Mutex<Option<Subscription>>,
}

impl AlertFeed {
    pub fn new() -> Self {
        let (alerts, _) = watch::channel(Arc::new(Vec::new()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(AlertFeedInner {
                alerts,
                events,
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to `alert` events on `channel`, replacing any previous
    /// subscription. `false` when the channel has not been connected.
    pub fn attach(&self, channel: &RealtimeChannel) -> bool {
        let inner = Arc::clone(&self.inner);
        let subscription = channel.subscribe_to_alerts(move |payload: &Value| {
            inner.push(AlertEvent::from_payload(payload, Utc::now()));
        });
        let attached = subscription.is_some();
        *self.lock_subscription() = subscription;
        if !attached {
            warn!("alert feed not attached: realtime channel is not connected");
        }
        attached
    }

    /// Drop the channel subscription. The current list is kept.
    pub fn detach(&self) {
        self.lock_subscription().take();
    }

    pub fn is_attached(&self) -> bool {
        self.lock_subscription()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Record an alert as if it had arrived on the channel.
    pub fn push(&self, alert: AlertEvent) {
        self.inner.push(alert);
    }

    pub fn clear(&self) {
        self.inner.alerts.send_replace(Arc::new(Vec::new()));
    }

    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.inner.alerts.borrow())
    }

    pub fn len(&self) -> usize {
        self.inner.alerts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Each alert as it arrives.
    pub fn events(&self) -> broadcast::Receiver<Arc<AlertEvent>> {
        self.inner.events.subscribe()
    }

    pub fn watch(&self) -> AlertStream {
        AlertStream::new(self.inner.alerts.subscribe())
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Option<Subscription>> {
        self.inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AlertFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertFeedInner {
    fn push(&self, alert: AlertEvent) {
        debug!(zone = %alert.zone, severity = %alert.severity, "alert received");
        let alert = Arc::new(alert);
        self.alerts.send_modify(|list| {
            let mut next = Vec::with_capacity(ALERT_CAPACITY);
            next.push(AlertEvent::clone(&alert));
            next.extend(list.iter().take(ALERT_CAPACITY - 1).cloned());
            *list = Arc::new(next);
        });
        // No receivers is fine.
        let _ = self.events.send(alert);
    }
}

/// Snapshot access plus change notification for the alert list.
pub struct AlertStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl AlertStream {
    fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Wait for the next change. `None` once the feed is gone.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    pub fn into_stream(self) -> AlertWatchStream {
        AlertWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` of alert list snapshots.
pub struct AlertWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for AlertWatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// ── Occupancy ────────────────────────────────────────────────────────

/// Latest pushed `liveOccupancy` reading.
#[derive(Clone)]
pub struct OccupancyGauge {
    inner: Arc<GaugeInner>,
}

struct GaugeInner {
    latest: watch::Sender<Option<OccupancyReading>>,
    subscription: Mutex<Option<Subscription>>,
}

impl OccupancyGauge {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            inner: Arc::new(GaugeInner {
                latest,
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn attach(&self, channel: &RealtimeChannel) -> bool {
        let inner = Arc::clone(&self.inner);
        let subscription = channel.subscribe_to_live_occupancy(move |payload: &Value| {
            match OccupancyReading::from_payload(payload, Utc::now()) {
                Some(reading) => inner.record(reading),
                None => warn!(%payload, "ignoring liveOccupancy without a numeric occupancy"),
            }
        });
        let attached = subscription.is_some();
        *self.lock_subscription() = subscription;
        attached
    }

    pub fn detach(&self) {
        self.lock_subscription().take();
    }

    pub fn record(&self, reading: OccupancyReading) {
        self.inner.record(reading);
    }

    pub fn clear(&self) {
        self.inner.latest.send_replace(None);
    }

    pub fn latest(&self) -> Option<OccupancyReading> {
        self.inner.latest.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<OccupancyReading>> {
        self.inner.latest.subscribe()
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Option<Subscription>> {
        self.inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for OccupancyGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeInner {
    fn record(&self, reading: OccupancyReading) {
        debug!(occupancy = reading.occupancy, "live occupancy");
        self.latest.send_replace(Some(reading));
    }
}

// ── Both ─────────────────────────────────────────────────────────────

/// The realtime-fed state of a dashboard session.
#[derive(Clone, Default)]
pub struct LiveFeeds {
    pub alerts: AlertFeed,
    pub occupancy: OccupancyGauge,
}

impl LiveFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe both feeds. `true` only if both attached.
    pub fn attach(&self, channel: &RealtimeChannel) -> bool {
        let alerts = self.alerts.attach(channel);
        let occupancy = self.occupancy.attach(channel);
        alerts && occupancy
    }

    pub fn detach(&self) {
        self.alerts.detach();
        self.occupancy.detach();
    }

    /// Detach and forget everything received.
    pub fn reset(&self) {
        self.detach();
        self.alerts.clear();
        self.occupancy.clear();
    }
}
