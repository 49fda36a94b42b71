//! Event bus (C3, §4.3).
//!
//! Single-producer, many-consumer, best-effort in-order delivery per topic.
//! Slow consumers are dropped from *that* topic, never the producer: each
//! subscriber owns a bounded ring buffer, and a full buffer increments that
//! subscriber's `dropped` counter and evicts the oldest queued event to make
//! room for the new one, rather than blocking the publisher or losing the
//! event a consumer hasn't seen yet.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;

pub type Topic = String;

pub fn match_tick_topic(game_id: u64) -> Topic {
    format!("match.{game_id}.tick")
}

pub fn match_lifecycle_topic(game_id: u64) -> Topic {
    format!("match.{game_id}.lifecycle")
}

pub fn tournament_state_topic(tournament_id: u64) -> Topic {
    format!("tournament.{tournament_id}.state")
}

pub const SEASON_PHASE_TOPIC: &str = "season.phase";
pub const TOURNAMENT_LIFECYCLE_TOPIC: &str = "tournament.matches.lifecycle";

/// A subscriber's ring buffer and wake signal, shared between the `Subscriber`
/// handle the bus holds (by `Weak`, so a dropped `Subscription` is detected
/// without the producer ever blocking) and the `Subscription` the caller owns.
struct Inner<E> {
    capacity: usize,
    queue: Mutex<VecDeque<E>>,
    notify: Notify,
    dropped: AtomicU64,
}

struct Subscriber<E> {
    inner: Weak<Inner<E>>,
}

/// Handle returned to a subscriber: pulls events in publish order off its own
/// ring buffer, and tracks how many were evicted on overflow. Dropping it
/// unsubscribes promptly — the bus only holds a `Weak` reference.
pub struct Subscription<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Subscription<E> {
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Waits for the next event. Never returns `None`: a `Subscription`
    /// outlives its entry in the bus's topic map, so there is no "producer
    /// gone" state to observe from here.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            if let Some(event) = self.inner.queue.lock().pop_front() {
                return Some(event);
            }
            self.inner.notify.notified().await;
        }
    }
}

pub struct EventBus<E: Clone + Send + 'static> {
    topics: RwLock<HashMap<Topic, Vec<Subscriber<E>>>>,
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self { topics: RwLock::new(HashMap::new()) }
    }

    /// `buffer_size` is the subscriber-supplied bounded-buffer size (§4.3).
    pub fn subscribe(&self, topic: impl Into<Topic>, buffer_size: usize) -> Subscription<E> {
        let inner = Arc::new(Inner {
            capacity: buffer_size.max(1),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        });
        let mut topics = self.topics.write();
        topics.entry(topic.into()).or_default().push(Subscriber { inner: Arc::downgrade(&inner) });
        Subscription { inner }
    }

    /// Non-blocking: publishing to a subscriber whose ring buffer is already
    /// at capacity evicts the oldest queued event and bumps `dropped`, rather
    /// than refusing the new one or stalling the publisher. Subscriptions
    /// that have been dropped are skipped (their `Weak` no longer upgrades)
    /// and pruned lazily on the next `prune_closed`.
    pub fn publish(&self, topic: &str, event: E) {
        let topics = self.topics.read();
        let Some(subscribers) = topics.get(topic) else { return };
        for sub in subscribers {
            let Some(inner) = sub.inner.upgrade() else { continue };
            let mut queue = inner.queue.lock();
            if queue.len() >= inner.capacity {
                queue.pop_front();
                inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(event.clone());
            drop(queue);
            inner.notify.notify_one();
        }
    }

    /// Drops subscribers whose `Subscription` has gone away. Cheap to call
    /// periodically (e.g. from the season coordinator's per-minute tick) so
    /// the topic map doesn't grow unbounded across a long-running process.
    pub fn prune_closed(&self) {
        let mut topics = self.topics.write();
        for subs in topics.values_mut() {
            subs.retain(|s| s.inner.strong_count() > 0);
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_delivered_in_order_within_a_topic() {
        let bus: EventBus<u32> = EventBus::new();
        let mut sub = bus.subscribe("match.1.tick", 8);
        for tick in 0..5 {
            bus.publish("match.1.tick", tick);
        }
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(sub.recv().await.unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn overflow_increments_dropped_and_evicts_the_oldest_not_the_newest() {
        let bus: EventBus<u32> = EventBus::new();
        let mut sub = bus.subscribe("match.1.tick", 1);
        // Producer never awaits; publish is synchronous and always returns.
        bus.publish("match.1.tick", 1);
        bus.publish("match.1.tick", 2);
        bus.publish("match.1.tick", 3);
        assert_eq!(sub.dropped_count(), 2); // 1 and 2 both evicted to make room
        assert_eq!(sub.recv().await.unwrap(), 3); // the survivor is the newest, not the oldest
    }

    #[tokio::test]
    async fn unsubscribe_is_prompt_and_does_not_block_producer() {
        let bus: EventBus<u32> = EventBus::new();
        {
            let sub = bus.subscribe("match.1.tick", 4);
            drop(sub);
        }
        bus.publish("match.1.tick", 1); // must not panic or block
        bus.prune_closed();
        assert_eq!(bus.subscriber_count("match.1.tick"), 0);
    }
}
