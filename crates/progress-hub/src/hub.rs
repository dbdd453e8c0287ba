//! Channel map, subscription bookkeeping, and broadcast.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::SinkError;
use crate::message::encode;
use crate::sink::{ProgressSink, SubscriberId};

/// Hub configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Upper bound on a single delivery before the subscriber is pruned.
    pub send_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of one broadcast. Delivery failures never surface as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub pruned: usize,
}

struct Subscriber {
    id: SubscriberId,
    sink: Box<dyn ProgressSink>,
}

#[derive(Default)]
struct ChannelState {
    subscribers: Vec<Subscriber>,
    /// Set once the channel has emptied and left the map; a late caller
    /// holding the old slot must not add to it.
    retired: bool,
}

type ChannelSlot = Arc<Mutex<ChannelState>>;

/// Fans progress events out to subscribers grouped by channel.
///
/// Each channel's subscriber set sits behind its own async mutex, so
/// subscribe, unsubscribe, and broadcast on one channel never interleave
/// while unrelated channels proceed independently. The map of channels is
/// only touched briefly and never across an await.
pub struct ProgressHub {
    config: HubConfig,
    channels: StdMutex<HashMap<String, ChannelSlot>>,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl std::fmt::Debug for ProgressHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressHub")
            .field("config", &self.config)
            .field("channels", &self.map().len())
            .finish()
    }
}

impl ProgressHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            channels: StdMutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, ChannelSlot>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, channel: &str) -> Option<ChannelSlot> {
        self.map().get(channel).cloned()
    }

    /// Drop `channel` from the map if it still points at `slot`.
    fn retire(&self, channel: &str, slot: &ChannelSlot, state: &mut ChannelState) {
        state.retired = true;
        let mut map = self.map();
        if map.get(channel).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            map.remove(channel);
            debug!(channel = %channel, "channel removed");
        }
    }

    /// Register `sink` under `channel`, creating the channel if needed.
    pub async fn subscribe<S>(&self, channel: &str, sink: S) -> SubscriberId
    where
        S: ProgressSink + 'static,
    {
        let id = SubscriberId::new();
        let mut sink: Option<Box<dyn ProgressSink>> = Some(Box::new(sink));

        loop {
            let slot = self
                .map()
                .entry(channel.to_string())
                .or_default()
                .clone();

            let mut state = slot.lock().await;
            if state.retired {
                // Emptied and removed while we waited; take the fresh entry.
                continue;
            }
            if let Some(sink) = sink.take() {
                state.subscribers.push(Subscriber { id, sink });
            }
            info!(
                channel = %channel,
                subscriber = %id,
                subscribers = state.subscribers.len(),
                "subscriber added"
            );
            return id;
        }
    }

    /// Remove one subscriber. Returns whether it was present.
    pub async fn unsubscribe(&self, channel: &str, id: SubscriberId) -> bool {
        let Some(slot) = self.slot(channel) else {
            return false;
        };
        let mut state = slot.lock().await;
        if state.retired {
            return false;
        }

        let before = state.subscribers.len();
        state.subscribers.retain(|s| s.id != id);
        let removed = state.subscribers.len() < before;

        if removed {
            info!(
                channel = %channel,
                subscriber = %id,
                subscribers = state.subscribers.len(),
                "subscriber removed"
            );
        }
        if state.subscribers.is_empty() {
            self.retire(channel, &slot, &mut state);
        }
        removed
    }

    /// Deliver `event` to every subscriber of `channel` as
    /// `{"type": "progress", "data": event}`.
    ///
    /// Deliveries run concurrently, each bounded by the configured send
    /// timeout. A subscriber whose delivery fails or times out is pruned; if
    /// that empties the channel, the channel is removed. A missing channel is
    /// a no-op.
    pub async fn broadcast<T>(&self, channel: &str, event: &T) -> BroadcastReport
    where
        T: Serialize + ?Sized,
    {
        let Some(slot) = self.slot(channel) else {
            return BroadcastReport::default();
        };
        let message = match encode(event) {
            Ok(message) => message,
            Err(e) => {
                warn!(channel = %channel, error = %e, "dropping unencodable progress event");
                return BroadcastReport::default();
            }
        };

        let mut state = slot.lock().await;
        if state.retired {
            return BroadcastReport::default();
        }

        let limit = self.config.send_timeout;
        let outcomes = join_all(state.subscribers.iter().map(|subscriber| {
            let message = message.as_str();
            async move {
                let outcome = match timeout(limit, subscriber.sink.send(message)).await {
                    Ok(result) => result,
                    Err(_) => Err(SinkError::Timeout(limit)),
                };
                (subscriber.id, outcome)
            }
        }))
        .await;

        let mut failed = Vec::new();
        for (id, outcome) in outcomes {
            if let Err(e) = outcome {
                warn!(channel = %channel, subscriber = %id, error = %e, "pruning subscriber");
                failed.push(id);
            }
        }

        let report = BroadcastReport {
            delivered: state.subscribers.len() - failed.len(),
            pruned: failed.len(),
        };
        if !failed.is_empty() {
            state.subscribers.retain(|s| !failed.contains(&s.id));
            if state.subscribers.is_empty() {
                self.retire(channel, &slot, &mut state);
            }
        }
        report
    }

    /// Current subscriber count; 0 for an unknown channel.
    pub async fn count(&self, channel: &str) -> usize {
        match self.slot(channel) {
            Some(slot) => {
                let state = slot.lock().await;
                if state.retired {
                    0
                } else {
                    state.subscribers.len()
                }
            }
            None => 0,
        }
    }

    /// Sorted keys of every channel that currently has subscribers.
    pub async fn channels(&self) -> Vec<String> {
        let slots: Vec<(String, ChannelSlot)> = self
            .map()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.clone()))
            .collect();

        let mut live = Vec::with_capacity(slots.len());
        for (name, slot) in slots {
            let state = slot.lock().await;
            if !state.retired && !state.subscribers.is_empty() {
                live.push(name);
            }
        }
        live.sort();
        live
    }
}
