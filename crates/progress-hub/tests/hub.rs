use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use progress_hub::{
    channel_sink, HubConfig, ProgressEvent, ProgressHub, ProgressSink, SinkError, SinkResult,
};
use serde_json::{json, Value};

/// Records every delivered message; fails once marked closed.
#[derive(Clone, Default)]
struct RecordingSink {
    received: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingSink {
    fn closed() -> Self {
        let sink = Self::default();
        sink.closed.store(true, Ordering::SeqCst);
        sink
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn send(&self, message: &str) -> SinkResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        self.received.lock().expect("lock").push(message.to_string());
        Ok(())
    }
}

/// Never completes a send.
struct StuckSink;

#[async_trait]
impl ProgressSink for StuckSink {
    async fn send(&self, _message: &str) -> SinkResult<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn broadcast_prunes_closed_subscriber() {
    let hub = ProgressHub::default();
    let a = RecordingSink::default();
    let b = RecordingSink::default();
    let dead = RecordingSink::closed();

    let id_a = hub.subscribe("kb1", a.clone()).await;
    let id_b = hub.subscribe("kb1", b.clone()).await;
    hub.subscribe("kb1", dead.clone()).await;
    assert_eq!(hub.count("kb1").await, 3);

    let report = hub
        .broadcast("kb1", &json!({"stage": "indexing", "current": 1}))
        .await;
    assert_eq!(report.delivered, 2);
    assert_eq!(report.pruned, 1);
    assert_eq!(hub.count("kb1").await, 2);

    hub.broadcast("kb1", &json!({"stage": "indexing", "current": 2}))
        .await;
    assert!(dead.received().is_empty());
    assert_eq!(a.received().len(), 2);
    assert_eq!(b.received().len(), 2);

    hub.unsubscribe("kb1", id_a).await;
    hub.unsubscribe("kb1", id_b).await;
    assert_eq!(hub.count("kb1").await, 0);
    assert!(!hub.channels().await.contains(&"kb1".to_string()));
}

#[tokio::test]
async fn messages_use_progress_envelope() {
    let hub = ProgressHub::default();
    let (sink, mut rx) = channel_sink(8);
    hub.subscribe("kb2", sink).await;

    let event = ProgressEvent::new("chunking", "split 4 of 8 files").with_progress(4, 8);
    hub.broadcast("kb2", &event).await;

    let raw = rx.recv().await.expect("delivered");
    let value: Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["type"], "progress");
    assert_eq!(value["data"]["stage"], "chunking");
    assert_eq!(value["data"]["current"], 4);
    assert_eq!(value["data"]["total"], 8);
    assert_eq!(value["data"]["percent"], 50.0);
}

#[tokio::test]
async fn per_subscriber_order_follows_broadcast_order() {
    let hub = ProgressHub::default();
    let (first, mut rx1) = channel_sink(32);
    let (second, mut rx2) = channel_sink(32);
    hub.subscribe("kb3", first).await;
    hub.subscribe("kb3", second).await;

    for n in 0..10 {
        hub.broadcast("kb3", &n).await;
    }

    for rx in [&mut rx1, &mut rx2] {
        for n in 0..10 {
            let raw = rx.recv().await.expect("delivered");
            assert_eq!(raw, format!(r#"{{"type":"progress","data":{n}}}"#));
        }
    }
}

#[tokio::test]
async fn channels_are_independent() {
    let hub = ProgressHub::default();
    let (kb_a, mut rx_a) = channel_sink(4);
    let (kb_b, mut rx_b) = channel_sink(4);
    hub.subscribe("alpha", kb_a).await;
    hub.subscribe("beta", kb_b).await;

    hub.broadcast("alpha", "only-alpha").await;
    assert!(rx_a.recv().await.is_some());
    assert!(rx_b.try_recv().is_err());
    assert_eq!(hub.channels().await, vec!["alpha".to_string(), "beta".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn stuck_subscriber_is_pruned_after_timeout() {
    let hub = ProgressHub::new(HubConfig {
        send_timeout: Duration::from_millis(250),
    });
    let healthy = RecordingSink::default();
    hub.subscribe("kb4", healthy.clone()).await;
    hub.subscribe("kb4", StuckSink).await;

    let report = hub.broadcast("kb4", "tick").await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.pruned, 1);
    assert_eq!(hub.count("kb4").await, 1);
    assert_eq!(healthy.received().len(), 1);
}

#[tokio::test]
async fn pruning_last_subscriber_removes_channel() {
    let hub = ProgressHub::default();
    let (sink, rx) = channel_sink(4);
    hub.subscribe("kb5", sink).await;
    drop(rx);

    let report = hub.broadcast("kb5", "anyone?").await;
    assert_eq!(report.pruned, 1);
    assert_eq!(hub.count("kb5").await, 0);
    assert!(hub.channels().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_subscribe_and_unsubscribe_leave_no_empty_channels() {
    let hub = Arc::new(ProgressHub::default());

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let hub = hub.clone();
            tokio::spawn(async move {
                let channel = format!("kb-{}", i % 4);
                let id = hub.subscribe(&channel, RecordingSink::default()).await;
                hub.broadcast(&channel, &i).await;
                hub.unsubscribe(&channel, id).await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.expect("task"));
    }
    assert!(hub.channels().await.is_empty());
    for n in 0..4 {
        assert_eq!(hub.count(&format!("kb-{n}")).await, 0);
    }
}
