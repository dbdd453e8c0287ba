//! Progress-Hub: live progress fan-out per channel
//!
//! Producers (knowledge-base builds, long agent runs) publish events to a
//! named channel; every subscriber attached to that channel receives
//! `{"type": "progress", "data": ...}`. Subscribers are opaque
//! [`ProgressSink`]s owned by the transport layer.
//!
//! A failed or slow delivery prunes just that subscriber. Channels exist only
//! while they have subscribers.
//!
//! ```rust
//! use progress_hub::{channel_sink, ProgressEvent, ProgressHub};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let hub = ProgressHub::default();
//! let (sink, mut rx) = channel_sink(16);
//! hub.subscribe("physics-101", sink).await;
//!
//! let event = ProgressEvent::new("embedding", "embedded 3 of 12 chunks").with_progress(3, 12);
//! let report = hub.broadcast("physics-101", &event).await;
//! assert_eq!(report.delivered, 1);
//! assert!(rx.recv().await.unwrap_or_default().starts_with(r#"{"type":"progress""#));
//! # }
//! ```

mod error;
mod hub;
mod message;
mod sink;

pub use error::{SinkError, SinkResult};
pub use hub::{BroadcastReport, HubConfig, ProgressHub};
pub use message::ProgressEvent;
pub use sink::{channel_sink, ChannelSink, ProgressSink, SubscriberId};
