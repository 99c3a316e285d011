//! Audio frame fan-out
//!
//! One producer (the capture drainer) publishes into a bounded intake queue.
//! A single dispatcher task copies each frame into every subscriber queue
//! with a non-blocking send. A full queue loses that frame for that
//! subscriber only; a full intake loses the frame for everyone.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::frame::AudioFrame;
use crate::config::StreamConfig;
use crate::utils::LogThrottler;
use crate::warn_throttled;

/// Multiplexer counters
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MultiplexerStats {
    pub subscribers: usize,
    pub frames_published: u64,
    pub intake_dropped: u64,
    pub deliveries_dropped: u64,
}

/// Fan-out of raw frames to per-client queues
pub struct AudioMultiplexer {
    subscribers: RwLock<HashMap<u64, mpsc::Sender<AudioFrame>>>,
    next_id: AtomicU64,
    subscriber_capacity: usize,
    intake_tx: mpsc::Sender<AudioFrame>,
    intake_rx: Mutex<Option<mpsc::Receiver<AudioFrame>>>,
    frames_published: AtomicU64,
    intake_dropped: AtomicU64,
    deliveries_dropped: AtomicU64,
    log_throttler: LogThrottler,
}

impl AudioMultiplexer {
    pub fn new(config: &StreamConfig) -> Arc<Self> {
        let (intake_tx, intake_rx) = mpsc::channel(config.intake_capacity.max(1));
        Arc::new(Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            subscriber_capacity: config.subscriber_capacity.max(1),
            intake_tx,
            intake_rx: Mutex::new(Some(intake_rx)),
            frames_published: AtomicU64::new(0),
            intake_dropped: AtomicU64::new(0),
            deliveries_dropped: AtomicU64::new(0),
            log_throttler: LogThrottler::default(),
        })
    }

    /// Spawn the dispatcher task; later calls are no-ops
    pub fn start(self: &Arc<Self>) {
        let Some(mut intake_rx) = self.intake_rx.lock().take() else {
            return;
        };

        let mux = self.clone();
        tokio::spawn(async move {
            info!("Audio multiplexer dispatcher started");
            while let Some(frame) = intake_rx.recv().await {
                mux.dispatch(&frame);
            }
            info!("Audio multiplexer dispatcher stopped");
        });
    }

    /// Register a new subscriber queue
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        self.subscribers.write().insert(id, tx);
        debug!("Audio subscriber {} added", id);

        Subscription {
            id,
            rx,
            mux: self.clone(),
        }
    }

    /// Remove a subscriber queue; its receiver then sees end of stream
    pub fn unsubscribe(&self, id: u64) {
        if self.subscribers.write().remove(&id).is_some() {
            debug!("Audio subscriber {} removed", id);
        }
    }

    /// Hand a frame to the dispatcher without waiting
    pub fn publish(&self, frame: AudioFrame) {
        match self.intake_tx.try_send(frame) {
            Ok(()) => {
                self.frames_published.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.intake_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn_throttled!(
                    self.log_throttler,
                    "intake_full",
                    dropped,
                    "Audio intake queue full, dropping frame"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.intake_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn dispatch(&self, frame: &AudioFrame) {
        let subscribers = self.subscribers.read();
        for (id, tx) in subscribers.iter() {
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(frame.clone()) {
                self.deliveries_dropped.fetch_add(1, Ordering::Relaxed);
                warn_throttled!(
                    self.log_throttler,
                    "subscriber_full",
                    subscriber = id,
                    "Audio subscriber queue full, skipping frame"
                );
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn stats(&self) -> MultiplexerStats {
        MultiplexerStats {
            subscribers: self.subscriber_count(),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            intake_dropped: self.intake_dropped.load(Ordering::Relaxed),
            deliveries_dropped: self.deliveries_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Subscriber handle; unsubscribes on drop
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<AudioFrame>,
    mux: Arc<AudioMultiplexer>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next frame, or `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.mux.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::time::timeout;

    fn config(subscriber_capacity: usize, intake_capacity: usize) -> StreamConfig {
        StreamConfig {
            subscriber_capacity,
            intake_capacity,
            ..Default::default()
        }
    }

    fn frame(seq: u64) -> AudioFrame {
        AudioFrame::new(Bytes::from(vec![seq as u8; 16]), seq)
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber_unchanged() {
        let mux = AudioMultiplexer::new(&StreamConfig::default());
        mux.start();
        let mut sub = mux.subscribe();

        let sent = frame(3);
        mux.publish(sent.clone());

        let got = timeout(Duration::from_secs(1), sub.recv()).await.unwrap().unwrap();
        assert_eq!(got, sent);
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_every_frame() {
        let mux = AudioMultiplexer::new(&StreamConfig::default());
        mux.start();
        let mut a = mux.subscribe();
        let mut b = mux.subscribe();

        for seq in 0..5 {
            mux.publish(frame(seq));
        }

        for sub in [&mut a, &mut b] {
            for seq in 0..5 {
                let got = timeout(Duration::from_secs(1), sub.recv()).await.unwrap().unwrap();
                assert_eq!(got.sequence, seq);
            }
        }
    }

    #[tokio::test]
    async fn test_full_subscriber_does_not_block_others() {
        let mux = AudioMultiplexer::new(&config(2, 100));
        mux.start();
        let _stalled = mux.subscribe();
        let mut live = mux.subscribe();

        for seq in 0..5 {
            mux.publish(frame(seq));
            let got = timeout(Duration::from_secs(1), live.recv()).await.unwrap().unwrap();
            assert_eq!(got.sequence, seq);
        }

        assert_eq!(mux.stats().deliveries_dropped, 3);
    }

    #[tokio::test]
    async fn test_intake_overflow_drops_frames() {
        // Dispatcher not started, so the intake never drains
        let mux = AudioMultiplexer::new(&config(50, 2));
        for seq in 0..5 {
            mux.publish(frame(seq));
        }
        let stats = mux.stats();
        assert_eq!(stats.frames_published, 2);
        assert_eq!(stats.intake_dropped, 3);
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        let mux = AudioMultiplexer::new(&StreamConfig::default());
        let sub = mux.subscribe();
        let other = mux.subscribe();
        assert_eq!(mux.subscriber_count(), 2);
        assert_ne!(sub.id(), other.id());

        drop(sub);
        assert_eq!(mux.subscriber_count(), 1);
        drop(other);
        assert_eq!(mux.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_queue() {
        let mux = AudioMultiplexer::new(&StreamConfig::default());
        let mut sub = mux.subscribe();
        mux.unsubscribe(sub.id());
        assert!(sub.recv().await.is_none());
    }
}
