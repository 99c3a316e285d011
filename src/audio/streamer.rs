//! Per-client streaming pipeline
//!
//! Subscribes to the shared frame stream, applies the silence gate, encodes
//! each transmitted frame to Opus and writes it to the client's track as a
//! 20ms sample. Runs until the client's cancellation token fires, the track
//! rejects a write, or the frame stream closes.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::capture::CaptureSupervisor;
use super::encoder::{OpusConfig, OpusEncoder};
use super::gate::{GateEvent, SilenceGate};
use super::multiplexer::AudioMultiplexer;
use crate::config::StreamConfig;
use crate::error::Result;
use crate::webrtc::SampleSink;

/// Duration of one encoded sample
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Packets between rate log lines
const STATS_INTERVAL: u64 = 50;

/// Why a pipeline stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    /// Client stop signal
    Cancelled,
    /// Track write failed
    SinkFailed,
    /// Frame stream closed
    SourceClosed,
}

/// Pipeline result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub exit: StreamExit,
    pub frames_received: u64,
    pub packets_sent: u64,
}

/// Shared audio plumbing handed to every client pipeline
#[derive(Clone)]
pub struct AudioPipeline {
    capture: Arc<CaptureSupervisor>,
    mux: Arc<AudioMultiplexer>,
    config: StreamConfig,
}

impl AudioPipeline {
    pub fn new(
        capture: Arc<CaptureSupervisor>,
        mux: Arc<AudioMultiplexer>,
        config: StreamConfig,
    ) -> Self {
        Self {
            capture,
            mux,
            config,
        }
    }

    pub fn capture(&self) -> &Arc<CaptureSupervisor> {
        &self.capture
    }

    pub fn multiplexer(&self) -> &Arc<AudioMultiplexer> {
        &self.mux
    }

    /// Stream encoded audio into `sink` until stopped
    ///
    /// Fails only before streaming starts: when the capture process cannot
    /// be started or the encoder cannot be created.
    pub async fn stream_to(
        &self,
        client_id: &str,
        sink: Arc<dyn SampleSink>,
        cancel: CancellationToken,
    ) -> Result<StreamSummary> {
        self.capture.ensure_running().await?;

        let mut subscription = self.mux.subscribe();
        let mut encoder = OpusEncoder::new(OpusConfig::from(&self.config))?;
        let mut gate = SilenceGate::new(self.config.silence_frames);
        let threshold = self.config.silence_threshold;

        info!(
            "Audio stream started for client {} (subscriber {})",
            client_id,
            subscription.id()
        );

        let mut frames_received = 0u64;
        let mut packets_sent = 0u64;
        let mut window_start = Instant::now();

        let exit = loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => break StreamExit::Cancelled,
                frame = subscription.recv() => match frame {
                    Some(frame) => frame,
                    None => break StreamExit::SourceClosed,
                },
            };
            frames_received += 1;

            let (transmit, event) = gate.observe_with_event(frame.is_silent(threshold));
            match event {
                Some(GateEvent::Paused) => debug!("Client {} audio paused on silence", client_id),
                Some(GateEvent::Resumed) => debug!("Client {} audio resumed", client_id),
                None => {}
            }
            if !transmit {
                continue;
            }

            let packet = match encoder.encode_frame(&frame) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Client {} dropped frame {}: {}", client_id, frame.sequence, e);
                    continue;
                }
            };

            if let Err(e) = sink.write_sample(packet, FRAME_DURATION).await {
                warn!("Client {} track write failed, stopping stream: {}", client_id, e);
                break StreamExit::SinkFailed;
            }
            packets_sent += 1;

            if packets_sent % STATS_INTERVAL == 0 {
                let elapsed = window_start.elapsed().as_secs_f64();
                let rate = if elapsed > 0.0 {
                    STATS_INTERVAL as f64 / elapsed
                } else {
                    0.0
                };
                debug!(
                    "Client {} sent {} audio packets ({:.1} pkt/s)",
                    client_id, packets_sent, rate
                );
                window_start = Instant::now();
            }
        };

        info!(
            "Audio stream for client {} ended ({:?}): {} frames in, {} encoded, {} packets out",
            client_id,
            exit,
            frames_received,
            encoder.frames_encoded(),
            packets_sent
        );

        Ok(StreamSummary {
            exit,
            frames_received,
            packets_sent,
        })
    }
}
