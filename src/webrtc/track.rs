//! Outbound Opus audio track

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use super::config::{opus_codec_capability, WebRtcConfig};
use crate::error::{AppError, Result};

/// Destination for timed, already-encoded media samples
#[async_trait]
pub trait SampleSink: Send + Sync {
    /// Write one sample; an error means the transport is gone
    async fn write_sample(&self, data: Bytes, duration: Duration) -> Result<()>;
}

/// Track statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct AudioTrackStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub errors: u64,
}

/// Opus sample track bound to one peer connection
pub struct AudioTrack {
    track: Arc<TrackLocalStaticSample>,
    stats: Mutex<AudioTrackStats>,
}

impl AudioTrack {
    pub fn new(config: &WebRtcConfig) -> Self {
        let track = Arc::new(TrackLocalStaticSample::new(
            opus_codec_capability(),
            config.track_id.clone(),
            config.stream_id.clone(),
        ));

        Self {
            track,
            stats: Mutex::new(AudioTrackStats::default()),
        }
    }

    /// Get track as TrackLocal
    pub fn as_track_local(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.track.clone()
    }

    pub fn stats(&self) -> AudioTrackStats {
        self.stats.lock().clone()
    }
}

impl AudioTrackStats {
    /// Fold another track's counters into this one
    pub fn accumulate(&mut self, other: &AudioTrackStats) {
        self.packets_sent += other.packets_sent;
        self.bytes_sent += other.bytes_sent;
        self.errors += other.errors;
    }
}

#[async_trait]
impl SampleSink for AudioTrack {
    async fn write_sample(&self, data: Bytes, duration: Duration) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let len = data.len() as u64;
        let sample = Sample {
            data,
            duration,
            ..Default::default()
        };

        match self.track.write_sample(&sample).await {
            Ok(_) => {
                let mut stats = self.stats.lock();
                stats.packets_sent += 1;
                stats.bytes_sent += len;
                Ok(())
            }
            Err(e) => {
                self.stats.lock().errors += 1;
                error!("Failed to write Opus sample: {}", e);
                Err(AppError::WebRtcError(format!(
                    "Failed to write audio sample: {}",
                    e
                )))
            }
        }
    }
}
