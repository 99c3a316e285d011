//! Opus audio encoder for WebRTC

use audiopus::{coder::Encoder, Application, Bitrate, Channels, SampleRate};
use bytes::Bytes;
use tracing::{info, trace};

use super::frame::{AudioFrame, CHANNELS, SAMPLES_PER_FRAME, SAMPLE_RATE};
use crate::config::StreamConfig;
use crate::error::{AppError, Result};

/// Largest packet libopus will produce
const MAX_PACKET_BYTES: usize = 4000;

/// Opus encoder configuration
#[derive(Debug, Clone)]
pub struct OpusConfig {
    /// Target bitrate in bps
    pub bitrate: u32,
    /// Encoder complexity (0-10)
    pub complexity: u8,
    /// Enable forward error correction
    pub fec: bool,
}

impl Default for OpusConfig {
    fn default() -> Self {
        Self {
            bitrate: 128_000,
            complexity: 5,
            fec: true,
        }
    }
}

impl From<&StreamConfig> for OpusConfig {
    fn from(config: &StreamConfig) -> Self {
        Self {
            bitrate: config.bitrate,
            complexity: config.complexity,
            ..Default::default()
        }
    }
}

/// 48kHz stereo Opus encoder, one per streaming client
pub struct OpusEncoder {
    encoder: Encoder,
    output_buffer: Vec<u8>,
    pcm_buffer: Vec<i16>,
    frames_encoded: u64,
}

impl OpusEncoder {
    pub fn new(config: OpusConfig) -> Result<Self> {
        let mut encoder = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
            .map_err(|e| {
                AppError::AudioError(format!("Failed to create Opus encoder: {:?}", e))
            })?;

        encoder
            .set_bitrate(Bitrate::BitsPerSecond(config.bitrate as i32))
            .map_err(|e| AppError::AudioError(format!("Failed to set bitrate: {:?}", e)))?;

        encoder
            .set_complexity(config.complexity)
            .map_err(|e| AppError::AudioError(format!("Failed to set complexity: {:?}", e)))?;

        if config.fec {
            encoder
                .set_inband_fec(true)
                .map_err(|e| AppError::AudioError(format!("Failed to enable FEC: {:?}", e)))?;
        }

        info!(
            "Opus encoder created: {}Hz {}ch {}bps complexity {}",
            SAMPLE_RATE, CHANNELS, config.bitrate, config.complexity
        );

        Ok(Self {
            encoder,
            output_buffer: vec![0u8; MAX_PACKET_BYTES],
            pcm_buffer: Vec::with_capacity(SAMPLES_PER_FRAME * CHANNELS as usize),
            frames_encoded: 0,
        })
    }

    /// Encode interleaved S16 samples
    pub fn encode(&mut self, pcm: &[i16]) -> Result<Bytes> {
        let encoded_len = self
            .encoder
            .encode(pcm, &mut self.output_buffer)
            .map_err(|e| AppError::AudioError(format!("Opus encode failed: {:?}", e)))?;

        self.frames_encoded += 1;
        trace!("Encoded {} samples to {} bytes Opus", pcm.len(), encoded_len);

        Ok(Bytes::copy_from_slice(&self.output_buffer[..encoded_len]))
    }

    /// Encode a raw PCM frame
    pub fn encode_frame(&mut self, frame: &AudioFrame) -> Result<Bytes> {
        let mut pcm = std::mem::take(&mut self.pcm_buffer);
        frame.decode_into(&mut pcm);
        let result = self.encode(&pcm);
        self.pcm_buffer = pcm;
        result
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }
}
