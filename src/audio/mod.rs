//! Audio capture, fan-out and encoding
//!
//! This module provides:
//! - The capture subprocess supervisor and frame drainer
//! - Frame fan-out to per-client queues
//! - Opus encoding with silence gating per client

pub mod capture;
pub mod encoder;
pub mod frame;
pub mod gate;
pub mod multiplexer;
pub mod streamer;

pub use capture::{drain_frames, CaptureState, CaptureSupervisor};
pub use encoder::{OpusConfig, OpusEncoder};
pub use frame::{AudioFrame, CHANNELS, PCM_FRAME_BYTES, SAMPLES_PER_FRAME, SAMPLE_RATE};
pub use gate::{GateEvent, SilenceGate};
pub use multiplexer::{AudioMultiplexer, MultiplexerStats, Subscription};
pub use streamer::{AudioPipeline, StreamExit, StreamSummary, FRAME_DURATION};
