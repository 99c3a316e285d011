use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server settings
    pub web: WebConfig,
    /// Audio capture subprocess settings
    pub capture: CaptureConfig,
    /// Per-client streaming settings
    pub stream: StreamConfig,
    /// WebRTC negotiation settings
    pub webrtc: WebRtcConfig,
    /// Client session settings
    pub session: SessionConfig,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub bind_address: String,
    /// HTTP port
    pub http_port: u16,
    /// Directory served for non-API requests
    pub static_dir: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 8080,
            static_dir: "./static".to_string(),
        }
    }
}

/// Audio capture configuration
///
/// Describes the PulseAudio recorder launched once per process to read the
/// shared monitor source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Recorder binary
    pub program: String,
    /// Source device name
    pub device: String,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u32,
    /// Requested recorder latency
    pub latency_ms: u32,
    /// Requested recorder processing time
    pub process_time_ms: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            program: "parec".to_string(),
            device: "snapcast_sink.monitor".to_string(),
            sample_rate: 48000,
            channels: 2,
            latency_ms: 10,
            process_time_ms: 10,
        }
    }
}

impl CaptureConfig {
    /// Command line arguments for the recorder (signed 16-bit little endian output)
    pub fn args(&self) -> Vec<String> {
        vec![
            "--format=s16le".to_string(),
            format!("--rate={}", self.sample_rate),
            format!("--channels={}", self.channels),
            format!("--latency-msec={}", self.latency_ms),
            format!("--process-time-msec={}", self.process_time_ms),
            format!("--device={}", self.device),
        ]
    }
}

/// Streaming pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Opus target bitrate in bps
    pub bitrate: u32,
    /// Opus encoder complexity, lower is cheaper
    pub complexity: u8,
    /// Samples with an absolute amplitude above this are audible
    pub silence_threshold: i16,
    /// Consecutive silent frames before transmission pauses
    pub silence_frames: u32,
    /// Per-subscriber frame queue capacity
    pub subscriber_capacity: usize,
    /// Multiplexer intake queue capacity
    pub intake_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bitrate: 128_000,
            complexity: 5,
            silence_threshold: 100,
            silence_frames: 25, // 500ms of 20ms frames
            subscriber_capacity: 50,
            intake_capacity: 100,
        }
    }
}

/// WebRTC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRtcConfig {
    /// STUN server URLs
    pub stun_servers: Vec<String>,
    /// Outbound audio track ID
    pub track_id: String,
    /// Outbound media stream ID
    pub stream_id: String,
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            track_id: "audio".to_string(),
            stream_id: "smartclock-stream".to_string(),
        }
    }
}

/// Client session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Outbound message queue capacity per client
    pub outbound_capacity: usize,
    /// Minimum time between two refresh commands to the same client
    pub refresh_cooldown_secs: u64,
    /// Grace period after a reported media disconnect before auto-refresh
    pub auto_refresh_grace_secs: u64,
    /// Clock tick broadcast period
    pub clock_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            refresh_cooldown_secs: 120,
            auto_refresh_grace_secs: 5,
            clock_interval_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_args() {
        let args = CaptureConfig::default().args();
        assert_eq!(
            args,
            vec![
                "--format=s16le",
                "--rate=48000",
                "--channels=2",
                "--latency-msec=10",
                "--process-time-msec=10",
                "--device=snapcast_sink.monitor",
            ]
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"web": {"http_port": 9000}, "stream": {"bitrate": 96000}}"#)
                .unwrap();
        assert_eq!(config.web.http_port, 9000);
        assert_eq!(config.web.bind_address, "0.0.0.0");
        assert_eq!(config.stream.bitrate, 96000);
        assert_eq!(config.stream.silence_frames, 25);
        assert_eq!(config.session.refresh_cooldown_secs, 120);
    }
}
