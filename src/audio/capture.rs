//! Capture subprocess supervisor and frame drainer
//!
//! The supervisor owns at most one capture process for the lifetime of the
//! server. The first caller of [`CaptureSupervisor::ensure_running`] spawns
//! it; every later caller sees the stored handle and returns immediately.

use bytes::Bytes;
use serde::Serialize;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use super::frame::{AudioFrame, PCM_FRAME_BYTES};
use super::multiplexer::AudioMultiplexer;
use crate::config::CaptureConfig;
use crate::error::{AppError, Result};

/// Capture process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    /// Never started
    Stopped,
    /// Process spawned, output being drained
    Running,
    /// Output stream ended
    Ended,
}

/// Singleton owner of the capture subprocess
pub struct CaptureSupervisor {
    config: CaptureConfig,
    mux: Arc<AudioMultiplexer>,
    child: Mutex<Option<Child>>,
    state: Arc<watch::Sender<CaptureState>>,
    state_rx: watch::Receiver<CaptureState>,
    starts: AtomicU64,
}

impl CaptureSupervisor {
    pub fn new(config: CaptureConfig, mux: Arc<AudioMultiplexer>) -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(CaptureState::Stopped);
        Arc::new(Self {
            config,
            mux,
            child: Mutex::new(None),
            state: Arc::new(state_tx),
            state_rx,
            starts: AtomicU64::new(0),
        })
    }

    /// Start the capture process unless it already exists
    ///
    /// The lock is held across check-and-spawn so concurrent callers
    /// collapse into one process. On failure nothing is stored and a later
    /// call may try again.
    pub async fn ensure_running(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        if child.is_some() {
            return Ok(());
        }

        let args = self.config.args();
        info!("Starting audio capture: {} {}", self.config.program, args.join(" "));

        let mut process = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::CaptureStart(format!(
                    "Failed to spawn {}: {}",
                    self.config.program, e
                ))
            })?;

        let stdout = process.stdout.take().ok_or_else(|| {
            AppError::CaptureStart("Capture process has no output stream".to_string())
        })?;

        *child = Some(process);
        self.starts.fetch_add(1, Ordering::Relaxed);
        let _ = self.state.send(CaptureState::Running);

        let mux = self.mux.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            let frames = drain_frames(stdout, &mux).await;
            info!("Audio capture stream ended after {} frames", frames);
            let _ = state.send(CaptureState::Ended);
        });

        Ok(())
    }

    pub fn state(&self) -> CaptureState {
        *self.state_rx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == CaptureState::Running
    }

    /// Number of processes spawned so far (0 or 1)
    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::Relaxed)
    }
}

/// Read fixed-size PCM frames from `reader` into the multiplexer
///
/// Returns the number of complete frames published. A short read at end of
/// stream is a normal stop and the partial tail is discarded.
pub async fn drain_frames<R>(reader: R, mux: &AudioMultiplexer) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(PCM_FRAME_BYTES * 2, reader);
    let mut buffer = vec![0u8; PCM_FRAME_BYTES];
    let mut sequence = 0u64;

    loop {
        match reader.read_exact(&mut buffer).await {
            Ok(_) => {
                mux.publish(AudioFrame::new(Bytes::copy_from_slice(&buffer), sequence));
                sequence += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("Capture stream reached end of file");
                break;
            }
            Err(e) => {
                error!("Audio capture read error: {}", e);
                break;
            }
        }
    }

    sequence
}
