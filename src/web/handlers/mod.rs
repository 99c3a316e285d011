use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::{CaptureState, MultiplexerStats};
use crate::display::validate_brightness;
use crate::error::{AppError, Result};
use crate::protocol::Tab;
use crate::state::AppState;
use crate::webrtc::AudioTrackStats;

/// Process name probed by the snap status endpoint
const SNAPCLIENT_PROCESS: &str = "snapclient";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn parse_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e.body_text())))
}

// ============================================================================
// Display state
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct BrightnessResponse {
    pub brightness: u8,
}

#[derive(Debug, Deserialize)]
pub struct SetBrightnessRequest {
    pub brightness: i64,
}

pub async fn get_brightness(State(state): State<Arc<AppState>>) -> Json<BrightnessResponse> {
    Json(BrightnessResponse {
        brightness: state.display.brightness(),
    })
}

pub async fn set_brightness(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<SetBrightnessRequest>, JsonRejection>,
) -> Result<Json<BrightnessResponse>> {
    let req = parse_body(body)?;
    let brightness = validate_brightness(req.brightness).ok_or_else(|| {
        AppError::BadRequest("Brightness must be between 0 and 100".to_string())
    })?;

    info!("Brightness set to {} via HTTP", brightness);
    state.display.set_brightness(brightness).await?;
    Ok(Json(BrightnessResponse { brightness }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TabResponse {
    pub tab: Tab,
}

#[derive(Debug, Deserialize)]
pub struct SetTabRequest {
    pub tab: String,
}

pub async fn get_tab(State(state): State<Arc<AppState>>) -> Json<TabResponse> {
    Json(TabResponse {
        tab: state.display.tab(),
    })
}

pub async fn set_tab(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<SetTabRequest>, JsonRejection>,
) -> Result<Json<TabResponse>> {
    let req = parse_body(body)?;
    let tab: Tab = req.tab.parse()?;

    info!("Tab set to {} via HTTP", tab);
    state.display.set_tab(tab).await?;
    Ok(Json(TabResponse { tab }))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
}

/// Ask every connected display to reload, subject to each one's cooldown
pub async fn refresh(State(state): State<Arc<AppState>>) -> Json<RefreshResponse> {
    let clients = state.hub.clients();
    info!("Refresh requested via HTTP for {} clients", clients.len());
    for client in clients {
        client.request_refresh();
    }
    Json(RefreshResponse {
        status: "refresh sent",
    })
}

// ============================================================================
// Device info
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub timezone: String,
}

/// Display configuration
pub async fn get_config() -> Json<ConfigResponse> {
    let timezone = std::env::var("TZ")
        .ok()
        .filter(|tz| !tz.is_empty())
        .unwrap_or_else(|| "UTC".to_string());
    Json(ConfigResponse { timezone })
}

#[derive(Debug, Serialize)]
pub struct SnapStatusResponse {
    pub running: bool,
    pub message: &'static str,
}

/// Whether the snapcast client process is up
pub async fn snap_status() -> Json<SnapStatusResponse> {
    let running = match tokio::process::Command::new("pgrep")
        .args(["-x", SNAPCLIENT_PROCESS])
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(e) => {
            debug!("pgrep unavailable: {}", e);
            false
        }
    };

    Json(SnapStatusResponse {
        running,
        message: if running {
            "Snapclient is running"
        } else {
            "Snapclient not running"
        },
    })
}

#[derive(Debug, Serialize)]
pub struct AudioStatusResponse {
    pub capture: CaptureState,
    pub capture_running: bool,
    #[serde(flatten)]
    pub multiplexer: MultiplexerStats,
    /// Clients with a negotiated media session
    pub webrtc_sessions: usize,
    /// Counters summed over every session's track
    pub tracks: AudioTrackStats,
}

/// Capture, fan-out and track status
pub async fn audio_status(State(state): State<Arc<AppState>>) -> Json<AudioStatusResponse> {
    let mut webrtc_sessions = 0;
    let mut tracks = AudioTrackStats::default();
    for client in state.hub.clients() {
        if let Some(session) = client.session().lock().await.as_ref() {
            webrtc_sessions += 1;
            tracks.accumulate(&session.track().stats());
        }
    }

    let capture = state.audio.capture();
    Json(AudioStatusResponse {
        capture: capture.state(),
        capture_running: capture.is_running(),
        multiplexer: state.audio.multiplexer().stats(),
        webrtc_sessions,
        tracks,
    })
}
