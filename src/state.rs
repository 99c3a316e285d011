use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioMultiplexer, AudioPipeline, CaptureSupervisor};
use crate::config::AppConfig;
use crate::display::DisplayState;
use crate::hub::Hub;
use crate::webrtc::Negotiator;

/// Application-wide state shared across handlers
///
/// Built once at startup and passed to every component; there are no
/// process globals. Constructing it spawns the hub and multiplexer
/// dispatchers, so it must be created inside a Tokio runtime.
pub struct AppState {
    /// Effective configuration
    pub config: AppConfig,
    /// Live client registry
    pub hub: Arc<Hub>,
    /// Brightness and active tab
    pub display: DisplayState,
    /// Shared capture and fan-out, handed to client pipelines
    pub audio: AudioPipeline,
    /// Offer/answer handling for every client
    pub negotiator: Negotiator,
    /// Cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let hub = Hub::new();
        hub.start();

        let mux = AudioMultiplexer::new(&config.stream);
        mux.start();

        let capture = CaptureSupervisor::new(config.capture.clone(), mux.clone());
        let audio = AudioPipeline::new(capture, mux, config.stream.clone());
        let negotiator = Negotiator::new(config.webrtc.clone(), audio.clone());

        Arc::new(Self {
            display: DisplayState::new(hub.clone()),
            config,
            hub,
            audio,
            negotiator,
            shutdown: CancellationToken::new(),
        })
    }
}
