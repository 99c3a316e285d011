//! WebRTC peer connection wrapper

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;

use super::config::{rtc_configuration, WebRtcConfig};
use super::signaling::{IceCandidate, SessionDescription};
use super::track::AudioTrack;
use crate::error::{AppError, Result};

/// Send-only audio peer connection
pub struct AudioPeer {
    session_id: String,
    pc: Arc<RTCPeerConnection>,
    transport_rx: watch::Receiver<RTCPeerConnectionState>,
}

impl AudioPeer {
    /// Create a new peer connection
    pub async fn new(config: &WebRtcConfig, session_id: String) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| AppError::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(|e| {
            AppError::WebRtcError(format!("Failed to register interceptors: {}", e))
        })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = api
            .new_peer_connection(rtc_configuration(config))
            .await
            .map_err(|e| {
                AppError::WebRtcError(format!("Failed to create peer connection: {}", e))
            })?;
        let pc = Arc::new(pc);

        let (transport_tx, transport_rx) = watch::channel(RTCPeerConnectionState::New);
        let id = session_id.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            info!("Peer {} connection state: {}", id, s);
            let _ = transport_tx.send(s);
            Box::pin(async {})
        }));

        Ok(Self {
            session_id,
            pc,
            transport_rx,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Apply the browser's offer
    pub async fn set_remote_offer(&self, offer: SessionDescription) -> Result<()> {
        let desc = offer.into_rtc_offer()?;
        self.pc.set_remote_description(desc).await.map_err(|e| {
            AppError::WebRtcError(format!("Failed to set remote description: {}", e))
        })
    }

    /// Create an outbound Opus track and attach it
    pub async fn add_audio_track(&self, config: &WebRtcConfig) -> Result<Arc<AudioTrack>> {
        let track = Arc::new(AudioTrack::new(config));

        let sender = self
            .pc
            .add_track(track.as_track_local())
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to add audio track: {}", e)))?;

        // Interceptors only run while RTCP is being read
        let id = self.session_id.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
            debug!("RTCP reader for peer {} stopped", id);
        });

        info!("Audio track added to peer {}", self.session_id);
        Ok(track)
    }

    /// Forward every locally gathered candidate to `f` as it appears
    pub fn on_local_candidate<F>(&self, f: F)
    where
        F: Fn(IceCandidate) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let id = self.session_id.clone();
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let f = f.clone();
                let id = id.clone();
                Box::pin(async move {
                    let Some(candidate) = candidate else {
                        debug!("Peer {} finished gathering candidates", id);
                        return;
                    };
                    match candidate.to_json() {
                        Ok(init) => f(init.into()),
                        Err(e) => warn!("Peer {} produced unusable candidate: {}", id, e),
                    }
                })
            }));
    }

    /// Create the answer and install it as the local description
    pub async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to create answer: {}", e)))?;

        let reply = SessionDescription::from(&answer);

        self.pc.set_local_description(answer).await.map_err(|e| {
            AppError::WebRtcError(format!("Failed to set local description: {}", e))
        })?;

        Ok(reply)
    }

    /// Add a remote ICE candidate
    pub async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.pc
            .add_ice_candidate(candidate.into())
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to add ICE candidate: {}", e)))
    }

    /// Subscribe to transport state changes
    pub fn transport_watch(&self) -> watch::Receiver<RTCPeerConnectionState> {
        self.transport_rx.clone()
    }

    /// Close the connection
    pub async fn close(&self) -> Result<()> {
        self.pc
            .close()
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to close peer connection: {}", e)))
    }
}
