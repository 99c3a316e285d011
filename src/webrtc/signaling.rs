//! WebRTC signaling types and messages

use serde::{Deserialize, Serialize};
use std::fmt;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::error::{AppError, Result};

/// Session description kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Session description as exchanged with the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }

    /// Convert a remote offer into the media stack's representation
    pub fn into_rtc_offer(self) -> Result<RTCSessionDescription> {
        if self.kind != SdpKind::Offer {
            return Err(AppError::WebRtcError(format!(
                "Expected offer, got {:?}",
                self.kind
            )));
        }
        RTCSessionDescription::offer(self.sdp)
            .map_err(|e| AppError::WebRtcError(format!("Invalid SDP offer: {}", e)))
    }
}

impl From<&RTCSessionDescription> for SessionDescription {
    fn from(desc: &RTCSessionDescription) -> Self {
        let kind = match desc.sdp_type {
            RTCSdpType::Offer => SdpKind::Offer,
            RTCSdpType::Pranswer => SdpKind::Pranswer,
            RTCSdpType::Rollback => SdpKind::Rollback,
            _ => SdpKind::Answer,
        };
        Self {
            kind,
            sdp: desc.sdp.clone(),
        }
    }
}

/// ICE candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate string
    pub candidate: String,
    /// SDP mid (media ID)
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// SDP mline index
    #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
    /// Username fragment
    #[serde(rename = "usernameFragment", default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }

    pub fn with_mid(mut self, mid: impl Into<String>, index: u16) -> Self {
        self.sdp_mid = Some(mid.into());
        self.sdp_mline_index = Some(index);
        self
    }
}

impl From<IceCandidate> for RTCIceCandidateInit {
    fn from(c: IceCandidate) -> Self {
        RTCIceCandidateInit {
            candidate: c.candidate,
            sdp_mid: c.sdp_mid,
            sdp_mline_index: c.sdp_mline_index,
            username_fragment: c.username_fragment,
        }
    }
}

impl From<RTCIceCandidateInit> for IceCandidate {
    fn from(init: RTCIceCandidateInit) -> Self {
        Self {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
            username_fragment: init.username_fragment,
        }
    }
}

/// Per-client negotiation state
///
/// ```text
/// Idle -> OfferReceived -> Answered -> Connected -> Disconnected | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    #[default]
    Idle,
    OfferReceived,
    Answered,
    Connected,
    Disconnected,
    Failed,
}

impl NegotiationState {
    /// Map a transport report onto the negotiation state, if it moves it
    pub fn from_transport(state: RTCPeerConnectionState) -> Option<Self> {
        match state {
            RTCPeerConnectionState::Connected => Some(Self::Connected),
            RTCPeerConnectionState::Disconnected => Some(Self::Disconnected),
            RTCPeerConnectionState::Failed => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationState::Idle => write!(f, "idle"),
            NegotiationState::OfferReceived => write!(f, "offer_received"),
            NegotiationState::Answered => write!(f, "answered"),
            NegotiationState::Connected => write!(f, "connected"),
            NegotiationState::Disconnected => write!(f, "disconnected"),
            NegotiationState::Failed => write!(f, "failed"),
        }
    }
}
