//! WebRTC audio delivery
//!
//! Each client that sends an offer gets its own peer connection with one
//! send-only Opus track:
//! ```text
//! AudioMultiplexer
//!        |
//!        v
//! AudioPipeline (gate -> Opus encode), one per client
//!        |
//!        v
//! AudioTrack (TrackLocalStaticSample)
//!        |
//!        v
//! AudioPeer
//!        |
//! Browser <-------- offer/answer/candidates ------- socket
//! ```

pub mod config;
pub mod negotiation;
pub mod peer;
pub mod signaling;
pub mod track;

pub use config::WebRtcConfig;
pub use negotiation::{Negotiator, PeerSession};
pub use peer::AudioPeer;
pub use signaling::{IceCandidate, NegotiationState, SdpKind, SessionDescription};
pub use track::{AudioTrack, AudioTrackStats, SampleSink};
