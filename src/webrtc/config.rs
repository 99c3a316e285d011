//! WebRTC configuration helpers

use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;

pub use crate::config::WebRtcConfig;

/// Opus clock rate
pub const OPUS_CLOCK_RATE: u32 = 48000;

/// Build the peer connection configuration (STUN only, no TURN)
pub fn rtc_configuration(config: &WebRtcConfig) -> RTCConfiguration {
    let ice_servers = config
        .stun_servers
        .iter()
        .filter(|url| !url.is_empty())
        .map(|url| RTCIceServer {
            urls: vec![url.clone()],
            ..Default::default()
        })
        .collect();

    RTCConfiguration {
        ice_servers,
        ..Default::default()
    }
}

/// RTP codec capability for the outbound Opus track
pub fn opus_codec_capability() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: "audio/opus".to_string(),
        clock_rate: OPUS_CLOCK_RATE,
        channels: 2,
        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
        rtcp_feedback: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_public_stun() {
        let rtc = rtc_configuration(&WebRtcConfig::default());
        assert_eq!(rtc.ice_servers.len(), 1);
        assert_eq!(rtc.ice_servers[0].urls, vec!["stun:stun.l.google.com:19302"]);
    }

    #[test]
    fn test_empty_urls_are_skipped() {
        let config = WebRtcConfig {
            stun_servers: vec![String::new()],
            ..Default::default()
        };
        assert!(rtc_configuration(&config).ice_servers.is_empty());
    }
}
