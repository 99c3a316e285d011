//! Per-client offer/answer/candidate handling
//!
//! ```text
//! Idle -> OfferReceived -> Answered -> Connected -> Disconnected | Failed
//! ```
//!
//! A successful offer leaves a [`PeerSession`] on the client. When the
//! transport first reports `connected`, the session's audio pipeline is
//! spawned under a child of the client's cancellation token, so closing the
//! client or replacing the session stops it.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::WebRtcConfig;
use super::peer::AudioPeer;
use super::signaling::{IceCandidate, NegotiationState, SessionDescription};
use super::track::{AudioTrack, SampleSink};
use crate::audio::AudioPipeline;
use crate::client::Client;
use crate::error::Result;
use crate::protocol::ServerMessage;

/// A negotiated media session owned by one client
pub struct PeerSession {
    peer: Arc<AudioPeer>,
    track: Arc<AudioTrack>,
    cancel: CancellationToken,
}

impl PeerSession {
    pub fn track(&self) -> &Arc<AudioTrack> {
        &self.track
    }

    /// Stop the pipeline and close the peer connection
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.peer.close().await {
            warn!("Error closing peer {}: {}", self.peer.session_id(), e);
        }
    }
}

/// Holds local candidates until the answer has been queued
///
/// The browser rejects candidates that arrive before the remote description.
struct CandidateRelay {
    client: Weak<Client>,
    state: Mutex<RelayState>,
}

#[derive(Default)]
struct RelayState {
    answered: bool,
    pending: Vec<IceCandidate>,
}

impl CandidateRelay {
    fn new(client: &Arc<Client>) -> Arc<Self> {
        Arc::new(Self {
            client: Arc::downgrade(client),
            state: Mutex::new(RelayState::default()),
        })
    }

    fn push(&self, candidate: IceCandidate) {
        let mut state = self.state.lock();
        if state.answered {
            self.forward(candidate);
        } else {
            state.pending.push(candidate);
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.answered = true;
        for candidate in std::mem::take(&mut state.pending) {
            self.forward(candidate);
        }
    }

    fn forward(&self, candidate: IceCandidate) {
        if let Some(client) = self.client.upgrade() {
            debug!("Sending local candidate to client {}", client.id());
            client.send_message(&ServerMessage::IceCandidate { candidate });
        }
    }
}

/// Runs negotiation for every client
#[derive(Clone)]
pub struct Negotiator {
    config: WebRtcConfig,
    pipeline: AudioPipeline,
}

impl Negotiator {
    pub fn new(config: WebRtcConfig, pipeline: AudioPipeline) -> Self {
        Self { config, pipeline }
    }

    /// Answer a browser offer, replacing any earlier session
    ///
    /// On failure the client is left without a session in `Idle`; it is
    /// expected to offer again.
    pub async fn handle_offer(&self, client: &Arc<Client>, offer: SessionDescription) -> Result<()> {
        let mut slot = client.session().lock().await;
        if let Some(previous) = slot.take() {
            info!("Client {} re-offered, closing previous session", client.id());
            previous.close().await;
        }

        client.set_negotiation_state(NegotiationState::OfferReceived);

        let peer = match AudioPeer::new(&self.config, client.id().to_string()).await {
            Ok(peer) => Arc::new(peer),
            Err(e) => {
                client.set_negotiation_state(NegotiationState::Idle);
                return Err(e);
            }
        };

        let relay = CandidateRelay::new(client);
        let (track, answer) = match self.prepare(&peer, offer, &relay).await {
            Ok(parts) => parts,
            Err(e) => {
                let _ = peer.close().await;
                client.set_negotiation_state(NegotiationState::Idle);
                return Err(e);
            }
        };

        let cancel = client.cancel_token().child_token();
        self.watch_transport(client, &peer, track.clone(), cancel.clone());

        *slot = Some(PeerSession {
            peer,
            track,
            cancel,
        });
        drop(slot);

        client.send_message(&ServerMessage::WebrtcAnswer { answer });
        relay.release();
        client.set_negotiation_state(NegotiationState::Answered);
        info!("Answered offer from client {}", client.id());
        Ok(())
    }

    async fn prepare(
        &self,
        peer: &AudioPeer,
        offer: SessionDescription,
        relay: &Arc<CandidateRelay>,
    ) -> Result<(Arc<AudioTrack>, SessionDescription)> {
        peer.set_remote_offer(offer).await?;
        let track = peer.add_audio_track(&self.config).await?;

        let relay = relay.clone();
        peer.on_local_candidate(move |candidate| relay.push(candidate));

        let answer = peer.create_answer().await?;
        Ok((track, answer))
    }

    /// Apply a remote candidate; discarded when no session exists yet
    pub async fn handle_ice_candidate(&self, client: &Client, candidate: IceCandidate) -> Result<()> {
        let slot = client.session().lock().await;
        let Some(session) = slot.as_ref() else {
            warn!(
                "Client {} sent a candidate before any offer, discarding",
                client.id()
            );
            return Ok(());
        };
        session.peer.add_ice_candidate(candidate).await
    }

    /// Tear down the client's session, if any
    pub async fn close_session(&self, client: &Client) {
        if let Some(session) = client.session().lock().await.take() {
            session.close().await;
        }
    }

    fn watch_transport(
        &self,
        client: &Arc<Client>,
        peer: &AudioPeer,
        track: Arc<AudioTrack>,
        cancel: CancellationToken,
    ) {
        let client = Arc::downgrade(client);
        let mut transport = peer.transport_watch();
        let pipeline = self.pipeline.clone();
        let id = peer.session_id().to_string();

        tokio::spawn(async move {
            let mut streaming = false;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = transport.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let reported = *transport.borrow_and_update();
                let Some(state) = NegotiationState::from_transport(reported) else {
                    continue;
                };
                let Some(client) = client.upgrade() else {
                    break;
                };
                client.set_negotiation_state(state);

                if state == NegotiationState::Connected && !streaming {
                    streaming = true;
                    let pipeline = pipeline.clone();
                    let sink: Arc<dyn SampleSink> = track.clone();
                    let cancel = cancel.clone();
                    let id = id.clone();
                    tokio::spawn(async move {
                        match pipeline.stream_to(&id, sink, cancel).await {
                            Ok(summary) => debug!("Client {} stream summary: {:?}", id, summary),
                            Err(e) => error!("Failed to start audio for client {}: {}", id, e),
                        }
                    });
                }
            }
            debug!("Transport watcher for client {} stopped", id);
        });
    }
}
