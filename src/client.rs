//! One live socket connection
//!
//! A [`Client`] owns its outbound queue, its stop token and its media
//! session. The socket handler creates it, the hub holds it while it is
//! live, and every task started on its behalf watches [`Client::cancel_token`].

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::protocol::ServerMessage;
use crate::utils::Cooldown;
use crate::webrtc::negotiation::PeerSession;
use crate::webrtc::NegotiationState;

pub type ClientId = Uuid;

/// Why an outbound message was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Queue at capacity
    Full,
    /// Queue already closed
    Closed,
}

/// A live client connection
pub struct Client {
    id: ClientId,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    cancel: CancellationToken,
    session: tokio::sync::Mutex<Option<PeerSession>>,
    negotiation: watch::Sender<NegotiationState>,
    webrtc_connected: AtomicBool,
    refresh: Cooldown,
    auto_refresh_grace: Duration,
}

impl Client {
    /// Create a client and the receiving end of its outbound queue
    pub fn new(config: &SessionConfig) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (negotiation, _) = watch::channel(NegotiationState::Idle);

        let client = Arc::new(Self {
            id: Uuid::new_v4(),
            outbound: Mutex::new(Some(tx)),
            cancel: CancellationToken::new(),
            session: tokio::sync::Mutex::new(None),
            negotiation,
            webrtc_connected: AtomicBool::new(false),
            refresh: Cooldown::new(Duration::from_secs(config.refresh_cooldown_secs)),
            auto_refresh_grace: Duration::from_secs(config.auto_refresh_grace_secs),
        });

        (client, rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Queue a raw payload without waiting
    pub fn try_send(&self, payload: String) -> Result<(), SendError> {
        let outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return Err(SendError::Closed);
        };
        tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Queue a message to this client only; dropped if the queue is full
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        let payload = match message.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode message for client {}: {}", self.id, e);
                return false;
            }
        };

        match self.try_send(payload) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropped message for client {} ({:?})", self.id, e);
                false
            }
        }
    }

    /// Close the outbound queue; returns false if it was already closed
    pub fn close_outbound(&self) -> bool {
        self.outbound.lock().take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.lock().is_none()
    }

    /// Stop signal shared by every task serving this client
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Current media session, if negotiated
    pub fn session(&self) -> &tokio::sync::Mutex<Option<PeerSession>> {
        &self.session
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        *self.negotiation.borrow()
    }

    pub fn set_negotiation_state(&self, state: NegotiationState) {
        let previous = self.negotiation.send_replace(state);
        if previous != state {
            debug!("Client {} negotiation {} -> {}", self.id, previous, state);
        }
    }

    pub fn watch_negotiation(&self) -> watch::Receiver<NegotiationState> {
        self.negotiation.subscribe()
    }

    /// Browser-reported media session state
    pub fn set_webrtc_connected(&self, connected: bool) {
        self.webrtc_connected.store(connected, Ordering::SeqCst);
    }

    /// Clear the connected flag, returning whether it was set
    pub fn mark_webrtc_disconnected(&self) -> bool {
        self.webrtc_connected.swap(false, Ordering::SeqCst)
    }

    pub fn is_webrtc_connected(&self) -> bool {
        self.webrtc_connected.load(Ordering::SeqCst)
    }

    /// Send a refresh command to this client, at most once per cooldown
    pub fn request_refresh(&self) -> bool {
        self.request_refresh_at(Instant::now())
    }

    pub fn request_refresh_at(&self, now: Instant) -> bool {
        if let Err(remaining) = self.refresh.try_acquire_at(now) {
            info!(
                "Refresh for client {} suppressed, cooldown {}s remaining",
                self.id,
                remaining.as_secs()
            );
            return false;
        }

        info!("Sending refresh to client {}", self.id);
        self.send_message(&ServerMessage::Refresh)
    }

    /// Refresh the client if its media session is not back within the grace period
    pub fn schedule_auto_refresh(self: &Arc<Self>) {
        let client = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = client.cancel.cancelled() => return,
                _ = tokio::time::sleep(client.auto_refresh_grace) => {}
            }

            if client.is_webrtc_connected() {
                debug!("Client {} media session recovered, no refresh needed", client.id);
                return;
            }
            client.request_refresh();
        });
    }
}
