//! Display socket
//!
//! Each connection at `/ws` becomes one [`Client`]. A writer task drains the
//! client's outbound queue into the socket; the read loop routes inbound
//! messages by type. When either side ends, the client is unregistered, its
//! token cancelled and its media session closed.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::display::validate_brightness;
use crate::protocol::ClientMessage;
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let (client, outbound) = Client::new(&state.config.session);
    let id = client.id();

    state.hub.register(client.clone()).await;
    info!("WebSocket client {} connected", id);

    let mut writer = tokio::spawn(write_loop(sender, outbound, client.cancel_token().clone()));

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => dispatch(&state, &client, text).await,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client {} disconnected", id);
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket client {} receive error: {}", id, e);
                        break;
                    }
                    _ => {}
                }
            }
            _ = &mut writer => {
                debug!("Writer for client {} finished, closing", id);
                break;
            }
        }
    }

    client.cancel_token().cancel();
    writer.abort();
    state.hub.unregister(id).await;
    state.negotiator.close_session(&client).await;
    info!("WebSocket client {} cleaned up", id);
}

/// Forward queued messages to the socket in order
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let text = tokio::select! {
            _ = cancel.cancelled() => break,
            text = outbound.recv() => match text {
                Some(text) => text,
                // Closed by the hub
                None => break,
            },
        };

        if sender.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
    let _ = sender.close().await;
}

/// Route one inbound text frame
async fn dispatch(state: &AppState, client: &Arc<Client>, text: String) {
    let message = match ClientMessage::parse(&text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Ignoring message from client {}: {}", client.id(), e);
            return;
        }
    };

    let result = match message {
        ClientMessage::SetBrightness { brightness } => match validate_brightness(brightness) {
            Some(value) => state.display.set_brightness(value).await,
            None => {
                warn!(
                    "Client {} sent out of range brightness {}",
                    client.id(),
                    brightness
                );
                Ok(())
            }
        },
        ClientMessage::GetBrightness => state.display.announce_brightness().await,
        ClientMessage::SetTab { tab } => state.display.set_tab(tab).await,
        ClientMessage::GetTab => state.display.announce_tab().await,
        ClientMessage::Refresh => {
            client.request_refresh();
            Ok(())
        }
        ClientMessage::WebrtcConnected => {
            client.set_webrtc_connected(true);
            info!("Client {} reports media session connected", client.id());
            Ok(())
        }
        ClientMessage::WebrtcDisconnected => {
            if client.mark_webrtc_disconnected() {
                info!("Client {} reports media session lost, scheduling refresh", client.id());
                client.schedule_auto_refresh();
            }
            Ok(())
        }
        ClientMessage::WebrtcOffer { offer } => state.negotiator.handle_offer(client, offer).await,
        ClientMessage::IceCandidate { candidate } => {
            state.negotiator.handle_ice_candidate(client, candidate).await
        }
        ClientMessage::Unrecognized => {
            state.hub.broadcast(text).await;
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("Failed to handle message from client {}: {}", client.id(), e);
    }
}
