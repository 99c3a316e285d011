//! Connection registry
//!
//! Register, unregister and broadcast requests are queued to a single
//! dispatcher task, so membership changes never race with a broadcast in
//! progress. Broadcasting never waits on a client: a client whose outbound
//! queue is full is treated as dead, closed and dropped once the delivery
//! pass finishes.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::{Client, ClientId};
use crate::error::{AppError, Result};
use crate::protocol::ServerMessage;

/// Hub request queue capacity
const EVENT_CHANNEL_CAPACITY: usize = 256;

enum HubEvent {
    Register(Arc<Client>),
    Unregister(ClientId),
    Broadcast(String),
    Count(oneshot::Sender<usize>),
}

/// Registry of live clients
pub struct Hub {
    clients: RwLock<HashMap<ClientId, Arc<Client>>>,
    events_tx: mpsc::Sender<HubEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<HubEvent>>>,
}

impl Hub {
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            clients: RwLock::new(HashMap::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    /// Spawn the dispatcher task; later calls are no-ops
    pub fn start(self: &Arc<Self>) {
        let Some(mut events_rx) = self.events_rx.lock().take() else {
            return;
        };

        let hub = self.clone();
        tokio::spawn(async move {
            info!("Hub dispatcher started");
            while let Some(event) = events_rx.recv().await {
                hub.handle(event);
            }
            info!("Hub dispatcher stopped");
        });
    }

    pub async fn register(&self, client: Arc<Client>) {
        self.submit(HubEvent::Register(client)).await;
    }

    /// Remove a client and close its outbound queue; no-op if already gone
    pub async fn unregister(&self, id: ClientId) {
        self.submit(HubEvent::Unregister(id)).await;
    }

    /// Deliver a raw payload to every live client
    pub async fn broadcast(&self, payload: String) {
        self.submit(HubEvent::Broadcast(payload)).await;
    }

    pub async fn broadcast_message(&self, message: &ServerMessage) -> Result<()> {
        self.broadcast(message.to_json()?).await;
        Ok(())
    }

    /// Number of live clients, ordered after every request queued before it
    pub async fn client_count(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.submit(HubEvent::Count(tx)).await;
        rx.await
            .map_err(|_| AppError::Internal("Hub dispatcher not running".to_string()))
    }

    /// Snapshot of the live clients
    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.clients.read().values().cloned().collect()
    }

    async fn submit(&self, event: HubEvent) {
        if self.events_tx.send(event).await.is_err() {
            warn!("Hub dispatcher is gone, request dropped");
        }
    }

    fn handle(&self, event: HubEvent) {
        match event {
            HubEvent::Register(client) => {
                let id = client.id();
                let count = {
                    let mut clients = self.clients.write();
                    clients.insert(id, client);
                    clients.len()
                };
                info!("Client {} registered ({} connected)", id, count);
            }
            HubEvent::Unregister(id) => {
                let removed = self.clients.write().remove(&id);
                if let Some(client) = removed {
                    client.close_outbound();
                    info!("Client {} unregistered", id);
                }
            }
            HubEvent::Broadcast(payload) => self.deliver(payload),
            HubEvent::Count(reply) => {
                let _ = reply.send(self.clients.read().len());
            }
        }
    }

    fn deliver(&self, payload: String) {
        let mut dead = Vec::new();
        {
            let clients = self.clients.read();
            for (id, client) in clients.iter() {
                if client.try_send(payload.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }

        if dead.is_empty() {
            return;
        }

        let mut clients = self.clients.write();
        for id in dead {
            if let Some(client) = clients.remove(&id) {
                client.close_outbound();
                warn!("Client {} not keeping up, dropped from hub", id);
            }
        }
        debug!("{} clients remain after broadcast", clients.len());
    }
}
