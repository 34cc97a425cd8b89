//! Connected client bookkeeping for the snake server
//!
//! This module tracks every client that completed the name handshake:
//! - Id allocation (ids start at 1 and are never reused)
//! - Capacity enforcement against the configured client limit
//! - The outbound frame queue feeding each connection's writer task
//!
//! The manager is owned by the tick loop, so it needs no locking. Network
//! tasks only ever see the sending half of a client's queue.

use log::{info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Frames a client may fall behind before it is treated as gone.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Queue of serialized text waiting to be written to one client.
pub type Outbound = mpsc::Sender<Arc<str>>;

/// Creates the queue between the tick loop and one connection's writer.
pub fn outbound_queue() -> (Outbound, mpsc::Receiver<Arc<str>>) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// A client that finished its handshake
///
/// Each client keeps:
/// - Connection metadata (id, player name, peer address)
/// - The sender feeding its writer task
/// - Counters used for periodic diagnostics
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier, also used as the snake id
    pub id: u32,
    /// Player name as received in the handshake
    pub name: String,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// Frames queued for this client
    pub outbound: Outbound,
    /// When the handshake completed
    pub connected_at: Instant,
    /// Number of frames successfully queued
    pub frames_sent: u64,
}

impl Client {
    pub fn new(id: u32, name: String, addr: SocketAddr, outbound: Outbound) -> Self {
        Self {
            id,
            name,
            addr,
            outbound,
            connected_at: Instant::now(),
            frames_sent: 0,
        }
    }

    /// Queues text for the writer task
    ///
    /// Returns false once the writer has gone away or has fallen a full
    /// queue behind. Either way the client should be dropped.
    pub fn send(&mut self, text: Arc<str>) -> bool {
        match self.outbound.try_send(text) {
            Ok(()) => {
                self.frames_sent += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Client {} ({}) is not keeping up", self.id, self.name);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Manages all connected clients
///
/// The ClientManager hands out client ids, enforces the capacity limit and
/// fans each frame out to every connection.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty roster with the given capacity.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Registers a client that finished its handshake
    ///
    /// Returns the assigned id, or None when the server is at capacity.
    /// Ids are consumed even if the caller later drops the client again.
    pub fn add_client(&mut self, name: String, addr: SocketAddr, outbound: Outbound) -> Option<u32> {
        if self.is_full() {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} ({}) connected from {}", client_id, name, addr);
        self.clients
            .insert(client_id, Client::new(client_id, name, addr, outbound));

        Some(client_id)
    }

    /// Removes a client. Returns false if it was already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} ({}) disconnected after {:.1}s, {} frames",
                client.id,
                client.name,
                client.connected_at.elapsed().as_secs_f64(),
                client.frames_sent
            );
            true
        } else {
            false
        }
    }

    /// Queues text for a single client. False if the client is unknown or
    /// its connection is closed.
    pub fn send_to(&mut self, client_id: u32, text: Arc<str>) -> bool {
        self.clients
            .get_mut(&client_id)
            .map_or(false, |client| client.send(text))
    }

    /// Queues one frame for every client
    ///
    /// The frame is shared, not copied, between clients. Returns the ids of
    /// clients whose connection turned out to be closed or stalled; the
    /// caller decides what to do with them.
    pub fn broadcast(&mut self, frame: Arc<str>) -> Vec<u32> {
        let mut closed: Vec<u32> = self
            .clients
            .values_mut()
            .filter_map(|client| {
                if client.send(Arc::clone(&frame)) {
                    None
                } else {
                    Some(client.id)
                }
            })
            .collect();
        closed.sort_unstable();
        closed
    }

    pub fn contains(&self, client_id: u32) -> bool {
        self.clients.contains_key(&client_id)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
