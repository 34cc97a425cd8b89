//! Server network layer: TCP connections, the name handshake and the tick loop

use crate::client_manager::{outbound_queue, ClientManager, Outbound};
use crate::error::{JoinError, ServerError};
use crate::game::GameState;
use crate::settings::GameSettings;
use log::{debug, error, info, warn};
use shared::{Direction, LineBuffer, MAX_NAME_LEN};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};

const READ_CHUNK: usize = 1024;

/// Messages sent from connection tasks to the tick loop
#[derive(Debug)]
pub enum ServerMessage {
    /// A connection sent its name and wants a snake.
    Join {
        name: String,
        addr: SocketAddr,
        outbound: Outbound,
        reply: oneshot::Sender<Result<u32, JoinError>>,
    },
    /// Latest heading requested by a client.
    Move { client_id: u32, direction: Direction },
    /// The connection went away (EOF, read or write failure).
    Disconnected { client_id: u32 },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    settings: GameSettings,
    game_state: GameState,
    clients: ClientManager,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(addr: &str, settings: GameSettings) -> Result<Self, ServerError> {
        Self::with_game_state(addr, GameState::new(&settings), settings).await
    }

    /// Like `new`, with a caller-built game state (e.g. a seeded one).
    pub async fn with_game_state(
        addr: &str,
        game_state: GameState,
        settings: GameSettings,
    ) -> Result<Self, ServerError> {
        settings.validate()?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(settings.max_clients),
            settings,
            game_state,
            server_tx,
            server_rx,
        })
    }

    /// Address the listener is bound to, useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    /// Spawns the task accepting new connections
    fn spawn_acceptor(&mut self) -> Option<tokio::task::JoinHandle<()>> {
        let listener = self.listener.take()?;
        let server_tx = self.server_tx.clone();
        let handshake_timeout = self.settings.handshake_timeout();

        Some(tokio::spawn(async move {
            while !server_tx.is_closed() {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                        }
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            server_tx.clone(),
                            handshake_timeout,
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }))
    }

    /// Applies one message from a connection task
    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Join {
                name,
                addr,
                outbound,
                reply,
            } => {
                let result = self.admit(name, addr, outbound);
                if let Err(e) = &result {
                    warn!("Rejected connection from {}: {}", addr, e);
                }
                // The connection may have dropped while waiting for its id
                if let Err(Ok(client_id)) = reply.send(result) {
                    self.drop_client(client_id);
                }
            }
            ServerMessage::Move {
                client_id,
                direction,
            } => {
                self.game_state.request_direction(client_id, direction);
            }
            ServerMessage::Disconnected { client_id } => {
                self.drop_client(client_id);
            }
        }
    }

    /// Registers a client, places its snake and queues the handshake.
    fn admit(&mut self, name: String, addr: SocketAddr, outbound: Outbound) -> Result<u32, JoinError> {
        let client_id = self
            .clients
            .add_client(name.clone(), addr, outbound)
            .ok_or(JoinError::ServerFull)?;

        if let Err(e) = self.game_state.add_snake(client_id, name) {
            self.clients.remove_client(&client_id);
            return Err(e.into());
        }

        let handshake: Arc<str> = Arc::from(self.game_state.handshake(client_id));
        self.clients.send_to(client_id, handshake);
        Ok(client_id)
    }

    /// Forgets a client and flags its snake for one last broadcast.
    /// Repeated calls for the same id are harmless.
    fn drop_client(&mut self, client_id: u32) {
        if self.clients.remove_client(&client_id) {
            self.game_state.mark_disconnected(client_id);
        }
    }

    fn drain_messages(&mut self) {
        while let Ok(message) = self.server_rx.try_recv() {
            self.handle_message(message);
        }
    }

    /// One server tick: apply queued messages, simulate, broadcast.
    fn tick(&mut self) {
        self.drain_messages();
        self.game_state.update();

        let frame: Arc<str> = Arc::from(self.game_state.frame());
        let closed = self.clients.broadcast(frame);
        self.game_state.finish_broadcast();

        // Flagged after the broadcast so the dc frame goes out next tick
        for client_id in closed {
            debug!("Outbound queue for client {} is closed or full", client_id);
            self.drop_client(client_id);
        }

        if self.game_state.tick % 60 == 0 && !self.clients.is_empty() {
            debug!(
                "Tick {}: {} clients, {} snakes, {} power-ups",
                self.game_state.tick,
                self.clients.len(),
                self.game_state.world.snakes.len(),
                self.game_state.world.live_power_ups()
            );
        }
    }

    /// Main server loop
    ///
    /// Runs until the acceptor task dies; callers normally stop it from the
    /// outside (e.g. on Ctrl+C).
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let Some(mut acceptor) = self.spawn_acceptor() else {
            return Err(ServerError::Io(io::Error::new(
                io::ErrorKind::Other,
                "server is already running",
            )));
        };

        let mut tick_interval = interval(self.settings.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started: {} ms per frame, world size {}, {} walls",
            self.settings.ms_per_frame,
            self.settings.world_size,
            self.settings.walls.len()
        );

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.tick();
                },
                result = &mut acceptor => {
                    result?;
                    info!("Acceptor stopped, shutting down");
                    return Ok(());
                },
            }
        }
    }
}

/// Drives one TCP connection from the name handshake until it closes
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    handshake_timeout: Duration,
) {
    let (mut reader, writer) = stream.into_split();
    let mut buffer = LineBuffer::new();

    let name = match timeout(handshake_timeout, read_name(&mut reader, &mut buffer)).await {
        Ok(Ok(Some(raw))) => sanitize_name(&raw),
        Ok(Ok(None)) => {
            debug!("{} closed before sending a name", addr);
            return;
        }
        Ok(Err(e)) => {
            warn!("Handshake with {} failed: {}", addr, e);
            return;
        }
        Err(_) => {
            warn!("{} sent no name within {:?}", addr, handshake_timeout);
            return;
        }
    };

    let (outbound, outbound_rx) = outbound_queue();
    let (reply_tx, reply_rx) = oneshot::channel();
    let join = ServerMessage::Join {
        name,
        addr,
        outbound,
        reply: reply_tx,
    };
    if server_tx.send(join).is_err() {
        return;
    }

    // Rejected or shut down: dropping the stream closes the connection
    let Ok(Ok(client_id)) = reply_rx.await else {
        return;
    };

    tokio::spawn(write_frames(writer, outbound_rx, client_id, server_tx.clone()));

    if let Err(e) = read_commands(&mut reader, &mut buffer, client_id, &server_tx).await {
        debug!("Read from client {} failed: {}", client_id, e);
    }
    let _ = server_tx.send(ServerMessage::Disconnected { client_id });
}

/// Reads until the first complete line, which carries the player name
///
/// Anything after the name stays in `buffer`. Returns None if the peer
/// closes the connection first.
pub async fn read_name<R>(reader: &mut R, buffer: &mut LineBuffer) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(line) = buffer.next_line() {
            return Ok(Some(line));
        }

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buffer.push(&chunk[..n]);
    }
}

/// Strips line-ending residue and caps the name length.
pub fn sanitize_name(raw: &str) -> String {
    raw.trim_end_matches(['\r', '\n'])
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect()
}

/// Forwards move commands until EOF
///
/// Only the last valid direction of each received chunk is forwarded;
/// malformed lines are dropped.
pub async fn read_commands<R>(
    reader: &mut R,
    buffer: &mut LineBuffer,
    client_id: u32,
    server_tx: &mpsc::UnboundedSender<ServerMessage>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(direction) = buffer.latest_direction() {
            if server_tx
                .send(ServerMessage::Move {
                    client_id,
                    direction,
                })
                .is_err()
            {
                return Ok(());
            }
        }

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buffer.push(&chunk[..n]);
    }
}

/// Writes queued text to the socket until the queue closes or a write fails
pub async fn write_frames<W>(
    mut writer: W,
    mut outbound_rx: mpsc::Receiver<Arc<str>>,
    client_id: u32,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(text) = outbound_rx.recv().await {
        if let Err(e) = writer.write_all(text.as_bytes()).await {
            debug!("Write to client {} failed: {}", client_id, e);
            let _ = server_tx.send(ServerMessage::Disconnected { client_id });
            return;
        }
    }

    let _ = writer.shutdown().await;
}
