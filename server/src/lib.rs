//! # Snake Server Library
//!
//! This library provides the authoritative server for a multiplayer snake
//! game. It owns the canonical world, advances it at a fixed tick rate and
//! streams every frame to all connected clients as newline-delimited JSON.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Movement, turning, growth, deaths, respawns and power-up spawning are all
//! decided here. Clients only send the heading they would like; they never
//! report positions.
//!
//! ### Client Management
//! Handles the lifecycle of TCP connections:
//! - Name handshake and id assignment
//! - Capacity enforcement
//! - Disconnect detection, with one final frame announcing the departure
//!
//! ### State Broadcasting
//! After every tick the world is serialized once and the same text is queued
//! for every client.
//!
//! ## Architecture Design
//!
//! ### Single Owner
//! One `Server` value owns the `GameState` and the `ClientManager`.
//! Connection tasks never touch the world: they send `ServerMessage`s over a
//! channel, and the tick loop drains that channel at the start of each tick.
//! Within a tick the simulation is sequential and deterministic for a given
//! random seed.
//!
//! ### TCP Text Protocol
//! A client connects, sends its name on one line and receives its id, the
//! world size and the wall list. From then on it receives one frame per tick
//! (one JSON object per snake and power-up) and may send
//! `{"moving":"up"}`-style commands at any time.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connected clients, id allocation and per-client outbound queues.
//!
//! ### Collision Module (`collision`)
//! Segment barriers and the rectangle tests built on them:
//! - Heads against walls, other snakes and the snake's own older body
//! - Spawn candidates against everything already in the world
//!
//! ### Game Module (`game`)
//! The per-tick update: life cycle, steering, movement, deaths, eating,
//! tail growth and power-up spawning.
//!
//! ### Network Module (`network`)
//! TCP acceptor, per-connection reader and writer tasks, and the tick loop.
//!
//! ### Settings, Spawn and World Modules
//! Tunable parameters loaded from JSON, random collision-free placement, and
//! the entity model itself.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::settings::GameSettings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:11000", GameSettings::default()).await?;
//!
//!     // Accepts connections and ticks until the acceptor stops
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod collision;
pub mod error;
pub mod game;
pub mod network;
pub mod settings;
pub mod spawn;
pub mod world;
