//! Newline-delimited JSON protocol spoken between the server and its clients.
//!
//! Every message is a single line of UTF-8 text terminated by `\n`. There is
//! no length prefix, so receivers accumulate bytes in a [`LineBuffer`] and
//! only act on complete lines.

use crate::geometry::{Direction, Vector2D};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest run of bytes without a newline a [`LineBuffer`] will hold.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// A static, axis-aligned wall segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    #[serde(rename = "wall")]
    pub id: u32,
    pub p1: Vector2D,
    pub p2: Vector2D,
}

impl Wall {
    pub fn new(id: u32, p1: Vector2D, p2: Vector2D) -> Self {
        Self { id, p1, p2 }
    }

    pub fn is_axis_aligned(&self) -> bool {
        self.p1.x == self.p2.x || self.p1.y == self.p2.y
    }
}

/// A consumable item. `died` is raised for the single frame in which the
/// power-up was eaten, after which it disappears from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    #[serde(rename = "power")]
    pub id: u32,
    pub loc: Vector2D,
    pub died: bool,
}

impl PowerUp {
    pub fn new(id: u32, loc: Vector2D) -> Self {
        Self {
            id,
            loc,
            died: false,
        }
    }
}

/// A snake as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnakeView {
    #[serde(rename = "snake")]
    pub id: u32,
    pub body: Vec<Vector2D>,
    pub dir: Vector2D,
    pub name: String,
    pub score: u32,
    pub died: bool,
    pub alive: bool,
    pub dc: bool,
    pub join: bool,
}

impl SnakeView {
    pub fn head(&self) -> Option<Vector2D> {
        self.body.last().copied()
    }
}

/// Value of the `moving` field in a client command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Moving {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Moving {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Moving::Up => Some(Direction::Up),
            Moving::Down => Some(Direction::Down),
            Moving::Left => Some(Direction::Left),
            Moving::Right => Some(Direction::Right),
            Moving::None => None,
        }
    }
}

impl From<Direction> for Moving {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => Moving::Up,
            Direction::Down => Moving::Down,
            Direction::Left => Moving::Left,
            Direction::Right => Moving::Right,
        }
    }
}

/// Client to server control command: `{"moving":"up"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCommand {
    pub moving: Moving,
}

impl MoveCommand {
    pub fn new(moving: Moving) -> Self {
        Self { moving }
    }

    /// Parses one line, returning `None` for anything that is not a
    /// well-formed command.
    pub fn parse(line: &str) -> Option<MoveCommand> {
        serde_json::from_str(line.trim()).ok()
    }

    /// Serialized form including the trailing newline.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

/// One line received from the server after the id and world size.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerLine {
    Snake(SnakeView),
    PowerUp(PowerUp),
    Wall(Wall),
    Unrecognized,
}

impl ServerLine {
    /// Classifies a line by its discriminant field (`snake`, `power` or
    /// `wall`) and decodes it into the matching shape.
    pub fn parse(line: &str) -> ServerLine {
        let value: Value = match serde_json::from_str(line.trim()) {
            Ok(v) => v,
            Err(_) => return ServerLine::Unrecognized,
        };

        let Some(object) = value.as_object() else {
            return ServerLine::Unrecognized;
        };

        let parsed = if object.contains_key("snake") {
            serde_json::from_value(value).map(ServerLine::Snake)
        } else if object.contains_key("power") {
            serde_json::from_value(value).map(ServerLine::PowerUp)
        } else if object.contains_key("wall") {
            serde_json::from_value(value).map(ServerLine::Wall)
        } else {
            return ServerLine::Unrecognized;
        };

        parsed.unwrap_or(ServerLine::Unrecognized)
    }
}

/// Builds the handshake reply sent once to every new client: its id, the
/// world side length, then one wall per line.
pub fn handshake(client_id: u32, world_size: u32, walls: &[Wall]) -> String {
    let mut out = format!("{}\n{}\n", client_id, world_size);
    for wall in walls {
        if let Ok(json) = serde_json::to_string(wall) {
            out.push_str(&json);
            out.push('\n');
        }
    }
    out
}

/// Accumulates raw bytes from a stream and hands out complete lines.
///
/// Partial trailing data stays buffered until the rest of the line arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    data: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);

        // A peer that never sends a newline must not grow the buffer forever
        if self.data.len() > MAX_PENDING_BYTES && !self.data.contains(&b'\n') {
            self.data.clear();
        }
    }

    /// Removes and returns the next complete line without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.data.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.data.drain(..=end).collect();
        let text = String::from_utf8_lossy(&line[..end]);
        Some(text.trim_end_matches('\r').to_string())
    }

    /// Consumes every complete line and returns the direction carried by the
    /// last valid move command among them.
    pub fn latest_direction(&mut self) -> Option<Direction> {
        let mut latest = None;
        while let Some(line) = self.next_line() {
            if let Some(direction) = MoveCommand::parse(&line).and_then(|c| c.moving.direction()) {
                latest = Some(direction);
            }
        }
        latest
    }

    /// Number of bytes still waiting for a newline.
    pub fn pending(&self) -> usize {
        self.data.len()
    }
}
