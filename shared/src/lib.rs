//! Types and constants shared by the snake server and anything that talks to it.

pub mod geometry;
pub mod protocol;

pub use geometry::{Direction, Rect, Vector2D};
pub use protocol::{
    handshake, LineBuffer, MoveCommand, Moving, PowerUp, ServerLine, SnakeView, Wall,
};

/// Well-known TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 11000;

/// Distance a snake head travels each tick.
pub const SNAKE_SPEED: f64 = 3.0;

/// Collision width of a wall, independent of how it is drawn.
pub const WALL_WIDTH: f64 = 50.0;

/// Collision width of a snake body segment.
pub const SNAKE_WIDTH: f64 = 10.0;

/// Extra padding added on each side of every collision barrier. It stands in
/// for the radius of point-like objects (heads, power-ups).
pub const BARRIER_MARGIN: f64 = 10.0;

/// Half side of the square hit box centred on a power-up.
pub const POWER_UP_HALF_EXTENT: f64 = 10.0;

/// Body length of a freshly spawned snake.
pub const SPAWN_LENGTH: f64 = 120.0;

/// Player names are cut to this many characters.
pub const MAX_NAME_LEN: usize = 16;
