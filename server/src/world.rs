//! The authoritative world model: snakes, walls and power-ups.

use crate::settings::GameSettings;
use log::error;
use serde::Serialize;
use shared::{Direction, PowerUp, Vector2D, Wall};
use std::collections::BTreeMap;

/// A player's snake.
///
/// `body[0]` is the tail and the last joint is the head. Consecutive joints
/// always share an axis. `died`, `join` and `dc` are one-frame signals: they
/// are broadcast once and then cleared (or, for `dc`, the snake is removed).
#[derive(Debug, Clone, Serialize)]
pub struct Snake {
    #[serde(rename = "snake")]
    pub id: u32,
    pub body: Vec<Vector2D>,
    #[serde(rename = "dir")]
    pub direction: Vector2D,
    pub name: String,
    pub score: u32,
    pub died: bool,
    pub alive: bool,
    pub dc: bool,
    pub join: bool,

    /// Ticks spent dead, counting toward the respawn delay.
    #[serde(skip)]
    pub frames_dead: u32,
    /// Ticks during which the tail holds still.
    #[serde(skip)]
    pub food_in_belly: u32,
    /// Latest heading requested by the client, applied on the next tick.
    #[serde(skip)]
    pub requested_direction: Option<Direction>,
    /// First joint of the most recent segment running against the heading.
    /// Only segments ending at or before it are tested against the head.
    #[serde(skip)]
    pub turn_index: usize,
}

impl Snake {
    pub fn new(id: u32, name: String, body: Vec<Vector2D>, direction: Vector2D) -> Self {
        Self {
            id,
            body,
            direction,
            name,
            score: 0,
            died: false,
            alive: true,
            dc: false,
            join: false,
            frames_dead: 0,
            food_in_belly: 0,
            requested_direction: None,
            turn_index: 0,
        }
    }

    pub fn head(&self) -> Vector2D {
        self.body[self.body.len() - 1]
    }

    pub fn tail(&self) -> Vector2D {
        self.body[0]
    }

    pub fn heading(&self) -> Option<Direction> {
        Direction::from_vector(self.direction)
    }

    /// Total length of the body polyline.
    pub fn length(&self) -> f64 {
        self.body
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).length())
            .sum()
    }

    /// Marks the snake dead for this frame. The body stays where it was so
    /// clients can draw the crash.
    pub fn kill(&mut self) {
        self.died = true;
        self.alive = false;
        self.score = 0;
        self.frames_dead = 0;
        self.food_in_belly = 0;
        self.requested_direction = None;
    }

    /// Brings a dead snake back with a fresh body.
    pub fn respawn(&mut self, body: Vec<Vector2D>, direction: Vector2D) {
        self.body = body;
        self.direction = direction;
        self.alive = true;
        self.frames_dead = 0;
        self.turn_index = 0;
        self.requested_direction = None;
    }

    /// Alive and still connected, i.e. something other snakes can hit.
    pub fn is_solid(&self) -> bool {
        self.alive && !self.dc
    }
}

/// Aggregate root owned by the simulation loop.
#[derive(Debug, Clone)]
pub struct World {
    pub snakes: BTreeMap<u32, Snake>,
    pub walls: BTreeMap<u32, Wall>,
    pub power_ups: BTreeMap<u32, PowerUp>,
    pub size: u32,
    pub snake_speed: f64,
    pub snake_growth: u32,
    pub max_power_ups: usize,
    pub respawn_rate: u32,
    next_power_up_id: u32,
}

impl World {
    pub fn new(settings: &GameSettings) -> Self {
        Self {
            snakes: BTreeMap::new(),
            walls: settings.walls.iter().map(|w| (w.id, w.clone())).collect(),
            power_ups: BTreeMap::new(),
            size: settings.world_size,
            snake_speed: settings.snake_speed,
            snake_growth: settings.snake_growth,
            max_power_ups: settings.max_power_ups,
            respawn_rate: settings.respawn_rate,
            next_power_up_id: 0,
        }
    }

    pub fn half_extent(&self) -> f64 {
        self.size as f64 / 2.0
    }

    pub fn in_bounds(&self, point: Vector2D) -> bool {
        let half = self.half_extent();
        point.x.abs() <= half && point.y.abs() <= half
    }

    /// Adds a power-up under a fresh id and returns that id.
    pub fn add_power_up(&mut self, loc: Vector2D) -> u32 {
        let id = self.next_power_up_id;
        self.next_power_up_id += 1;
        self.power_ups.insert(id, PowerUp::new(id, loc));
        id
    }

    /// Power-ups that have not been eaten.
    pub fn live_power_ups(&self) -> usize {
        self.power_ups.values().filter(|p| !p.died).count()
    }

    pub fn wall_list(&self) -> Vec<Wall> {
        self.walls.values().cloned().collect()
    }

    /// Serializes every snake and power-up, one JSON object per line.
    pub fn frame(&self) -> String {
        let mut out = String::new();
        for snake in self.snakes.values() {
            push_line(&mut out, snake);
        }
        for power_up in self.power_ups.values() {
            push_line(&mut out, power_up);
        }
        out
    }
}

fn push_line<T: Serialize>(out: &mut String, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => {
            out.push_str(&json);
            out.push('\n');
        }
        Err(e) => error!("Failed to serialize world object: {}", e),
    }
}
