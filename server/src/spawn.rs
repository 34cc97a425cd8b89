//! Random, collision-free placement of new snakes and power-ups.

use crate::collision::{power_up_spot_blocked, spawn_body_blocked};
use crate::error::SpawnError;
use crate::world::World;
use rand::Rng;
use shared::{Direction, Vector2D, SPAWN_LENGTH};

/// Attempts made before a placement is declared impossible.
pub const MAX_SPAWN_ATTEMPTS: usize = 1000;

/// A planned snake: its two-joint body (tail first) and heading.
#[derive(Debug, Clone, PartialEq)]
pub struct SnakeSpawn {
    pub body: Vec<Vector2D>,
    pub direction: Vector2D,
}

fn random_point<R: Rng>(world: &World, rng: &mut R) -> Vector2D {
    let half = world.half_extent();
    Vector2D::new(rng.gen_range(-half..=half), rng.gen_range(-half..=half))
}

fn random_direction<R: Rng>(rng: &mut R) -> Direction {
    let vertical = rng.gen_bool(0.5);
    let forward = rng.gen_bool(0.5);
    match (vertical, forward) {
        (true, true) => Direction::Up,
        (true, false) => Direction::Down,
        (false, true) => Direction::Right,
        (false, false) => Direction::Left,
    }
}

/// Picks a heading and head position, lays the body out behind the head and
/// retries until nothing is in the way.
pub fn plan_snake<R: Rng>(world: &World, rng: &mut R) -> Result<SnakeSpawn, SpawnError> {
    for _ in 0..MAX_SPAWN_ATTEMPTS {
        let direction = random_direction(rng).to_vector();
        let head = random_point(world, rng);
        let tail = head - direction * SPAWN_LENGTH;

        if !world.in_bounds(tail) {
            continue;
        }

        let body = vec![tail, head];
        if !spawn_body_blocked(world, &body) {
            return Ok(SnakeSpawn { body, direction });
        }
    }

    Err(SpawnError::Snake(MAX_SPAWN_ATTEMPTS))
}

pub fn plan_power_up<R: Rng>(world: &World, rng: &mut R) -> Result<Vector2D, SpawnError> {
    for _ in 0..MAX_SPAWN_ATTEMPTS {
        let loc = random_point(world, rng);
        if !power_up_spot_blocked(world, loc) {
            return Ok(loc);
        }
    }

    Err(SpawnError::PowerUp(MAX_SPAWN_ATTEMPTS))
}
