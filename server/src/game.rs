use crate::collision::{head_collides, last_opposite_segment, point_hits_power_up};
use crate::error::SpawnError;
use crate::settings::GameSettings;
use crate::spawn::{plan_power_up, plan_snake};
use crate::world::{Snake, World};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Direction, Vector2D};

/// Authoritative simulation state. Owned by the tick loop; nothing else
/// mutates the world.
#[derive(Debug)]
pub struct GameState {
    pub tick: u64,
    pub world: World,
    rng: StdRng,
    power_up_countdown: u32,
    max_power_up_delay: u32,
}

impl GameState {
    pub fn new(settings: &GameSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Deterministic construction for reproducible runs.
    pub fn with_rng(settings: &GameSettings, mut rng: StdRng) -> Self {
        let power_up_countdown = random_delay(&mut rng, settings.max_power_up_delay);
        Self {
            tick: 0,
            world: World::new(settings),
            rng,
            power_up_countdown,
            max_power_up_delay: settings.max_power_up_delay,
        }
    }

    /// Places a new snake for a client that just finished its handshake.
    pub fn add_snake(&mut self, id: u32, name: String) -> Result<(), SpawnError> {
        let spawn = plan_snake(&self.world, &mut self.rng)?;
        let mut snake = Snake::new(id, name, spawn.body, spawn.direction);
        snake.join = true;

        info!(
            "Snake {} ({}) joined at ({:.1}, {:.1})",
            id,
            snake.name,
            snake.head().x,
            snake.head().y
        );
        self.world.snakes.insert(id, snake);
        Ok(())
    }

    /// Records the most recent heading a client asked for. Later requests
    /// within the same tick overwrite earlier ones. Dead snakes ignore input.
    pub fn request_direction(&mut self, id: u32, direction: Direction) {
        if let Some(snake) = self.world.snakes.get_mut(&id).filter(|s| s.alive) {
            snake.requested_direction = Some(direction);
        }
    }

    /// Flags a snake for removal after the next broadcast.
    pub fn mark_disconnected(&mut self, id: u32) {
        if let Some(snake) = self.world.snakes.get_mut(&id) {
            snake.dc = true;
            snake.requested_direction = None;
        }
    }

    /// Handshake text for client `id`.
    pub fn handshake(&self, id: u32) -> String {
        shared::handshake(id, self.world.size, &self.world.wall_list())
    }

    /// Serialized snapshot of every snake and power-up.
    pub fn frame(&self) -> String {
        self.world.frame()
    }

    /// Advances the world by one tick.
    pub fn update(&mut self) {
        self.tick += 1;

        // Eaten power-ups have had their one broadcast
        self.world.power_ups.retain(|_, p| !p.died);

        let moving = self.update_life_cycle();

        let mut previous_heads = Vec::with_capacity(moving.len());
        for &id in &moving {
            if let Some(snake) = self.world.snakes.get_mut(&id) {
                previous_heads.push((id, snake.head(), snake.direction));
                steer(snake);
                let speed = self.world.snake_speed;
                let last = snake.body.len() - 1;
                snake.body[last] = snake.body[last] + snake.direction * speed;
            }
        }

        // Every head has moved before anyone is judged, so two snakes that
        // run into each other in the same tick both die
        let crashed: Vec<u32> = moving
            .iter()
            .copied()
            .filter(|&id| head_collides(&self.world, id))
            .collect();

        for (id, head, direction) in previous_heads
            .iter()
            .filter(|(id, _, _)| crashed.contains(id))
        {
            if let Some(snake) = self.world.snakes.get_mut(id) {
                debug!("Snake {} died with score {}", id, snake.score);
                snake.kill();
                retract_head(snake, *head, *direction);
            }
        }

        let survivors: Vec<u32> = moving
            .into_iter()
            .filter(|id| !crashed.contains(id))
            .collect();

        self.eat_power_ups(&survivors);

        let speed = self.world.snake_speed;
        for id in &survivors {
            if let Some(snake) = self.world.snakes.get_mut(id) {
                if snake.food_in_belly > 0 {
                    snake.food_in_belly -= 1;
                } else {
                    advance_tail(snake, speed);
                }
            }
        }

        self.update_power_ups();
    }

    /// Clears last frame's death signal, counts down respawns and returns
    /// the ids of snakes that move this tick.
    fn update_life_cycle(&mut self) -> Vec<u32> {
        let mut moving = Vec::new();
        let mut due = Vec::new();

        for snake in self.world.snakes.values_mut() {
            snake.died = false;
            if snake.dc {
                continue;
            }
            if snake.alive {
                moving.push(snake.id);
            } else {
                snake.frames_dead = snake.frames_dead.saturating_add(1);
                if snake.frames_dead >= self.world.respawn_rate {
                    due.push(snake.id);
                }
            }
        }

        for id in due {
            match plan_snake(&self.world, &mut self.rng) {
                Ok(spawn) => {
                    if let Some(snake) = self.world.snakes.get_mut(&id) {
                        snake.respawn(spawn.body, spawn.direction);
                        debug!("Snake {} respawned", id);
                    }
                }
                Err(e) => warn!("Respawn of snake {} postponed: {}", id, e),
            }
        }

        moving
    }

    fn eat_power_ups(&mut self, survivors: &[u32]) {
        let World {
            snakes,
            power_ups,
            snake_growth,
            ..
        } = &mut self.world;

        for id in survivors {
            let Some(snake) = snakes.get_mut(id) else {
                continue;
            };
            let head = snake.head();

            for power_up in power_ups.values_mut().filter(|p| !p.died) {
                if point_hits_power_up(head, power_up.loc) {
                    power_up.died = true;
                    snake.score += 1;
                    snake.food_in_belly += *snake_growth;
                }
            }
        }
    }

    fn update_power_ups(&mut self) {
        if self.world.live_power_ups() >= self.world.max_power_ups {
            return;
        }

        if self.power_up_countdown > 0 {
            self.power_up_countdown -= 1;
            return;
        }

        match plan_power_up(&self.world, &mut self.rng) {
            Ok(loc) => {
                let id = self.world.add_power_up(loc);
                debug!("Power-up {} spawned at ({:.1}, {:.1})", id, loc.x, loc.y);
                self.power_up_countdown = random_delay(&mut self.rng, self.max_power_up_delay);
            }
            Err(e) => warn!("Power-up spawn postponed: {}", e),
        }
    }

    /// Runs after a frame has been sent: disconnected snakes leave the world
    /// and join signals are cleared.
    pub fn finish_broadcast(&mut self) {
        self.world.snakes.retain(|id, snake| {
            if snake.dc {
                info!("Removed snake {} ({})", id, snake.name);
            }
            !snake.dc
        });

        for snake in self.world.snakes.values_mut() {
            snake.join = false;
        }
    }
}

fn random_delay(rng: &mut StdRng, max: u32) -> u32 {
    if max == 0 {
        0
    } else {
        rng.gen_range(0..max)
    }
}

/// Applies a pending turn. Reversals and repeats of the current heading are
/// ignored; a real turn pins a joint at the current head and moves the
/// self-collision boundary to the last segment running the other way.
fn steer(snake: &mut Snake) {
    let Some(requested) = snake.requested_direction.take() else {
        return;
    };
    let Some(current) = snake.heading() else {
        return;
    };
    if requested == current || requested == current.opposite() {
        return;
    }

    let head = snake.head();
    snake.body.push(head);
    snake.direction = requested.to_vector();
    snake.turn_index = last_opposite_segment(&snake.body, requested).unwrap_or(0);
}

/// Puts the head of a crashed snake back where it was before this tick,
/// facing the way it was facing.
fn retract_head(snake: &mut Snake, head: Vector2D, direction: Vector2D) {
    let last = snake.body.len() - 1;
    snake.body[last] = head;
    snake.direction = direction;

    // A turn taken this tick left a joint on the old head
    if snake.body.len() > 2 && snake.body[last - 1] == head {
        snake.body.pop();
    }
}

/// Pulls the tail forward by `distance`, dropping joints it passes.
fn advance_tail(snake: &mut Snake, distance: f64) {
    let mut remaining = distance;

    while snake.body.len() > 2 {
        let first = snake.body[1] - snake.body[0];
        let segment = first.x.abs() + first.y.abs();
        if remaining < segment {
            break;
        }
        remaining -= segment;
        snake.body.remove(0);
        snake.turn_index = snake.turn_index.saturating_sub(1);
    }

    snake.body[0] = snake.body[0].move_towards(snake.body[1], remaining);
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{ServerLine, Wall};

    fn v(x: f64, y: f64) -> Vector2D {
        Vector2D::new(x, y)
    }

    fn quiet_settings() -> GameSettings {
        GameSettings {
            world_size: 600,
            max_power_ups: 0,
            respawn_rate: 5,
            ..GameSettings::default()
        }
    }

    fn game_with(settings: &GameSettings) -> GameState {
        GameState::with_rng(settings, StdRng::seed_from_u64(42))
    }

    fn place(game: &mut GameState, id: u32, body: Vec<Vector2D>, dir: Vector2D) {
        game.world
            .snakes
            .insert(id, Snake::new(id, format!("p{}", id), body, dir));
    }

    fn assert_axis_aligned(snake: &Snake) {
        assert!(snake.body.len() >= 2, "snake {} too short", snake.id);
        for pair in snake.body.windows(2) {
            assert!(
                pair[0].x == pair[1].x || pair[0].y == pair[1].y,
                "snake {} has a diagonal segment {:?}",
                snake.id,
                pair
            );
        }
    }

    #[test]
    fn test_add_snake_sets_join() {
        let mut game = game_with(&quiet_settings());
        game.add_snake(1, "ann".into()).unwrap();

        let snake = &game.world.snakes[&1];
        assert!(snake.join && snake.alive);
        assert_eq!(snake.body.len(), 2);

        game.finish_broadcast();
        assert!(!game.world.snakes[&1].join);
    }

    #[test]
    fn test_head_moves_by_speed() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(0.0, 120.0), v(0.0, 0.0)], Vector2D::UP);

        game.update();
        let snake = &game.world.snakes[&1];
        assert_eq!(snake.head(), v(0.0, -3.0));
        assert_eq!(snake.tail(), v(0.0, 117.0));
        assert_eq!(snake.length(), 120.0);
    }

    #[test]
    fn test_turn_inserts_joint() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(0.0, 120.0), v(0.0, 0.0)], Vector2D::UP);

        game.request_direction(1, Direction::Left);
        game.update();

        let snake = &game.world.snakes[&1];
        assert_eq!(snake.body, vec![v(0.0, 117.0), v(0.0, 0.0), v(-3.0, 0.0)]);
        assert_eq!(snake.direction, Vector2D::LEFT);
        assert_eq!(snake.turn_index, 0);
        assert!(snake.alive);
    }

    #[test]
    fn test_reversal_is_ignored() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(0.0, 120.0), v(0.0, 0.0)], Vector2D::UP);
        place(&mut game, 2, vec![v(200.0, 120.0), v(200.0, 0.0)], Vector2D::UP);

        game.request_direction(1, Direction::Down);
        game.update();

        let reversed = &game.world.snakes[&1];
        let untouched = &game.world.snakes[&2];
        assert_eq!(reversed.direction, untouched.direction);
        assert_eq!(reversed.body.len(), untouched.body.len());
        assert_eq!(reversed.head() - untouched.head(), v(-200.0, 0.0));
        assert!(reversed.requested_direction.is_none());
    }

    #[test]
    fn test_last_request_in_tick_wins() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(-120.0, 0.0), v(0.0, 0.0)], Vector2D::RIGHT);

        game.request_direction(1, Direction::Down);
        game.request_direction(1, Direction::Up);
        game.update();

        assert_eq!(game.world.snakes[&1].direction, Vector2D::UP);
        assert_eq!(game.world.snakes[&1].head(), v(0.0, -3.0));
    }

    #[test]
    fn test_tail_drops_passed_joints() {
        let mut game = game_with(&quiet_settings());
        place(
            &mut game,
            1,
            vec![v(0.0, 2.0), v(0.0, 0.0), v(100.0, 0.0)],
            Vector2D::RIGHT,
        );
        game.world.snakes.get_mut(&1).unwrap().turn_index = 1;

        game.update();
        let snake = &game.world.snakes[&1];
        assert_eq!(snake.body, vec![v(1.0, 0.0), v(103.0, 0.0)]);
        assert_eq!(snake.turn_index, 0);
        assert_axis_aligned(snake);
    }

    #[test]
    fn test_wall_death_and_respawn() {
        let mut settings = quiet_settings();
        settings.walls = vec![Wall::new(1, v(0.0, -300.0), v(0.0, 300.0))];
        let mut game = game_with(&settings);
        place(&mut game, 1, vec![v(-220.0, 0.0), v(-100.0, 0.0)], Vector2D::RIGHT);

        // The head starts 65 units from the wall barrier
        let limit = (65.0_f64 / 3.0).ceil() as u32;
        let mut ticks = 0;
        while game.world.snakes[&1].alive {
            let before = game.world.snakes[&1].head();
            game.update();
            ticks += 1;
            assert!(ticks <= limit, "snake never hit the wall");

            let snake = &game.world.snakes[&1];
            if snake.alive {
                assert_eq!(snake.head(), before + Vector2D::RIGHT * 3.0);
            } else {
                // The crash frame shows the head where it was
                assert_eq!(snake.head(), before);
            }
        }

        let dead = &game.world.snakes[&1];
        assert!(dead.died);
        assert_eq!(dead.score, 0);
        let corpse = dead.body.clone();

        for _ in 1..settings.respawn_rate {
            game.update();
            let snake = &game.world.snakes[&1];
            assert!(!snake.alive);
            assert!(!snake.died);
            assert_eq!(snake.body, corpse);
        }

        game.update();
        let snake = &game.world.snakes[&1];
        assert!(snake.alive);
        assert_ne!(snake.body, corpse);
        assert!(!head_collides(&game.world, 1));
    }

    #[test]
    fn test_head_on_collision_kills_both() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(-123.0, 0.0), v(-3.0, 0.0)], Vector2D::RIGHT);
        place(&mut game, 2, vec![v(0.0, -123.0), v(0.0, -3.0)], Vector2D::DOWN);

        game.update();
        assert!(game.world.snakes[&1].died);
        assert!(game.world.snakes[&2].died);
    }

    #[test]
    fn test_crash_while_turning_keeps_old_heading() {
        let mut settings = quiet_settings();
        settings.walls = vec![Wall::new(1, v(-300.0, -37.0), v(300.0, -37.0))];
        let mut game = game_with(&settings);
        place(&mut game, 1, vec![v(-120.0, 0.0), v(0.0, 0.0)], Vector2D::RIGHT);

        game.request_direction(1, Direction::Up);
        game.update();

        let snake = &game.world.snakes[&1];
        assert!(snake.died);
        assert_eq!(snake.body, vec![v(-120.0, 0.0), v(0.0, 0.0)]);
        assert_eq!(snake.direction, Vector2D::RIGHT);
    }

    /// Horizontal walls close enough together that no spawn body fits.
    fn blocking_walls() -> Vec<Wall> {
        (0..16)
            .map(|i| {
                let y = -300.0 + 40.0 * i as f64;
                Wall::new(100 + i, v(-300.0, y), v(300.0, y))
            })
            .collect()
    }

    #[test]
    fn test_respawn_postponed_while_world_is_blocked() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(0.0, 120.0), v(0.0, 0.0)], Vector2D::UP);
        game.world.snakes.get_mut(&1).unwrap().kill();
        let corpse = game.world.snakes[&1].body.clone();

        for wall in blocking_walls() {
            game.world.walls.insert(wall.id, wall);
        }
        for _ in 0..3 * game.world.respawn_rate {
            game.update();
            let snake = &game.world.snakes[&1];
            assert!(!snake.alive);
            assert_eq!(snake.body, corpse);
        }

        game.world.walls.clear();
        game.update();
        let snake = &game.world.snakes[&1];
        assert!(snake.alive);
        assert_ne!(snake.body, corpse);
    }

    #[test]
    fn test_requests_ignored_while_dead() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(0.0, 120.0), v(0.0, 0.0)], Vector2D::UP);
        game.world.snakes.get_mut(&1).unwrap().kill();

        game.request_direction(1, Direction::Left);
        assert!(game.world.snakes[&1].requested_direction.is_none());

        while !game.world.snakes[&1].alive {
            game.update();
        }
        let snake = &game.world.snakes[&1];
        assert!(snake.requested_direction.is_none());
        assert_eq!(snake.body.len(), 2);
    }

    #[test]
    fn test_running_into_body_kills_only_the_runner() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(-100.0, -16.0), v(-10.0, -16.0)], Vector2D::RIGHT);
        place(&mut game, 2, vec![v(-50.0, 200.0), v(-50.0, 80.0)], Vector2D::UP);
        place(&mut game, 3, vec![v(-50.0, -60.0), v(-50.0, -18.0)], Vector2D::DOWN);

        game.update();
        assert!(game.world.snakes[&3].died);
        assert!(game.world.snakes[&1].alive);
        assert!(game.world.snakes[&2].alive);
    }

    #[test]
    fn test_tight_u_turn_is_not_self_collision() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(-120.0, 0.0), v(0.0, 0.0)], Vector2D::RIGHT);

        game.request_direction(1, Direction::Up);
        game.update();
        game.request_direction(1, Direction::Left);
        for _ in 0..10 {
            game.update();
        }
        assert!(game.world.snakes[&1].alive);
        assert_eq!(game.world.snakes[&1].head(), v(-30.0, -3.0));
    }

    #[test]
    fn test_looping_back_into_own_body_is_fatal() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(-300.0, 0.0), v(0.0, 0.0)], Vector2D::RIGHT);

        game.request_direction(1, Direction::Up);
        for _ in 0..10 {
            game.update();
        }
        game.request_direction(1, Direction::Left);
        for _ in 0..10 {
            game.update();
        }
        game.request_direction(1, Direction::Down);
        for _ in 0..4 {
            game.update();
        }
        assert!(game.world.snakes[&1].alive);
        assert_eq!(game.world.snakes[&1].turn_index, 1);

        // The head now reaches the barrier of the first leg
        game.update();
        assert!(game.world.snakes[&1].died);
    }

    #[test]
    fn test_power_up_growth() {
        let mut game = game_with(&quiet_settings());
        place(&mut game, 1, vec![v(0.0, 100.0), v(0.0, 0.0)], Vector2D::UP);
        let power = game.world.add_power_up(v(0.0, -30.0));

        while !game.world.power_ups[&power].died {
            game.update();
            assert!(game.tick < 20, "power-up never eaten");
        }

        let growth = game.world.snake_growth;
        let snake = &game.world.snakes[&1];
        assert_eq!(snake.score, 1);
        assert_eq!(snake.length(), 103.0);
        let tail = snake.tail();

        game.update();
        assert!(!game.world.power_ups.contains_key(&power));

        for _ in 2..growth {
            game.update();
            assert_eq!(game.world.snakes[&1].tail(), tail);
        }
        assert_eq!(game.world.snakes[&1].length(), 100.0 + growth as f64 * 3.0);

        game.update();
        let snake = &game.world.snakes[&1];
        assert_ne!(snake.tail(), tail);
        assert_eq!(snake.length(), 100.0 + growth as f64 * 3.0);
    }

    #[test]
    fn test_disconnect_visible_once() {
        let mut game = game_with(&quiet_settings());
        game.add_snake(1, "ann".into()).unwrap();
        game.add_snake(2, "bob".into()).unwrap();
        game.finish_broadcast();

        game.mark_disconnected(2);
        game.update();
        let frame = game.frame();
        let dc: Vec<bool> = frame
            .lines()
            .filter_map(|l| match ServerLine::parse(l) {
                ServerLine::Snake(s) if s.id == 2 => Some(s.dc),
                _ => None,
            })
            .collect();
        assert_eq!(dc, vec![true]);
        game.finish_broadcast();

        game.update();
        let frame = game.frame();
        assert!(!frame.contains("\"snake\":2,"));
        assert!(frame.contains("\"snake\":1,"));
        assert!(!game.world.snakes.contains_key(&2));
    }

    #[test]
    fn test_power_ups_spawn_up_to_max() {
        let mut settings = quiet_settings();
        settings.max_power_ups = 3;
        settings.max_power_up_delay = 2;
        let mut game = game_with(&settings);

        for _ in 0..30 {
            game.update();
            assert!(game.world.live_power_ups() <= 3);
        }
        assert_eq!(game.world.live_power_ups(), 3);
    }

    #[test]
    fn test_invariants_hold_in_busy_world() {
        let mut settings = quiet_settings();
        settings.world_size = 1000;
        settings.max_power_ups = 10;
        settings.max_power_up_delay = 5;
        settings.respawn_rate = 10;
        settings.walls = vec![
            Wall::new(0, v(-500.0, -500.0), v(500.0, -500.0)),
            Wall::new(1, v(-500.0, 500.0), v(500.0, 500.0)),
            Wall::new(2, v(-500.0, -500.0), v(-500.0, 500.0)),
            Wall::new(3, v(500.0, -500.0), v(500.0, 500.0)),
        ];
        let mut game = game_with(&settings);
        for id in 1..=6 {
            game.add_snake(id, format!("s{}", id)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..600 {
            for id in 1..=6 {
                if rng.gen_bool(0.1) {
                    let dir = Direction::ALL[rng.gen_range(0..4)];
                    game.request_direction(id, dir);
                }
            }

            let before: Vec<(u32, Vector2D, bool)> = game
                .world
                .snakes
                .values()
                .map(|s| (s.id, s.head(), s.alive))
                .collect();

            game.update();

            for (id, head, was_alive) in before {
                let snake = &game.world.snakes[&id];
                assert_axis_aligned(snake);
                if was_alive && snake.alive {
                    let moved = snake.head() - head;
                    assert_approx_eq!(moved.x.abs() + moved.y.abs(), 3.0, 1e-9);
                }
            }
            game.finish_broadcast();
        }
    }
}
