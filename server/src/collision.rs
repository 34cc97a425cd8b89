//! Collision detection reduced to axis-aligned rectangle tests.
//!
//! Every segment (a wall, one piece of a snake body) is inflated into a
//! "collision barrier": a rectangle whose long side spans the segment and
//! whose short side reaches `width / 2 + BARRIER_MARGIN` either way. The margin
//! absorbs the radius of point-like objects, so a head or a power-up can be
//! tested as a bare point.

use crate::world::{Snake, World};
use shared::{
    Direction, Rect, Vector2D, Wall, BARRIER_MARGIN, POWER_UP_HALF_EXTENT, SNAKE_WIDTH, WALL_WIDTH,
};

/// Barrier around the segment `p1`..`p2`.
///
/// A zero-length segment yields a rectangle without area, which never
/// collides with anything.
pub fn collision_barrier(p1: Vector2D, p2: Vector2D, width: f64) -> Rect {
    let pad = width / 2.0 + BARRIER_MARGIN;

    if p1 == p2 {
        return Rect::from_corners(p1, p2);
    }

    if p1.x == p2.x {
        // Vertical
        let (top, bottom) = if p1.y < p2.y { (p1.y, p2.y) } else { (p2.y, p1.y) };
        Rect {
            top_left: Vector2D::new(p1.x - pad, top),
            bottom_right: Vector2D::new(p1.x + pad, bottom),
        }
    } else {
        let (left, right) = if p1.x < p2.x { (p1.x, p2.x) } else { (p2.x, p1.x) };
        Rect {
            top_left: Vector2D::new(left, p1.y - pad),
            bottom_right: Vector2D::new(right, p1.y + pad),
        }
    }
}

pub fn rectangles_intersect(a: &Rect, b: &Rect) -> bool {
    a.intersects(b)
}

/// Fixed hit box around a power-up, independent of its sprite size.
pub fn power_up_box(loc: Vector2D) -> Rect {
    let half = Vector2D::new(POWER_UP_HALF_EXTENT, POWER_UP_HALF_EXTENT);
    Rect::from_corners(loc - half, loc + half)
}

pub fn wall_barrier(wall: &Wall) -> Rect {
    collision_barrier(wall.p1, wall.p2, WALL_WIDTH)
}

/// Whether `point` lies inside the barrier of any segment of `joints`.
pub fn point_hits_polyline(point: Vector2D, joints: &[Vector2D], width: f64) -> bool {
    joints
        .windows(2)
        .any(|pair| collision_barrier(pair[0], pair[1], width).contains(point))
}

/// Whether any segment of `a` overlaps any segment of `b`.
pub fn polyline_hits_polyline(a: &[Vector2D], a_width: f64, b: &[Vector2D], b_width: f64) -> bool {
    a.windows(2).any(|pa| {
        let ra = collision_barrier(pa[0], pa[1], a_width);
        b.windows(2)
            .any(|pb| rectangles_intersect(&ra, &collision_barrier(pb[0], pb[1], b_width)))
    })
}

pub fn point_hits_wall(point: Vector2D, wall: &Wall) -> bool {
    wall_barrier(wall).contains(point)
}

pub fn point_hits_power_up(point: Vector2D, loc: Vector2D) -> bool {
    power_up_box(loc).contains(point)
}

/// Start joint of the most recent body segment that runs against `heading`.
///
/// A head can only come back into its own body after turning around, so
/// nothing from that segment onward needs checking.
pub fn last_opposite_segment(body: &[Vector2D], heading: Direction) -> Option<usize> {
    let opposite = heading.opposite();
    (0..body.len().saturating_sub(1))
        .rev()
        .find(|&i| Direction::from_vector((body[i + 1] - body[i]).normalize()) == Some(opposite))
}

/// Self-collision: the head against the segments that end at or before the
/// snake's opposite-turn joint.
pub fn head_hits_own_body(snake: &Snake) -> bool {
    let end = (snake.turn_index + 1).min(snake.body.len());
    point_hits_polyline(snake.head(), &snake.body[..end], SNAKE_WIDTH)
}

/// Whether the head of snake `id` hits a wall, its own body or any other
/// solid snake.
pub fn head_collides(world: &World, id: u32) -> bool {
    let Some(snake) = world.snakes.get(&id) else {
        return false;
    };
    let head = snake.head();

    if world.walls.values().any(|w| point_hits_wall(head, w)) {
        return true;
    }

    if head_hits_own_body(snake) {
        return true;
    }

    world
        .snakes
        .values()
        .filter(|other| other.id != id && other.is_solid())
        .any(|other| point_hits_polyline(head, &other.body, SNAKE_WIDTH))
}

/// Whether a candidate spawn body would overlap a wall, a solid snake or a
/// live power-up.
pub fn spawn_body_blocked(world: &World, body: &[Vector2D]) -> bool {
    if world.walls.values().any(|w| {
        polyline_hits_polyline(body, SNAKE_WIDTH, &[w.p1, w.p2], WALL_WIDTH)
    }) {
        return true;
    }

    if world
        .snakes
        .values()
        .filter(|s| s.is_solid())
        .any(|s| polyline_hits_polyline(body, SNAKE_WIDTH, &s.body, SNAKE_WIDTH))
    {
        return true;
    }

    world.power_ups.values().filter(|p| !p.died).any(|p| {
        let boxed = power_up_box(p.loc);
        body.windows(2).any(|pair| {
            rectangles_intersect(&collision_barrier(pair[0], pair[1], SNAKE_WIDTH), &boxed)
        })
    })
}

/// Whether a candidate power-up location would sit on a wall, a snake or
/// another power-up.
pub fn power_up_spot_blocked(world: &World, loc: Vector2D) -> bool {
    if world.walls.values().any(|w| point_hits_wall(loc, w)) {
        return true;
    }

    if world
        .snakes
        .values()
        .filter(|s| !s.dc)
        .any(|s| point_hits_polyline(loc, &s.body, SNAKE_WIDTH))
    {
        return true;
    }

    let candidate = power_up_box(loc);
    world
        .power_ups
        .values()
        .filter(|p| !p.died)
        .any(|p| rectangles_intersect(&candidate, &power_up_box(p.loc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GameSettings;
    use assert_approx_eq::assert_approx_eq;

    fn v(x: f64, y: f64) -> Vector2D {
        Vector2D::new(x, y)
    }

    #[test]
    fn test_vertical_barrier() {
        let r = collision_barrier(v(0.0, 300.0), v(0.0, -300.0), WALL_WIDTH);
        assert_approx_eq!(r.top_left.x, -35.0);
        assert_approx_eq!(r.bottom_right.x, 35.0);
        assert_approx_eq!(r.top_left.y, -300.0);
        assert_approx_eq!(r.bottom_right.y, 300.0);
    }

    #[test]
    fn test_horizontal_barrier() {
        let r = collision_barrier(v(50.0, 10.0), v(-50.0, 10.0), SNAKE_WIDTH);
        assert_eq!(r.top_left, v(-50.0, -5.0));
        assert_eq!(r.bottom_right, v(50.0, 25.0));
    }

    #[test]
    fn test_zero_length_segment_never_collides() {
        let r = collision_barrier(v(5.0, 5.0), v(5.0, 5.0), WALL_WIDTH);
        assert!(r.is_degenerate());
        assert!(!r.contains(v(5.0, 5.0)));
        assert!(!point_hits_polyline(v(5.0, 5.0), &[v(5.0, 5.0), v(5.0, 5.0)], SNAKE_WIDTH));
    }

    #[test]
    fn test_point_against_polyline() {
        let body = [v(0.0, 0.0), v(100.0, 0.0), v(100.0, 100.0)];
        assert!(point_hits_polyline(v(50.0, 14.0), &body, SNAKE_WIDTH));
        assert!(!point_hits_polyline(v(50.0, 16.0), &body, SNAKE_WIDTH));
        assert!(point_hits_polyline(v(90.0, 60.0), &body, SNAKE_WIDTH));
    }

    #[test]
    fn test_point_against_power_up() {
        assert!(point_hits_power_up(v(9.0, -10.0), v(0.0, 0.0)));
        assert!(!point_hits_power_up(v(11.0, 0.0), v(0.0, 0.0)));
    }

    #[test]
    fn test_polyline_against_polyline() {
        let a = [v(0.0, 0.0), v(0.0, 120.0)];
        let crossing = [v(-60.0, 60.0), v(60.0, 60.0)];
        let parallel_far = [v(40.0, 0.0), v(40.0, 120.0)];
        let parallel_near = [v(25.0, 0.0), v(25.0, 120.0)];

        assert!(polyline_hits_polyline(&a, SNAKE_WIDTH, &crossing, SNAKE_WIDTH));
        assert!(!polyline_hits_polyline(&a, SNAKE_WIDTH, &parallel_far, SNAKE_WIDTH));
        assert!(polyline_hits_polyline(&a, SNAKE_WIDTH, &parallel_near, SNAKE_WIDTH));
    }

    #[test]
    fn test_last_opposite_segment() {
        let spiral = [v(0.0, 0.0), v(100.0, 0.0), v(100.0, -50.0), v(50.0, -50.0), v(50.0, -10.0)];
        assert_eq!(last_opposite_segment(&spiral, Direction::Down), Some(1));
        assert_eq!(last_opposite_segment(&spiral, Direction::Left), Some(0));
        assert_eq!(last_opposite_segment(&spiral, Direction::Right), Some(2));
        assert_eq!(last_opposite_segment(&spiral[..3], Direction::Down), None);
    }

    #[test]
    fn test_self_collision_ignores_segments_after_turn() {
        // Heading right, then up: the head is right next to the first segment
        let mut snake = Snake::new(
            1,
            "a".into(),
            vec![v(0.0, 0.0), v(100.0, 0.0), v(100.0, -3.0)],
            Vector2D::UP,
        );
        assert!(!head_hits_own_body(&snake));

        // A tight U-turn runs alongside the first leg without hitting it
        snake.body = vec![v(0.0, 0.0), v(100.0, 0.0), v(100.0, -6.0), v(97.0, -6.0)];
        snake.direction = Vector2D::LEFT;
        snake.turn_index = last_opposite_segment(&snake.body, Direction::Left).unwrap();
        assert!(!head_hits_own_body(&snake));
    }

    #[test]
    fn test_self_collision_after_looping_back() {
        let mut snake = Snake::new(
            1,
            "a".into(),
            vec![v(0.0, 0.0), v(100.0, 0.0), v(100.0, -50.0), v(50.0, -50.0), v(50.0, -10.0)],
            Vector2D::DOWN,
        );
        snake.turn_index = last_opposite_segment(&snake.body, Direction::Down).unwrap();
        assert!(head_hits_own_body(&snake));

        snake.body[4] = v(50.0, -16.0);
        assert!(!head_hits_own_body(&snake));
    }

    #[test]
    fn test_head_collides_with_wall_and_other_snake() {
        let mut settings = GameSettings::default();
        settings.walls = vec![Wall::new(1, v(0.0, -300.0), v(0.0, 300.0))];
        let mut world = World::new(&settings);

        world.snakes.insert(
            1,
            Snake::new(1, "a".into(), vec![v(-200.0, 0.0), v(-34.0, 0.0)], Vector2D::RIGHT),
        );
        world.snakes.insert(
            2,
            Snake::new(2, "b".into(), vec![v(200.0, 100.0), v(200.0, -100.0)], Vector2D::UP),
        );
        world.snakes.insert(
            3,
            Snake::new(3, "c".into(), vec![v(100.0, 0.0), v(195.0, 0.0)], Vector2D::RIGHT),
        );

        assert!(head_collides(&world, 1));
        assert!(!head_collides(&world, 2));
        assert!(head_collides(&world, 3));

        // Dead snakes are not obstacles
        world.snakes.get_mut(&2).unwrap().alive = false;
        assert!(!head_collides(&world, 3));
    }

    #[test]
    fn test_spawn_checks() {
        let mut settings = GameSettings::default();
        settings.walls = vec![Wall::new(1, v(0.0, -300.0), v(0.0, 300.0))];
        let mut world = World::new(&settings);
        world.add_power_up(v(500.0, 500.0));

        assert!(spawn_body_blocked(&world, &[v(-100.0, 0.0), v(20.0, 0.0)]));
        assert!(!spawn_body_blocked(&world, &[v(-200.0, 0.0), v(-80.0, 0.0)]));
        assert!(spawn_body_blocked(&world, &[v(500.0, 400.0), v(500.0, 520.0)]));

        assert!(power_up_spot_blocked(&world, v(10.0, 0.0)));
        assert!(power_up_spot_blocked(&world, v(515.0, 505.0)));
        assert!(!power_up_spot_blocked(&world, v(-400.0, 400.0)));
    }
}
