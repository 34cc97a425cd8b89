use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// A point or direction in world space.
///
/// World coordinates follow screen conventions: `x` grows to the right and
/// `y` grows downward, so `UP` is `(0, -1)`. The wire format spells the
/// fields with capital letters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2D {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

impl Vector2D {
    pub const UP: Vector2D = Vector2D { x: 0.0, y: -1.0 };
    pub const DOWN: Vector2D = Vector2D { x: 0.0, y: 1.0 };
    pub const LEFT: Vector2D = Vector2D { x: -1.0, y: 0.0 };
    pub const RIGHT: Vector2D = Vector2D { x: 1.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the unit vector pointing the same way, or zero for a zero vector.
    pub fn normalize(&self) -> Vector2D {
        let len = self.length();
        if len == 0.0 {
            Vector2D::default()
        } else {
            Vector2D::new(self.x / len, self.y / len)
        }
    }

    /// Rotates the vector clockwise (on screen) by `degrees`.
    pub fn rotate(&self, degrees: f64) -> Vector2D {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Vector2D::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Clockwise angle in degrees between `UP` and this vector, in `(-180, 180]`.
    pub fn to_angle(&self) -> f64 {
        self.x.atan2(-self.y).to_degrees()
    }

    /// Moves toward `target` by at most `distance` along the axis they share.
    ///
    /// Only meaningful for axis-aligned pairs, which is all a snake body holds.
    pub fn move_towards(&self, target: Vector2D, distance: f64) -> Vector2D {
        if self.x == target.x {
            let step = distance.min((target.y - self.y).abs());
            Vector2D::new(self.x, self.y + step * (target.y - self.y).signum())
        } else {
            let step = distance.min((target.x - self.x).abs());
            Vector2D::new(self.x + step * (target.x - self.x).signum(), self.y)
        }
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, other: Vector2D) -> Vector2D {
        Vector2D::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, other: Vector2D) -> Vector2D {
        Vector2D::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, scalar: f64) -> Vector2D {
        Vector2D::new(self.x * scalar, self.y * scalar)
    }
}

impl Neg for Vector2D {
    type Output = Vector2D;

    fn neg(self) -> Vector2D {
        Vector2D::new(-self.x, -self.y)
    }
}

/// One of the four headings a snake can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn to_vector(self) -> Vector2D {
        match self {
            Direction::Up => Vector2D::UP,
            Direction::Down => Vector2D::DOWN,
            Direction::Left => Vector2D::LEFT,
            Direction::Right => Vector2D::RIGHT,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }

    /// Maps a unit axis vector back to its heading.
    pub fn from_vector(v: Vector2D) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.to_vector() == v)
    }
}

/// Axis-aligned rectangle given by its top-left (minimum) and bottom-right
/// (maximum) corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top_left: Vector2D,
    pub bottom_right: Vector2D,
}

impl Rect {
    /// Builds a rectangle from any two opposite corners.
    pub fn from_corners(a: Vector2D, b: Vector2D) -> Self {
        Self {
            top_left: Vector2D::new(a.x.min(b.x), a.y.min(b.y)),
            bottom_right: Vector2D::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f64 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f64 {
        self.bottom_right.y - self.top_left.y
    }

    /// A rectangle with no area, which never takes part in a collision.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// AABB overlap test. Touching edges do not count as overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_degenerate() || other.is_degenerate() {
            return false;
        }

        !(self.bottom_right.x <= other.top_left.x
            || other.bottom_right.x <= self.top_left.x
            || self.bottom_right.y <= other.top_left.y
            || other.bottom_right.y <= self.top_left.y)
    }

    /// Inclusive point containment test.
    pub fn contains(&self, point: Vector2D) -> bool {
        !self.is_degenerate()
            && point.x >= self.top_left.x
            && point.x <= self.bottom_right.x
            && point.y >= self.top_left.y
            && point.y <= self.bottom_right.y
    }
}
