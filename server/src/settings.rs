//! Tunable game parameters.
//!
//! Settings come from an optional JSON file; every field has a default so a
//! file only needs to name what it changes. Walls use the same shape they
//! have on the wire.

use crate::error::SettingsError;
use log::info;
use serde::{Deserialize, Serialize};
use shared::{Wall, SNAKE_SPEED};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Side length of the square world, centred on the origin.
    pub world_size: u32,
    /// Duration of one tick in milliseconds.
    pub ms_per_frame: u64,
    /// Distance a snake travels per tick.
    pub snake_speed: f64,
    /// Ticks a dead snake waits before respawning.
    pub respawn_rate: u32,
    /// Upper bound on simultaneously live power-ups.
    pub max_power_ups: usize,
    /// Upper bound (exclusive) of the random delay between power-up spawns.
    pub max_power_up_delay: u32,
    /// Ticks of tail retention credited per power-up eaten.
    pub snake_growth: u32,
    pub max_clients: usize,
    /// How long a fresh connection may take to send its name.
    pub handshake_timeout_ms: u64,
    pub walls: Vec<Wall>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            world_size: 2000,
            ms_per_frame: 34,
            snake_speed: SNAKE_SPEED,
            respawn_rate: 100,
            max_power_ups: 20,
            max_power_up_delay: 75,
            snake_growth: 12,
            max_clients: 32,
            handshake_timeout_ms: 10_000,
            walls: Vec::new(),
        }
    }
}

impl GameSettings {
    /// Reads and validates a JSON settings file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&contents)?;
        info!(
            "Loaded settings from {} ({} walls, world size {})",
            path.display(),
            settings.walls.len(),
            settings.world_size
        );
        Ok(settings)
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: GameSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.world_size == 0 {
            return Err(SettingsError::Invalid("world_size must be positive".into()));
        }
        if self.ms_per_frame == 0 {
            return Err(SettingsError::Invalid("ms_per_frame must be positive".into()));
        }
        if !(self.snake_speed > 0.0) {
            return Err(SettingsError::Invalid("snake_speed must be positive".into()));
        }

        let mut seen = HashSet::new();
        for wall in &self.walls {
            if !seen.insert(wall.id) {
                return Err(SettingsError::Invalid(format!(
                    "duplicate wall id {}",
                    wall.id
                )));
            }
            if !wall.is_axis_aligned() {
                return Err(SettingsError::Invalid(format!(
                    "wall {} is not axis-aligned",
                    wall.id
                )));
            }
        }

        Ok(())
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.ms_per_frame)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Half of the world side; coordinates range over `[-half, half]`.
    pub fn half_extent(&self) -> f64 {
        self.world_size as f64 / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Vector2D;

    #[test]
    fn test_defaults_are_valid() {
        let settings = GameSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.snake_speed, 3.0);
        assert_eq!(settings.tick_duration(), Duration::from_millis(34));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = GameSettings::from_json(
            r#"{"world_size":600,"walls":[{"wall":1,"p1":{"X":0,"Y":-300},"p2":{"X":0,"Y":300}}]}"#,
        )
        .unwrap();

        assert_eq!(settings.world_size, 600);
        assert_eq!(settings.respawn_rate, 100);
        assert_eq!(settings.walls.len(), 1);
        assert_eq!(settings.walls[0].p2, Vector2D::new(0.0, 300.0));
        assert_eq!(settings.half_extent(), 300.0);
    }

    #[test]
    fn test_rejects_diagonal_wall() {
        let result = GameSettings::from_json(
            r#"{"walls":[{"wall":1,"p1":{"X":0,"Y":0},"p2":{"X":50,"Y":50}}]}"#,
        );
        assert!(matches!(result, Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_rejects_duplicate_wall_ids() {
        let mut settings = GameSettings::default();
        settings.walls = vec![
            Wall::new(4, Vector2D::new(0.0, 0.0), Vector2D::new(0.0, 50.0)),
            Wall::new(4, Vector2D::new(100.0, 0.0), Vector2D::new(100.0, 50.0)),
        ];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_tick_and_world() {
        let mut settings = GameSettings::default();
        settings.ms_per_frame = 0;
        assert!(settings.validate().is_err());

        let mut settings = GameSettings::default();
        settings.world_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            GameSettings::from_json("{not json"),
            Err(SettingsError::Parse(_))
        ));
    }
}
