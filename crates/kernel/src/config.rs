//! World construction parameters, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use worldtrack_grid::GridConfig;

/// Errors loading or validating a [`WorldConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Slot count of each entity pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub buildings: usize,
    pub dummies: usize,
    pub vehicles: usize,
    pub peds: usize,
    pub objects: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buildings: 5500,
            dummies: 2802,
            vehicles: 110,
            peds: 140,
            objects: 450,
        }
    }
}

impl PoolConfig {
    fn sizes(&self) -> [(&'static str, usize); 5] {
        [
            ("buildings", self.buildings),
            ("dummies", self.dummies),
            ("vehicles", self.vehicles),
            ("peds", self.peds),
            ("objects", self.objects),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub grid: GridConfig,
    pub pools: PoolConfig,
    /// Weak reference slots shared by all entities.
    pub reference_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            pools: PoolConfig::default(),
            reference_capacity: 3000,
        }
    }
}

impl WorldConfig {
    /// Read and validate a config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.grid.is_valid() {
            return Err(ConfigError::Invalid(
                "grid needs at least one sector and world_max above world_min".into(),
            ));
        }
        if let Some((name, _)) = self.pools.sizes().into_iter().find(|(_, n)| *n == 0) {
            return Err(ConfigError::Invalid(format!("pool `{name}` has zero capacity")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn defaults_match_fixed_limits() {
        let config = WorldConfig::default();
        assert_eq!(config.reference_capacity, 3000);
        assert_eq!(config.pools.vehicles, 110);
        assert_eq!(config.pools.buildings, 5500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        std::fs::write(&path, r#"{ "pools": { "vehicles": 8 }, "reference_capacity": 16 }"#)
            .unwrap();

        let config = WorldConfig::load(&path).unwrap();
        assert_eq!(config.pools.vehicles, 8);
        assert_eq!(config.pools.peds, 140);
        assert_eq!(config.reference_capacity, 16);
        assert_eq!(config.grid, GridConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        let mut config = WorldConfig::default();
        config.grid.sectors_x = 8;
        config.save(&path).unwrap();
        assert_eq!(WorldConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn zero_pool_is_rejected() {
        let mut config = WorldConfig::default();
        config.pools.objects = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("objects"));
    }

    #[test]
    fn inverted_grid_is_rejected() {
        let mut config = WorldConfig::default();
        config.grid.world_max = Vec2::splat(-3000.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(WorldConfig::load(&path), Err(ConfigError::Json(_))));
    }
}
