use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Extent and resolution of the sector grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of sector columns along X.
    pub sectors_x: usize,
    /// Number of sector rows along Y.
    pub sectors_y: usize,
    /// Lower corner of the playable world.
    pub world_min: Vec2,
    /// Upper corner of the playable world.
    pub world_max: Vec2,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            sectors_x: 100,
            sectors_y: 100,
            world_min: Vec2::splat(-2000.0),
            world_max: Vec2::splat(2000.0),
        }
    }
}

impl GridConfig {
    /// World-space size of one sector.
    pub fn sector_size(&self) -> Vec2 {
        (self.world_max - self.world_min) / Vec2::new(self.sectors_x as f32, self.sectors_y as f32)
    }

    pub fn sector_count(&self) -> usize {
        self.sectors_x * self.sectors_y
    }

    pub fn is_valid(&self) -> bool {
        self.sectors_x > 0
            && self.sectors_y > 0
            && self.world_max.x > self.world_min.x
            && self.world_max.y > self.world_min.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sectors_are_forty_units() {
        let config = GridConfig::default();
        assert_eq!(config.sector_size(), Vec2::splat(40.0));
        assert_eq!(config.sector_count(), 10_000);
        assert!(config.is_valid());
    }

    #[test]
    fn inverted_bounds_are_invalid() {
        let config = GridConfig {
            world_min: Vec2::splat(10.0),
            world_max: Vec2::splat(-10.0),
            ..GridConfig::default()
        };
        assert!(!config.is_valid());
    }
}
