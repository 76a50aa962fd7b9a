//! Physics world settings.
//!
//! Inserted by the tiled physics scene when it is created; the external solver
//! reads it when stepping the world.

use bevy_ecs::prelude::Resource;
use glam::Vec2;

use crate::resources::physicsconfig::PhysicsConfig;

#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct PhysicsWorldSettings {
    /// Gravity vector; only the vertical component is configurable.
    pub gravity: Vec2,
    /// Solver substeps per frame.
    pub substeps: u32,
    /// Draw shapes and contacts for debugging.
    pub debug_draw: bool,
}

impl Default for PhysicsWorldSettings {
    fn default() -> Self {
        Self::from_config(&PhysicsConfig::new())
    }
}

impl PhysicsWorldSettings {
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            gravity: Vec2::new(0.0, config.gravity),
            // the solver needs at least one step
            substeps: config.substeps.max(1),
            debug_draw: config.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = PhysicsConfig::new();
        config.gravity = -500.0;
        config.substeps = 0;
        config.debug = true;
        let settings = PhysicsWorldSettings::from_config(&config);
        assert_eq!(settings.gravity, Vec2::new(0.0, -500.0));
        assert_eq!(settings.substeps, 1);
        assert!(settings.debug_draw);
    }

    #[test]
    fn test_default_matches_config_defaults() {
        let settings = PhysicsWorldSettings::default();
        assert_eq!(settings.gravity, Vec2::new(0.0, -980.0));
        assert_eq!(settings.substeps, 4);
        assert!(!settings.debug_draw);
    }
}
