//! Root component of a tile map with physics.
//!
//! Spawned by
//! [`spawn_physics_tiled_scene`](crate::systems::tiledphysics::spawn_physics_tiled_scene).
//! The binder is attached once the map has been bound successfully; a scene
//! whose binding failed is despawned and never observed.

use std::path::{Path, PathBuf};

use bevy_ecs::prelude::Component;

use crate::resources::tiledmap::TileGrid;
use crate::systems::tiledphysics::TilePhysicsBinder;

#[derive(Component, Debug)]
pub struct PhysicsTiledScene {
    map_path: PathBuf,
    grid: TileGrid,
    binder: Option<TilePhysicsBinder>,
}

impl PhysicsTiledScene {
    pub fn new(map_path: impl Into<PathBuf>, grid: TileGrid) -> Self {
        Self {
            map_path: map_path.into(),
            grid,
            binder: None,
        }
    }

    pub fn map_path(&self) -> &Path {
        &self.map_path
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// The binder that populated this scene, once bound.
    pub fn binder(&self) -> Option<&TilePhysicsBinder> {
        self.binder.as_ref()
    }

    pub(crate) fn attach_binder(&mut self, binder: TilePhysicsBinder) {
        self.binder = Some(binder);
    }
}
