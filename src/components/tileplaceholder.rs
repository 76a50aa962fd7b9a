//! Components spawned by the tile-map physics binder.
//!
//! A bound map produces a small hierarchy:
//!
//! ```text
//! PhysicsTiledScene            (scene root)
//! ├── MapBounds                (edge box around the whole map)
//! └── TileLayer "walls"        (one per physics layer)
//!     ├── TilePlaceholder (3,7)
//!     └── TilePlaceholder (4,7)
//! ```
//!
//! Placeholders are never drawn; they only exist to host a
//! [`PhysicsBody`](super::physicsbody::PhysicsBody) at a tile's position.

use bevy_ecs::prelude::Component;
use glam::{UVec2, Vec2};

/// Invisible node hosting the physics body of one occupied tile.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct TilePlaceholder {
    /// Name of the layer the tile belongs to.
    pub layer: String,
    /// Cell coordinates (column, row).
    pub cell: UVec2,
    /// Graphic identifier of the tile.
    pub gid: u32,
    /// Size of one block in world units.
    pub size: Vec2,
    /// Placeholders start hidden.
    pub visible: bool,
}

impl TilePlaceholder {
    pub fn new(layer: impl Into<String>, cell: UVec2, gid: u32, size: Vec2) -> Self {
        Self {
            layer: layer.into(),
            cell,
            gid,
            size,
            visible: false,
        }
    }
}

/// Tile layer node; placeholders are its children.
#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct TileLayer {
    pub name: String,
}

/// Marker for the entity holding the map boundary body.
#[derive(Component, Clone, Copy, Debug)]
pub struct MapBounds;
