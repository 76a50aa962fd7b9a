//! ECS components for entities.
//!
//! Components attached to the entities of a physics tiled scene: the scene
//! root, its layers, the tile placeholders and their physics bodies.
//!
//! Submodules overview:
//! - [`group`] – tag component for grouping entities by name
//! - [`harm`] – contact damage of hazardous tiles
//! - [`mapposition`] – world-space position (pivot) for an entity
//! - [`physicsbody`] – physics body configuration and collision shapes
//! - [`physicstiledscene`] – root of a tile map bound to physics
//! - [`signals`] – per-entity values copied from map data
//! - [`tileplaceholder`] – invisible tile nodes, layers and map bounds

pub mod group;
pub mod harm;
pub mod mapposition;
pub mod physicsbody;
pub mod physicstiledscene;
pub mod signals;
pub mod tileplaceholder;
