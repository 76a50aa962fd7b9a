//! Laserbots physics library.
//!
//! Exposes the shape cache, the tile-map physics binder and their ECS
//! components, resources and events for the game binary and integration tests.

pub mod components;
pub mod events;
pub mod resources;
pub mod systems;
