//! ECS resources and asset models.
//!
//! Long-lived data injected into the ECS world or owned by scenes.
//!
//! Overview
//! - `input` – edge-triggered state of the game's logical buttons
//! - `physicsconfig` – INI-backed physics and asset settings
//! - `physicsworld` – gravity, substeps and debug flag for the solver
//! - `shapecache` – body templates loaded from shape-definition files
//! - `tiledmap` – Tiled JSON map model and the block grid
pub mod input;
pub mod physicsconfig;
pub mod physicsworld;
pub mod shapecache;
pub mod tiledmap;
