//! Engine systems.
//!
//! Submodules overview
//! - [`tiledphysics`] – bind tile map layers to physics bodies and build
//!   physics tiled scenes
pub mod tiledphysics;
