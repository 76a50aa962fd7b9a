//! Event types and observers.
//!
//! Submodules:
//! - [`tiledphysics`] – notification that a map has been bound to physics,
//!   and the observers decorating its tiles
pub mod tiledphysics;
