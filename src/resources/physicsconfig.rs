//! Physics configuration resource.
//!
//! Settings loaded from an INI file. Every value has a default so a missing
//! file or key never prevents start-up.
//!
//! # Configuration File Format
//!
//! ```ini
//! [physics]
//! content_scale_factor = 1.0
//! gravity = -980.0
//! substeps = 4
//! debug = false
//!
//! [assets]
//! map = ./assets/maps/level_01.json
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

const DEFAULT_CONTENT_SCALE_FACTOR: f32 = 1.0;
const DEFAULT_GRAVITY: f32 = -980.0;
const DEFAULT_SUBSTEPS: u32 = 4;
const DEFAULT_DEBUG: bool = false;
const DEFAULT_MAP: &str = "./assets/maps/level_01.json";
const DEFAULT_CONFIG_PATH: &str = "./config.ini";

/// Physics configuration resource.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct PhysicsConfig {
    /// Divisor applied to every coordinate of loaded shape files.
    pub content_scale_factor: f32,
    /// Vertical gravity handed to the solver.
    pub gravity: f32,
    /// Solver substeps per frame.
    pub substeps: u32,
    /// Enable the solver's debug drawing.
    pub debug: bool,
    /// Map loaded when none is given on the command line.
    pub map_path: PathBuf,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            content_scale_factor: DEFAULT_CONTENT_SCALE_FACTOR,
            gravity: DEFAULT_GRAVITY,
            substeps: DEFAULT_SUBSTEPS,
            debug: DEFAULT_DEBUG,
            map_path: PathBuf::from(DEFAULT_MAP),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a default configuration bound to a custom file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values keep their current value. Returns an error if the file
    /// cannot be read or parsed.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;

        // [physics] section
        if let Some(scale) = config.getfloat("physics", "content_scale_factor").ok().flatten() {
            self.content_scale_factor = scale as f32;
        }
        if let Some(gravity) = config.getfloat("physics", "gravity").ok().flatten() {
            self.gravity = gravity as f32;
        }
        if let Some(substeps) = config
            .getuint("physics", "substeps")
            .ok()
            .flatten()
            .and_then(|v| u32::try_from(v).ok())
        {
            self.substeps = substeps;
        }
        if let Some(debug) = config.getbool("physics", "debug").ok().flatten() {
            self.debug = debug;
        }

        // [assets] section
        if let Some(map) = config.get("assets", "map") {
            self.map_path = PathBuf::from(map);
        }

        info!(
            "Loaded config: scale={}, gravity={}, substeps={}, debug={}, map={:?}",
            self.content_scale_factor, self.gravity, self.substeps, self.debug, self.map_path
        );

        Ok(())
    }

    /// Save configuration to the INI file, creating it if needed.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        config.set(
            "physics",
            "content_scale_factor",
            Some(self.content_scale_factor.to_string()),
        );
        config.set("physics", "gravity", Some(self.gravity.to_string()));
        config.set("physics", "substeps", Some(self.substeps.to_string()));
        config.set("physics", "debug", Some(self.debug.to_string()));
        config.set("assets", "map", Some(self.map_path.display().to_string()));

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }
}
