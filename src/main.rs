//! Laserbots physics inspector.
//!
//! Headless entry point that loads the configuration, builds the physics
//! tiled scene of a map and reports what was bound. Useful to check a map and
//! its shape file before running the game.
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --map assets/maps/level_01.json
//! cargo run --release -- --list-bodies assets/maps/shapes.json
//! ```

use std::path::{Path, PathBuf};
use std::process;

use bevy_ecs::prelude::*;
use clap::Parser;
use log::{error, info, warn};

use laserbots::components::group::Group;
use laserbots::components::physicsbody::PhysicsBody;
use laserbots::components::tileplaceholder::TilePlaceholder;
use laserbots::events::tiledphysics::{observe_harmful_tiles, observe_log_map_bound};
use laserbots::resources::input::{InputController, update_input_controller};
use laserbots::resources::physicsconfig::PhysicsConfig;
use laserbots::resources::shapecache::ShapeCache;
use laserbots::systems::tiledphysics::spawn_physics_tiled_scene;

/// Laserbots physics inspector
#[derive(Parser)]
#[command(version, about = "Binds a Tiled map to physics bodies and reports the result.")]
struct Cli {
    /// Configuration file.
    #[arg(long, value_name = "PATH", default_value = "./config.ini")]
    config: PathBuf,

    /// Map to bind, overriding `[assets] map` from the configuration.
    #[arg(long, value_name = "PATH")]
    map: Option<PathBuf>,

    /// Content scale factor, overriding the configuration.
    #[arg(long, value_name = "FACTOR")]
    scale: Option<f32>,

    /// Print the body templates of a shape file and exit.
    #[arg(long, value_name = "PATH")]
    list_bodies: Option<PathBuf>,
}

fn list_bodies(path: &Path, scale: f32) -> Result<(), String> {
    let file_id = path.to_string_lossy();
    let mut cache = ShapeCache::new().with_scale_factor(scale);
    cache.load_shapes(&file_id).map_err(|e| e.to_string())?;
    for name in cache.body_names() {
        let Some(template) = cache.lookup(name) else {
            continue;
        };
        println!(
            "{}: dynamic={} gravity={} rotation={} fixtures={}",
            name,
            template.is_dynamic,
            template.affected_by_gravity,
            template.allows_rotation,
            template.fixtures.len()
        );
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = PhysicsConfig::with_path(&cli.config);
    if let Err(e) = config.load_from_file() {
        warn!("{}; using defaults", e);
    }
    if let Some(scale) = cli.scale {
        config.content_scale_factor = scale;
    }
    if let Some(map) = cli.map {
        config.map_path = map;
    }

    // Early-exit: dump a shape file
    if let Some(path) = cli.list_bodies {
        if let Err(e) = list_bodies(&path, config.content_scale_factor) {
            error!("Failed to list bodies of {}: {}", path.display(), e);
            process::exit(1);
        }
        return;
    }

    let mut world = World::new();
    world.insert_resource(config.clone());
    world.insert_resource(InputController::new());
    world.add_observer(observe_log_map_bound);
    world.add_observer(observe_harmful_tiles);

    let scene = match spawn_physics_tiled_scene(&mut world, &config.map_path, &config) {
        Ok(scene) => scene,
        Err(e) => {
            error!("Scene refused to be created: {}", e);
            process::exit(1);
        }
    };
    info!("Physics tiled scene {:?} ready", scene);

    let mut schedule = Schedule::default();
    schedule.add_systems(update_input_controller);
    schedule.run(&mut world);

    let mut placeholders = world.query::<(&TilePlaceholder, &PhysicsBody, &Group)>();
    let mut rows: Vec<_> = placeholders
        .iter(&world)
        .map(|(tile, body, group)| {
            (
                tile.layer.clone(),
                tile.cell.y,
                tile.cell.x,
                tile.gid,
                body.shape_count(),
                group.name().to_string(),
            )
        })
        .collect();
    rows.sort();
    for (layer, row, col, gid, shapes, group) in &rows {
        println!(
            "{} ({}, {}) gid={} shapes={} group={}",
            layer, col, row, gid, shapes, group
        );
    }
    println!("{} placeholders", rows.len());
}
