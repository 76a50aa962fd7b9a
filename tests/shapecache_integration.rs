//! Integration tests for loading shape files from disk.
//!
//! # Usage
//!
//! ```sh
//! cargo test --test shapecache_integration
//! ```

use std::fs;
use std::path::Path;

use glam::Vec2;

use laserbots::components::physicsbody::ShapeGeometry;
use laserbots::resources::shapecache::{FixtureKind, ShapeCache, ShapeCacheError};

fn maps_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/maps"))
}

const EXTRA: &str = r#"{
    "metadata": { "format": 1 },
    "bodies": {
        "barrel": {
            "anchorpoint": "0.5,0.5", "is_dynamic": true, "affected_by_gravity": true,
            "allows_rotation": true, "linear_damping": 0.0, "angular_damping": 0.0,
            "velocity_limit": 500.0, "angular_velocity_limit": 10.0,
            "fixtures": [ {
                "density": 0.5, "restitution": 0.1, "friction": 0.9,
                "tag": 0, "group": 0,
                "category_mask": 1, "collision_mask": -1, "contact_test_mask": 0,
                "fixture_type": "CIRCLE",
                "circle": { "radius": 10.0, "position": "0,0" }
            } ]
        }
    }
}"#;

#[test]
fn shipped_shapes_load_with_default_scale() {
    let mut cache = ShapeCache::new().with_base_dir(maps_dir());
    assert_eq!(cache.load_shapes("shapes.json").unwrap(), 3);
    assert_eq!(cache.files(), vec!["shapes.json"]);

    let robot = cache.lookup("robot").unwrap();
    assert_eq!(robot.fixtures.len(), 1);
    match robot.fixtures[0].kind {
        FixtureKind::Circle { center, radius } => {
            assert_eq!(center, Vec2::new(0.0, 8.0));
            assert_eq!(radius, 12.0);
        }
        ref other => panic!("unexpected fixture {:?}", other),
    }
    assert_eq!(robot.fixtures[0].collision_mask, u32::MAX);
}

#[test]
fn configured_scale_applies_to_load_shapes() {
    let mut cache = ShapeCache::new().with_base_dir(maps_dir()).with_scale_factor(4.0);
    cache.load_shapes("shapes.json").unwrap();
    let body = cache.create_body("robot").unwrap();
    match body.shapes[0].geometry {
        ShapeGeometry::Circle { radius, offset } => {
            assert_eq!(radius, 3.0);
            assert_eq!(offset, Vec2::new(0.0, 2.0));
        }
        ref other => panic!("unexpected geometry {:?}", other),
    }
}

#[test]
fn several_files_unload_independently() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(maps_dir().join("shapes.json"), dir.path().join("level.json")).unwrap();
    fs::write(dir.path().join("props.json"), EXTRA).unwrap();

    let mut cache = ShapeCache::new().with_base_dir(dir.path());
    cache.load_shapes("level.json").unwrap();
    cache.load_shapes_with_scale("props.json", 2.0).unwrap();
    assert_eq!(cache.len(), 4);

    cache.unload("level.json").unwrap();
    assert!(cache.lookup("crate").is_none());
    assert!(cache.lookup("barrel.png").is_some());
    assert_eq!(cache.files(), vec!["props.json"]);

    // loading again after eviction is allowed
    cache.load_shapes("level.json").unwrap();
    assert_eq!(cache.len(), 4);
}

#[test]
fn duplicate_source_is_rejected_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("props.json");
    fs::write(&path, EXTRA).unwrap();

    let mut cache = ShapeCache::new().with_base_dir(dir.path());
    cache.load_shapes("props.json").unwrap();
    fs::remove_file(&path).unwrap();

    assert!(matches!(
        cache.load_shapes("props.json"),
        Err(ShapeCacheError::DuplicateSource(_))
    ));
    assert!(cache.lookup("barrel").is_some());
}

#[test]
fn empty_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("empty.json"), "").unwrap();
    let mut cache = ShapeCache::new().with_base_dir(dir.path());
    assert!(matches!(
        cache.load_shapes("empty.json"),
        Err(ShapeCacheError::NotFound(_))
    ));
    assert!(!cache.is_loaded("empty.json"));
}
