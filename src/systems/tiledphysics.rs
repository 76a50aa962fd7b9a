//! Tile-map physics binding.
//!
//! [`TilePhysicsBinder::bind_physics`] walks every layer of a tile map marked
//! with the `physics` property and gives each occupied tile an invisible
//! placeholder entity carrying the [`PhysicsBody`] named by the tile's `shape`
//! property. Shape templates come from the file named by the map's `shapes`
//! property.
//!
//! [`spawn_physics_tiled_scene`] builds a whole scene around it: map loading,
//! world settings, the boundary box and the bound event.
//!
//! # Map Properties
//!
//! | Where   | Name      | Type   | Meaning                                  |
//! |---------|-----------|--------|------------------------------------------|
//! | map     | `shapes`  | string | shape file, relative to the map          |
//! | layer   | `physics` | bool   | bind this layer                          |
//! | tile    | `shape`   | string | body template name; absent = no physics  |
//!
//! Other tile properties are copied into the placeholder's [`Signals`].

use std::path::{Path, PathBuf};

use bevy_ecs::prelude::*;
use glam::UVec2;
use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::components::group::Group;
use crate::components::mapposition::MapPosition;
use crate::components::physicsbody::{PhysicsBody, PhysicsMaterial};
use crate::components::physicstiledscene::PhysicsTiledScene;
use crate::components::signals::Signals;
use crate::components::tileplaceholder::{MapBounds, TileLayer, TilePlaceholder};
use crate::events::tiledphysics::PhysicsMapBoundEvent;
use crate::resources::physicsconfig::PhysicsConfig;
use crate::resources::physicsworld::PhysicsWorldSettings;
use crate::resources::shapecache::{ShapeCache, ShapeCacheError};
use crate::resources::tiledmap::{
    BlockRect, Properties, PropertyValue, TileGrid, TileMapSource, TiledMap, TiledMapError,
};

pub const SHAPES_PROPERTY: &str = "shapes";
pub const PHYSICS_PROPERTY: &str = "physics";
pub const SHAPE_PROPERTY: &str = "shape";

/// Group given to tile placeholders.
pub const TILE_GROUP: &str = "tile";
/// Group of the map boundary entity.
pub const MAP_BOUNDS_GROUP: &str = "map_bounds";
/// Wall thickness of the map boundary box.
pub const MAP_BOUNDS_BORDER: f32 = 5.0;

/// Material of the map boundary box.
pub fn map_bounds_material() -> PhysicsMaterial {
    PhysicsMaterial::new(0.1, 0.0, 0.5)
}

#[derive(Debug, thiserror::Error)]
pub enum BinderError {
    #[error("map has no \"shapes\" property")]
    MissingShapesProperty,

    #[error("failed to load shapes from {shapes}: {cause}")]
    ShapeLoadFailure {
        shapes: String,
        #[source]
        cause: ShapeCacheError,
    },

    #[error("map physics already bound")]
    AlreadyBound,

    #[error("failed to load map {path:?}: {cause}")]
    MapLoad {
        path: PathBuf,
        #[source]
        cause: TiledMapError,
    },
}

/// Counts reported by a successful bind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindSummary {
    /// Layers carrying the `physics` property.
    pub layers: usize,
    /// Placeholder entities spawned.
    pub placeholders: usize,
    /// Shapes attached over all placeholders.
    pub shapes: usize,
}

/// Binds a tile map's physics layers to bodies from its own [`ShapeCache`].
///
/// What a tile gid resolves to: the body template name and the values copied
/// into each placeholder's [`Signals`].
#[derive(Debug, Clone, Default)]
struct TileBinding {
    shape: String,
    signals: Signals,
}

/// A binder binds once; it keeps its cache and the gid table afterwards so
/// the scene can create more bodies from the same templates.
#[derive(Debug, Default)]
pub struct TilePhysicsBinder {
    cache: ShapeCache,
    tiles: FxHashMap<u32, TileBinding>,
    bound: bool,
}

// Free function so callers can keep borrowing the cache while the binding is alive.
fn memoized_binding<'a, M: TileMapSource + ?Sized>(
    tiles: &'a mut FxHashMap<u32, TileBinding>,
    map: &M,
    gid: u32,
) -> &'a TileBinding {
    tiles.entry(gid).or_insert_with(|| {
        let properties = map.properties_for_gid(gid);
        TileBinding {
            shape: properties
                .and_then(|properties| properties.get_str(SHAPE_PROPERTY))
                .unwrap_or_default()
                .to_string(),
            signals: tile_signals(properties),
        }
    })
}

/// Copy a tile's properties, except its shape name, into [`Signals`].
fn tile_signals(properties: Option<&Properties>) -> Signals {
    let mut signals = Signals::default();
    let Some(properties) = properties else {
        return signals;
    };
    for (key, value) in properties.iter() {
        if key == SHAPE_PROPERTY {
            continue;
        }
        match value {
            PropertyValue::Int(v) => signals.set_integer(key, *v as i32),
            PropertyValue::Float(v) => signals.set_scalar(key, *v as f32),
            PropertyValue::String(v) => signals.set_string(key, v.clone()),
            PropertyValue::Bool(v) => {
                if *v {
                    signals.set_flag(key);
                }
            }
        }
    }
    signals
}

impl TilePhysicsBinder {
    /// Create an unbound binder owning `cache`.
    pub fn new(cache: ShapeCache) -> Self {
        Self {
            cache,
            tiles: FxHashMap::default(),
            bound: false,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn cache(&self) -> &ShapeCache {
        &self.cache
    }

    /// Shape name of the tile behind `gid`, or `""` when it has none.
    ///
    /// The map is only asked once per gid.
    pub fn resolve_shape_name<M: TileMapSource + ?Sized>(&mut self, map: &M, gid: u32) -> &str {
        &memoized_binding(&mut self.tiles, map, gid).shape
    }

    /// Spawn a placeholder with a physics body for every occupied tile of the
    /// map's physics layers, under `scene`.
    pub fn bind_physics<M: TileMapSource + ?Sized>(
        &mut self,
        world: &mut World,
        map: &M,
        grid: &TileGrid,
        scene: Entity,
    ) -> Result<BindSummary, BinderError> {
        if self.bound {
            return Err(BinderError::AlreadyBound);
        }

        let shapes = map
            .property(SHAPES_PROPERTY)
            .and_then(PropertyValue::as_str)
            .filter(|shapes| !shapes.is_empty())
            .ok_or(BinderError::MissingShapesProperty)?;
        self.cache
            .load_shapes(shapes)
            .map_err(|cause| BinderError::ShapeLoadFailure {
                shapes: shapes.to_string(),
                cause,
            })?;
        self.bound = true;

        let mut summary = BindSummary::default();

        for layer in 0..map.layer_count() {
            let physics = map
                .layer_property(layer, PHYSICS_PROPERTY)
                .is_some_and(PropertyValue::as_bool);
            if !physics {
                continue;
            }
            let layer_name = map.layer_name(layer).unwrap_or_default().to_string();
            let layer_entity = world
                .spawn((TileLayer { name: layer_name.clone() }, ChildOf(scene)))
                .id();
            summary.layers += 1;

            for (col, row) in grid.cells() {
                let gid = map.gid_at(layer, col, row);
                if gid == 0 {
                    continue;
                }
                let first_use = !self.tiles.contains_key(&gid);
                let binding = memoized_binding(&mut self.tiles, map, gid);
                if binding.shape.is_empty() {
                    continue;
                }
                let Some(template) = self.cache.lookup(&binding.shape) else {
                    if first_use {
                        warn!("PhysicsBody with name \"{}\" not found (gid {})", binding.shape, gid);
                    }
                    continue;
                };
                let body = template.instantiate();
                let block = BlockRect {
                    origin: map.position_at(col, row),
                    size: grid.block_size,
                };

                summary.placeholders += 1;
                summary.shapes += body.shape_count();
                world.spawn((
                    TilePlaceholder::new(
                        layer_name.as_str(),
                        UVec2::new(col, row),
                        gid,
                        grid.block_size,
                    ),
                    MapPosition::from_vec(block.center()),
                    body,
                    Group::new(TILE_GROUP),
                    binding.signals.clone(),
                    ChildOf(layer_entity),
                ));
            }
        }

        info!(
            "Bound physics from {}: {} layers, {} placeholders, {} shapes",
            shapes, summary.layers, summary.placeholders, summary.shapes
        );
        if summary.layers == 0 {
            warn!("Map has no layer with the \"{}\" property", PHYSICS_PROPERTY);
        }
        Ok(summary)
    }
}

/// Load a Tiled map and build a physics scene from it.
///
/// Returns the scene entity. When anything fails the scene and everything
/// spawned under it is despawned and the error is returned.
pub fn spawn_physics_tiled_scene(
    world: &mut World,
    map_path: impl AsRef<Path>,
    config: &PhysicsConfig,
) -> Result<Entity, BinderError> {
    let map_path = map_path.as_ref();
    let map = TiledMap::load_from_file(map_path).map_err(|cause| BinderError::MapLoad {
        path: map_path.to_path_buf(),
        cause,
    })?;
    let grid = map.grid();

    world.insert_resource(PhysicsWorldSettings::from_config(config));
    let scene = world.spawn(PhysicsTiledScene::new(map_path, grid)).id();

    let total_size = grid.total_size();
    world.spawn((
        MapBounds,
        Group::new(MAP_BOUNDS_GROUP),
        MapPosition::from_vec(total_size / 2.0),
        PhysicsBody::edge_box(total_size, map_bounds_material(), MAP_BOUNDS_BORDER),
        ChildOf(scene),
    ));

    let base_dir = map_path.parent().unwrap_or(Path::new(""));
    let cache = ShapeCache::new()
        .with_base_dir(base_dir)
        .with_scale_factor(config.content_scale_factor);
    let mut binder = TilePhysicsBinder::new(cache);

    let summary = match binder.bind_physics(world, &map, &grid, scene) {
        Ok(summary) => summary,
        Err(err) => {
            world.despawn(scene);
            return Err(err);
        }
    };

    if let Some(mut scene_component) = world.get_mut::<PhysicsTiledScene>(scene) {
        scene_component.attach_binder(binder);
    }
    world.trigger(PhysicsMapBoundEvent {
        scene,
        layers: summary.layers,
        placeholders: summary.placeholders,
        shapes: summary.shapes,
    });
    world.flush();

    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use std::cell::Cell;
    use std::fs;

    const SHAPES: &str = r#"{
        "metadata": { "format": 1 },
        "bodies": {
            "crate": {
                "anchorpoint": "0.5,0.5",
                "is_dynamic": false, "affected_by_gravity": false, "allows_rotation": false,
                "linear_damping": 0.0, "angular_damping": 0.0,
                "velocity_limit": 100.0, "angular_velocity_limit": 100.0,
                "fixtures": [{
                    "density": 1.0, "restitution": 0.0, "friction": 0.5,
                    "tag": 0, "group": 0,
                    "category_mask": 1, "collision_mask": -1, "contact_test_mask": 0,
                    "fixture_type": "POLYGON",
                    "polygons": [["0,0", "32,0", "32,32", "0,32"]]
                }]
            }
        }
    }"#;

    /// In-memory map counting tile property lookups.
    struct MockMap {
        properties: Properties,
        layers: Vec<(String, Properties, Vec<u32>)>,
        width: u32,
        tiles: FxHashMap<u32, Properties>,
        tile_size: Vec2,
        lookups: Cell<usize>,
    }

    impl MockMap {
        fn new(shapes: Option<&str>, width: u32) -> Self {
            let mut properties = Properties::new();
            if let Some(shapes) = shapes {
                properties.insert(SHAPES_PROPERTY, PropertyValue::String(shapes.into()));
            }
            Self {
                properties,
                layers: Vec::new(),
                width,
                tiles: FxHashMap::default(),
                tile_size: Vec2::new(32.0, 32.0),
                lookups: Cell::new(0),
            }
        }

        fn with_layer(mut self, name: &str, physics: bool, data: Vec<u32>) -> Self {
            let properties = Properties::new().with(PHYSICS_PROPERTY, PropertyValue::Bool(physics));
            self.layers.push((name.to_string(), properties, data));
            self
        }

        fn with_tile(mut self, gid: u32, properties: Properties) -> Self {
            self.tiles.insert(gid, properties);
            self
        }

        fn grid(&self) -> TileGrid {
            let cells = self.layers.first().map_or(0, |(_, _, data)| data.len() as u32);
            TileGrid::new(UVec2::new(self.width, cells / self.width), self.tile_size)
        }
    }

    impl TileMapSource for MockMap {
        fn property(&self, name: &str) -> Option<&PropertyValue> {
            self.properties.get(name)
        }

        fn layer_count(&self) -> usize {
            self.layers.len()
        }

        fn layer_name(&self, layer: usize) -> Option<&str> {
            self.layers.get(layer).map(|(name, _, _)| name.as_str())
        }

        fn layer_property(&self, layer: usize, name: &str) -> Option<&PropertyValue> {
            self.layers.get(layer).and_then(|(_, props, _)| props.get(name))
        }

        fn gid_at(&self, layer: usize, col: u32, row: u32) -> u32 {
            let index = (row * self.width + col) as usize;
            self.layers
                .get(layer)
                .and_then(|(_, _, data)| data.get(index).copied())
                .unwrap_or(0)
        }

        fn properties_for_gid(&self, gid: u32) -> Option<&Properties> {
            self.lookups.set(self.lookups.get() + 1);
            self.tiles.get(&gid)
        }

        fn position_at(&self, col: u32, row: u32) -> Vec2 {
            Vec2::new(col as f32, row as f32) * self.tile_size
        }
    }

    fn crate_tile() -> Properties {
        Properties::new()
            .with(SHAPE_PROPERTY, PropertyValue::String("crate".into()))
            .with("damage", PropertyValue::Float(3.0))
    }

    fn binder_with_shapes(dir: &tempfile::TempDir) -> TilePhysicsBinder {
        fs::write(dir.path().join("shapes.json"), SHAPES).unwrap();
        TilePhysicsBinder::new(ShapeCache::new().with_base_dir(dir.path()))
    }

    #[test]
    fn test_resolve_shape_name_memoizes() {
        let map = MockMap::new(Some("shapes.json"), 1).with_tile(5, crate_tile());
        let mut binder = TilePhysicsBinder::default();
        assert_eq!(binder.resolve_shape_name(&map, 5), "crate");
        assert_eq!(binder.resolve_shape_name(&map, 5), "crate");
        assert_eq!(map.lookups.get(), 1);
    }

    #[test]
    fn test_resolve_shape_name_without_property() {
        let map = MockMap::new(Some("shapes.json"), 1).with_tile(7, Properties::new());
        let mut binder = TilePhysicsBinder::default();
        assert_eq!(binder.resolve_shape_name(&map, 7), "");
        assert_eq!(binder.resolve_shape_name(&map, 8), "");
        binder.resolve_shape_name(&map, 7);
        assert_eq!(map.lookups.get(), 2);
    }

    #[test]
    fn test_bind_single_crate_tile() {
        let dir = tempfile::tempdir().unwrap();
        let mut binder = binder_with_shapes(&dir);
        let map = MockMap::new(Some("shapes.json"), 2)
            .with_layer("walls", true, vec![0, 0, 0, 5])
            .with_tile(5, crate_tile());
        let grid = map.grid();

        let mut world = World::new();
        let scene = world.spawn_empty().id();
        let summary = binder.bind_physics(&mut world, &map, &grid, scene).unwrap();
        assert_eq!(
            summary,
            BindSummary {
                layers: 1,
                placeholders: 1,
                shapes: 1
            }
        );
        assert!(binder.is_bound());

        let mut query = world.query::<(&TilePlaceholder, &MapPosition, &PhysicsBody, &Signals, &ChildOf)>();
        let (placeholder, position, body, signals, parent) = query.single(&world).unwrap();
        assert_eq!(placeholder.cell, UVec2::new(1, 1));
        assert_eq!(placeholder.gid, 5);
        assert!(!placeholder.visible);
        assert_eq!(position.pos, Vec2::new(48.0, 48.0));
        assert_eq!(body.shape_count(), 1);
        assert!(!body.dynamic);
        assert_eq!(signals.get_scalar("damage"), Some(3.0));
        assert!(signals.get_string(SHAPE_PROPERTY).is_none());

        let layer = world.get::<TileLayer>(parent.parent()).unwrap();
        assert_eq!(layer.name, "walls");
        assert_eq!(world.get::<ChildOf>(parent.parent()).map(ChildOf::parent), Some(scene));
    }

    #[test]
    fn test_bind_queries_each_gid_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut binder = binder_with_shapes(&dir);
        let map = MockMap::new(Some("shapes.json"), 2)
            .with_layer("walls", true, vec![5, 5, 5, 5])
            .with_tile(5, crate_tile());
        let grid = map.grid();

        let mut world = World::new();
        let scene = world.spawn_empty().id();
        let summary = binder.bind_physics(&mut world, &map, &grid, scene).unwrap();
        assert_eq!(summary.placeholders, 4);
        assert_eq!(map.lookups.get(), 1);

        // every placeholder still gets its own copy of the tile values
        let mut query = world.query::<&Signals>();
        assert_eq!(query.iter(&world).count(), 4);
        assert!(query.iter(&world).all(|signals| signals.get_scalar("damage") == Some(3.0)));
    }

    #[test]
    fn test_unknown_shape_resolves_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut binder = binder_with_shapes(&dir);
        let barrel = Properties::new().with(SHAPE_PROPERTY, PropertyValue::String("barrel".into()));
        let map = MockMap::new(Some("shapes.json"), 3)
            .with_layer("walls", true, vec![6, 6, 6, 6, 0, 6])
            .with_tile(6, barrel);
        let grid = map.grid();

        let mut world = World::new();
        let scene = world.spawn_empty().id();
        let summary = binder.bind_physics(&mut world, &map, &grid, scene).unwrap();
        assert_eq!(summary.placeholders, 0);
        assert_eq!(map.lookups.get(), 1);
        assert_eq!(binder.resolve_shape_name(&map, 6), "barrel");
        assert_eq!(map.lookups.get(), 1);
    }

    #[test]
    fn test_tile_without_shape_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut binder = binder_with_shapes(&dir);
        let map = MockMap::new(Some("shapes.json"), 2)
            .with_layer("walls", true, vec![9, 0, 0, 9])
            .with_tile(9, Properties::new());
        let grid = map.grid();

        let mut world = World::new();
        let scene = world.spawn_empty().id();
        let summary = binder.bind_physics(&mut world, &map, &grid, scene).unwrap();
        assert_eq!(summary.placeholders, 0);
        assert_eq!(binder.resolve_shape_name(&map, 9), "");
        assert_eq!(world.query::<&TilePlaceholder>().iter(&world).count(), 0);
    }

    #[test]
    fn test_unknown_shape_and_non_physics_layers_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut binder = binder_with_shapes(&dir);
        let barrel = Properties::new().with(SHAPE_PROPERTY, PropertyValue::String("barrel".into()));
        let map = MockMap::new(Some("shapes.json"), 2)
            .with_layer("decor", false, vec![5, 5, 5, 5])
            .with_layer("walls", true, vec![6, 5, 0, 0])
            .with_tile(5, crate_tile())
            .with_tile(6, barrel);
        let grid = map.grid();

        let mut world = World::new();
        let scene = world.spawn_empty().id();
        let summary = binder.bind_physics(&mut world, &map, &grid, scene).unwrap();
        assert_eq!(summary.layers, 1);
        assert_eq!(summary.placeholders, 1);
        assert_eq!(world.query::<&TileLayer>().iter(&world).count(), 1);
    }

    #[test]
    fn test_missing_shapes_property() {
        let map = MockMap::new(None, 1).with_layer("walls", true, vec![5]);
        let grid = map.grid();
        let mut world = World::new();
        let scene = world.spawn_empty().id();
        let mut binder = TilePhysicsBinder::default();
        let err = binder.bind_physics(&mut world, &map, &grid, scene).unwrap_err();
        assert!(matches!(err, BinderError::MissingShapesProperty));
        assert!(!binder.is_bound());
    }

    #[test]
    fn test_shape_load_failure_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let map = MockMap::new(Some("absent.json"), 1).with_layer("walls", true, vec![5]);
        let grid = map.grid();
        let mut world = World::new();
        let scene = world.spawn_empty().id();
        let mut binder = TilePhysicsBinder::new(ShapeCache::new().with_base_dir(dir.path()));
        match binder.bind_physics(&mut world, &map, &grid, scene) {
            Err(BinderError::ShapeLoadFailure { shapes, cause }) => {
                assert_eq!(shapes, "absent.json");
                assert!(matches!(cause, ShapeCacheError::NotFound(_)));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_second_bind_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut binder = binder_with_shapes(&dir);
        let map = MockMap::new(Some("shapes.json"), 1)
            .with_layer("walls", true, vec![5])
            .with_tile(5, crate_tile());
        let grid = map.grid();
        let mut world = World::new();
        let scene = world.spawn_empty().id();
        binder.bind_physics(&mut world, &map, &grid, scene).unwrap();
        let err = binder.bind_physics(&mut world, &map, &grid, scene).unwrap_err();
        assert!(matches!(err, BinderError::AlreadyBound));
        assert_eq!(world.query::<&TilePlaceholder>().iter(&world).count(), 1);
    }

    #[test]
    fn test_tile_signals_skip_shape() {
        let properties = Properties::new()
            .with(SHAPE_PROPERTY, PropertyValue::String("crate".into()))
            .with("points", PropertyValue::Int(50))
            .with("spiky", PropertyValue::Bool(true))
            .with("hidden", PropertyValue::Bool(false));
        let signals = tile_signals(Some(&properties));
        assert_eq!(signals.get_integer("points"), Some(50));
        assert!(signals.has_flag("spiky"));
        assert!(!signals.has_flag("hidden"));
        assert!(signals.get_string(SHAPE_PROPERTY).is_none());
        assert!(tile_signals(None).is_empty());
    }
}
