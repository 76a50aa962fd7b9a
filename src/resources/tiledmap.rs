//! Tiled map model.
//!
//! Deserializes the JSON export of the Tiled editor (orthogonal maps with
//! embedded tilesets and CSV layer data) and exposes it to the physics binder
//! through the [`TileMapSource`] trait.
//!
//! Only the parts the binder and gameplay code read are modelled; unknown
//! fields are ignored. Coordinates use the map's own convention: origin at the
//! top-left corner, y growing downwards.

use std::fs;
use std::path::Path;

use glam::{UVec2, Vec2};
use serde::Deserialize;

/// Tiled stores flip/rotation flags in the top three bits of a gid.
pub const GID_FLAGS_MASK: u32 = 0xE000_0000;

/// Strip the flip flags from a raw gid.
pub fn clean_gid(raw: u32) -> u32 {
    raw & !GID_FLAGS_MASK
}

#[derive(Debug, thiserror::Error)]
pub enum TiledMapError {
    #[error("failed to read map: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse map: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("layer \"{name}\" has {found} cells, expected {expected}")]
    LayerSize {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Value of a custom property.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Truthiness of the value: booleans as is, non-zero numbers and the
    /// string `"true"` are true.
    pub fn as_bool(&self) -> bool {
        match self {
            PropertyValue::Bool(v) => *v,
            PropertyValue::Int(v) => *v != 0,
            PropertyValue::Float(v) => *v != 0.0,
            PropertyValue::String(v) => v.eq_ignore_ascii_case("true"),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// One named custom property, as Tiled writes it.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub value: PropertyValue,
}

/// Ordered list of custom properties.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Properties(Vec<Property>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing any property with the same name.
    pub fn with(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        self.0.retain(|p| p.name != name);
        self.0.push(Property {
            name,
            kind: String::new(),
            value,
        });
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropertyValue::as_str)
    }

    /// Absent properties read as false.
    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).is_some_and(PropertyValue::as_bool)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|p| (p.name.as_str(), &p.value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A layer of tile gids, row-major.
#[derive(Deserialize, Debug, Clone)]
pub struct TileLayerData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u32>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl TileLayerData {
    /// Gid at a cell with flip flags removed; 0 for empty or out of range.
    pub fn gid_at(&self, col: u32, row: u32) -> u32 {
        if col >= self.width || row >= self.height {
            return 0;
        }
        let index = (row as usize) * (self.width as usize) + col as usize;
        self.data.get(index).copied().map(clean_gid).unwrap_or(0)
    }
}

/// An object placed in an object group.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct MapObject {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", alias = "class", default)]
    pub kind: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    /// Degrees, clockwise.
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub properties: Properties,
}

impl MapObject {
    /// Center of the object's bounding box, ignoring rotation.
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ObjectGroup {
    pub name: String,
    #[serde(default)]
    pub objects: Vec<MapObject>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum Layer {
    #[serde(rename = "tilelayer")]
    Tiles(TileLayerData),
    #[serde(rename = "objectgroup")]
    Objects(ObjectGroup),
    /// Image and group layers are not used.
    #[serde(other)]
    Unsupported,
}

impl Layer {
    pub fn as_tiles(&self) -> Option<&TileLayerData> {
        match self {
            Layer::Tiles(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_objects(&self) -> Option<&ObjectGroup> {
        match self {
            Layer::Objects(group) => Some(group),
            _ => None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TilesetTile {
    pub id: u32,
    #[serde(default)]
    pub properties: Properties,
}

/// Embedded tileset. External tilesets (`source`) carry no tile properties.
#[derive(Deserialize, Debug, Clone)]
pub struct Tileset {
    pub firstgid: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tiles: Vec<TilesetTile>,
}

/// A Tiled map.
#[derive(Deserialize, Debug, Clone)]
pub struct TiledMap {
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    /// Tile width in pixels.
    pub tilewidth: u32,
    /// Tile height in pixels.
    pub tileheight: u32,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub tilesets: Vec<Tileset>,
}

impl TiledMap {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, TiledMapError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a map and check every tile layer holds `width * height` cells.
    pub fn from_json(contents: &str) -> Result<Self, TiledMapError> {
        let map: TiledMap = serde_json::from_str(contents)?;
        for layer in map.tile_layers() {
            let expected = (layer.width as usize) * (layer.height as usize);
            if layer.data.len() != expected {
                return Err(TiledMapError::LayerSize {
                    name: layer.name.clone(),
                    expected,
                    found: layer.data.len(),
                });
            }
        }
        Ok(map)
    }

    pub fn tile_layers(&self) -> impl Iterator<Item = &TileLayerData> {
        self.layers.iter().filter_map(Layer::as_tiles)
    }

    pub fn object_groups(&self) -> impl Iterator<Item = &ObjectGroup> {
        self.layers.iter().filter_map(Layer::as_objects)
    }

    pub fn object_group(&self, name: &str) -> Option<&ObjectGroup> {
        self.object_groups().find(|group| group.name == name)
    }

    pub fn tile_size(&self) -> Vec2 {
        Vec2::new(self.tilewidth as f32, self.tileheight as f32)
    }

    /// Block grid matching this map's dimensions.
    pub fn grid(&self) -> TileGrid {
        TileGrid::new(UVec2::new(self.width, self.height), self.tile_size())
    }

    fn tile_layer(&self, index: usize) -> Option<&TileLayerData> {
        self.tile_layers().nth(index)
    }
}

/// Read access to a tile map, as needed by the physics binder.
///
/// Layer indices only count tile layers.
pub trait TileMapSource {
    /// Map-level custom property.
    fn property(&self, name: &str) -> Option<&PropertyValue>;
    fn layer_count(&self) -> usize;
    fn layer_name(&self, layer: usize) -> Option<&str>;
    fn layer_property(&self, layer: usize, name: &str) -> Option<&PropertyValue>;
    /// Flag-free gid at a cell, 0 when empty.
    fn gid_at(&self, layer: usize, col: u32, row: u32) -> u32;
    /// Custom properties of the tile a gid refers to.
    fn properties_for_gid(&self, gid: u32) -> Option<&Properties>;
    /// Top-left corner of a cell in world units.
    fn position_at(&self, col: u32, row: u32) -> Vec2;
}

impl TileMapSource for TiledMap {
    fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    fn layer_count(&self) -> usize {
        self.tile_layers().count()
    }

    fn layer_name(&self, layer: usize) -> Option<&str> {
        self.tile_layer(layer).map(|l| l.name.as_str())
    }

    fn layer_property(&self, layer: usize, name: &str) -> Option<&PropertyValue> {
        self.tile_layer(layer).and_then(|l| l.properties.get(name))
    }

    fn gid_at(&self, layer: usize, col: u32, row: u32) -> u32 {
        self.tile_layer(layer).map_or(0, |l| l.gid_at(col, row))
    }

    fn properties_for_gid(&self, gid: u32) -> Option<&Properties> {
        let gid = clean_gid(gid);
        if gid == 0 {
            return None;
        }
        let tileset = self
            .tilesets
            .iter()
            .filter(|tileset| tileset.firstgid <= gid)
            .max_by_key(|tileset| tileset.firstgid)?;
        let local_id = gid - tileset.firstgid;
        tileset
            .tiles
            .iter()
            .find(|tile| tile.id == local_id)
            .map(|tile| &tile.properties)
    }

    fn position_at(&self, col: u32, row: u32) -> Vec2 {
        Vec2::new(
            col as f32 * self.tilewidth as f32,
            row as f32 * self.tileheight as f32,
        )
    }
}

/// Axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockRect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl BlockRect {
    pub fn center(&self) -> Vec2 {
        self.origin + self.size / 2.0
    }
}

/// Block grid of a tiled scene: number of blocks and the size of one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    pub blocks: UVec2,
    pub block_size: Vec2,
}

impl TileGrid {
    pub fn new(blocks: UVec2, block_size: Vec2) -> Self {
        Self { blocks, block_size }
    }

    /// Size of the whole grid in world units.
    pub fn total_size(&self) -> Vec2 {
        self.blocks.as_vec2() * self.block_size
    }

    /// Every cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + use<> {
        let blocks = self.blocks;
        (0..blocks.y).flat_map(move |row| (0..blocks.x).map(move |col| (col, row)))
    }
}
