//! Physics shape cache.
//!
//! Loads shape-definition files exported by the shape editor and keeps the
//! parsed [`BodyTemplate`]s keyed by name, so any number of
//! [`PhysicsBody`] instances can be created from them later.
//!
//! # File Format
//!
//! ```json
//! {
//!   "metadata": { "format": 1 },
//!   "bodies": {
//!     "crate": {
//!       "anchorpoint": "0.5,0.5",
//!       "is_dynamic": false, "affected_by_gravity": false, "allows_rotation": false,
//!       "linear_damping": 0.0, "angular_damping": 0.0,
//!       "velocity_limit": 1000.0, "angular_velocity_limit": 100.0,
//!       "fixtures": [{
//!         "density": 1.0, "restitution": 0.0, "friction": 0.5,
//!         "tag": 0, "group": 0,
//!         "category_mask": 1, "collision_mask": -1, "contact_test_mask": 0,
//!         "fixture_type": "POLYGON",
//!         "polygons": [["0,0", "32,0", "32,32", "0,32"]]
//!       }]
//!     }
//!   }
//! }
//! ```
//!
//! Coordinates are authored in design pixels and divided by the scale factor
//! when loaded. Unknown fields are ignored.
//!
//! Templates are grouped by the file they came from so a whole file can be
//! evicted at once with [`ShapeCache::unload`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec2;
use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use smallvec::SmallVec;

use crate::components::physicsbody::{PhysicsBody, PhysicsMaterial, PhysicsShape, PolygonVertices};

/// The only shape-definition format version understood.
pub const SUPPORTED_FORMAT: i64 = 1;

/// Errors raised while loading or evicting shape definitions.
#[derive(Debug, thiserror::Error)]
pub enum ShapeCacheError {
    /// The source was never loaded, cannot be read, or holds no data.
    #[error("shape source not found or empty: {0}")]
    NotFound(String),

    /// The source was already loaded into this cache.
    #[error("shape source already loaded: {0}")]
    DuplicateSource(String),

    /// `metadata.format` is not [`SUPPORTED_FORMAT`].
    #[error("unsupported shape format {found} in {file}")]
    UnsupportedFormat { file: String, found: i64 },

    /// A fixture declares a `fixture_type` other than POLYGON or CIRCLE.
    #[error("unsupported fixture type \"{kind}\" in body \"{body}\"")]
    UnsupportedFixtureKind { body: String, kind: String },

    /// A body name is already owned by another loaded source, or appears
    /// twice in the same one.
    #[error("body \"{name}\" in {file} is already defined by {existing}")]
    DuplicateBody {
        name: String,
        file: String,
        existing: String,
    },

    /// A required field is missing or has the wrong type.
    #[error("malformed shape source {file}: {reason}")]
    Malformed { file: String, reason: String },

    /// A point string is not of the form `x,y`.
    #[error("invalid point \"{0}\"")]
    InvalidPoint(String),

    /// Scale factors must be finite and positive.
    #[error("invalid scale factor {0}")]
    InvalidScale(f32),
}

/// Geometry of a fixture template, already in simulation units.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureKind {
    /// One or more convex polygons, each with at least three vertices.
    Polygon { polygons: Vec<PolygonVertices> },
    Circle { center: Vec2, radius: f32 },
}

/// One collision description of a [`BodyTemplate`].
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureTemplate {
    pub kind: FixtureKind,
    pub material: PhysicsMaterial,
    pub tag: i32,
    pub group: i32,
    pub category_mask: u32,
    pub collision_mask: u32,
    pub contact_test_mask: u32,
}

impl FixtureTemplate {
    fn configure(&self, mut shape: PhysicsShape) -> PhysicsShape {
        shape.set_group(self.group);
        shape.set_category_bitmask(self.category_mask);
        shape.set_collision_bitmask(self.collision_mask);
        shape.set_contact_test_bitmask(self.contact_test_mask);
        shape.set_tag(self.tag);
        shape
    }

    /// Attach the shapes described by this fixture to `body`.
    ///
    /// A circle yields one shape; a polygon fixture yields one shape per polygon.
    pub fn attach_to(&self, body: &mut PhysicsBody) {
        match &self.kind {
            FixtureKind::Circle { center, radius } => {
                let shape = PhysicsShape::circle(*radius, self.material, *center);
                body.add_shape(self.configure(shape));
            }
            FixtureKind::Polygon { polygons } => {
                for polygon in polygons {
                    let shape = PhysicsShape::polygon(polygon, self.material, Vec2::ZERO);
                    body.add_shape(self.configure(shape));
                }
            }
        }
    }
}

/// A named, reusable physics body archetype.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyTemplate {
    pub name: String,
    pub anchor_point: Vec2,
    pub is_dynamic: bool,
    pub affected_by_gravity: bool,
    pub allows_rotation: bool,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub velocity_limit: f32,
    pub angular_velocity_limit: f32,
    pub fixtures: Vec<FixtureTemplate>,
}

impl BodyTemplate {
    /// Build a new body configured from this template.
    pub fn instantiate(&self) -> PhysicsBody {
        let mut body = PhysicsBody::new();
        body.set_gravity_enable(self.affected_by_gravity);
        body.set_dynamic(self.is_dynamic);
        body.set_rotation_enable(self.allows_rotation);
        body.set_linear_damping(self.linear_damping);
        body.set_angular_damping(self.angular_damping);
        body.set_velocity_limit(self.velocity_limit);
        body.set_angular_velocity_limit(self.angular_velocity_limit);
        body.anchor_point = self.anchor_point;
        for fixture in &self.fixtures {
            fixture.attach_to(&mut body);
        }
        body
    }
}

#[derive(Deserialize)]
struct BodyEntry {
    anchorpoint: String,
    is_dynamic: bool,
    affected_by_gravity: bool,
    allows_rotation: bool,
    linear_damping: f32,
    angular_damping: f32,
    velocity_limit: f32,
    angular_velocity_limit: f32,
    fixtures: Vec<FixtureEntry>,
}

#[derive(Deserialize)]
struct ShapeDocument {
    bodies: BodyList,
}

/// Body entries in file order, duplicate names included.
struct BodyList(Vec<(String, BodyEntry)>);

impl<'de> Deserialize<'de> for BodyList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BodyListVisitor;

        impl<'de> Visitor<'de> for BodyListVisitor {
            type Value = BodyList;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of body names to bodies")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<BodyList, A::Error> {
                let mut bodies = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, BodyEntry>()? {
                    bodies.push(entry);
                }
                Ok(BodyList(bodies))
            }
        }

        deserializer.deserialize_map(BodyListVisitor)
    }
}

#[derive(Deserialize)]
struct FixtureEntry {
    density: f32,
    restitution: f32,
    friction: f32,
    tag: i32,
    group: i32,
    category_mask: i64,
    collision_mask: i64,
    contact_test_mask: i64,
    fixture_type: String,
    #[serde(default)]
    polygons: Option<Vec<Vec<String>>>,
    #[serde(default)]
    circle: Option<CircleEntry>,
}

#[derive(Deserialize)]
struct CircleEntry {
    radius: f32,
    position: String,
}

/// Parse a point written as `x,y`, optionally wrapped in braces (`{ x, y }`).
pub fn parse_point(text: &str) -> Result<Vec2, ShapeCacheError> {
    let invalid = || ShapeCacheError::InvalidPoint(text.to_string());
    let inner = text.trim().trim_start_matches('{').trim_end_matches('}');
    let mut parts = inner.split(',');
    let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let x = x.trim().parse::<f32>().map_err(|_| invalid())?;
    let y = y.trim().parse::<f32>().map_err(|_| invalid())?;
    Ok(Vec2::new(x, y))
}

// Editors may write the version as `1` or `1.0`.
fn format_version(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
}

// Bitmasks may be written signed (-1) or unsigned (4294967295); both mean all bits.
fn mask(value: i64) -> u32 {
    value as u32
}

fn build_fixture(
    file_id: &str,
    body_name: &str,
    entry: FixtureEntry,
    scale_factor: f32,
) -> Result<FixtureTemplate, ShapeCacheError> {
    let malformed = |reason: String| ShapeCacheError::Malformed {
        file: file_id.to_string(),
        reason,
    };

    let kind = match entry.fixture_type.as_str() {
        "POLYGON" => {
            let polygons = entry
                .polygons
                .ok_or_else(|| malformed(format!("body \"{}\": polygon fixture without polygons", body_name)))?;
            let mut scaled = Vec::with_capacity(polygons.len());
            for polygon in polygons {
                if polygon.len() < 3 {
                    return Err(malformed(format!(
                        "body \"{}\": polygon with {} vertices",
                        body_name,
                        polygon.len()
                    )));
                }
                let mut vertices: PolygonVertices = SmallVec::with_capacity(polygon.len());
                for point in &polygon {
                    vertices.push(parse_point(point)? / scale_factor);
                }
                scaled.push(vertices);
            }
            FixtureKind::Polygon { polygons: scaled }
        }
        "CIRCLE" => {
            let circle = entry
                .circle
                .ok_or_else(|| malformed(format!("body \"{}\": circle fixture without circle", body_name)))?;
            FixtureKind::Circle {
                center: parse_point(&circle.position)? / scale_factor,
                radius: circle.radius / scale_factor,
            }
        }
        other => {
            return Err(ShapeCacheError::UnsupportedFixtureKind {
                body: body_name.to_string(),
                kind: other.to_string(),
            });
        }
    };

    Ok(FixtureTemplate {
        kind,
        material: PhysicsMaterial::new(entry.density, entry.restitution, entry.friction),
        tag: entry.tag,
        group: entry.group,
        category_mask: mask(entry.category_mask),
        collision_mask: mask(entry.collision_mask),
        contact_test_mask: mask(entry.contact_test_mask),
    })
}

fn build_body(
    file_id: &str,
    name: String,
    entry: BodyEntry,
    scale_factor: f32,
) -> Result<BodyTemplate, ShapeCacheError> {
    let mut fixtures = Vec::with_capacity(entry.fixtures.len());
    for fixture in entry.fixtures {
        fixtures.push(build_fixture(file_id, &name, fixture, scale_factor)?);
    }
    Ok(BodyTemplate {
        anchor_point: parse_point(&entry.anchorpoint)?,
        is_dynamic: entry.is_dynamic,
        affected_by_gravity: entry.affected_by_gravity,
        allows_rotation: entry.allows_rotation,
        linear_damping: entry.linear_damping,
        angular_damping: entry.angular_damping,
        velocity_limit: entry.velocity_limit,
        angular_velocity_limit: entry.angular_velocity_limit,
        fixtures,
        name,
    })
}

/// Store of body templates loaded from shape-definition files.
#[derive(Debug)]
pub struct ShapeCache {
    base_dir: Option<PathBuf>,
    scale_factor: f32,
    bodies: FxHashMap<String, BodyTemplate>,
    files: FxHashMap<String, Vec<String>>,
}

impl Default for ShapeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeCache {
    /// Create an empty cache resolving files against the working directory,
    /// with a scale factor of 1.
    pub fn new() -> Self {
        Self {
            base_dir: None,
            scale_factor: 1.0,
            bodies: FxHashMap::default(),
            files: FxHashMap::default(),
        }
    }

    /// Resolve file ids relative to `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Set the scale factor used by [`ShapeCache::load_shapes`].
    pub fn with_scale_factor(mut self, scale_factor: f32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Default scale factor applied when loading.
    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    fn resolve(&self, file_id: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(file_id),
            None => Path::new(file_id).to_path_buf(),
        }
    }

    /// Load a shape file using the cache's default scale factor.
    pub fn load_shapes(&mut self, file_id: &str) -> Result<usize, ShapeCacheError> {
        self.load_shapes_with_scale(file_id, self.scale_factor)
    }

    /// Load a shape file, dividing every coordinate by `scale_factor`.
    ///
    /// Returns the number of bodies added.
    pub fn load_shapes_with_scale(&mut self, file_id: &str, scale_factor: f32) -> Result<usize, ShapeCacheError> {
        if self.files.contains_key(file_id) {
            return Err(ShapeCacheError::DuplicateSource(file_id.to_string()));
        }
        let path = self.resolve(file_id);
        let contents = fs::read_to_string(&path).map_err(|e| {
            warn!("Failed to read shape file {:?}: {}", path, e);
            ShapeCacheError::NotFound(file_id.to_string())
        })?;
        self.load_shapes_from_str(file_id, &contents, scale_factor)
    }

    /// Load shapes from in-memory contents registered under `file_id`.
    ///
    /// Either every body of the source is added or none is.
    pub fn load_shapes_from_str(
        &mut self,
        file_id: &str,
        contents: &str,
        scale_factor: f32,
    ) -> Result<usize, ShapeCacheError> {
        if self.files.contains_key(file_id) {
            return Err(ShapeCacheError::DuplicateSource(file_id.to_string()));
        }
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(ShapeCacheError::InvalidScale(scale_factor));
        }
        if contents.trim().is_empty() {
            return Err(ShapeCacheError::NotFound(file_id.to_string()));
        }

        // Text that is not JSON counts as an empty source.
        let Ok(document) = serde_json::from_str::<Value>(contents) else {
            warn!("Shape source {} is not valid JSON", file_id);
            return Err(ShapeCacheError::NotFound(file_id.to_string()));
        };
        if document.as_object().is_none_or(|root| root.is_empty()) {
            return Err(ShapeCacheError::NotFound(file_id.to_string()));
        }

        let format = document
            .get("metadata")
            .and_then(|metadata| metadata.get("format"))
            .and_then(format_version)
            .unwrap_or(0);
        if format != SUPPORTED_FORMAT {
            return Err(ShapeCacheError::UnsupportedFormat {
                file: file_id.to_string(),
                found: format,
            });
        }

        // Parsed again from the text: a `Value` map would merge repeated body names.
        let ShapeDocument { bodies: BodyList(entries) } =
            serde_json::from_str(contents).map_err(|e| ShapeCacheError::Malformed {
                file: file_id.to_string(),
                reason: e.to_string(),
            })?;

        let mut seen = FxHashSet::default();
        let mut parsed = Vec::with_capacity(entries.len());
        for (name, entry) in entries {
            if !seen.insert(name.clone()) {
                return Err(ShapeCacheError::DuplicateBody {
                    name,
                    file: file_id.to_string(),
                    existing: file_id.to_string(),
                });
            }
            if let Some(existing) = self.owner_of(&name) {
                return Err(ShapeCacheError::DuplicateBody {
                    name,
                    file: file_id.to_string(),
                    existing: existing.to_string(),
                });
            }
            let body = build_body(file_id, name, entry, scale_factor)?;
            debug!("Parsed body \"{}\" with {} fixtures", body.name, body.fixtures.len());
            parsed.push(body);
        }

        let count = parsed.len();
        let mut names = Vec::with_capacity(count);
        for body in parsed {
            names.push(body.name.clone());
            self.bodies.insert(body.name.clone(), body);
        }
        self.files.insert(file_id.to_string(), names);

        info!("Loaded {} bodies from {} (scale {})", count, file_id, scale_factor);
        Ok(count)
    }

    fn owner_of(&self, body_name: &str) -> Option<&str> {
        if !self.bodies.contains_key(body_name) {
            return None;
        }
        self.files
            .iter()
            .find(|(_, names)| names.iter().any(|n| n == body_name))
            .map(|(file, _)| file.as_str())
    }

    /// Find a template by name, retrying without the file extension
    /// (`"Foo.png"` falls back to `"Foo"`).
    pub fn lookup(&self, name: &str) -> Option<&BodyTemplate> {
        if let Some(body) = self.bodies.get(name) {
            return Some(body);
        }
        let (stem, _) = name.rsplit_once('.')?;
        self.bodies.get(stem)
    }

    /// Create a new body from the template named `name`.
    ///
    /// Returns `None` when no template matches; many tiles have no physics.
    pub fn create_body(&self, name: &str) -> Option<PhysicsBody> {
        let Some(template) = self.lookup(name) else {
            warn!("PhysicsBody with name \"{}\" not found", name);
            return None;
        };
        Some(template.instantiate())
    }

    /// Drop every template loaded from `file_id`.
    pub fn unload(&mut self, file_id: &str) -> Result<(), ShapeCacheError> {
        let names = self
            .files
            .remove(file_id)
            .ok_or_else(|| ShapeCacheError::NotFound(file_id.to_string()))?;
        for name in &names {
            self.bodies.remove(name);
        }
        info!("Unloaded {} bodies from {}", names.len(), file_id);
        Ok(())
    }

    /// Drop every template and every loaded file.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.files.clear();
    }

    /// Whether `file_id` is currently loaded.
    pub fn is_loaded(&self, file_id: &str) -> bool {
        self.files.contains_key(file_id)
    }

    /// Number of templates in the cache.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Names of all templates, sorted.
    pub fn body_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bodies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Loaded file ids, sorted.
    pub fn files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self.files.keys().map(String::as_str).collect();
        files.sort_unstable();
        files
    }
}
