//! Physics body component and its collision shapes.
//!
//! [`PhysicsBody`] is the configuration the external physics solver consumes:
//! body flags, damping, velocity limits and the list of [`PhysicsShape`]s
//! attached to it. Nothing here integrates motion; the solver reads these
//! values when it adopts the entity.
//!
//! Bodies are normally produced by
//! [`ShapeCache::create_body`](crate::resources::shapecache::ShapeCache::create_body)
//! from a named template, but can be assembled by hand with the same
//! primitives:
//!
//! ```ignore
//! let mut body = PhysicsBody::new();
//! body.set_dynamic(false);
//! body.add_shape(PhysicsShape::circle(8.0, PhysicsMaterial::default(), Vec2::ZERO));
//! ```

use bevy_ecs::prelude::Component;
use glam::Vec2;
use smallvec::SmallVec;

/// Vertex list of a single convex polygon.
pub type PolygonVertices = SmallVec<[Vec2; 8]>;

/// Surface material of a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsMaterial {
    pub density: f32,
    pub restitution: f32,
    pub friction: f32,
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            density: 0.1,
            restitution: 0.5,
            friction: 0.5,
        }
    }
}

impl PhysicsMaterial {
    pub fn new(density: f32, restitution: f32, friction: f32) -> Self {
        Self {
            density,
            restitution,
            friction,
        }
    }
}

/// Geometry of a shape, relative to the body's position.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeGeometry {
    Circle {
        radius: f32,
        offset: Vec2,
    },
    Polygon {
        vertices: PolygonVertices,
        offset: Vec2,
    },
    /// Hollow rectangle centered on the body, used for map boundaries.
    EdgeBox {
        size: Vec2,
        border: f32,
    },
}

/// A collision shape attached to a [`PhysicsBody`].
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsShape {
    pub geometry: ShapeGeometry,
    pub material: PhysicsMaterial,
    pub tag: i32,
    pub group: i32,
    pub category_bitmask: u32,
    pub collision_bitmask: u32,
    pub contact_test_bitmask: u32,
}

impl PhysicsShape {
    fn with_geometry(geometry: ShapeGeometry, material: PhysicsMaterial) -> Self {
        Self {
            geometry,
            material,
            tag: 0,
            group: 0,
            category_bitmask: u32::MAX,
            collision_bitmask: u32::MAX,
            contact_test_bitmask: 0,
        }
    }

    /// Create a circle shape of `radius` centered at `offset`.
    pub fn circle(radius: f32, material: PhysicsMaterial, offset: Vec2) -> Self {
        Self::with_geometry(ShapeGeometry::Circle { radius, offset }, material)
    }

    /// Create a polygon shape from its vertices.
    pub fn polygon(vertices: &[Vec2], material: PhysicsMaterial, offset: Vec2) -> Self {
        Self::with_geometry(
            ShapeGeometry::Polygon {
                vertices: SmallVec::from_slice(vertices),
                offset,
            },
            material,
        )
    }

    /// Create a hollow box of `size` with walls `border` units thick.
    pub fn edge_box(size: Vec2, material: PhysicsMaterial, border: f32) -> Self {
        Self::with_geometry(ShapeGeometry::EdgeBox { size, border }, material)
    }

    pub fn set_tag(&mut self, tag: i32) {
        self.tag = tag;
    }

    pub fn set_group(&mut self, group: i32) {
        self.group = group;
    }

    pub fn set_category_bitmask(&mut self, mask: u32) {
        self.category_bitmask = mask;
    }

    pub fn set_collision_bitmask(&mut self, mask: u32) {
        self.collision_bitmask = mask;
    }

    pub fn set_contact_test_bitmask(&mut self, mask: u32) {
        self.contact_test_bitmask = mask;
    }

    /// Short name of the geometry kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.geometry {
            ShapeGeometry::Circle { .. } => "circle",
            ShapeGeometry::Polygon { .. } => "polygon",
            ShapeGeometry::EdgeBox { .. } => "edge_box",
        }
    }
}

/// Physics body configuration attached to an entity.
///
/// # Fields
/// - `dynamic` - Moved by the solver when true, static otherwise
/// - `gravity_enabled` - Whether world gravity applies
/// - `rotation_enabled` - Whether the solver may rotate the body
/// - `linear_damping` / `angular_damping` - Velocity decay factors
/// - `velocity_limit` / `angular_velocity_limit` - Speed clamps
/// - `anchor_point` - Normalized pivot of the sprite the body was authored for
/// - `shapes` - Collision shapes, in template order
#[derive(Component, Clone, Debug, PartialEq)]
pub struct PhysicsBody {
    pub dynamic: bool,
    pub gravity_enabled: bool,
    pub rotation_enabled: bool,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub velocity_limit: f32,
    pub angular_velocity_limit: f32,
    pub anchor_point: Vec2,
    pub shapes: Vec<PhysicsShape>,
}

impl Default for PhysicsBody {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsBody {
    /// Create a dynamic, gravity-affected body with no shapes and no limits.
    pub fn new() -> Self {
        Self {
            dynamic: true,
            gravity_enabled: true,
            rotation_enabled: true,
            linear_damping: 0.0,
            angular_damping: 0.0,
            velocity_limit: f32::INFINITY,
            angular_velocity_limit: f32::INFINITY,
            anchor_point: Vec2::new(0.5, 0.5),
            shapes: Vec::new(),
        }
    }

    /// Create a static body enclosing an area of `size` with hollow walls.
    pub fn edge_box(size: Vec2, material: PhysicsMaterial, border: f32) -> Self {
        let mut body = Self::new();
        body.set_dynamic(false);
        body.set_gravity_enable(false);
        body.add_shape(PhysicsShape::edge_box(size, material, border));
        body
    }

    pub fn set_dynamic(&mut self, dynamic: bool) {
        self.dynamic = dynamic;
    }

    pub fn set_gravity_enable(&mut self, enabled: bool) {
        self.gravity_enabled = enabled;
    }

    pub fn set_rotation_enable(&mut self, enabled: bool) {
        self.rotation_enabled = enabled;
    }

    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping;
    }

    pub fn set_angular_damping(&mut self, damping: f32) {
        self.angular_damping = damping;
    }

    pub fn set_velocity_limit(&mut self, limit: f32) {
        self.velocity_limit = limit;
    }

    pub fn set_angular_velocity_limit(&mut self, limit: f32) {
        self.angular_velocity_limit = limit;
    }

    /// Attach a shape to the body.
    pub fn add_shape(&mut self, shape: PhysicsShape) {
        self.shapes.push(shape);
    }

    /// Number of attached shapes.
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// First shape carrying `tag`, if any.
    pub fn shape_by_tag(&self, tag: i32) -> Option<&PhysicsShape> {
        self.shapes.iter().find(|shape| shape.tag == tag)
    }
}
