use bevy_ecs::prelude::Component;

/// Damage dealt on contact, taken from a tile's `damage` property.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Harm {
    pub damage: f32,
}
