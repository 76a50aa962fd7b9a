//! Group tag component.
//!
//! A [`Group`] names the gameplay category of an entity ("tile", "harm",
//! "map_bounds"...). Observers and game logic filter on it.

use bevy_ecs::prelude::Component;

#[derive(Component, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Group(String);

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}
