//! Tiled physics scene events.
//!
//! [`PhysicsMapBoundEvent`] is triggered once a physics tiled scene has bound
//! its map. Gameplay observers use it to decorate the freshly spawned tile
//! placeholders, e.g. [`observe_harmful_tiles`] turns tiles with a `damage`
//! property into hazards.
//!
//! ```ignore
//! world.add_observer(observe_harmful_tiles);
//! let scene = spawn_physics_tiled_scene(&mut world, "level_01.json", &config)?;
//! ```
use bevy_ecs::observer::On;
use bevy_ecs::prelude::*;
use log::{debug, info};

use crate::components::group::Group;
use crate::components::harm::Harm;
use crate::components::signals::Signals;
use crate::components::tileplaceholder::{TileLayer, TilePlaceholder};

/// Tile property holding contact damage.
pub const DAMAGE_SIGNAL: &str = "damage";
/// Group given to tiles that deal damage.
pub const HARM_GROUP: &str = "harm";

/// Event fired after a map has been bound to physics.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicsMapBoundEvent {
    /// The scene root entity.
    pub scene: Entity,
    pub layers: usize,
    pub placeholders: usize,
    pub shapes: usize,
}

fn damage_of(signals: &Signals) -> Option<f32> {
    signals
        .get_scalar(DAMAGE_SIGNAL)
        .or_else(|| signals.get_integer(DAMAGE_SIGNAL).map(|v| v as f32))
        .filter(|damage| *damage > 0.0)
}

/// Observer marking the bound scene's damaging tiles with [`Harm`] and the
/// `"harm"` [`Group`].
pub fn observe_harmful_tiles(
    trigger: On<PhysicsMapBoundEvent>,
    mut commands: Commands,
    placeholders: Query<(Entity, &Signals, &ChildOf), With<TilePlaceholder>>,
    layers: Query<&ChildOf, With<TileLayer>>,
) {
    let scene = trigger.event().scene;
    let mut harmful = 0;
    for (entity, signals, parent) in placeholders.iter() {
        let in_scene = layers
            .get(parent.parent())
            .map(|layer_parent| layer_parent.parent() == scene)
            .unwrap_or(false);
        if !in_scene {
            continue;
        }
        if let Some(damage) = damage_of(signals) {
            commands
                .entity(entity)
                .insert((Harm { damage }, Group::new(HARM_GROUP)));
            harmful += 1;
        }
    }
    debug!("Marked {} harmful tiles in scene {:?}", harmful, scene);
}

/// Observer logging a summary of every bound map.
pub fn observe_log_map_bound(trigger: On<PhysicsMapBoundEvent>) {
    let event = trigger.event();
    info!(
        "Physics map bound on {:?}: {} layers, {} placeholders, {} shapes",
        event.scene, event.layers, event.placeholders, event.shapes
    );
}
