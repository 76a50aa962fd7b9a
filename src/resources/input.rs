//! Per-frame input resource.
//!
//! Platform code reports raw button changes from the keyboard, the gamepad
//! buttons and the gamepad's left stick. [`InputController::update`] is then
//! called once per frame to merge the sources and compute edges, so
//! `just_pressed` is true for exactly one frame per press no matter how many
//! systems read it.
use bevy_ecs::prelude::*;

/// Stick deflection beyond which the axis counts as a pressed direction.
pub const AXIS_THRESHOLD: f32 = 0.5;

/// Logical actions the game reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    Left,
    Right,
    Up,
    Down,
    ButtonA,
    ButtonB,
    Start,
    Back,
}

impl InputAction {
    pub const ALL: [InputAction; 8] = [
        InputAction::Left,
        InputAction::Right,
        InputAction::Up,
        InputAction::Down,
        InputAction::ButtonA,
        InputAction::ButtonB,
        InputAction::Start,
        InputAction::Back,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Physical origin of a raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Keyboard,
    Controller,
    /// Left stick, only for directions.
    Axis,
}

impl InputSource {
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Merged state of one action.
pub struct BoolState {
    /// Whether the action is held this frame.
    pub active: bool,
    /// Whether the action went down this frame.
    pub just_pressed: bool,
    /// Whether the action went up this frame.
    pub just_released: bool,
}

/// Resource holding raw source states and the merged per-action state.
#[derive(Resource, Debug, Clone, Default)]
pub struct InputController {
    raw: [[bool; 3]; InputAction::ALL.len()],
    states: [BoolState; InputAction::ALL.len()],
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw press or release from one source.
    pub fn set_raw(&mut self, source: InputSource, action: InputAction, down: bool) {
        self.raw[action.index()][source.index()] = down;
    }

    /// Record left-stick deflection. Positive `y` is up.
    pub fn set_axis(&mut self, x: f32, y: f32) {
        let (left, right) = if x.abs() > AXIS_THRESHOLD {
            (x < 0.0, x > 0.0)
        } else {
            (false, false)
        };
        let (up, down) = if y.abs() > AXIS_THRESHOLD {
            (y > 0.0, y < 0.0)
        } else {
            (false, false)
        };
        self.set_raw(InputSource::Axis, InputAction::Left, left);
        self.set_raw(InputSource::Axis, InputAction::Right, right);
        self.set_raw(InputSource::Axis, InputAction::Up, up);
        self.set_raw(InputSource::Axis, InputAction::Down, down);
    }

    /// Merge sources and compute edges. Call once per frame.
    pub fn update(&mut self) {
        for action in InputAction::ALL {
            let i = action.index();
            let active = self.raw[i].iter().any(|down| *down);
            let previous = self.states[i].active;
            self.states[i] = BoolState {
                active,
                just_pressed: active && !previous,
                just_released: !active && previous,
            };
        }
    }

    pub fn state(&self, action: InputAction) -> BoolState {
        self.states[action.index()]
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.state(action).active
    }

    pub fn just_pressed(&self, action: InputAction) -> bool {
        self.state(action).just_pressed
    }

    pub fn just_released(&self, action: InputAction) -> bool {
        self.state(action).just_released
    }
}

/// Frame system advancing the [`InputController`] edges.
pub fn update_input_controller(mut input: ResMut<InputController>) {
    input.update();
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::system::RunSystemOnce;

    #[test]
    fn test_just_pressed_lasts_one_frame() {
        let mut input = InputController::new();
        input.set_raw(InputSource::Keyboard, InputAction::ButtonA, true);
        input.update();
        assert!(input.is_down(InputAction::ButtonA));
        assert!(input.just_pressed(InputAction::ButtonA));
        // reading twice in the same frame gives the same answer
        assert!(input.just_pressed(InputAction::ButtonA));

        input.update();
        assert!(input.is_down(InputAction::ButtonA));
        assert!(!input.just_pressed(InputAction::ButtonA));
    }

    #[test]
    fn test_release_edge() {
        let mut input = InputController::new();
        input.set_raw(InputSource::Controller, InputAction::Start, true);
        input.update();
        input.set_raw(InputSource::Controller, InputAction::Start, false);
        input.update();
        assert!(!input.is_down(InputAction::Start));
        assert!(input.just_released(InputAction::Start));
        input.update();
        assert!(!input.just_released(InputAction::Start));
    }

    #[test]
    fn test_sources_are_merged() {
        let mut input = InputController::new();
        input.set_raw(InputSource::Keyboard, InputAction::Left, true);
        input.set_axis(-0.9, 0.0);
        input.update();
        input.set_raw(InputSource::Keyboard, InputAction::Left, false);
        input.update();
        // stick still held
        assert!(input.is_down(InputAction::Left));
        assert!(!input.just_released(InputAction::Left));
    }

    #[test]
    fn test_axis_dead_zone() {
        let mut input = InputController::new();
        input.set_axis(0.3, 0.8);
        input.update();
        assert!(!input.is_down(InputAction::Left));
        assert!(!input.is_down(InputAction::Right));
        assert!(input.is_down(InputAction::Up));
        assert!(!input.is_down(InputAction::Down));
    }

    #[test]
    fn test_update_system() {
        let mut world = World::new();
        world.insert_resource(InputController::new());
        world
            .resource_mut::<InputController>()
            .set_raw(InputSource::Keyboard, InputAction::Back, true);
        world.run_system_once(update_input_controller).unwrap();
        assert!(world.resource::<InputController>().just_pressed(InputAction::Back));
    }
}
