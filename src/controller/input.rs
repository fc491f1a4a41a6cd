//! Platform-agnostic input handling: key table, input sources and arbitration

use glam::Vec3;

/// Platform-independent input events
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    // Window events
    FocusLost,
    VisibilityChanged { visible: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Keyboard,
    Gesture,
}

/// One input device's contribution: an acceleration vector plus whether it
/// currently participates in arbitration. Lives for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSource {
    pub acceleration: Vec3,
    pub active: bool,
}

impl InputSource {
    fn set_axis(&mut self, axis: Axis, value: f32) {
        self.acceleration[axis.index()] = value;
    }

    fn is_moving(&self) -> bool {
        self.active && self.acceleration != Vec3::ZERO
    }
}

/// Holds the keyboard and gesture sources and combines them into the one
/// acceleration the integrator consumes.
#[derive(Debug, Clone, Default)]
pub struct InputAggregator {
    keyboard: InputSource,
    gesture: InputSource,
}

impl InputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, kind: SourceKind) -> &InputSource {
        match kind {
            SourceKind::Keyboard => &self.keyboard,
            SourceKind::Gesture => &self.gesture,
        }
    }

    fn source_mut(&mut self, kind: SourceKind) -> &mut InputSource {
        match kind {
            SourceKind::Keyboard => &mut self.keyboard,
            SourceKind::Gesture => &mut self.gesture,
        }
    }

    pub fn set_keyboard_axis(&mut self, axis: Axis, value: f32) {
        self.keyboard.set_axis(axis, value);
    }

    pub fn set_gesture_axis(&mut self, axis: Axis, value: f32) {
        self.gesture.set_axis(axis, value);
    }

    pub fn set_source_active(&mut self, kind: SourceKind, active: bool) {
        self.source_mut(kind).active = active;
    }

    /// Arbitrated acceleration for this frame.
    ///
    /// With both sources active the gesture owns Z and the keyboard owns X/Y.
    /// Otherwise the single active source is used whole, or zero if none is.
    pub fn combined_acceleration(&self) -> Vec3 {
        match (self.keyboard.active, self.gesture.active) {
            (true, true) => Vec3::new(
                self.keyboard.acceleration.x,
                self.keyboard.acceleration.y,
                self.gesture.acceleration.z,
            ),
            (true, false) => self.keyboard.acceleration,
            (false, true) => self.gesture.acceleration,
            (false, false) => Vec3::ZERO,
        }
    }

    /// True while any source is commanding motion. Drives the thrust effect.
    pub fn thrust_commanded(&self) -> bool {
        self.keyboard.is_moving() || self.gesture.is_moving()
    }
}

/// Discrete commands the key table maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCommand {
    Forward,
    Backward,
    StrafeLeft,
    StrafeRight,
    Up,
    Down,
}

impl KeyCommand {
    pub fn axis(self) -> Axis {
        match self {
            KeyCommand::Forward | KeyCommand::Backward => Axis::Z,
            KeyCommand::StrafeLeft | KeyCommand::StrafeRight => Axis::X,
            KeyCommand::Up | KeyCommand::Down => Axis::Y,
        }
    }

    /// Sign of the acceleration on [`axis`](Self::axis). Forward is -Z.
    pub fn sign(self) -> f32 {
        match self {
            KeyCommand::Forward | KeyCommand::StrafeLeft | KeyCommand::Down => -1.0,
            KeyCommand::Backward | KeyCommand::StrafeRight | KeyCommand::Up => 1.0,
        }
    }

    /// New facing for the rocket, if this command turns it. Vertical thrust
    /// keeps the current heading.
    pub fn heading(self) -> Option<Vec3> {
        match self {
            KeyCommand::Forward => Some(Vec3::new(0.0, 0.0, -1.0)),
            KeyCommand::Backward => Some(Vec3::new(0.0, 0.0, 1.0)),
            KeyCommand::StrafeLeft => Some(Vec3::new(-1.0, 0.0, 0.0)),
            KeyCommand::StrafeRight => Some(Vec3::new(1.0, 0.0, 0.0)),
            KeyCommand::Up | KeyCommand::Down => None,
        }
    }
}

/// Key mapping configuration
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub forward: String,
    pub backward: String,
    pub left: String,
    pub right: String,
    pub up: String,
    pub down: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: "w".to_string(),
            backward: "s".to_string(),
            left: "a".to_string(),
            right: "d".to_string(),
            up: "ArrowUp".to_string(),
            down: "ArrowDown".to_string(),
        }
    }
}

impl KeyBindings {
    /// Letters match either case, named keys match exactly.
    pub fn command_for(&self, key: &str) -> Option<KeyCommand> {
        let is_bound = |binding: &str| {
            if binding.chars().count() == 1 {
                key.eq_ignore_ascii_case(binding)
            } else {
                key == binding
            }
        };
        [
            (&self.forward, KeyCommand::Forward),
            (&self.backward, KeyCommand::Backward),
            (&self.left, KeyCommand::StrafeLeft),
            (&self.right, KeyCommand::StrafeRight),
            (&self.up, KeyCommand::Up),
            (&self.down, KeyCommand::Down),
        ]
        .into_iter()
        .find(|(binding, _)| is_bound(binding.as_str()))
        .map(|(_, command)| command)
    }
}

/// Turns raw key events into keyboard-source updates
#[derive(Debug, Clone)]
pub struct InputProcessor {
    bindings: KeyBindings,
    move_speed: f32,
}

impl InputProcessor {
    pub fn new(bindings: KeyBindings, move_speed: f32) -> Self {
        Self {
            bindings,
            move_speed,
        }
    }

    pub fn with_move_speed(move_speed: f32) -> Self {
        Self::new(KeyBindings::default(), move_speed)
    }

    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    /// Apply a key press. Returns the command it mapped to, if any.
    pub fn key_down(&self, input: &mut InputAggregator, key: &str) -> Option<KeyCommand> {
        let command = self.bindings.command_for(key)?;
        input.set_keyboard_axis(command.axis(), command.sign() * self.move_speed);
        input.set_source_active(SourceKind::Keyboard, true);
        Some(command)
    }

    /// Apply a key release. The released key's axis stops; the keyboard stays
    /// active while any of its axes is still held.
    pub fn key_up(&self, input: &mut InputAggregator, key: &str) -> Option<KeyCommand> {
        let command = self.bindings.command_for(key)?;
        input.set_keyboard_axis(command.axis(), 0.0);
        let still_held = input.source(SourceKind::Keyboard).acceleration != Vec3::ZERO;
        input.set_source_active(SourceKind::Keyboard, still_held);
        Some(command)
    }

    /// Drop every held key, e.g. when the window loses focus.
    pub fn release_all(&self, input: &mut InputAggregator) {
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            input.set_keyboard_axis(axis, 0.0);
        }
        input.set_source_active(SourceKind::Keyboard, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn gesture_owns_z_when_both_active() {
        let mut input = InputAggregator::new();
        input.set_keyboard_axis(Axis::X, 1.0);
        input.set_keyboard_axis(Axis::Z, 1.0);
        input.set_gesture_axis(Axis::Z, -1.0);
        input.set_source_active(SourceKind::Keyboard, true);
        input.set_source_active(SourceKind::Gesture, true);
        assert_eq!(input.combined_acceleration(), Vec3::new(1.0, 0.0, -1.0));
    }

    #[test]
    fn gesture_xy_is_ignored_when_keyboard_active() {
        let mut input = InputAggregator::new();
        input.set_gesture_axis(Axis::X, 5.0);
        input.set_gesture_axis(Axis::Y, 5.0);
        input.set_keyboard_axis(Axis::Y, 0.5);
        input.set_source_active(SourceKind::Keyboard, true);
        input.set_source_active(SourceKind::Gesture, true);
        assert_eq!(input.combined_acceleration(), Vec3::new(0.0, 0.5, 0.0));
    }

    #[rstest]
    #[case(true, false, Vec3::new(1.0, 2.0, 3.0))]
    #[case(false, true, Vec3::new(-1.0, -2.0, -3.0))]
    #[case(false, false, Vec3::ZERO)]
    fn single_source_passes_whole_vector(
        #[case] keyboard: bool,
        #[case] gesture: bool,
        #[case] expected: Vec3,
    ) {
        let mut input = InputAggregator::new();
        input.set_keyboard_axis(Axis::X, 1.0);
        input.set_keyboard_axis(Axis::Y, 2.0);
        input.set_keyboard_axis(Axis::Z, 3.0);
        input.set_gesture_axis(Axis::X, -1.0);
        input.set_gesture_axis(Axis::Y, -2.0);
        input.set_gesture_axis(Axis::Z, -3.0);
        input.set_source_active(SourceKind::Keyboard, keyboard);
        input.set_source_active(SourceKind::Gesture, gesture);
        assert_eq!(input.combined_acceleration(), expected);
    }

    #[rstest]
    #[case("w", KeyCommand::Forward, Vec3::new(0.0, 0.0, -0.025))]
    #[case("W", KeyCommand::Forward, Vec3::new(0.0, 0.0, -0.025))]
    #[case("s", KeyCommand::Backward, Vec3::new(0.0, 0.0, 0.025))]
    #[case("A", KeyCommand::StrafeLeft, Vec3::new(-0.025, 0.0, 0.0))]
    #[case("d", KeyCommand::StrafeRight, Vec3::new(0.025, 0.0, 0.0))]
    #[case("ArrowUp", KeyCommand::Up, Vec3::new(0.0, 0.025, 0.0))]
    #[case("ArrowDown", KeyCommand::Down, Vec3::new(0.0, -0.025, 0.0))]
    fn key_table(#[case] key: &str, #[case] command: KeyCommand, #[case] accel: Vec3) {
        let processor = InputProcessor::with_move_speed(0.025);
        let mut input = InputAggregator::new();
        assert_eq!(processor.key_down(&mut input, key), Some(command));
        assert_eq!(input.combined_acceleration(), accel);
        assert!(input.thrust_commanded());
    }

    #[test]
    fn unmapped_keys_do_nothing() {
        let processor = InputProcessor::with_move_speed(0.025);
        let mut input = InputAggregator::new();
        assert_eq!(processor.key_down(&mut input, "q"), None);
        assert_eq!(processor.key_down(&mut input, "arrowup"), None);
        assert!(!input.source(SourceKind::Keyboard).active);
    }

    #[test]
    fn keyboard_stays_active_while_another_axis_is_held() {
        let processor = InputProcessor::with_move_speed(0.025);
        let mut input = InputAggregator::new();
        processor.key_down(&mut input, "w");
        processor.key_down(&mut input, "d");
        processor.key_up(&mut input, "w");
        assert!(input.source(SourceKind::Keyboard).active);
        assert_eq!(input.combined_acceleration(), Vec3::new(0.025, 0.0, 0.0));
        processor.key_up(&mut input, "d");
        assert!(!input.source(SourceKind::Keyboard).active);
        assert!(!input.thrust_commanded());
    }

    #[test]
    fn release_all_clears_keyboard() {
        let processor = InputProcessor::with_move_speed(0.025);
        let mut input = InputAggregator::new();
        processor.key_down(&mut input, "w");
        processor.key_down(&mut input, "ArrowUp");
        processor.release_all(&mut input);
        assert_eq!(input.combined_acceleration(), Vec3::ZERO);
        assert!(!input.thrust_commanded());
    }

    #[test]
    fn headings_follow_the_key() {
        assert_eq!(KeyCommand::Forward.heading(), Some(Vec3::NEG_Z));
        assert_eq!(KeyCommand::StrafeRight.heading(), Some(Vec3::X));
        assert_eq!(KeyCommand::Up.heading(), None);
    }
}
