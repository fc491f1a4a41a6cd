use glam::{Quat, Vec3};

use crate::config::MotionConfig;

/// Rigid-body state of the rocket. Owned by the frame loop and only mutated
/// through [`MotionIntegrator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation_current: Quat,
    pub orientation_target: Quat,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            orientation_current: Quat::IDENTITY,
            orientation_target: Quat::IDENTITY,
        }
    }
}

/// Per-frame velocity/position/orientation integrator.
///
/// There is no fixed timestep: one call to [`tick`](Self::tick) per displayed
/// frame, so speed scales with the frame rate.
#[derive(Debug, Clone)]
pub struct MotionIntegrator {
    pub max_speed: f32,
    pub damping: f32,
    pub turn_smoothing: f32,
}

impl MotionIntegrator {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            max_speed: config.max_speed,
            damping: config.damping,
            turn_smoothing: config.turn_smoothing,
        }
    }

    /// Advance `state` by one frame under the commanded acceleration.
    pub fn tick(&self, state: &mut MotionState, acceleration: Vec3) {
        state.orientation_current = state
            .orientation_current
            .slerp(state.orientation_target, self.turn_smoothing);

        state.velocity += acceleration;
        // y stays unclamped
        state.velocity.x = state.velocity.x.clamp(-self.max_speed, self.max_speed);
        state.velocity.z = state.velocity.z.clamp(-self.max_speed, self.max_speed);

        state.position += state.velocity;
        state.velocity *= self.damping;
    }

    /// Point the rocket's nose (local +Y) along `direction`.
    ///
    /// Zero-length directions are ignored and leave the target untouched.
    pub fn set_direction(&self, state: &mut MotionState, direction: Vec3) {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return;
        }
        state.orientation_target = Quat::from_rotation_arc(Vec3::Y, dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn integrator() -> MotionIntegrator {
        MotionIntegrator::new(&MotionConfig::default())
    }

    #[test]
    fn coasting_decays_monotonically() {
        let integ = integrator();
        let mut state = MotionState {
            velocity: Vec3::new(1.2, -3.0, 0.7),
            ..Default::default()
        };
        let mut last = state.velocity.length();
        for _ in 0..200 {
            integ.tick(&mut state, Vec3::ZERO);
            let now = state.velocity.length();
            assert!(now <= last, "speed grew from {last} to {now}");
            last = now;
        }
        assert!(last < 0.01);
    }

    #[rstest]
    #[case(Vec3::new(0.5, 0.0, 0.0))]
    #[case(Vec3::new(-0.5, 0.0, 0.5))]
    #[case(Vec3::new(3.0, 0.0, -3.0))]
    fn horizontal_speed_is_bounded(#[case] accel: Vec3) {
        let integ = integrator();
        let mut state = MotionState::default();
        for _ in 0..100 {
            integ.tick(&mut state, accel);
            assert!(state.velocity.x.abs() <= integ.max_speed);
            assert!(state.velocity.z.abs() <= integ.max_speed);
        }
    }

    #[test]
    fn horizontal_speed_stays_bounded_under_changing_input() {
        let integ = integrator();
        let mut state = MotionState::default();
        for i in 0..600 {
            let t = i as f32;
            // flips sign every few frames, with bursts well past max_speed
            let flip = if (i / 7) % 2 == 0 { 1.0 } else { -1.0 };
            let accel = Vec3::new(flip * (t * 0.37).sin() * 4.0, (t * 0.11).cos(), -flip * (t * 0.23).cos() * 2.5);
            integ.tick(&mut state, accel);
            assert!(state.velocity.x.abs() <= integ.max_speed, "x = {} at {i}", state.velocity.x);
            assert!(state.velocity.z.abs() <= integ.max_speed, "z = {} at {i}", state.velocity.z);
        }
    }

    #[test]
    fn vertical_speed_is_not_clamped() {
        let integ = MotionIntegrator {
            max_speed: 1.0,
            damping: 0.98,
            turn_smoothing: 0.4,
        };
        let mut state = MotionState::default();
        for _ in 0..500 {
            integ.tick(&mut state, Vec3::new(0.0, 0.5, 0.0));
        }
        assert!(state.velocity.y > integ.max_speed);
    }

    #[test]
    fn position_moves_by_clamped_velocity_before_damping() {
        let integ = integrator();
        let mut state = MotionState::default();
        integ.tick(&mut state, Vec3::new(0.0, 0.0, -0.025));
        assert_relative_eq!(state.position.z, -0.025);
        assert_relative_eq!(state.velocity.z, -0.025 * 0.96);
    }

    #[test]
    fn orientation_converges_without_overshoot() {
        let integ = integrator();
        let mut state = MotionState::default();
        integ.set_direction(&mut state, Vec3::new(0.0, 0.0, -1.0));

        let mut last = state.orientation_current.angle_between(state.orientation_target);
        assert!(last > 1.0);
        while last > 1e-2 {
            integ.tick(&mut state, Vec3::ZERO);
            let now = state.orientation_current.angle_between(state.orientation_target);
            assert!(now < last, "angle went from {last} to {now}");
            last = now;
        }
    }

    #[rstest]
    #[case(Vec3::new(0.0, 0.0, -1.0))]
    #[case(Vec3::new(1.0, 0.0, 0.0))]
    #[case(Vec3::new(-1.0, 0.0, 0.0))]
    #[case(Vec3::new(0.0, 0.0, 5.0))]
    fn heading_maps_up_onto_direction(#[case] dir: Vec3) {
        let integ = integrator();
        let mut state = MotionState::default();
        integ.set_direction(&mut state, dir);
        let nose = state.orientation_target * Vec3::Y;
        assert!(nose.abs_diff_eq(dir.normalize(), 1e-5), "{nose:?} vs {dir:?}");
    }

    #[test]
    fn zero_direction_keeps_target() {
        let integ = integrator();
        let mut state = MotionState::default();
        integ.set_direction(&mut state, Vec3::X);
        let before = state.orientation_target;
        integ.set_direction(&mut state, Vec3::ZERO);
        assert_eq!(state.orientation_target, before);
    }
}
