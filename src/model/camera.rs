use glam::Vec3;

use crate::config::{CameraConfig, CameraMode};

/// Where the chase camera currently is. Owned by the frame loop, never by the
/// motion integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    /// Set only in [`CameraMode::OffsetFollowLookAt`].
    pub look_at: Option<Vec3>,
}

impl CameraState {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            look_at: None,
        }
    }
}

/// Exponentially smoothed follow camera.
///
/// Each frame the camera moves `follow_factor` of the way toward
/// `target + offset`. A plain lerp with a factor below one never overshoots.
#[derive(Debug, Clone)]
pub struct ChaseCamera {
    pub offset: Vec3,
    pub follow_factor: f32,
    pub mode: CameraMode,
    pub inherit_velocity: bool,
}

impl ChaseCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            offset: config.offset,
            follow_factor: config.follow_factor,
            mode: config.mode,
            inherit_velocity: config.inherit_velocity,
        }
    }

    pub fn ideal_position(&self, target: Vec3) -> Vec3 {
        target + self.offset
    }

    /// Move `camera` one step toward the follow position of `target`.
    ///
    /// `target_velocity` is only used when `inherit_velocity` is set.
    pub fn update(&self, camera: &mut CameraState, target: Vec3, target_velocity: Vec3) {
        if self.inherit_velocity {
            camera.position += target_velocity;
        }
        camera.position = camera
            .position
            .lerp(self.ideal_position(target), self.follow_factor);

        camera.look_at = match self.mode {
            CameraMode::OffsetFollow => None,
            CameraMode::OffsetFollowLookAt => Some(target),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chase(mode: CameraMode) -> ChaseCamera {
        ChaseCamera::new(&CameraConfig {
            mode,
            ..Default::default()
        })
    }

    #[test]
    fn approaches_offset_without_overshoot() {
        let cam = chase(CameraMode::OffsetFollow);
        let mut state = CameraState::new(Vec3::new(0.0, 0.0, 25.0));
        let target = Vec3::new(0.0, 0.0, -100.0);
        let goal = cam.ideal_position(target);

        let mut last = state.position.distance(goal);
        for _ in 0..500 {
            cam.update(&mut state, target, Vec3::ZERO);
            let now = state.position.distance(goal);
            assert!(now < last);
            // still on the starting side of the goal
            assert!(state.position.z > goal.z);
            last = now;
        }
    }

    #[test]
    fn single_step_is_a_lerp() {
        let cam = chase(CameraMode::OffsetFollow);
        let mut state = CameraState::new(Vec3::ZERO);
        cam.update(&mut state, Vec3::ZERO, Vec3::ZERO);
        assert!(state
            .position
            .abs_diff_eq(Vec3::new(4.0, 4.0, 10.0) * 0.02, 1e-6));
        assert_eq!(state.look_at, None);
    }

    #[test]
    fn look_at_mode_tracks_target() {
        let cam = chase(CameraMode::OffsetFollowLookAt);
        let mut state = CameraState::new(Vec3::ZERO);
        let target = Vec3::new(1.0, 2.0, 3.0);
        cam.update(&mut state, target, Vec3::ZERO);
        assert_eq!(state.look_at, Some(target));
    }

    #[test]
    fn inherited_velocity_is_added_before_smoothing() {
        let mut cam = chase(CameraMode::OffsetFollow);
        cam.inherit_velocity = true;
        let mut state = CameraState::new(cam.ideal_position(Vec3::ZERO));
        let velocity = Vec3::new(0.0, 0.0, -1.0);
        cam.update(&mut state, Vec3::ZERO, velocity);
        // pulled back toward the goal by 2% of the unit displacement
        assert!((state.position.z - (10.0 - 0.98)).abs() < 1e-5);
    }
}
