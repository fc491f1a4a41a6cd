//! Tunable constants for the flight controller.
//!
//! Every value that used to be hardcoded per scene lives here. Missing fields
//! in a JSON file fall back to the defaults below.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub motion: MotionConfig,
    pub camera: CameraConfig,
    pub markers: MarkerConfig,
    pub gesture: GestureConfig,
    pub effect: EffectConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Acceleration added per frame while an axis is held.
    pub move_speed: f32,
    /// Bound for |velocity.x| and |velocity.z|. Vertical velocity is not bounded.
    pub max_speed: f32,
    /// Per-frame velocity multiplier, in (0, 1).
    pub damping: f32,
    /// Slerp factor toward the target heading, in (0, 1].
    pub turn_smoothing: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            move_speed: 0.025,
            max_speed: 1.5,
            damping: 0.96,
            turn_smoothing: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Position follows the offset, orientation is left alone.
    OffsetFollow,
    /// Position follows the offset and the camera looks at the rocket.
    OffsetFollowLookAt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// World-space offset from the rocket the camera drifts toward.
    pub offset: Vec3,
    /// Lerp factor per frame, in (0, 1).
    pub follow_factor: f32,
    pub mode: CameraMode,
    /// Add the rocket velocity to the camera before smoothing.
    pub inherit_velocity: bool,
    pub initial_position: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            offset: Vec3::new(4.0, 4.0, 10.0),
            follow_factor: 0.02,
            mode: CameraMode::OffsetFollow,
            inherit_velocity: false,
            initial_position: Vec3::new(0.0, 0.0, 25.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub min_distance: f32,
    pub max_distance: f32,
    pub initial_opacity: f32,
    pub max_opacity: f32,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            min_distance: 10.0,
            max_distance: 50.0,
            initial_opacity: 0.01,
            max_opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Mean fingertip-to-wrist distance (normalized landmark space) below
    /// which the hand counts as clenched.
    pub clench_threshold: f32,
    /// Only every n-th processed video frame is classified.
    pub throttle: u32,
    pub initial_delay_ms: u32,
    pub retry_delay_ms: u32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            clench_threshold: 0.25,
            throttle: 3,
            initial_delay_ms: 500,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    pub flicker_min_scale: f32,
    pub flicker_max_scale: f32,
    /// Angular frequency of the flicker, radians per second.
    pub flicker_rate: f32,
    /// Y rotation added to the flame every frame, radians.
    pub spin_per_frame: f32,
    pub sound_volume: f32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            flicker_min_scale: 0.20,
            flicker_max_scale: 0.23,
            flicker_rate: 10.0,
            spin_per_frame: 0.25,
            sound_volume: 0.4,
        }
    }
}

impl FlightConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.motion;
        if !(m.max_speed > 0.0) {
            return Err(ConfigError::invalid("motion.max_speed", "must be positive"));
        }
        if !(m.damping > 0.0 && m.damping < 1.0) {
            return Err(ConfigError::invalid("motion.damping", "must lie in (0, 1)"));
        }
        if !(m.turn_smoothing > 0.0 && m.turn_smoothing <= 1.0) {
            return Err(ConfigError::invalid("motion.turn_smoothing", "must lie in (0, 1]"));
        }

        let c = &self.camera;
        if !(c.follow_factor > 0.0 && c.follow_factor < 1.0) {
            return Err(ConfigError::invalid("camera.follow_factor", "must lie in (0, 1)"));
        }

        let k = &self.markers;
        if !(k.min_distance >= 0.0 && k.min_distance < k.max_distance) {
            return Err(ConfigError::invalid(
                "markers.min_distance",
                format!("must be non-negative and below max_distance ({})", k.max_distance),
            ));
        }

        if self.gesture.throttle == 0 {
            return Err(ConfigError::invalid("gesture.throttle", "must be at least 1"));
        }
        if !(self.gesture.clench_threshold > 0.0) {
            return Err(ConfigError::invalid("gesture.clench_threshold", "must be positive"));
        }

        let e = &self.effect;
        if e.flicker_min_scale > e.flicker_max_scale {
            return Err(ConfigError::invalid(
                "effect.flicker_min_scale",
                "must not exceed flicker_max_scale",
            ));
        }
        Ok(())
    }
}
