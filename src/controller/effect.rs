use std::f32::consts::PI;

use glam::{Quat, Vec3};

use crate::config::EffectConfig;
use crate::view::scene_graph::{LoopedSound, SceneNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectPhase {
    #[default]
    Idle,
    Active,
}

/// Two-state machine behind the thruster flame and its looped sound.
///
/// `active` is the OR over every input source, so one source letting go while
/// another still thrusts keeps the effect running.
#[derive(Debug, Clone, Default)]
pub struct EffectTrigger {
    phase: EffectPhase,
}

impl EffectTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> EffectPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == EffectPhase::Active
    }

    /// Feed the combined thrust state. Acts only on edges; returns the new
    /// phase when one happened.
    pub fn on_forward_command_changed<N, S>(
        &mut self,
        active: bool,
        fire: Option<&N>,
        sound: Option<&S>,
    ) -> Option<EffectPhase>
    where
        N: SceneNode,
        S: LoopedSound,
    {
        match (self.phase, active) {
            (EffectPhase::Idle, true) => {
                if let Some(fire) = fire {
                    fire.set_visible(true);
                }
                if let Some(sound) = sound.filter(|s| !s.is_playing()) {
                    sound.play();
                }
                self.phase = EffectPhase::Active;
                tracing::debug!("thrust effect on");
                Some(self.phase)
            }
            (EffectPhase::Active, false) => {
                if let Some(fire) = fire {
                    fire.set_visible(false);
                }
                if let Some(sound) = sound.filter(|s| s.is_playing()) {
                    sound.stop();
                }
                self.phase = EffectPhase::Idle;
                tracing::debug!("thrust effect off");
                Some(self.phase)
            }
            _ => None,
        }
    }
}

/// Flicker and spin of the flame mesh.
#[derive(Debug, Clone)]
pub struct FlameAnimator {
    min_scale: f32,
    max_scale: f32,
    rate: f32,
    spin_per_frame: f32,
    spin: f32,
}

impl FlameAnimator {
    pub fn new(config: &EffectConfig) -> Self {
        Self {
            min_scale: config.flicker_min_scale,
            max_scale: config.flicker_max_scale,
            rate: config.flicker_rate,
            spin_per_frame: config.spin_per_frame,
            spin: 0.0,
        }
    }

    /// Flame scale at `elapsed` seconds; stretched along the plume axes.
    pub fn scale_at(&self, elapsed: f32) -> Vec3 {
        let wave = 0.5 * (elapsed * self.rate).sin() + 0.5;
        let s = self.min_scale + (self.max_scale - self.min_scale) * wave;
        Vec3::new(s, s * 2.0, s * 2.0)
    }

    /// Flipped to point out of the engine, then spun about its own axis.
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_x(PI) * Quat::from_rotation_y(self.spin)
    }

    pub fn animate<N: SceneNode>(&mut self, fire: &N, elapsed: f32) {
        self.spin = (self.spin + self.spin_per_frame) % std::f32::consts::TAU;
        fire.set_scale(self.scale_at(elapsed));
        fire.set_rotation(self.rotation());
    }
}
