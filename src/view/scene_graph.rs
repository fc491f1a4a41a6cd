//! Seams to the rendering collaborator.
//!
//! The flight controller never draws anything itself. It pushes transforms,
//! visibility and opacity into whatever scene graph sits behind these traits
//! (three.js on the web, an in-memory graph natively and in tests).

use glam::{Quat, Vec3};

use crate::hud::Hud;

/// A positioned object in the scene graph. Handles are shared, so setters
/// take `&self`.
pub trait SceneNode {
    fn set_position(&self, position: Vec3);
    fn set_rotation(&self, rotation: Quat);
    fn set_scale(&self, scale: Vec3);
    fn set_visible(&self, visible: bool);
    /// Parent `child` to this node so it inherits the transform.
    fn add_child(&self, child: &Self);
}

pub trait CameraRig {
    fn set_position(&self, position: Vec3);
    fn look_at(&self, target: Vec3);
}

/// Visual part of a milestone marker.
pub trait MarkerVisual {
    fn set_opacity(&self, opacity: f32);
}

pub trait LoopedSound {
    fn play(&self);
    fn stop(&self);
    fn is_playing(&self) -> bool;
}

/// Everything the frame loop needs from a platform.
pub trait Backend {
    type Node: SceneNode;
    type Camera: CameraRig;
    type Billboard: MarkerVisual;
    type Sound: LoopedSound;

    /// Give loaders without their own event loop a chance to settle slots.
    fn poll_assets(&mut self) {}

    fn show_hud(&mut self, _hud: &Hud) {}

    /// Draw the scene from `camera`. Called once per tick after all updates.
    fn render(&mut self, camera: &Self::Camera);
}
