//! Heads-up readouts. The frame loop fills a [`Hud`] every tick and the
//! backend decides where to print it (DOM overlay, window title, log).

use std::fmt;

use glam::Vec3;

use crate::controller::gesture::HandStatus;

/// Frames-per-second counter refreshed once at least a second has passed.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    window_start_ms: Option<f64>,
    frames: u32,
    fps: u32,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one frame at `now_ms`. Returns the new reading when the window
    /// rolled over.
    pub fn record(&mut self, now_ms: f64) -> Option<u32> {
        let start = *self.window_start_ms.get_or_insert(now_ms);
        self.frames += 1;
        let elapsed = now_ms - start;
        if elapsed < 1000.0 {
            return None;
        }
        self.fps = (f64::from(self.frames) * 1000.0 / elapsed).round() as u32;
        self.frames = 0;
        self.window_start_ms = Some(now_ms);
        Some(self.fps)
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}

pub fn format_position(position: Vec3) -> String {
    format!(
        "Position: ({:.2}, {:.2}, {:.2})",
        position.x, position.y, position.z
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hud {
    pub position: Vec3,
    pub fps: u32,
    pub hand_status: HandStatus,
    pub frames_processed: u64,
    pub clench_distance: Option<f32>,
}

impl Default for Hud {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            fps: 0,
            hand_status: HandStatus::Waiting,
            frames_processed: 0,
            clench_distance: None,
        }
    }
}

impl Hud {
    pub fn position_text(&self) -> String {
        format_position(self.position)
    }

    pub fn fps_text(&self) -> String {
        format!("FPS: {}", self.fps)
    }

    pub fn frames_text(&self) -> String {
        format!("Frames: {}", self.frames_processed)
    }

    pub fn distance_text(&self) -> String {
        match self.clench_distance {
            Some(d) => format!("Distance: {d:.3}"),
            None => "Distance: -".to_string(),
        }
    }
}

/// One-line summary, used for the native window title.
impl fmt::Display for Hud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {}",
            self.position_text(),
            self.fps_text(),
            self.hand_status
        )
    }
}
