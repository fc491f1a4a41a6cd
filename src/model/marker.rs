use glam::Vec3;

use crate::config::MarkerConfig;

/// A world-positioned billboard that fades in as the camera gets closer.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub title: String,
    pub world_position: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub initial_opacity: f32,
    pub max_opacity: f32,
    /// Last value computed by [`Marker::update_opacity`].
    pub opacity: f32,
}

impl Marker {
    pub fn new(title: impl Into<String>, world_position: Vec3, config: &MarkerConfig) -> Self {
        Self {
            title: title.into(),
            world_position,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            initial_opacity: config.initial_opacity,
            max_opacity: config.max_opacity,
            opacity: config.initial_opacity,
        }
    }

    /// Opacity for a camera at `camera_position`: `max_opacity` inside
    /// `min_distance`, `initial_opacity` beyond `max_distance`, linear between.
    pub fn opacity_at(&self, camera_position: Vec3) -> f32 {
        let distance = self.world_position.distance(camera_position);
        if distance <= self.min_distance {
            return self.max_opacity;
        }
        if distance >= self.max_distance {
            return self.initial_opacity;
        }
        let t = (distance - self.min_distance) / (self.max_distance - self.min_distance);
        self.max_opacity + (self.initial_opacity - self.max_opacity) * t
    }

    pub fn update_opacity(&mut self, camera_position: Vec3) -> f32 {
        self.opacity = self.opacity_at(camera_position);
        self.opacity
    }
}

/// One entry on the resume timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Milestone {
    pub year: &'static str,
    pub text: &'static str,
    pub z: f32,
}

impl Milestone {
    pub fn title(&self) -> String {
        format!("{}: {}", self.year, self.text)
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, self.z)
    }
}

pub const MILESTONES: [Milestone; 7] = [
    Milestone { year: "2021", text: "Completed BTech CSE", z: -50.0 },
    Milestone { year: "2022", text: "Completed work at Sri Sai Oilfield International", z: -150.0 },
    Milestone { year: "Sept 2022", text: "Started Masters at NJIT", z: -250.0 },
    Milestone { year: "Dec 2023", text: "Started job at InTheLoop AI", z: -350.0 },
    Milestone { year: "May 2024", text: "Finished Masters at NJIT", z: -450.0 },
    Milestone { year: "Dec 2024", text: "Finished job at InTheLoop AI", z: -550.0 },
    Milestone { year: "Jan 2025", text: "Joined Womp 3D", z: -650.0 },
];

/// Build one marker per milestone.
pub fn build_markers(milestones: &[Milestone], config: &MarkerConfig) -> Vec<Marker> {
    milestones
        .iter()
        .map(|m| Marker::new(m.title(), m.position(), config))
        .collect()
}

/// Points of the checkpoint line drawn through the milestones.
pub fn track_points(milestones: &[Milestone]) -> Vec<Vec3> {
    milestones.iter().map(Milestone::position).collect()
}
