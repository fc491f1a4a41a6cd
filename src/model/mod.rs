// MODEL: flight state and the math that advances it
pub mod motion;
pub mod camera;
pub mod marker;
pub mod asset;

pub use motion::{MotionIntegrator, MotionState};
pub use camera::{CameraState, ChaseCamera};
pub use marker::{build_markers, track_points, Marker, Milestone, MILESTONES};
pub use asset::{AssetSlot, AssetState};
