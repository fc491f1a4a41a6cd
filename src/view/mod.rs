// VIEW: scene-graph seams and the backends behind them
pub mod scene_graph;
pub mod headless;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use scene_graph::{Backend, CameraRig, LoopedSound, MarkerVisual, SceneNode};
pub use headless::{AssetPaths, HeadlessBackend};
