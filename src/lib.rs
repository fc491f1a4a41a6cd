// Re-export all public modules so they can be used from main.rs
pub mod config;
pub mod error;
pub mod hud;
pub mod logging;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

pub use config::FlightConfig;
pub use controller::{FlightScene, FrameLoop};
pub use error::{AssetError, ConfigError, GestureError};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::wasm_bindgen;

/// Module start: logging only. The page calls `launch` once its three.js
/// scene exists.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    logging::init();
    tracing::info!("rocket-trail module loaded");
}
