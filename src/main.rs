use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{Key, NamedKey},
    window::Window,
};

// Import from the library crate
use rocket_trail::{
    config::FlightConfig,
    controller::{gesture_feed, replay::LandmarkReplay, FrameLoop, InputEvent},
    logging,
    model::MILESTONES,
    view::{AssetPaths, HeadlessBackend},
};

/// Fly the rocket in a native window. The scene graph is kept in memory and
/// the HUD is shown in the window title.
#[derive(Parser, Debug)]
#[command(name = "rocket-trail", version)]
struct Args {
    /// JSON file overriding any of the flight constants
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding models/ and sfx/
    #[arg(long, default_value = ".")]
    assets_dir: PathBuf,

    /// Recorded hand landmarks (JSON lines) to replay as gesture input
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Exit after this many frames
    #[arg(long)]
    frames: Option<u64>,
}

/// Web-style key name for a winit key, if the flight controls care about it.
fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Character(c) => Some(c.to_string()),
        Key::Named(NamedKey::ArrowUp) => Some("ArrowUp".to_string()),
        Key::Named(NamedKey::ArrowDown) => Some("ArrowDown".to_string()),
        Key::Named(NamedKey::ArrowLeft) => Some("ArrowLeft".to_string()),
        Key::Named(NamedKey::ArrowRight) => Some("ArrowRight".to_string()),
        _ => None,
    }
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FlightConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => FlightConfig::default(),
    };

    let event_loop = EventLoop::new().context("creating event loop")?;
    let window_attributes = Window::default_attributes()
        .with_title("Rocket Trail")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
    #[allow(deprecated)]
    let window = Arc::new(event_loop.create_window(window_attributes).context("creating window")?);

    let mut backend = HeadlessBackend::new();
    let scene = backend.load_scene(&AssetPaths::under(&args.assets_dir), MILESTONES.len());
    {
        let window = window.clone();
        let mut last_title = String::new();
        backend.on_hud(move |hud| {
            let title = hud.to_string();
            if title != last_title {
                window.set_title(&title);
                last_title = title;
            }
        });
    }

    let (feed, gestures) = gesture_feed();
    if let Some(path) = args.landmarks.clone() {
        LandmarkReplay::new(path).spawn(&config.gesture, feed);
    }

    let mut flight = FrameLoop::new(&config, backend, scene, gestures);
    let started = Instant::now();
    let frame_limit = args.frames;

    #[allow(deprecated)]
    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { ref event, window_id } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::KeyboardInput { event: KeyEvent { state, logical_key, .. }, .. } => {
                if let Some(key) = key_name(logical_key) {
                    let input = match state {
                        ElementState::Pressed => InputEvent::KeyDown(key),
                        ElementState::Released => InputEvent::KeyUp(key),
                    };
                    flight.handle_event(&input);
                }
            }
            WindowEvent::Focused(false) => {
                flight.handle_event(&InputEvent::FocusLost);
            }
            WindowEvent::Occluded(occluded) => {
                flight.handle_event(&InputEvent::VisibilityChanged { visible: !occluded });
            }
            WindowEvent::RedrawRequested => {
                flight.frame(started.elapsed().as_secs_f64() * 1000.0);
                if frame_limit.is_some_and(|limit| flight.frame_count() >= limit) {
                    tracing::info!(
                        frames = flight.frame_count(),
                        position = %flight.hud().position_text(),
                        "frame limit reached"
                    );
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            window.request_redraw();
        }
        _ => {}
    })
    .context("running event loop")?;

    Ok(())
}
