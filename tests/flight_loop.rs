use std::io::Cursor;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use glam::Vec3;
use rocket_trail::config::{FlightConfig, GestureConfig};
use rocket_trail::controller::gesture::{gesture_feed, GestureSender, GestureTracker, HandStatus};
use rocket_trail::controller::replay::LandmarkReplay;
use rocket_trail::model::MILESTONES;
use rocket_trail::view::{AssetPaths, HeadlessBackend};
use rocket_trail::FrameLoop;

struct AssetDir(PathBuf);

impl AssetDir {
    fn create(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!("rocket-trail-{name}-{}", std::process::id()));
        for dir in ["models/rocket", "models/fire", "sfx"] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
        }
        std::fs::write(root.join("models/rocket/scene.gltf"), b"{\"asset\":{}}").unwrap();
        std::fs::write(root.join("models/fire/scene.gltf"), b"{\"asset\":{}}").unwrap();
        std::fs::write(root.join("sfx/burning.wav"), b"RIFF").unwrap();
        Self(root)
    }
}

impl Drop for AssetDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn launch(config: &FlightConfig, assets: &AssetPaths) -> (FrameLoop<HeadlessBackend>, GestureSender) {
    let mut backend = HeadlessBackend::new();
    let scene = backend.load_scene(assets, MILESTONES.len());
    let (feed, gestures) = gesture_feed();
    (FrameLoop::new(config, backend, scene, gestures), feed)
}

/// Run frames until every asset load has settled.
fn settle(flight: &mut FrameLoop<HeadlessBackend>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while flight.backend().pending_loads() > 0 {
        assert!(Instant::now() < deadline, "assets never settled");
        step(flight, 1);
        thread::sleep(Duration::from_millis(2));
    }
}

fn step(flight: &mut FrameLoop<HeadlessBackend>, frames: u32) {
    for _ in 0..frames {
        let now = flight.frame_count() as f64 * 16.0;
        flight.frame(now);
    }
}

#[test]
fn flying_forward_brings_first_milestone_into_view() {
    let dir = AssetDir::create("milestone");
    let (mut flight, _feed) = launch(&FlightConfig::default(), &AssetPaths::under(&dir.0));
    settle(&mut flight);
    assert!(flight.scene().rocket.is_loaded());

    let first = &flight.scene().billboards[0];
    assert_relative_eq!(first.opacity(), 0.01);

    flight.key_down("w");
    let milestone = MILESTONES[0].position();
    let mut seen_up_close = false;
    for _ in 0..2000 {
        step(&mut flight, 1);
        if flight.camera().position.distance(milestone) <= 10.0 {
            seen_up_close = true;
            break;
        }
    }
    assert!(seen_up_close, "camera never reached the first milestone");
    assert_relative_eq!(flight.scene().billboards[0].opacity(), 1.0);
    // farther milestones are still faint
    assert!(flight.scene().billboards[6].opacity() < 0.5);
    assert!(flight.motion().position.z < -40.0);
    assert!(flight.motion().velocity.z.abs() <= 1.5);
}

#[test]
fn missing_assets_degrade_without_stopping_the_loop() {
    let (mut flight, _feed) = launch(
        &FlightConfig::default(),
        &AssetPaths::under("/nonexistent/rocket-trail-assets"),
    );
    settle(&mut flight);
    assert!(flight.scene().rocket.is_failed());

    flight.key_down("w");
    step(&mut flight, 30);
    assert_eq!(flight.motion().position, Vec3::ZERO);
    assert!(flight.effect().is_active());
    assert_eq!(flight.backend().frames_rendered(), flight.frame_count());
    let hud = flight.backend().last_hud().map(|h| h.position_text());
    assert_eq!(hud.as_deref(), Some("Position: (0.00, 0.00, 0.00)"));
}

#[test]
fn replayed_fist_flies_and_open_hand_stops() {
    let dir = AssetDir::create("replay");
    let (mut flight, feed) = launch(&FlightConfig::default(), &AssetPaths::under(&dir.0));
    settle(&mut flight);

    let hand = |spread: f32| {
        let mut points = vec![[0.5f32, 0.5f32]; 21];
        for tip in [8, 12, 16, 20] {
            points[tip] = [0.5 + spread, 0.5];
        }
        serde_json::to_string(&points).unwrap()
    };
    let gesture = GestureConfig {
        throttle: 1,
        ..GestureConfig::default()
    };
    let mut tracker = GestureTracker::new(&gesture);
    let replay = LandmarkReplay::new("in-memory");

    replay.stream(Cursor::new(format!("{}\n{}\n", hand(0.4), hand(0.05))), &mut tracker, &feed, |_| {});
    step(&mut flight, 20);
    assert_eq!(flight.hand_status(), HandStatus::Clenched { keyboard_active: false });
    assert!(flight.motion().position.z < 0.0);
    assert!(flight.effect().is_active());
    assert_eq!(flight.scene().fire.get().map(|f| f.visible()), Some(true));

    replay.stream(Cursor::new("null\n"), &mut tracker, &feed, |_| {});
    step(&mut flight, 1);
    assert_eq!(flight.hand_status(), HandStatus::Open { keyboard_active: false });
    assert!(!flight.effect().is_active());
    assert_eq!(flight.hud().frames_processed, 3);

    let coasting = flight.motion().velocity.z;
    step(&mut flight, 10);
    assert!(flight.motion().velocity.z.abs() < coasting.abs());
}

#[test]
fn look_at_mode_aims_the_camera() {
    let dir = AssetDir::create("lookat");
    let config = FlightConfig::from_json(r#"{ "camera": { "mode": "offset_follow_look_at" } }"#).unwrap();
    let (mut flight, _feed) = launch(&config, &AssetPaths::under(&dir.0));
    settle(&mut flight);

    flight.key_down("a");
    step(&mut flight, 5);
    let target = flight.scene().camera.target();
    assert_eq!(target, Some(flight.motion().position));
}

#[test]
fn default_mode_never_aims_the_camera() {
    let dir = AssetDir::create("follow");
    let (mut flight, _feed) = launch(&FlightConfig::default(), &AssetPaths::under(&dir.0));
    settle(&mut flight);
    step(&mut flight, 5);
    assert_eq!(flight.scene().camera.target(), None);
}
