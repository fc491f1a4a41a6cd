use glam::Vec3;

use crate::config::FlightConfig;
use crate::controller::effect::{EffectTrigger, FlameAnimator};
use crate::controller::gesture::{FrameWatchdog, GestureReceiver, GestureSignal, GestureTransition, HandStatus};
use crate::controller::input::{Axis, InputAggregator, InputEvent, InputProcessor, KeyCommand, SourceKind};
use crate::hud::{FrameStats, Hud};
use crate::model::{build_markers, AssetSlot, CameraState, ChaseCamera, Marker, MotionIntegrator, MotionState, MILESTONES};
use crate::view::scene_graph::{Backend, CameraRig, MarkerVisual, SceneNode};

/// Milliseconds after the camera reports ready before a stalled video feed
/// is flagged.
pub const CAMERA_WATCHDOG_MS: f64 = 5000.0;

/// How long "Ready" stays up before the readout asks for a hand.
pub const READY_PROMPT_MS: f64 = 2000.0;

/// Length of a [`FrameLoop::test_hand`] run.
pub const TEST_HAND_MS: f64 = 2000.0;

/// Handles the frame loop drives. Asset handles start pending and are
/// resolved by the backend's loader.
pub struct FlightScene<B: Backend> {
    pub camera: B::Camera,
    pub rocket: AssetSlot<B::Node>,
    pub fire: AssetSlot<B::Node>,
    pub sound: AssetSlot<B::Sound>,
    /// One per milestone, same order as [`MILESTONES`].
    pub billboards: Vec<B::Billboard>,
}

/// One logical tick per displayed frame: input, motion, camera, markers,
/// effect, readouts, render. Nothing in here blocks.
pub struct FrameLoop<B: Backend> {
    backend: B,
    scene: FlightScene<B>,
    gestures: GestureReceiver,

    processor: InputProcessor,
    integrator: MotionIntegrator,
    chase: ChaseCamera,
    flame: FlameAnimator,

    input: InputAggregator,
    motion: MotionState,
    camera: CameraState,
    markers: Vec<Marker>,
    effect: EffectTrigger,
    fire_attached: bool,

    hand_status: HandStatus,
    frames_processed: u64,
    clench_distance: Option<f32>,
    watchdog: FrameWatchdog,
    ready_prompt_at: Option<f64>,
    test_release_at: Option<f64>,
    stats: FrameStats,
    start_ms: Option<f64>,
    last_ms: f64,
    frame_count: u64,
    hud: Hud,
}

impl<B: Backend> FrameLoop<B> {
    pub fn new(config: &FlightConfig, backend: B, scene: FlightScene<B>, gestures: GestureReceiver) -> Self {
        let markers = build_markers(&MILESTONES, &config.markers);
        if scene.billboards.len() != markers.len() {
            tracing::warn!(
                billboards = scene.billboards.len(),
                markers = markers.len(),
                "billboard count does not match milestones, extra markers stay invisible"
            );
        }
        let camera = CameraState::new(config.camera.initial_position);
        scene.camera.set_position(camera.position);

        Self {
            backend,
            scene,
            gestures,
            processor: InputProcessor::with_move_speed(config.motion.move_speed),
            integrator: MotionIntegrator::new(&config.motion),
            chase: ChaseCamera::new(&config.camera),
            flame: FlameAnimator::new(&config.effect),
            input: InputAggregator::new(),
            motion: MotionState::default(),
            camera,
            markers,
            effect: EffectTrigger::new(),
            fire_attached: false,
            hand_status: HandStatus::Waiting,
            frames_processed: 0,
            clench_distance: None,
            watchdog: FrameWatchdog::new(CAMERA_WATCHDOG_MS),
            ready_prompt_at: None,
            test_release_at: None,
            stats: FrameStats::new(),
            start_ms: None,
            last_ms: 0.0,
            frame_count: 0,
            hud: Hud::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn scene(&self) -> &FlightScene<B> {
        &self.scene
    }

    pub fn motion(&self) -> &MotionState {
        &self.motion
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn input(&self) -> &InputAggregator {
        &self.input
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn effect(&self) -> &EffectTrigger {
        &self.effect
    }

    pub fn hand_status(&self) -> HandStatus {
        self.hand_status
    }

    pub fn hud(&self) -> &Hud {
        &self.hud
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Route a platform event. Returns true when the event was a bound key,
    /// so the caller can suppress the platform default.
    pub fn handle_event(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::KeyDown(key) => self.key_down(key),
            InputEvent::KeyUp(key) => self.key_up(key),
            InputEvent::FocusLost | InputEvent::VisibilityChanged { visible: false } => {
                self.processor.release_all(&mut self.input);
                false
            }
            InputEvent::VisibilityChanged { visible: true } => false,
        }
    }

    pub fn key_down(&mut self, key: &str) -> bool {
        let Some(command) = self.processor.key_down(&mut self.input, key) else {
            return false;
        };
        if let Some(heading) = command.heading() {
            self.integrator.set_direction(&mut self.motion, heading);
        }
        tracing::trace!(?command, "key down");
        true
    }

    pub fn key_up(&mut self, key: &str) -> bool {
        self.processor.key_up(&mut self.input, key).is_some()
    }

    /// Same path a recognized fist takes.
    pub fn simulate_clench(&mut self) {
        self.apply_transition(GestureTransition::Clenched);
    }

    pub fn simulate_open(&mut self) {
        self.apply_transition(GestureTransition::Opened);
    }

    /// Clench now and open again [`TEST_HAND_MS`] later, timed against the
    /// frame clock.
    pub fn test_hand(&mut self) {
        tracing::info!("manual hand test triggered");
        self.simulate_clench();
        self.hand_status = HandStatus::TestActive;
        self.test_release_at = Some(self.last_ms + TEST_HAND_MS);
    }

    fn apply_transition(&mut self, transition: GestureTransition) {
        let keyboard_active = self.input.source(SourceKind::Keyboard).active;
        match transition {
            GestureTransition::Clenched => {
                let speed = self.processor.move_speed();
                self.input.set_gesture_axis(Axis::Z, KeyCommand::Forward.sign() * speed);
                self.input.set_source_active(SourceKind::Gesture, true);
                if let Some(heading) = KeyCommand::Forward.heading() {
                    self.integrator.set_direction(&mut self.motion, heading);
                }
                self.hand_status = HandStatus::Clenched { keyboard_active };
                tracing::info!(keyboard_active, "hand clenched, moving forward");
            }
            GestureTransition::Opened => {
                self.input.set_gesture_axis(Axis::Z, 0.0);
                self.input.set_source_active(SourceKind::Gesture, false);
                self.hand_status = HandStatus::Open { keyboard_active };
                tracing::info!(keyboard_active, "hand opened");
            }
        }
    }

    fn drain_gestures(&mut self, now_ms: f64) {
        let signals: Vec<GestureSignal> = self.gestures.drain().collect();
        for signal in signals {
            match signal {
                GestureSignal::Transition(transition) => self.apply_transition(transition),
                GestureSignal::Status(status) => {
                    if status == HandStatus::Ready {
                        self.watchdog.arm(now_ms);
                        self.ready_prompt_at = Some(now_ms + READY_PROMPT_MS);
                    }
                    self.hand_status = status;
                }
                GestureSignal::Frames { processed, mean_distance } => {
                    self.frames_processed = processed;
                    self.clench_distance = mean_distance;
                }
            }
        }
        if self.ready_prompt_at.is_some_and(|at| now_ms >= at) {
            self.ready_prompt_at = None;
            if self.hand_status == HandStatus::Ready {
                self.hand_status = HandStatus::ShowHandToCamera;
            }
        }
        if let Some(status) = self.watchdog.check(now_ms, self.frames_processed) {
            self.hand_status = status;
        }
    }

    fn finish_test_hand(&mut self, now_ms: f64) {
        if !self.test_release_at.is_some_and(|at| now_ms >= at) {
            return;
        }
        self.test_release_at = None;
        self.simulate_open();
        self.hand_status = HandStatus::TestComplete;
    }

    /// Parent the flame to the rocket the first frame both exist.
    fn attach_fire(&mut self) {
        if self.fire_attached {
            return;
        }
        let (Some(rocket), Some(fire)) = (self.scene.rocket.get(), self.scene.fire.get()) else {
            return;
        };
        rocket.add_child(&fire);
        fire.set_position(Vec3::ZERO);
        fire.set_rotation(self.flame.rotation());
        fire.set_visible(self.effect.is_active());
        self.fire_attached = true;
        tracing::debug!("flame attached to rocket");
    }

    /// Advance everything by one displayed frame at `now_ms` (monotonic).
    pub fn frame(&mut self, now_ms: f64) {
        let start = *self.start_ms.get_or_insert(now_ms);
        let elapsed = ((now_ms - start) / 1000.0) as f32;
        self.frame_count += 1;
        self.last_ms = now_ms;

        self.drain_gestures(now_ms);
        self.finish_test_hand(now_ms);
        self.backend.poll_assets();
        self.attach_fire();

        let acceleration = self.input.combined_acceleration();
        if let Some(rocket) = self.scene.rocket.get() {
            self.integrator.tick(&mut self.motion, acceleration);
            rocket.set_position(self.motion.position);
            rocket.set_rotation(self.motion.orientation_current);

            self.chase.update(&mut self.camera, self.motion.position, self.motion.velocity);
            self.scene.camera.set_position(self.camera.position);
            if let Some(target) = self.camera.look_at {
                self.scene.camera.look_at(target);
            }
        }

        if let Some(fire) = self.scene.fire.get() {
            self.flame.animate(&*fire, elapsed);
        }

        for (marker, billboard) in self.markers.iter_mut().zip(&self.scene.billboards) {
            billboard.set_opacity(marker.update_opacity(self.camera.position));
        }

        {
            let fire = self.scene.fire.get();
            let sound = self.scene.sound.get();
            self.effect.on_forward_command_changed(
                self.input.thrust_commanded(),
                fire.as_deref(),
                sound.as_deref(),
            );
        }

        if let Some(fps) = self.stats.record(now_ms) {
            tracing::trace!(fps, "frame rate");
        }
        self.hud = Hud {
            position: self.motion.position,
            fps: self.stats.fps(),
            hand_status: self.hand_status,
            frames_processed: self.frames_processed,
            clench_distance: self.clench_distance,
        };
        self.backend.show_hud(&self.hud);
        self.backend.render(&self.scene.camera);
    }
}
