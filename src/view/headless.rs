//! In-memory scene graph. Used by the native harness and by tests; records
//! every transform so callers can inspect what a real renderer would draw.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;

use glam::{Quat, Vec3};

use crate::controller::frame_loop::FlightScene;
use crate::error::AssetError;
use crate::hud::Hud;
use crate::model::AssetSlot;
use crate::view::scene_graph::{Backend, CameraRig, LoopedSound, MarkerVisual, SceneNode};

#[derive(Debug, Clone)]
struct NodeState {
    name: String,
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    visible: bool,
    children: Vec<HeadlessNode>,
}

#[derive(Debug, Clone)]
pub struct HeadlessNode(Rc<RefCell<NodeState>>);

impl HeadlessNode {
    pub fn new(name: &str) -> Self {
        Self(Rc::new(RefCell::new(NodeState {
            name: name.to_string(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            visible: true,
            children: Vec::new(),
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn position(&self) -> Vec3 {
        self.0.borrow().position
    }

    pub fn rotation(&self) -> Quat {
        self.0.borrow().rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.0.borrow().scale
    }

    pub fn visible(&self) -> bool {
        self.0.borrow().visible
    }

    /// Names of attached children, in attach order.
    pub fn children(&self) -> Vec<String> {
        self.0.borrow().children.iter().map(HeadlessNode::name).collect()
    }
}

impl SceneNode for HeadlessNode {
    fn set_position(&self, position: Vec3) {
        self.0.borrow_mut().position = position;
    }

    fn set_rotation(&self, rotation: Quat) {
        self.0.borrow_mut().rotation = rotation;
    }

    fn set_scale(&self, scale: Vec3) {
        self.0.borrow_mut().scale = scale;
    }

    fn set_visible(&self, visible: bool) {
        self.0.borrow_mut().visible = visible;
    }

    fn add_child(&self, child: &Self) {
        self.0.borrow_mut().children.push(child.clone());
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessCamera {
    position: Rc<Cell<Vec3>>,
    target: Rc<Cell<Option<Vec3>>>,
}

impl HeadlessCamera {
    pub fn position(&self) -> Vec3 {
        self.position.get()
    }

    /// Last look-at target, if the camera was ever aimed.
    pub fn target(&self) -> Option<Vec3> {
        self.target.get()
    }
}

impl CameraRig for HeadlessCamera {
    fn set_position(&self, position: Vec3) {
        self.position.set(position);
    }

    fn look_at(&self, target: Vec3) {
        self.target.set(Some(target));
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessBillboard(Rc<Cell<f32>>);

impl HeadlessBillboard {
    pub fn opacity(&self) -> f32 {
        self.0.get()
    }
}

impl MarkerVisual for HeadlessBillboard {
    fn set_opacity(&self, opacity: f32) {
        self.0.set(opacity);
    }
}

#[derive(Debug, Default)]
struct SoundState {
    playing: bool,
    play_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessSound(Rc<RefCell<SoundState>>);

impl HeadlessSound {
    pub fn play_count(&self) -> u32 {
        self.0.borrow().play_count
    }
}

impl LoopedSound for HeadlessSound {
    fn play(&self) {
        let mut state = self.0.borrow_mut();
        state.playing = true;
        state.play_count += 1;
    }

    fn stop(&self) {
        self.0.borrow_mut().playing = false;
    }

    fn is_playing(&self) -> bool {
        self.0.borrow().playing
    }
}

/// Where the filesystem loader looks for the three assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub rocket: PathBuf,
    pub fire: PathBuf,
    pub sound: PathBuf,
}

impl AssetPaths {
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            rocket: root.join("models/rocket/scene.gltf"),
            fire: root.join("models/fire/scene.gltf"),
            sound: root.join("sfx/burning.wav"),
        }
    }
}

/// A load in flight: returns true once it has settled its slot.
type PendingLoad = Box<dyn FnMut() -> bool>;

pub struct HeadlessBackend {
    loads: Vec<PendingLoad>,
    frames_rendered: u64,
    last_hud: Option<Hud>,
    hud_sink: Option<Box<dyn FnMut(&Hud)>>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            loads: Vec::new(),
            frames_rendered: 0,
            last_hud: None,
            hud_sink: None,
        }
    }

    /// Forward every HUD update to `sink`, e.g. a window title.
    pub fn on_hud(&mut self, sink: impl FnMut(&Hud) + 'static) {
        self.hud_sink = Some(Box::new(sink));
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn last_hud(&self) -> Option<&Hud> {
        self.last_hud.as_ref()
    }

    pub fn pending_loads(&self) -> usize {
        self.loads.len()
    }

    /// Scene with every asset pending and nothing scheduled to load it.
    pub fn empty_scene(&self, billboards: usize) -> FlightScene<Self> {
        FlightScene {
            camera: HeadlessCamera::default(),
            rocket: AssetSlot::pending("rocket"),
            fire: AssetSlot::pending("fire"),
            sound: AssetSlot::pending("sound"),
            billboards: (0..billboards).map(|_| HeadlessBillboard::default()).collect(),
        }
    }

    /// Scene whose assets are read from disk in the background.
    pub fn load_scene(&mut self, paths: &AssetPaths, billboards: usize) -> FlightScene<Self> {
        let scene = self.empty_scene(billboards);
        self.load_into(&paths.rocket, scene.rocket.clone(), HeadlessNode::new("rocket"));
        self.load_into(&paths.fire, scene.fire.clone(), HeadlessNode::new("fire"));
        self.load_into(&paths.sound, scene.sound.clone(), HeadlessSound::default());
        scene
    }

    /// Read `path` on a worker thread; the slot is settled from
    /// [`Backend::poll_assets`] on the calling thread.
    fn load_into<T: 'static>(&mut self, path: &Path, slot: AssetSlot<T>, value: T) {
        let (tx, rx) = mpsc::channel();
        let worker_path = path.to_path_buf();
        thread::spawn(move || {
            let _ = tx.send(std::fs::read(&worker_path).map(|bytes| bytes.len()));
        });

        let shown = path.display().to_string();
        tracing::debug!(asset = slot.label(), path = %shown, "loading");
        let mut value = Some(value);
        self.loads.push(Box::new(move || {
            let result = match rx.try_recv() {
                Err(TryRecvError::Empty) => return false,
                Ok(Ok(bytes)) => {
                    tracing::debug!(asset = slot.label(), bytes, "read");
                    value.take().ok_or_else(|| AssetError::new(&shown, "loaded twice"))
                }
                Ok(Err(err)) => Err(AssetError::new(&shown, err.to_string())),
                Err(TryRecvError::Disconnected) => Err(AssetError::new(&shown, "loader thread exited")),
            };
            slot.resolve(result);
            true
        }));
    }
}

impl Backend for HeadlessBackend {
    type Node = HeadlessNode;
    type Camera = HeadlessCamera;
    type Billboard = HeadlessBillboard;
    type Sound = HeadlessSound;

    fn poll_assets(&mut self) {
        self.loads.retain_mut(|load| !load());
    }

    fn show_hud(&mut self, hud: &Hud) {
        if let Some(sink) = self.hud_sink.as_mut() {
            sink(hud);
        }
        self.last_hud = Some(hud.clone());
    }

    fn render(&mut self, _camera: &HeadlessCamera) {
        self.frames_rendered += 1;
    }
}
