//! Browser backend: three.js through a small JS bridge object, DOM readouts,
//! keyboard listeners, the requestAnimationFrame loop and the MediaPipe Hands
//! pipeline.
//!
//! The page builds the three.js scene and hands `launch` a bridge exposing
//! `camera`, `loadModel(path, addToScene)`, `loadSound(path, volume)`,
//! `createBillboard(title, x, y, z)`, `addTrack(points)` and `render()`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use glam::{Quat, Vec2, Vec3};
use js_sys::{Array, Float32Array, Function, Object, Promise, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{future_to_promise, spawn_local, JsFuture};
use web_sys::{Document, Element, Event, HtmlElement, KeyboardEvent, Window};

use crate::config::{FlightConfig, GestureConfig};
use crate::controller::frame_loop::{FlightScene, FrameLoop};
use crate::controller::gesture::{deliver_frame, gesture_feed, GestureSender, GestureSignal, GestureTracker, HandLandmarks, HandStatus, RetryPolicy};
use crate::controller::input::InputEvent;
use crate::error::{AssetError, GestureError};
use crate::hud::Hud;
use crate::model::{track_points, AssetSlot, MILESTONES};
use crate::view::scene_graph::{Backend, CameraRig, LoopedSound, MarkerVisual, SceneNode};

const ROCKET_MODEL: &str = "models/rocket/scene.gltf";
const FIRE_MODEL: &str = "models/fire/scene.gltf";
const THRUST_SOUND: &str = "sfx/burning.wav";
const HANDS_CDN: &str = "https://cdn.jsdelivr.net/npm/@mediapipe/hands";
const VIDEO_WIDTH: i32 = 240;
const VIDEO_HEIGHT: i32 = 180;

#[wasm_bindgen]
extern "C" {
    pub type Vector3;
    #[wasm_bindgen(method)]
    fn set(this: &Vector3, x: f32, y: f32, z: f32);

    pub type Quaternion;
    #[wasm_bindgen(method, js_name = set)]
    fn set_xyzw(this: &Quaternion, x: f32, y: f32, z: f32, w: f32);

    #[derive(Debug, Clone)]
    pub type Object3D;
    #[wasm_bindgen(method, getter = position)]
    fn position_ref(this: &Object3D) -> Vector3;
    #[wasm_bindgen(method, getter = quaternion)]
    fn quaternion_ref(this: &Object3D) -> Quaternion;
    #[wasm_bindgen(method, getter = scale)]
    fn scale_ref(this: &Object3D) -> Vector3;
    #[wasm_bindgen(method, setter = visible)]
    fn set_visible_flag(this: &Object3D, visible: bool);
    #[wasm_bindgen(method, js_name = add)]
    fn add_object(this: &Object3D, child: &Object3D);
    #[wasm_bindgen(method, js_name = lookAt)]
    fn look_at_xyz(this: &Object3D, x: f32, y: f32, z: f32);

    #[wasm_bindgen(extends = Object3D)]
    #[derive(Debug, Clone)]
    pub type Camera3D;

    #[derive(Debug, Clone)]
    pub type Billboard;
    #[wasm_bindgen(method, setter = opacity)]
    fn set_opacity_value(this: &Billboard, opacity: f32);

    #[derive(Debug, Clone)]
    pub type ThrustAudio;
    #[wasm_bindgen(method)]
    fn play(this: &ThrustAudio);
    #[wasm_bindgen(method)]
    fn stop(this: &ThrustAudio);
    #[wasm_bindgen(method, getter = isPlaying)]
    fn playing(this: &ThrustAudio) -> bool;

    #[derive(Debug, Clone)]
    pub type SceneBridge;
    #[wasm_bindgen(method, getter)]
    fn camera(this: &SceneBridge) -> Camera3D;
    #[wasm_bindgen(method, js_name = loadModel)]
    fn load_model(this: &SceneBridge, path: &str, add_to_scene: bool) -> Promise;
    #[wasm_bindgen(method, js_name = loadSound)]
    fn load_sound(this: &SceneBridge, path: &str, volume: f32) -> Promise;
    #[wasm_bindgen(method, js_name = createBillboard)]
    fn create_billboard(this: &SceneBridge, title: &str, x: f32, y: f32, z: f32) -> Billboard;
    #[wasm_bindgen(method, js_name = addTrack)]
    fn add_track(this: &SceneBridge, points: &Float32Array);
    #[wasm_bindgen(method, js_name = render)]
    fn render_frame(this: &SceneBridge);
}

impl SceneNode for Object3D {
    fn set_position(&self, position: Vec3) {
        self.position_ref().set(position.x, position.y, position.z);
    }

    fn set_rotation(&self, rotation: Quat) {
        self.quaternion_ref().set_xyzw(rotation.x, rotation.y, rotation.z, rotation.w);
    }

    fn set_scale(&self, scale: Vec3) {
        self.scale_ref().set(scale.x, scale.y, scale.z);
    }

    fn set_visible(&self, visible: bool) {
        self.set_visible_flag(visible);
    }

    fn add_child(&self, child: &Self) {
        self.add_object(child);
    }
}

impl CameraRig for Camera3D {
    fn set_position(&self, position: Vec3) {
        self.position_ref().set(position.x, position.y, position.z);
    }

    fn look_at(&self, target: Vec3) {
        self.look_at_xyz(target.x, target.y, target.z);
    }
}

impl MarkerVisual for Billboard {
    fn set_opacity(&self, opacity: f32) {
        self.set_opacity_value(opacity);
    }
}

impl LoopedSound for ThrustAudio {
    fn play(&self) {
        ThrustAudio::play(self);
    }

    fn stop(&self) {
        ThrustAudio::stop(self);
    }

    fn is_playing(&self) -> bool {
        self.playing()
    }
}

/// DOM elements the readouts go to. Any of them may be missing from the page.
struct DomHud {
    coordinates: Option<Element>,
    fps: Option<Element>,
    hand_status: Option<HtmlElement>,
    frames: Option<Element>,
    distance: Option<Element>,
    last: Option<Hud>,
}

impl DomHud {
    fn find(document: &Document) -> Self {
        Self {
            coordinates: document.get_element_by_id("coordinates"),
            fps: document.get_element_by_id("fps-counter"),
            hand_status: document
                .get_element_by_id("hand-status")
                .and_then(|el| el.dyn_into::<HtmlElement>().ok()),
            frames: document.get_element_by_id("frame-counter"),
            distance: document.get_element_by_id("clench-confidence"),
            last: None,
        }
    }

    fn show(&mut self, hud: &Hud) {
        if self.last.as_ref() == Some(hud) {
            return;
        }
        if let Some(el) = &self.coordinates {
            el.set_text_content(Some(&hud.position_text()));
        }
        if let Some(el) = &self.fps {
            el.set_text_content(Some(&hud.fps_text()));
        }
        if let Some(el) = &self.frames {
            el.set_text_content(Some(&hud.frames_text()));
        }
        if let Some(el) = &self.distance {
            el.set_text_content(Some(&hud.distance_text()));
        }
        if let Some(el) = &self.hand_status {
            el.set_inner_text(&hud.hand_status.to_string());
            let _ = el.style().set_property("color", hud.hand_status.color());
        }
        self.last = Some(hud.clone());
    }
}

pub struct WebBackend {
    bridge: SceneBridge,
    hud: DomHud,
}

impl Backend for WebBackend {
    type Node = Object3D;
    type Camera = Camera3D;
    type Billboard = Billboard;
    type Sound = ThrustAudio;

    fn show_hud(&mut self, hud: &Hud) {
        self.hud.show(hud);
    }

    fn render(&mut self, _camera: &Camera3D) {
        self.bridge.render_frame();
    }
}

fn js_reason(err: &JsValue) -> String {
    if let Some(text) = err.as_string() {
        return text;
    }
    Reflect::get(err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

/// Settle `slot` when `promise` does. The loader's error path leaves the
/// feature absent.
fn load_into<T: JsCast + 'static>(slot: AssetSlot<T>, path: &'static str, promise: Promise) {
    spawn_local(async move {
        let result = JsFuture::from(promise)
            .await
            .map(|value| value.unchecked_into::<T>())
            .map_err(|err| AssetError::new(path, js_reason(&err)));
        slot.resolve(result);
    });
}

fn build_scene(bridge: &SceneBridge, config: &FlightConfig) -> FlightScene<WebBackend> {
    let scene = FlightScene {
        camera: bridge.camera(),
        rocket: AssetSlot::pending("rocket"),
        fire: AssetSlot::pending("fire"),
        sound: AssetSlot::pending("sound"),
        billboards: MILESTONES
            .iter()
            .map(|m| {
                let p = m.position();
                bridge.create_billboard(&m.title(), p.x, p.y, p.z)
            })
            .collect(),
    };

    let track: Vec<f32> = track_points(&MILESTONES)
        .iter()
        .flat_map(|p| p.to_array())
        .collect();
    bridge.add_track(&Float32Array::from(track.as_slice()));

    load_into(scene.rocket.clone(), ROCKET_MODEL, bridge.load_model(ROCKET_MODEL, true));
    load_into(scene.fire.clone(), FIRE_MODEL, bridge.load_model(FIRE_MODEL, false));
    load_into(
        scene.sound.clone(),
        THRUST_SOUND,
        bridge.load_sound(THRUST_SOUND, config.effect.sound_volume),
    );
    scene
}

type SharedFlight = Rc<RefCell<FrameLoop<WebBackend>>>;

/// Handle returned to the page; exposes the manual gesture test hooks.
#[wasm_bindgen]
pub struct FlightHandle {
    flight: SharedFlight,
}

#[wasm_bindgen]
impl FlightHandle {
    #[wasm_bindgen(js_name = simulateClench)]
    pub fn simulate_clench(&self) {
        self.flight.borrow_mut().simulate_clench();
    }

    #[wasm_bindgen(js_name = testHand)]
    pub fn test_hand(&self) {
        self.flight.borrow_mut().test_hand();
    }

    #[wasm_bindgen(js_name = simulateOpen)]
    pub fn simulate_open(&self) {
        self.flight.borrow_mut().simulate_open();
    }
}

/// Start the flight: listeners, render loop and hand tracking.
/// `config_json` may override any of the defaults.
#[wasm_bindgen]
pub fn launch(bridge: SceneBridge, config_json: Option<String>) -> Result<FlightHandle, JsValue> {
    let config = match config_json {
        Some(text) => FlightConfig::from_json(&text).map_err(|e| js_error(e.to_string()))?,
        None => FlightConfig::default(),
    };
    let window = web_sys::window().ok_or(js_error("no global `window`"))?;
    let document = window.document().ok_or(js_error("no document on window"))?;

    let scene = build_scene(&bridge, &config);
    let backend = WebBackend {
        bridge,
        hud: DomHud::find(&document),
    };
    let (feed, gestures) = gesture_feed();
    let flight: SharedFlight = Rc::new(RefCell::new(FrameLoop::new(&config, backend, scene, gestures)));

    setup_input_listeners(&document, &window, flight.clone())?;
    setup_test_buttons(&document, flight.clone())?;

    let loop_flight = flight.clone();
    let performance = window.performance();
    RcCellCallback::new(window.clone(), move || {
        let now = performance.as_ref().map(|p| p.now()).unwrap_or(0.0);
        loop_flight.borrow_mut().frame(now);
    })
    .start();

    spawn_local(start_hand_tracking(window, document, config.gesture.clone(), feed));
    tracing::info!("flight launched");
    Ok(FlightHandle { flight })
}

fn setup_input_listeners(document: &Document, window: &Window, flight: SharedFlight) -> Result<(), JsValue> {
    // Keyboard down
    {
        let flight = flight.clone();
        let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            if flight.borrow_mut().handle_event(&InputEvent::KeyDown(e.key())) {
                e.prevent_default();
            }
        }) as Box<dyn FnMut(KeyboardEvent)>);
        document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
        keydown.forget();
    }

    // Keyboard up
    {
        let flight = flight.clone();
        let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            flight.borrow_mut().handle_event(&InputEvent::KeyUp(e.key()));
        }) as Box<dyn FnMut(KeyboardEvent)>);
        document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
        keyup.forget();
    }

    // Focus loss - release all keys
    {
        let flight = flight.clone();
        let blur = Closure::wrap(Box::new(move |_e: Event| {
            flight.borrow_mut().handle_event(&InputEvent::FocusLost);
        }) as Box<dyn FnMut(Event)>);
        window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
        blur.forget();
    }

    // Visibility change
    {
        let doc = document.clone();
        let visibility = Closure::wrap(Box::new(move |_e: Event| {
            let visible = !doc.hidden();
            flight.borrow_mut().handle_event(&InputEvent::VisibilityChanged { visible });
        }) as Box<dyn FnMut(Event)>);
        document.add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
        visibility.forget();
    }

    Ok(())
}

/// Optional page buttons that fake a clench or an open hand.
fn setup_test_buttons(document: &Document, flight: SharedFlight) -> Result<(), JsValue> {
    let hooks: [(&str, fn(&mut FrameLoop<WebBackend>)); 3] = [
        ("test-hand", FrameLoop::test_hand),
        ("test-clench", FrameLoop::simulate_clench),
        ("test-open", FrameLoop::simulate_open),
    ];
    for (id, hook) in hooks {
        let Some(button) = document.get_element_by_id(id) else {
            continue;
        };
        let flight = flight.clone();
        let click = Closure::wrap(Box::new(move |_e: Event| {
            hook(&mut flight.borrow_mut());
        }) as Box<dyn FnMut(Event)>);
        button.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
        click.forget();
    }
    Ok(())
}

fn js_error<E: Into<String>>(msg: E) -> JsValue {
    JsValue::from_str(&msg.into())
}

fn pipeline_error(err: JsValue) -> GestureError {
    GestureError::Pipeline(js_reason(&err))
}

/// Global constructor installed by a `<script>` tag, if it has run yet.
fn global_ctor(name: &str) -> Result<Function, GestureError> {
    let value = Reflect::get(&js_sys::global(), &JsValue::from_str(name)).map_err(pipeline_error)?;
    if value.is_undefined() || value.is_null() {
        return Err(GestureError::DependencyUnavailable(format!("`{name}` is not loaded")));
    }
    value
        .dyn_into::<Function>()
        .map_err(|_| GestureError::Pipeline(format!("`{name}` is not a constructor")))
}

fn call_method(target: &JsValue, method: &str, args: &Array) -> Result<JsValue, GestureError> {
    let func = Reflect::get(target, &JsValue::from_str(method))
        .map_err(pipeline_error)?
        .dyn_into::<Function>()
        .map_err(|_| GestureError::Pipeline(format!("`{method}` is not a function")))?;
    Reflect::apply(&func, target, args).map_err(pipeline_error)
}

fn js_object(fields: &[(&str, JsValue)]) -> JsValue {
    let object = Object::new();
    for (key, value) in fields {
        let _ = Reflect::set(&object, &JsValue::from_str(key), value);
    }
    object.into()
}

fn sleep(window: &Window, delay: Duration) -> JsFuture {
    let ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
    let promise = Promise::new(&mut |resolve, _reject| {
        let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms);
    });
    JsFuture::from(promise)
}

/// First hand of a MediaPipe results object, if any.
fn first_hand(results: &JsValue) -> Result<Option<HandLandmarks>, GestureError> {
    let all = Reflect::get(results, &JsValue::from_str("multiHandLandmarks")).map_err(pipeline_error)?;
    let Ok(all) = all.dyn_into::<Array>() else {
        return Ok(None);
    };
    if all.length() == 0 {
        return Ok(None);
    }
    let points = all
        .get(0)
        .dyn_into::<Array>()
        .map_err(|_| GestureError::Landmarks("hand is not a point list".into()))?;
    let coord = |point: &JsValue, axis: &str| {
        Reflect::get(point, &JsValue::from_str(axis))
            .ok()
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
            .ok_or_else(|| GestureError::Landmarks(format!("point without `{axis}`")))
    };
    let points = points
        .iter()
        .map(|p| -> Result<Vec2, GestureError> { Ok(Vec2::new(coord(&p, "x")?, coord(&p, "y")?)) })
        .collect::<Result<Vec<_>, GestureError>>()?;
    HandLandmarks::from_points(&points).map(Some)
}

/// Construct and configure `Hands`, wiring its results into the tracker.
fn create_hands(config: &GestureConfig, feed: &GestureSender) -> Result<JsValue, GestureError> {
    let hands_ctor = global_ctor("Hands")?;
    global_ctor("Camera")?;

    let locate = Closure::wrap(Box::new(|file: String| format!("{HANDS_CDN}/{file}")) as Box<dyn Fn(String) -> String>);
    let hands = Reflect::construct(
        &hands_ctor,
        &Array::of1(&js_object(&[("locateFile", locate.as_ref().clone())])),
    )
    .map_err(pipeline_error)?;
    locate.forget();

    let options = js_object(&[
        ("maxNumHands", JsValue::from(1)),
        ("modelComplexity", JsValue::from(0)),
        ("minDetectionConfidence", JsValue::from(0.7)),
        ("minTrackingConfidence", JsValue::from(0.7)),
    ]);
    call_method(&hands, "setOptions", &Array::of1(&options))?;

    let mut tracker = GestureTracker::new(config);
    let feed = feed.clone();
    let on_results = Closure::wrap(Box::new(move |results: JsValue| match first_hand(&results) {
        Ok(hand) => tracker.observe(hand.as_ref(), &feed),
        Err(e) => tracing::warn!("dropping hand tracking frame: {e}"),
    }) as Box<dyn FnMut(JsValue)>);
    call_method(&hands, "onResults", &Array::of1(on_results.as_ref()))?;
    on_results.forget();

    Ok(hands)
}

fn video_element(document: &Document) -> Result<Element, GestureError> {
    if let Some(video) = document.get_element_by_id("video-element") {
        return Ok(video);
    }
    let video = document.create_element("video").map_err(pipeline_error)?;
    video.set_attribute("playsinline", "").map_err(pipeline_error)?;
    video.set_attribute("style", "display:none").map_err(pipeline_error)?;
    if let Some(body) = document.body() {
        body.append_child(&video).map_err(pipeline_error)?;
    }
    Ok(video)
}

/// Ask for the webcam and start feeding frames into `hands`.
async fn start_camera(document: &Document, hands: JsValue) -> Result<(), GestureError> {
    let video: JsValue = video_element(document)?.into();

    let navigator = Reflect::get(&js_sys::global(), &JsValue::from_str("navigator")).map_err(pipeline_error)?;
    let media = Reflect::get(&navigator, &JsValue::from_str("mediaDevices")).map_err(pipeline_error)?;
    let permission = call_method(
        &media,
        "getUserMedia",
        &Array::of1(&js_object(&[("video", JsValue::TRUE)])),
    )?;
    JsFuture::from(permission.unchecked_into::<Promise>())
        .await
        .map_err(pipeline_error)?;

    let camera_ctor = global_ctor("Camera")?;
    let frame_video = video.clone();
    let on_frame = Closure::wrap(Box::new(move || {
        let input = js_object(&[("image", frame_video.clone())]);
        let sent = call_method(&hands, "send", &Array::of1(&input));
        // always resolves, a rejected send must not stall the camera pump
        let guarded = future_to_promise(async move {
            deliver_frame(async move {
                let pending = Promise::resolve(&sent?);
                JsFuture::from(pending).await.map_err(pipeline_error)?;
                Ok(())
            })
            .await;
            Ok(JsValue::UNDEFINED)
        });
        JsValue::from(guarded)
    }) as Box<dyn FnMut() -> JsValue>);
    let options = js_object(&[
        ("onFrame", on_frame.as_ref().clone()),
        ("width", JsValue::from(VIDEO_WIDTH)),
        ("height", JsValue::from(VIDEO_HEIGHT)),
    ]);
    let camera = Reflect::construct(&camera_ctor, &Array::of2(&video, &options)).map_err(pipeline_error)?;
    on_frame.forget();

    let started = call_method(&camera, "start", &Array::new())?;
    JsFuture::from(started.unchecked_into::<Promise>())
        .await
        .map_err(pipeline_error)?;
    Ok(())
}

async fn start_hand_tracking(window: Window, document: Document, config: GestureConfig, feed: GestureSender) {
    feed.send(GestureSignal::Status(HandStatus::Loading));
    let policy = RetryPolicy::new(&config);
    let hands = policy
        .run_async(
            || create_hands(&config, &feed),
            |delay| {
                let timer = sleep(&window, delay);
                async move {
                    let _ = timer.await;
                }
            },
        )
        .await;
    let hands = match hands {
        Ok(hands) => hands,
        Err(e) => {
            tracing::error!("hand tracking unavailable: {e}");
            feed.send(GestureSignal::Status(HandStatus::CameraDenied));
            return;
        }
    };

    match start_camera(&document, hands).await {
        Ok(()) => {
            tracing::info!("hand tracking camera started");
            feed.send(GestureSignal::Status(HandStatus::Ready));
        }
        Err(e) => {
            tracing::error!("camera initialization failed: {e}");
            feed.send(GestureSignal::Status(HandStatus::CameraDenied));
        }
    }
}

/// requestAnimationFrame driver that keeps re-arming itself.
struct RcCellCallback {
    inner: Rc<RefCell<Box<dyn FnMut()>>>,
    window: Window,
}

impl RcCellCallback {
    fn new(window: Window, f: impl FnMut() + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Box::new(f))),
            window,
        }
    }

    fn start(self) {
        let inner = self.inner.clone();
        let window = self.window.clone();

        let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
        let callback_clone = callback.clone();

        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            inner.borrow_mut().as_mut()();

            // Schedule next frame
            if let Some(cb) = callback_clone.borrow().as_ref() {
                if let Err(e) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    tracing::error!("requestAnimationFrame failed: {}", js_reason(&e));
                }
            }
        }) as Box<dyn FnMut()>));

        if let Some(cb) = callback.borrow().as_ref() {
            if let Err(e) = self.window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                tracing::error!("requestAnimationFrame failed to start: {}", js_reason(&e));
            }
        }

        // Leak the closure to keep it alive
        std::mem::forget(callback);
    }
}
