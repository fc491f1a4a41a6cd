// CONTROLLER: input arbitration, gesture feed, effects and the per-frame loop
pub mod input;
pub mod gesture;
pub mod effect;
pub mod frame_loop;
#[cfg(not(target_arch = "wasm32"))]
pub mod replay;

pub use input::{InputAggregator, InputEvent, InputProcessor, KeyBindings, KeyCommand, SourceKind};
pub use gesture::{gesture_feed, GestureReceiver, GestureSender, GestureTracker, HandLandmarks, HandStatus, RetryPolicy};
pub use effect::{EffectTrigger, FlameAnimator};
pub use frame_loop::{FlightScene, FrameLoop};
