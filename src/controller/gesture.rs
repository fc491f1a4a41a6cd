//! Hand-gesture input: clench detection over tracked landmarks.
//!
//! The recognizer delivers frames on its own callback stream. Everything that
//! stream learns travels to the render tick as [`GestureSignal`]s over a
//! channel, so the tick never reads half-written input state.

use std::fmt;
use std::sync::mpsc;
use std::time::Duration;

use glam::Vec2;

use crate::config::GestureConfig;
use crate::error::GestureError;

/// Landmark indices in a 21-point hand model.
const WRIST: usize = 0;
const FINGERTIPS: [usize; 4] = [8, 12, 16, 20];
const HAND_POINTS: usize = 21;

/// The five points clench detection needs: the wrist and the index, middle,
/// ring and pinky tips, in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandLandmarks {
    pub wrist: Vec2,
    pub tips: [Vec2; 4],
}

impl HandLandmarks {
    pub fn new(wrist: Vec2, tips: [Vec2; 4]) -> Self {
        Self { wrist, tips }
    }

    /// Pick wrist and fingertips out of a full landmark set.
    pub fn from_points(points: &[Vec2]) -> Result<Self, GestureError> {
        if points.len() < HAND_POINTS {
            return Err(GestureError::Landmarks(format!(
                "expected {HAND_POINTS} points, got {}",
                points.len()
            )));
        }
        Ok(Self {
            wrist: points[WRIST],
            tips: FINGERTIPS.map(|i| points[i]),
        })
    }

    /// Mean 2D distance from each fingertip to the wrist.
    pub fn mean_tip_distance(&self) -> f32 {
        self.tips.iter().map(|tip| tip.distance(self.wrist)).sum::<f32>() / self.tips.len() as f32
    }

    pub fn is_clenched(&self, threshold: f32) -> bool {
        self.mean_tip_distance() < threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureTransition {
    /// open -> clenched: start moving forward
    Clenched,
    /// clenched -> open, or the hand left the frame
    Opened,
}

/// What the hand-status readout shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandStatus {
    Waiting,
    Loading,
    Ready,
    /// Ready went unanswered for a while.
    ShowHandToCamera,
    ShowHand,
    Detected,
    Clenched { keyboard_active: bool },
    Open { keyboard_active: bool },
    /// Timed test run from the page's test button.
    TestActive,
    TestComplete,
    CameraDenied,
    NotProcessing,
}

impl HandStatus {
    /// CSS color used by the web readout.
    pub fn color(&self) -> &'static str {
        match self {
            HandStatus::Waiting => "#555",
            HandStatus::Loading => "#ffaa00",
            HandStatus::Ready | HandStatus::Clenched { .. } | HandStatus::TestActive => "#00ff00",
            HandStatus::ShowHand => "#555",
            HandStatus::Detected | HandStatus::ShowHandToCamera | HandStatus::TestComplete => "#00e5ff",
            HandStatus::Open { .. } => "#ffff00",
            HandStatus::CameraDenied | HandStatus::NotProcessing => "#ff0000",
        }
    }
}

impl fmt::Display for HandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HandStatus::Waiting => "Waiting",
            HandStatus::Loading => "Loading hand tracking...",
            HandStatus::Ready => "Ready - Show Your Hand",
            HandStatus::ShowHandToCamera => "Show Hand to Camera",
            HandStatus::ShowHand => "Show Hand",
            HandStatus::Detected => "Detected - Try Clenching",
            HandStatus::Clenched { keyboard_active: true } => "Clenched - Hand + Keyboard Active",
            HandStatus::Clenched { keyboard_active: false } => "Clenched - Hand Control Active",
            HandStatus::Open { keyboard_active: true } => "Open - Keyboard Still Active",
            HandStatus::Open { keyboard_active: false } => "Open - Stopped",
            HandStatus::TestActive => "Test - Move Forward!",
            HandStatus::TestComplete => "Test Complete",
            HandStatus::CameraDenied => "Camera Access Denied",
            HandStatus::NotProcessing => "Camera Not Processing",
        };
        write!(f, "Hand Status: {text}")
    }
}

/// Messages from the gesture stream to the render tick.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureSignal {
    Transition(GestureTransition),
    Status(HandStatus),
    /// Telemetry after every processed video frame.
    Frames { processed: u64, mean_distance: Option<f32> },
}

/// Producer half, owned by the gesture callback stream.
#[derive(Debug, Clone)]
pub struct GestureSender(mpsc::Sender<GestureSignal>);

/// Consumer half, owned by the frame loop.
#[derive(Debug)]
pub struct GestureReceiver(mpsc::Receiver<GestureSignal>);

pub fn gesture_feed() -> (GestureSender, GestureReceiver) {
    let (tx, rx) = mpsc::channel();
    (GestureSender(tx), GestureReceiver(rx))
}

impl GestureSender {
    pub fn send(&self, signal: GestureSignal) {
        if self.0.send(signal).is_err() {
            tracing::debug!("frame loop gone, dropping gesture signal");
        }
    }
}

impl GestureReceiver {
    /// Everything queued since the last frame, oldest first.
    pub fn drain(&self) -> impl Iterator<Item = GestureSignal> + '_ {
        self.0.try_iter()
    }
}

/// Classifies landmark frames into clench/open transitions.
///
/// Only every `throttle`-th frame is classified. A frame without a hand
/// releases a clench straight away, whatever the throttle phase.
#[derive(Debug, Clone)]
pub struct GestureTracker {
    threshold: f32,
    throttle: u32,
    phase: u32,
    processed: u64,
    clenched: bool,
    last_distance: Option<f32>,
    last_status: Option<HandStatus>,
}

impl GestureTracker {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            threshold: config.clench_threshold,
            throttle: config.throttle.max(1),
            phase: 0,
            processed: 0,
            clenched: false,
            last_distance: None,
            last_status: None,
        }
    }

    pub fn is_clenched(&self) -> bool {
        self.clenched
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Feed one recognizer frame. Returns the transition it caused, if any.
    pub fn process(&mut self, hand: Option<&HandLandmarks>) -> Option<GestureTransition> {
        self.processed += 1;
        self.phase = (self.phase + 1) % self.throttle;

        let Some(hand) = hand else {
            self.last_distance = None;
            if self.clenched {
                self.clenched = false;
                return Some(GestureTransition::Opened);
            }
            return None;
        };

        if self.phase != 0 {
            return None;
        }

        let distance = hand.mean_tip_distance();
        self.last_distance = Some(distance);
        let was_clenched = self.clenched;
        self.clenched = distance < self.threshold;

        match (was_clenched, self.clenched) {
            (false, true) => Some(GestureTransition::Clenched),
            (true, false) => Some(GestureTransition::Opened),
            _ => None,
        }
    }

    /// [`process`](Self::process) and publish the outcome on `feed`.
    pub fn observe(&mut self, hand: Option<&HandLandmarks>, feed: &GestureSender) {
        let transition = self.process(hand);

        let status = match hand {
            None => Some(HandStatus::ShowHand),
            Some(_) if !self.clenched => Some(HandStatus::Detected),
            Some(_) => None,
        };
        if let Some(status) = status {
            if self.last_status != Some(status) {
                self.last_status = Some(status);
                feed.send(GestureSignal::Status(status));
            }
        }
        if let Some(transition) = transition {
            // frame loop owns the clenched/open readout
            self.last_status = None;
            feed.send(GestureSignal::Transition(transition));
        }
        feed.send(GestureSignal::Frames {
            processed: self.processed,
            mean_distance: self.last_distance,
        });
    }
}

/// Fixed-delay retry schedule for bringing the gesture pipeline up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(u64::from(config.initial_delay_ms)),
            retry_delay: Duration::from_millis(u64::from(config.retry_delay_ms)),
        }
    }

    /// Delay before attempt number `attempt` (0-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            self.initial_delay
        } else {
            self.retry_delay
        }
    }

    /// Decide whether a failed attempt is worth another try.
    fn retry_or_give_up(&self, attempt: u32, err: GestureError) -> Result<(), GestureError> {
        match err {
            GestureError::DependencyUnavailable(why) => {
                tracing::warn!(attempt, "gesture dependency not ready ({why}), retrying in {:?}", self.retry_delay);
                Ok(())
            }
            err => Err(err),
        }
    }

    /// Keep calling `try_start` until the dependency shows up. Never gives up on
    /// [`GestureError::DependencyUnavailable`]; any other error ends the loop.
    pub fn run_blocking<T>(
        &self,
        mut try_start: impl FnMut() -> Result<T, GestureError>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T, GestureError> {
        let mut attempt = 0u32;
        loop {
            sleep(self.delay_before(attempt));
            match try_start() {
                Ok(value) => return Ok(value),
                Err(err) => self.retry_or_give_up(attempt, err)?,
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// [`run_blocking`](Self::run_blocking) for event-loop platforms where
    /// waiting is a future (a browser timer).
    pub async fn run_async<T, F>(
        &self,
        mut try_start: impl FnMut() -> Result<T, GestureError>,
        mut sleep: impl FnMut(Duration) -> F,
    ) -> Result<T, GestureError>
    where
        F: std::future::Future<Output = ()>,
    {
        let mut attempt = 0u32;
        loop {
            sleep(self.delay_before(attempt)).await;
            match try_start() {
                Ok(value) => return Ok(value),
                Err(err) => self.retry_or_give_up(attempt, err)?,
            }
            attempt = attempt.saturating_add(1);
        }
    }
}

/// Await one frame hand-off to the recognizer. A failed hand-off is logged
/// and swallowed so the camera keeps pumping frames. Returns whether the frame
/// went through.
pub async fn deliver_frame<F>(send: F) -> bool
where
    F: std::future::Future<Output = Result<(), GestureError>>,
{
    match send.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("hand tracking frame failed: {e}");
            false
        }
    }
}

/// One-shot check that video frames actually arrive after the camera started.
#[derive(Debug, Clone, Copy)]
pub struct FrameWatchdog {
    deadline_ms: f64,
    armed_at: Option<f64>,
}

impl FrameWatchdog {
    pub fn new(deadline_ms: f64) -> Self {
        Self {
            deadline_ms,
            armed_at: None,
        }
    }

    pub fn arm(&mut self, now_ms: f64) {
        self.armed_at = Some(now_ms);
    }

    /// Fires once, when the deadline passes with zero frames processed.
    pub fn check(&mut self, now_ms: f64, processed: u64) -> Option<HandStatus> {
        let armed_at = self.armed_at?;
        if now_ms - armed_at < self.deadline_ms {
            return None;
        }
        self.armed_at = None;
        if processed == 0 {
            tracing::error!("no video frames processed {} ms after camera start", self.deadline_ms);
            Some(HandStatus::NotProcessing)
        } else {
            tracing::info!(processed, "hand tracking camera is delivering frames");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn hand_with_spread(d: f32) -> HandLandmarks {
        let wrist = Vec2::new(0.5, 0.5);
        HandLandmarks::new(
            wrist,
            [
                wrist + Vec2::new(d, 0.0),
                wrist + Vec2::new(0.0, d),
                wrist - Vec2::new(d, 0.0),
                wrist - Vec2::new(0.0, d),
            ],
        )
    }

    fn tracker(throttle: u32) -> GestureTracker {
        GestureTracker::new(&GestureConfig {
            throttle,
            ..Default::default()
        })
    }

    #[rstest]
    #[case(0.1, true)]
    #[case(0.24, true)]
    #[case(0.25, false)]
    #[case(0.4, false)]
    fn clench_threshold(#[case] spread: f32, #[case] clenched: bool) {
        let hand = hand_with_spread(spread);
        assert!((hand.mean_tip_distance() - spread).abs() < 1e-5);
        assert_eq!(hand.is_clenched(0.25), clenched);
    }

    #[test]
    fn picks_wrist_and_tips_from_full_set() {
        let points: Vec<Vec2> = (0..21).map(|i| Vec2::new(i as f32, 0.0)).collect();
        let hand = HandLandmarks::from_points(&points).unwrap();
        assert_eq!(hand.wrist, Vec2::ZERO);
        assert_eq!(hand.tips.map(|p| p.x as u32), [8, 12, 16, 20]);
    }

    #[test]
    fn short_landmark_set_is_rejected() {
        let points = vec![Vec2::ZERO; 5];
        assert!(matches!(
            HandLandmarks::from_points(&points),
            Err(GestureError::Landmarks(_))
        ));
    }

    #[test]
    fn only_every_third_frame_is_classified() {
        let mut t = tracker(3);
        let fist = hand_with_spread(0.1);
        assert_eq!(t.process(Some(&fist)), None);
        assert_eq!(t.process(Some(&fist)), None);
        assert_eq!(t.process(Some(&fist)), Some(GestureTransition::Clenched));
        assert_eq!(t.process(Some(&fist)), None);
        assert!(t.is_clenched());
        assert_eq!(t.processed(), 4);
    }

    #[test]
    fn frames_without_a_hand_count_toward_the_throttle() {
        let mut t = tracker(3);
        assert_eq!(t.process(None), None);
        assert_eq!(t.process(None), None);
        assert_eq!(t.process(Some(&hand_with_spread(0.1))), Some(GestureTransition::Clenched));
        assert_eq!(t.processed(), 3);
    }

    #[test]
    fn opening_the_hand_releases() {
        let mut t = tracker(1);
        assert_eq!(t.process(Some(&hand_with_spread(0.1))), Some(GestureTransition::Clenched));
        assert_eq!(t.process(Some(&hand_with_spread(0.1))), None);
        assert_eq!(t.process(Some(&hand_with_spread(0.4))), Some(GestureTransition::Opened));
    }

    #[test]
    fn losing_the_hand_releases_regardless_of_phase() {
        let mut t = tracker(3);
        let fist = hand_with_spread(0.1);
        for _ in 0..3 {
            t.process(Some(&fist));
        }
        assert!(t.is_clenched());
        // next frame would be skipped by the throttle, but no hand means stop now
        assert_eq!(t.process(None), Some(GestureTransition::Opened));
        assert_eq!(t.process(None), None);
    }

    #[test]
    fn observe_publishes_status_transition_and_telemetry() {
        let (tx, rx) = gesture_feed();
        let mut t = tracker(1);
        t.observe(Some(&hand_with_spread(0.4)), &tx);
        t.observe(Some(&hand_with_spread(0.4)), &tx);
        t.observe(Some(&hand_with_spread(0.1)), &tx);
        let signals: Vec<_> = rx.drain().collect();
        assert_eq!(signals[0], GestureSignal::Status(HandStatus::Detected));
        assert!(matches!(signals[1], GestureSignal::Frames { processed: 1, .. }));
        // unchanged status is not repeated
        assert!(matches!(signals[2], GestureSignal::Frames { processed: 2, .. }));
        assert_eq!(signals[3], GestureSignal::Transition(GestureTransition::Clenched));
        assert!(matches!(signals[4], GestureSignal::Frames { processed: 3, .. }));
    }

    #[test]
    fn retry_waits_out_missing_dependency() {
        let policy = RetryPolicy::new(&GestureConfig::default());
        let mut attempts = 0;
        let mut slept = Vec::new();
        let result = policy.run_blocking(
            || {
                attempts += 1;
                if attempts < 4 {
                    Err(GestureError::DependencyUnavailable("not loaded".into()))
                } else {
                    Ok(attempts)
                }
            },
            |d| slept.push(d),
        );
        assert_eq!(result, Ok(4));
        assert_eq!(
            slept,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(1000),
                Duration::from_millis(1000),
            ]
        );
    }

    #[test]
    fn retry_stops_on_pipeline_error() {
        let policy = RetryPolicy::new(&GestureConfig::default());
        let result: Result<(), _> =
            policy.run_blocking(|| Err(GestureError::Pipeline("boom".into())), |_| {});
        assert_eq!(result, Err(GestureError::Pipeline("boom".into())));
    }

    /// Poll a future that never actually waits.
    fn resolve<F: std::future::Future>(future: F) -> F::Output {
        use std::sync::Arc;
        use std::task::{Context, Poll, Wake, Waker};

        struct Idle;
        impl Wake for Idle {
            fn wake(self: Arc<Self>) {}
        }

        let waker = Waker::from(Arc::new(Idle));
        let mut cx = Context::from_waker(&waker);
        let mut future = std::pin::pin!(future);
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(out) => out,
            Poll::Pending => panic!("future was not ready"),
        }
    }

    #[test]
    fn rejected_frame_is_swallowed() {
        let failed = resolve(deliver_frame(async { Err(GestureError::Pipeline("send rejected".into())) }));
        assert!(!failed);
        assert!(resolve(deliver_frame(async { Ok(()) })));
    }

    #[test]
    fn async_retry_uses_the_same_schedule() {
        let policy = RetryPolicy::new(&GestureConfig::default());
        let mut attempts = 0;
        let mut slept = Vec::new();
        let result = resolve(policy.run_async(
            || {
                attempts += 1;
                if attempts < 2 {
                    Err(GestureError::DependencyUnavailable("not loaded".into()))
                } else {
                    Ok(attempts)
                }
            },
            |d| {
                slept.push(d);
                std::future::ready(())
            },
        ));
        assert_eq!(result, Ok(2));
        assert_eq!(slept, vec![Duration::from_millis(500), Duration::from_millis(1000)]);
    }

    #[test]
    fn watchdog_fires_once_without_frames() {
        let mut dog = FrameWatchdog::new(5000.0);
        assert_eq!(dog.check(10_000.0, 0), None);
        dog.arm(1000.0);
        assert_eq!(dog.check(3000.0, 0), None);
        assert_eq!(dog.check(6000.0, 0), Some(HandStatus::NotProcessing));
        assert_eq!(dog.check(9000.0, 0), None);
    }

    #[test]
    fn watchdog_is_quiet_when_frames_flow() {
        let mut dog = FrameWatchdog::new(5000.0);
        dog.arm(0.0);
        assert_eq!(dog.check(5000.0, 42), None);
    }

    #[test]
    fn status_text() {
        assert_eq!(
            HandStatus::Clenched { keyboard_active: true }.to_string(),
            "Hand Status: Clenched - Hand + Keyboard Active"
        );
        assert_eq!(HandStatus::ShowHand.to_string(), "Hand Status: Show Hand");
        assert_eq!(HandStatus::ShowHandToCamera.to_string(), "Hand Status: Show Hand to Camera");
    }
}
