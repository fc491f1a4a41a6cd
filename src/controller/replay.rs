//! Native stand-in for the camera pipeline: streams recorded hand landmarks
//! from a JSON-lines file through the gesture feed on its own thread.
//!
//! Each line is either `null` (no hand in frame) or an array of 21 `[x, y]`
//! points in normalized image space.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use glam::Vec2;

use crate::config::GestureConfig;
use crate::controller::gesture::{GestureSender, GestureSignal, GestureTracker, HandLandmarks, HandStatus, RetryPolicy};
use crate::error::GestureError;

/// Decode one recorded frame. Blank lines are not frames.
pub fn parse_frame(line: &str) -> Result<Option<HandLandmarks>, GestureError> {
    let points: Option<Vec<[f32; 2]>> =
        serde_json::from_str(line).map_err(|e| GestureError::Landmarks(e.to_string()))?;
    match points {
        None => Ok(None),
        Some(points) => {
            let points: Vec<Vec2> = points.into_iter().map(Vec2::from).collect();
            HandLandmarks::from_points(&points).map(Some)
        }
    }
}

fn open(path: &Path) -> Result<File, GestureError> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => GestureError::DependencyUnavailable(format!("{} not found", path.display())),
        _ => GestureError::Pipeline(format!("{}: {e}", path.display())),
    })
}

#[derive(Debug, Clone)]
pub struct LandmarkReplay {
    pub path: PathBuf,
    /// Pause between frames, roughly the capture rate.
    pub frame_interval: Duration,
}

impl LandmarkReplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame_interval: Duration::from_millis(33),
        }
    }

    /// Push every frame of `reader` through `tracker`. Bad lines are logged
    /// and skipped.
    pub fn stream(
        &self,
        reader: impl BufRead,
        tracker: &mut GestureTracker,
        feed: &GestureSender,
        mut sleep: impl FnMut(Duration),
    ) {
        for (number, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(line = number + 1, "landmark replay read failed: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_frame(&line) {
                Ok(hand) => tracker.observe(hand.as_ref(), feed),
                Err(e) => tracing::warn!(line = number + 1, "skipping landmark frame: {e}"),
            }
            sleep(self.frame_interval);
        }
        tracing::info!(processed = tracker.processed(), "landmark replay finished");
    }

    /// Wait for the file to appear, then stream it on a background thread.
    pub fn spawn(self, config: &GestureConfig, feed: GestureSender) -> JoinHandle<()> {
        let policy = RetryPolicy::new(config);
        let mut tracker = GestureTracker::new(config);
        thread::spawn(move || {
            feed.send(GestureSignal::Status(HandStatus::Loading));
            match policy.run_blocking(|| open(&self.path), thread::sleep) {
                Ok(file) => {
                    feed.send(GestureSignal::Status(HandStatus::Ready));
                    self.stream(BufReader::new(file), &mut tracker, &feed, thread::sleep);
                }
                Err(e) => {
                    tracing::error!("landmark replay unavailable: {e}");
                    feed.send(GestureSignal::Status(HandStatus::CameraDenied));
                }
            }
        })
    }
}
