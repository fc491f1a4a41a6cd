use thiserror::Error;

/// An asset (rocket model, fire model, sound) could not be loaded.
///
/// Never fatal: the slot that requested it turns `Failed` and whatever
/// depends on it is simply skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to load asset `{path}`: {reason}")]
pub struct AssetError {
    pub path: String,
    pub reason: String,
}

impl AssetError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GestureError {
    /// The hand tracking dependency is not there yet. Startup keeps retrying.
    #[error("gesture dependency unavailable: {0}")]
    DependencyUnavailable(String),
    /// A single frame failed inside the capture/recognition pipeline.
    #[error("gesture pipeline error: {0}")]
    Pipeline(String),
    /// A landmark set did not have the expected shape.
    #[error("malformed landmarks: {0}")]
    Landmarks(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
