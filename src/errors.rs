// SPDX-License-Identifier: GPL-3.0-only

//! Error types for pipeline construction and control

use crate::overlays::OverlayId;
use crate::pipelines::PipelineState;
use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Default diagnostic used when a link fails and the caller gave none
pub const DEFAULT_LINK_DIAGNOSTIC: &str = "Failed to link elements {src} -> {dest}";

/// Main pipeline error type
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The runtime could not instantiate a stage (e.g. missing plugin)
    CreateFailure { stage: String, reason: String },
    /// Two stages could not be connected
    LinkFailure {
        src: String,
        dest: String,
        /// Message template; `{src}` and `{dest}` are replaced by the stage names
        diagnostic: Option<String>,
    },
    /// The runtime refused a requested state transition
    StateChangeFail(PipelineState),
    /// The pipeline was built without a required endpoint
    MissingEndpoint(&'static str),
    /// Frame data does not match its declared format and dimensions
    InvalidFrame(String),
    /// Overlay handle is not (or no longer) in the overlay list
    OverlayNotFound(OverlayId),
    /// Invalid or unreadable configuration
    Config(String),
    /// Graph runtime unavailable or failed to initialize
    Runtime(String),
    /// I/O errors (image files, config files)
    Io(String),
}

impl PipelineError {
    /// Build a link failure with the default diagnostic
    pub fn link_failure(src: impl Into<String>, dest: impl Into<String>) -> Self {
        PipelineError::LinkFailure {
            src: src.into(),
            dest: dest.into(),
            diagnostic: None,
        }
    }

    /// Whether this error was raised while building the graph
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            PipelineError::CreateFailure { .. }
                | PipelineError::LinkFailure { .. }
                | PipelineError::MissingEndpoint(_)
        )
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::CreateFailure { stage, reason } if reason.is_empty() => {
                write!(f, "Failed to create element {}", stage)
            }
            PipelineError::CreateFailure { stage, reason } => {
                write!(f, "Failed to create element {}: {}", stage, reason)
            }
            PipelineError::LinkFailure {
                src,
                dest,
                diagnostic,
            } => {
                let template = diagnostic.as_deref().unwrap_or(DEFAULT_LINK_DIAGNOSTIC);
                write!(
                    f,
                    "{}",
                    template.replace("{src}", src).replace("{dest}", dest)
                )
            }
            PipelineError::StateChangeFail(state) => {
                write!(f, "Unable to set pipeline to state {}", state)
            }
            PipelineError::MissingEndpoint(endpoint) => {
                write!(f, "Pipeline has no {} endpoint", endpoint)
            }
            PipelineError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            PipelineError::OverlayNotFound(id) => write!(f, "Overlay {} is not in the list", id),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PipelineError::Runtime(msg) => write!(f, "Graph runtime error: {}", msg),
            PipelineError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_failure_default_message() {
        let err = PipelineError::link_failure("capture_caps", "capture_sink");
        assert_eq!(
            err.to_string(),
            "Failed to link elements capture_caps -> capture_sink"
        );
    }

    #[test]
    fn test_link_failure_custom_diagnostic() {
        let err = PipelineError::LinkFailure {
            src: "source_caps".into(),
            dest: "source_jpeg_decode".into(),
            diagnostic: Some("Webcam {src} does not produce JPEG for {dest}".into()),
        };
        assert_eq!(
            err.to_string(),
            "Webcam source_caps does not produce JPEG for source_jpeg_decode"
        );
    }

    #[test]
    fn test_state_change_fail_names_state() {
        let err = PipelineError::StateChangeFail(PipelineState::Playing);
        assert_eq!(err.to_string(), "Unable to set pipeline to state PLAYING");
        assert!(!err.is_construction_error());
    }
}
