// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for graph runtimes

use crate::frame::PixelFormat;
use crate::overlays::DrawContext;
use crate::pipelines::PipelineState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Result type alias using BackendError
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for runtime operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// A stage kind (or the whole runtime) is not available on this system
    NotAvailable(String),
    /// A stage handle that this runtime never handed out
    UnknownStage(StageHandle),
    /// The runtime refused a link, a state change or a buffer
    Rejected(String),
    /// Other errors
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Not available: {}", msg),
            BackendError::UnknownStage(handle) => write!(f, "Unknown stage {}", handle.0),
            BackendError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Graph runtime implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeBackend {
    /// GStreamer media graph
    GStreamer,
    /// In-process test-pattern producer
    Synthetic,
}

impl Default for RuntimeBackend {
    /// GStreamer when compiled in, synthetic otherwise
    fn default() -> Self {
        if cfg!(feature = "gstreamer") {
            RuntimeBackend::GStreamer
        } else {
            RuntimeBackend::Synthetic
        }
    }
}

impl fmt::Display for RuntimeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeBackend::GStreamer => write!(f, "GStreamer"),
            RuntimeBackend::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Opaque reference to a stage inside one runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageHandle(pub usize);

/// Caps for a caps-filter stage
///
/// Renders as a runtime caps string, e.g.
/// `image/jpeg,framerate=[10/1,30/1],width=[640,1280]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsSpec {
    pub media_type: String,
    pub format: Option<PixelFormat>,
    pub width: Option<(u32, u32)>,
    pub height: Option<(u32, u32)>,
    pub framerate: Option<(u32, u32)>,
}

impl CapsSpec {
    /// Raw video restricted to exactly one pixel format
    pub fn raw(format: PixelFormat) -> Self {
        Self {
            media_type: "video/x-raw".to_string(),
            format: Some(format),
            width: None,
            height: None,
            framerate: None,
        }
    }

    /// Encoded video with width and framerate bounds
    pub fn encoded(media_type: &str, width: (u32, u32), framerate: (u32, u32)) -> Self {
        Self {
            media_type: media_type.to_string(),
            format: None,
            width: Some(width),
            height: None,
            framerate: Some(framerate),
        }
    }

    pub fn is_raw(&self) -> bool {
        self.media_type == "video/x-raw"
    }
}

impl fmt::Display for CapsSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.media_type)?;
        if let Some(format) = self.format {
            write!(f, ",format={}", format)?;
        }
        if let Some((min, max)) = self.framerate {
            write!(f, ",framerate=[{}/1,{}/1]", min, max)?;
        }
        if let Some((min, max)) = self.width {
            write!(f, ",width=[{},{}]", min, max)?;
        }
        if let Some((min, max)) = self.height {
            write!(f, ",height=[{},{}]", min, max)?;
        }
        Ok(())
    }
}

/// What a stage does; each runtime maps kinds to its own elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageKind {
    /// Reads bytes from a file
    FileSource { location: String },
    /// Source and decoder for a URI; its output pad appears at runtime
    UriDecoder { uri: String },
    /// Generic decoder; its output pad appears at runtime
    Decoder,
    /// Webcam; None selects the default device
    DeviceSource { device: Option<String> },
    CapsFilter { caps: CapsSpec },
    JpegDecoder,
    Queue { max_buffers: u32 },
    /// Pixel format conversion
    Convert,
    /// Application-side frame pull endpoint
    CaptureSink { max_buffers: u32, drop: bool },
    /// Application-side frame push endpoint
    InjectionSource,
    /// Fan-out to several branches
    Tee,
    /// Calls the registered draw callback on every frame
    Compositor { format: PixelFormat },
    /// Platform video output
    DisplaySink,
}

impl StageKind {
    /// GStreamer element factory backing this kind
    pub fn factory_name(&self) -> &'static str {
        match self {
            StageKind::FileSource { .. } => "filesrc",
            StageKind::UriDecoder { .. } => "uridecodebin",
            StageKind::Decoder => "decodebin",
            StageKind::DeviceSource { .. } => "v4l2src",
            StageKind::CapsFilter { .. } => "capsfilter",
            StageKind::JpegDecoder => "jpegdec",
            StageKind::Queue { .. } => "queue",
            StageKind::Convert => "videoconvert",
            StageKind::CaptureSink { .. } => "appsink",
            StageKind::InjectionSource => "appsrc",
            StageKind::Tee => "tee",
            // Drawing happens in a buffer probe on a format-pinning capsfilter
            StageKind::Compositor { .. } => "capsfilter",
            StageKind::DisplaySink => "autovideosink",
        }
    }

    /// Output pads are created while the stream is being decoded
    pub fn has_dynamic_output(&self) -> bool {
        matches!(self, StageKind::UriDecoder { .. } | StageKind::Decoder)
    }

    pub fn has_input(&self) -> bool {
        !matches!(
            self,
            StageKind::FileSource { .. }
                | StageKind::UriDecoder { .. }
                | StageKind::DeviceSource { .. }
                | StageKind::InjectionSource
        )
    }

    pub fn has_output(&self) -> bool {
        !matches!(self, StageKind::CaptureSink { .. } | StageKind::DisplaySink)
    }
}

/// Caps applied to an injection source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCaps {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

impl FrameCaps {
    pub fn frame_size(&self) -> usize {
        self.format.frame_size(self.width, self.height)
    }
}

impl fmt::Display for FrameCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "video/x-raw,format={},width={},height={},framerate=0/1",
            self.format, self.width, self.height
        )
    }
}

/// Caps as read back from a pulled sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCaps {
    /// Runtime format name, possibly one the crate does not model
    pub format: String,
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes when the runtime pads rows
    pub stride: Option<usize>,
}

/// A sample pulled from a capture sink
///
/// The data stays owned by the runtime until the sample is dropped.
pub trait RuntimeSample: Send {
    /// Caps of the sample; None when the runtime could not describe it
    fn caps(&self) -> Option<SampleCaps>;

    /// Raw bytes of the sample's buffer
    fn data(&self) -> &[u8];
}

/// Asynchronous notification from a runtime
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeMessage {
    EndOfStream,
    Error {
        source: String,
        message: String,
        debug: Option<String>,
    },
    Warning {
        source: String,
        message: String,
        debug: Option<String>,
    },
    StateChanged {
        old: PipelineState,
        new: PipelineState,
    },
    /// A display sink is ready to render into the given native window
    SurfaceReady { stage: String, handle: usize },
}

impl fmt::Display for RuntimeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMessage::EndOfStream => write!(f, "end of stream"),
            RuntimeMessage::Error {
                source, message, ..
            } => write!(f, "error from {}: {}", source, message),
            RuntimeMessage::Warning {
                source, message, ..
            } => write!(f, "warning from {}: {}", source, message),
            RuntimeMessage::StateChanged { old, new } => {
                write!(f, "state changed {} -> {}", old, new)
            }
            RuntimeMessage::SurfaceReady { stage, handle } => {
                write!(f, "{} ready for window {:#x}", stage, handle)
            }
        }
    }
}

/// Per-frame draw callback: `(surface, timestamp_ns, duration_ns)`
pub type DrawCallback = Arc<dyn Fn(&mut dyn DrawContext, u64, u64) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webcam_caps_string() {
        let caps = CapsSpec::encoded("image/jpeg", (640, 1280), (10, 30));
        assert_eq!(
            caps.to_string(),
            "image/jpeg,framerate=[10/1,30/1],width=[640,1280]"
        );
    }

    #[test]
    fn test_raw_caps_string() {
        assert_eq!(
            CapsSpec::raw(PixelFormat::Rgb).to_string(),
            "video/x-raw,format=RGB"
        );
    }

    #[test]
    fn test_pad_shape() {
        assert!(!StageKind::CaptureSink {
            max_buffers: 1,
            drop: true
        }
        .has_output());
        assert!(!StageKind::InjectionSource.has_input());
        assert!(StageKind::Decoder.has_dynamic_output());
        assert!(!StageKind::Convert.has_dynamic_output());
    }
}
