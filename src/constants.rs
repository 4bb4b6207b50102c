// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// How long a state query waits for the runtime to settle
    pub const STATE_QUERY_TIMEOUT: Duration = Duration::from_secs(1);

    /// Upper bound for a blocking frame pull; `stop()` waits at most this long
    /// behind an in-flight pull
    pub const PULL_TIMEOUT: Duration = Duration::from_secs(1);

    /// Log frame counters every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 100;

    /// Pause between frame loop iterations that produced nothing
    pub const IDLE_BACKOFF: Duration = Duration::from_millis(10);
}

/// Capture endpoint settings
pub mod capture {
    use crate::frame::PixelFormat;

    /// Pixel format delivered by `get_frame` unless configured otherwise
    pub const DEFAULT_FORMAT: PixelFormat = PixelFormat::Rgb;

    /// Queue in front of the capture sink holds a single frame
    pub const QUEUE_MAX_BUFFERS: u32 = 1;

    /// Capture sink holds a single frame and drops the oldest on overflow
    pub const SINK_MAX_BUFFERS: u32 = 1;
}

/// Webcam source capability bounds
pub mod webcam {
    /// Encoded format requested from the device
    pub const MEDIA_TYPE: &str = "image/jpeg";

    pub const MIN_WIDTH: u32 = 640;
    pub const MAX_WIDTH: u32 = 1280;
    pub const MIN_FRAMERATE: u32 = 10;
    pub const MAX_FRAMERATE: u32 = 30;
}

/// Overlay drawing constants
pub mod overlay {
    use crate::frame::PixelFormat;

    /// Stroke width of bounding boxes, also the text inset and padding unit
    pub const LINE_WIDTH: f64 = 8.0;

    /// Glyph height used for overlay text
    pub const TEXT_SIZE: f64 = LINE_WIDTH * 3.0;

    /// Padding added around each text line's measured extent
    pub const TEXT_PADDING: f64 = LINE_WIDTH;

    /// Pixel format of the compositor surface the draw callback paints on
    pub const SURFACE_FORMAT: PixelFormat = PixelFormat::Rgba;

    /// Queue in front of the compositor holds a single frame
    pub const QUEUE_MAX_BUFFERS: u32 = 1;
}

/// Synthetic runtime defaults
pub mod synthetic {
    pub const DEFAULT_WIDTH: u32 = 640;
    pub const DEFAULT_HEIGHT: u32 = 480;
    pub const DEFAULT_FRAMERATE: u32 = 30;
}

/// Stage names used when assembling pipelines
pub mod stages {
    pub const DEVICE_SOURCE: &str = "source_device";
    pub const DEVICE_CAPS: &str = "source_caps";
    pub const DEVICE_DECODE: &str = "source_jpeg_decode";
    pub const URI_DECODE: &str = "source_uri_decode";
    pub const FILE_SOURCE: &str = "source_file";
    pub const FILE_DECODE: &str = "source_decode";
    pub const SOURCE_CONVERT: &str = "source_convert";
    pub const SOURCE_TEE: &str = "source_tee";

    pub const CAPTURE_QUEUE: &str = "capture_queue";
    pub const CAPTURE_CONVERT: &str = "capture_convert";
    pub const CAPTURE_CAPS: &str = "capture_caps";
    pub const CAPTURE_SINK: &str = "capture_sink";

    pub const INJECT_SOURCE: &str = "inject_source";

    pub const OVERLAY_QUEUE: &str = "overlay_queue";
    pub const OVERLAY_CONVERT: &str = "overlay_convert";
    pub const OVERLAY_COMPOSITOR: &str = "overlay_compositor";

    pub const DISPLAY_CONVERT: &str = "display_convert";
    pub const DISPLAY_SINK: &str = "display_sink";
}

/// Application info
pub mod app_info {
    /// Version string from the build script
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_size_scales_with_line_width() {
        assert_eq!(overlay::TEXT_SIZE, 24.0);
        assert_eq!(overlay::TEXT_PADDING, overlay::LINE_WIDTH);
    }

    #[test]
    fn test_single_slot_capture() {
        assert_eq!(capture::QUEUE_MAX_BUFFERS, 1);
        assert_eq!(capture::SINK_MAX_BUFFERS, 1);
    }
}
