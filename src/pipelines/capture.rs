// SPDX-License-Identifier: GPL-3.0-only

//! Frame acquisition from the capture sink

use crate::backends::{GraphRuntime, RuntimeSample, StageHandle};
use crate::constants::timing;
use crate::frame::{Frame, PixelFormat};
use crate::pipelines::PipelineState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// The application-side end of the capture branch
#[derive(Debug)]
pub struct CaptureEndpoint {
    sink: StageHandle,
    format: PixelFormat,
    timeout: Duration,
    frames: AtomicU64,
}

impl CaptureEndpoint {
    pub fn new(sink: StageHandle, format: PixelFormat, timeout: Duration) -> Self {
        Self {
            sink,
            format,
            timeout,
            frames: AtomicU64::new(0),
        }
    }

    pub fn sink(&self) -> StageHandle {
        self.sink
    }

    /// Format the capture caps filter pins
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Frames delivered so far
    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Pull one frame appropriate for `state`
    ///
    /// PLAYING blocks for the next frame, PAUSED peeks at the preroll frame,
    /// anything else yields nothing. The caller must hold the pipeline lock.
    pub fn acquire(&self, runtime: &dyn GraphRuntime, state: PipelineState) -> Option<Frame> {
        let pulled = match state {
            PipelineState::Playing => runtime.pull_sample(self.sink, self.timeout),
            PipelineState::Paused => runtime.pull_preroll(self.sink, self.timeout),
            other => {
                debug!(state = %other, "No frame outside PLAYING and PAUSED");
                return None;
            }
        };

        let sample = match pulled {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                debug!(%state, timeout_ms = self.timeout.as_millis() as u64, "No sample available");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to pull sample");
                return None;
            }
        };

        let frame = frame_from_sample(sample.as_ref())?;
        let count = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if count % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(frames = count, %frame, "Frames captured");
        }
        Some(frame)
    }
}

/// Copy a runtime sample into a caller-owned frame
///
/// Row padding is stripped. Samples whose caps are missing, name an unknown
/// format or do not match the buffer size are logged and dropped.
pub fn frame_from_sample(sample: &dyn RuntimeSample) -> Option<Frame> {
    let Some(caps) = sample.caps() else {
        warn!("Sample has no readable caps");
        return None;
    };

    let format = match caps.format.parse::<PixelFormat>() {
        Ok(format) => format,
        Err(_) => {
            warn!(format = %caps.format, "Sample has an unsupported pixel format");
            return None;
        }
    };

    let stride = caps
        .stride
        .unwrap_or(caps.width as usize * format.bytes_per_pixel());
    match Frame::from_strided(format, caps.width, caps.height, stride, sample.data()) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "Sample does not match its caps");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SampleCaps;

    struct RawSample {
        caps: Option<SampleCaps>,
        data: Vec<u8>,
    }

    impl RuntimeSample for RawSample {
        fn caps(&self) -> Option<SampleCaps> {
            self.caps.clone()
        }

        fn data(&self) -> &[u8] {
            &self.data
        }
    }

    fn caps(format: &str, width: u32, height: u32, stride: Option<usize>) -> Option<SampleCaps> {
        Some(SampleCaps {
            format: format.to_string(),
            width,
            height,
            stride,
        })
    }

    #[test]
    fn test_sample_without_caps_is_dropped() {
        let sample = RawSample {
            caps: None,
            data: vec![0; 12],
        };
        assert!(frame_from_sample(&sample).is_none());
    }

    #[test]
    fn test_unknown_format_is_dropped() {
        let sample = RawSample {
            caps: caps("NV12", 2, 2, None),
            data: vec![0; 6],
        };
        assert!(frame_from_sample(&sample).is_none());
    }

    #[test]
    fn test_short_buffer_is_dropped() {
        let sample = RawSample {
            caps: caps("RGB", 2, 2, None),
            data: vec![0; 11],
        };
        assert!(frame_from_sample(&sample).is_none());
    }

    #[test]
    fn test_padded_rows_are_packed() {
        // 2x2 RGB with rows padded to 8 bytes
        let sample = RawSample {
            caps: caps("RGB", 2, 2, Some(8)),
            data: vec![1, 1, 1, 2, 2, 2, 0, 0, 3, 3, 3, 4, 4, 4, 0, 0],
        };
        let frame = frame_from_sample(&sample).unwrap();
        assert_eq!(frame.data(), &[1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }
}
