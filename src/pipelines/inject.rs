// SPDX-License-Identifier: GPL-3.0-only

//! Frame injection into the display branch

use crate::backends::{FrameCaps, GraphRuntime, StageHandle};
use crate::constants::timing;
use crate::frame::Frame;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// The application-side start of the display branch
#[derive(Debug)]
pub struct InjectionEndpoint {
    src: StageHandle,
    pushed: AtomicU64,
}

impl InjectionEndpoint {
    pub fn new(src: StageHandle) -> Self {
        Self {
            src,
            pushed: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> StageHandle {
        self.src
    }

    /// Frames pushed successfully so far
    pub fn pushed_count(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Push `frame` downstream
    ///
    /// Caps are set from the frame on every call, so consecutive frames may
    /// change size or format. Failures are logged, not returned.
    pub fn push(&self, runtime: &dyn GraphRuntime, frame: &Frame) {
        let caps = FrameCaps {
            format: frame.format(),
            width: frame.width(),
            height: frame.height(),
        };

        if let Err(e) = runtime.set_source_caps(self.src, &caps) {
            warn!(%caps, error = %e, "Failed to set injection caps");
            return;
        }

        match runtime.push_buffer(self.src, frame.data()) {
            Ok(()) => {
                let count = self.pushed.fetch_add(1, Ordering::Relaxed) + 1;
                if count % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(frames = count, %frame, "Frames pushed");
                }
            }
            Err(e) => warn!(%frame, error = %e, "Failed to push frame"),
        }
    }
}
