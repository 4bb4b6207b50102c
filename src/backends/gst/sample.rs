// SPDX-License-Identifier: GPL-3.0-only

//! Samples pulled from an appsink

use crate::backends::types::{RuntimeSample, SampleCaps};
use gstreamer::buffer::{MappedBuffer, Readable};
use tracing::warn;

/// A pulled sample with its buffer mapped for reading
///
/// The mapping is released when the sample is dropped.
pub struct GstSample {
    caps: Option<SampleCaps>,
    map: MappedBuffer<Readable>,
}

impl GstSample {
    /// Map the buffer of `sample`; None if it has no buffer or cannot be mapped
    pub fn new(sample: &gstreamer::Sample) -> Option<Self> {
        let caps = sample.caps().and_then(sample_caps);

        let buffer = sample.buffer_owned()?;
        match buffer.into_mapped_buffer_readable() {
            Ok(map) => Some(Self { caps, map }),
            Err(_) => {
                warn!("Failed to map sample buffer");
                None
            }
        }
    }
}

impl RuntimeSample for GstSample {
    fn caps(&self) -> Option<SampleCaps> {
        self.caps.clone()
    }

    fn data(&self) -> &[u8] {
        self.map.as_slice()
    }
}

fn sample_caps(caps: &gstreamer::CapsRef) -> Option<SampleCaps> {
    let info = match gstreamer_video::VideoInfo::from_caps(caps) {
        Ok(info) => info,
        Err(e) => {
            warn!(%caps, error = %e, "Caps are not raw video");
            return None;
        }
    };

    Some(SampleCaps {
        format: info.format().to_str().to_string(),
        width: info.width(),
        height: info.height(),
        stride: info.stride().first().map(|s| *s as usize),
    })
}
