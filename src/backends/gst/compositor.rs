// SPDX-License-Identifier: GPL-3.0-only

//! Overlay drawing on buffers passing a compositor stage
//!
//! The compositor is a capsfilter pinning the surface format. A buffer probe
//! on its source pad maps each frame writable and hands it to the registered
//! draw callback as a [`PixelCanvas`].

use crate::backends::types::DrawCallback;
use crate::frame::PixelFormat;
use crate::overlays::PixelCanvas;
use gstreamer::prelude::*;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Draw callback of one compositor, set after the stage is created
pub type DrawSlot = Arc<Mutex<Option<DrawCallback>>>;

/// Install the draw probe on `element`'s source pad
pub fn install(element: &gstreamer::Element) -> Option<DrawSlot> {
    let pad = element.static_pad("src")?;
    let slot: DrawSlot = Arc::new(Mutex::new(None));
    let probe_slot = Arc::clone(&slot);

    pad.add_probe(gstreamer::PadProbeType::BUFFER, move |pad, info| {
        draw_buffer(pad, info, &probe_slot);
        gstreamer::PadProbeReturn::Ok
    })?;

    Some(slot)
}

fn draw_buffer(pad: &gstreamer::Pad, info: &mut gstreamer::PadProbeInfo, slot: &DrawSlot) {
    let callback = slot
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    let Some(callback) = callback else {
        return;
    };

    let Some(caps) = pad.current_caps() else {
        return;
    };
    let video_info = match gstreamer_video::VideoInfo::from_caps(&caps) {
        Ok(info) => info,
        Err(e) => {
            warn!(error = %e, "Compositor caps are not raw video");
            return;
        }
    };
    let Ok(format) = video_info.format().to_str().parse::<PixelFormat>() else {
        warn!(format = %video_info.format(), "Compositor cannot draw on this format");
        return;
    };

    let Some(gstreamer::PadProbeData::Buffer(buffer)) = info.data.as_mut() else {
        return;
    };
    let timestamp = buffer.pts().map(|t| t.nseconds()).unwrap_or(0);
    let duration = buffer.duration().map(|t| t.nseconds()).unwrap_or(0);

    let buffer = buffer.make_mut();
    let mut frame =
        match gstreamer_video::VideoFrameRef::from_buffer_ref_writable(buffer, &video_info) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to map frame for drawing");
                return;
            }
        };

    let (width, height) = (frame.width(), frame.height());
    let stride = frame.plane_stride()[0] as usize;
    let Ok(data) = frame.plane_data_mut(0) else {
        return;
    };

    let mut canvas = PixelCanvas::new(data, width, height, stride, format);
    callback(&mut canvas, timestamp, duration);
}
