// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer graph runtime
//!
//! Each stage is one element in a `gstreamer::Pipeline`. Capture sinks are
//! appsinks, injection sources are appsrcs and compositors are capsfilters
//! with a drawing probe (see [`compositor`]).

mod compositor;
mod sample;

pub use sample::GstSample;

use crate::backends::types::{
    BackendError, BackendResult, DrawCallback, FrameCaps, RuntimeBackend, RuntimeMessage,
    RuntimeSample, StageHandle, StageKind,
};
use crate::backends::GraphRuntime;
use crate::errors::PipelineError;
use crate::pipelines::PipelineState;
use compositor::DrawSlot;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSrc};
use gstreamer_video::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

struct Stage {
    name: String,
    kind: StageKind,
    element: gstreamer::Element,
    draw: Option<DrawSlot>,
}

type MessageQueue = Arc<Mutex<VecDeque<RuntimeMessage>>>;

/// Display sink name and the native window it should render into
type WindowTarget = Arc<Mutex<Option<(String, usize)>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn to_gst_state(state: PipelineState) -> gstreamer::State {
    match state {
        PipelineState::Null => gstreamer::State::Null,
        PipelineState::Ready => gstreamer::State::Ready,
        PipelineState::Paused => gstreamer::State::Paused,
        PipelineState::Playing => gstreamer::State::Playing,
    }
}

fn from_gst_state(state: gstreamer::State) -> PipelineState {
    match state {
        gstreamer::State::Ready => PipelineState::Ready,
        gstreamer::State::Paused => PipelineState::Paused,
        gstreamer::State::Playing => PipelineState::Playing,
        _ => PipelineState::Null,
    }
}

fn clock_time(timeout: Duration) -> gstreamer::ClockTime {
    gstreamer::ClockTime::from_nseconds(timeout.as_nanos() as u64)
}

/// GStreamer-backed [`GraphRuntime`]
pub struct GstRuntime {
    pipeline: gstreamer::Pipeline,
    stages: Mutex<Vec<Stage>>,
    /// Messages raised outside the bus: deferred link failures and
    /// window handle hand-offs
    messages: MessageQueue,
    window: WindowTarget,
}

impl GstRuntime {
    /// Initialise GStreamer and create an empty pipeline called `name`
    pub fn new(name: &str) -> BackendResult<Self> {
        gstreamer::init()
            .map_err(|e| BackendError::NotAvailable(format!("GStreamer init failed: {}", e)))?;

        let pipeline = gstreamer::Pipeline::with_name(name);
        let messages: MessageQueue = Arc::new(Mutex::new(VecDeque::new()));
        let window: WindowTarget = Arc::new(Mutex::new(None));

        let bus = pipeline
            .bus()
            .ok_or_else(|| BackendError::Other("No bus on pipeline".into()))?;
        let sync_messages = Arc::clone(&messages);
        let sync_window = Arc::clone(&window);
        bus.set_sync_handler(move |_bus, msg| {
            if gstreamer_video::is_video_overlay_prepare_window_handle_message(msg) {
                hand_over_window(msg, &sync_window, &sync_messages);
            }
            gstreamer::BusSyncReply::Pass
        });

        info!(name, "GStreamer pipeline created");
        Ok(Self {
            pipeline,
            stages: Mutex::new(Vec::new()),
            messages,
            window,
        })
    }

    fn element(&self, stage: StageHandle) -> BackendResult<gstreamer::Element> {
        lock(&self.stages)
            .get(stage.0)
            .map(|s| s.element.clone())
            .ok_or(BackendError::UnknownStage(stage))
    }

    fn stage_of_kind(
        &self,
        stage: StageHandle,
        accept: impl Fn(&StageKind) -> bool,
    ) -> BackendResult<gstreamer::Element> {
        let stages = lock(&self.stages);
        let entry = stages.get(stage.0).ok_or(BackendError::UnknownStage(stage))?;
        if !accept(&entry.kind) {
            return Err(BackendError::Rejected(format!(
                "{} is a {}",
                entry.name,
                entry.kind.factory_name()
            )));
        }
        Ok(entry.element.clone())
    }

    fn appsink(&self, sink: StageHandle) -> BackendResult<AppSink> {
        self.stage_of_kind(sink, |k| matches!(k, StageKind::CaptureSink { .. }))?
            .downcast::<AppSink>()
            .map_err(|_| BackendError::Other("Failed to downcast to AppSink".into()))
    }

    fn appsrc(&self, src: StageHandle) -> BackendResult<AppSrc> {
        self.stage_of_kind(src, |k| matches!(k, StageKind::InjectionSource))?
            .downcast::<AppSrc>()
            .map_err(|_| BackendError::Other("Failed to downcast to AppSrc".into()))
    }

    fn make_element(kind: &StageKind, name: &str) -> BackendResult<gstreamer::Element> {
        let factory = kind.factory_name();
        let element = gstreamer::ElementFactory::make(factory)
            .name(name)
            .build()
            .map_err(|e| BackendError::NotAvailable(format!("{}: {}", factory, e)))?;

        match kind {
            StageKind::FileSource { location } => {
                element.set_property("location", location.as_str())
            }
            StageKind::UriDecoder { uri } => element.set_property("uri", uri.as_str()),
            StageKind::DeviceSource { device } => {
                if let Some(device) = device {
                    element.set_property("device", device.as_str());
                }
            }
            StageKind::CapsFilter { caps } => {
                let caps = caps.to_string().parse::<gstreamer::Caps>().map_err(|e| {
                    BackendError::Rejected(format!("Invalid caps {}: {}", caps, e))
                })?;
                element.set_property("caps", &caps);
            }
            StageKind::Compositor { format } => {
                let caps = gstreamer::Caps::builder("video/x-raw")
                    .field("format", format.as_str())
                    .build();
                element.set_property("caps", &caps);
            }
            StageKind::Queue { max_buffers } => {
                element.set_property("max-size-buffers", *max_buffers);
            }
            StageKind::CaptureSink { max_buffers, drop } => {
                element.set_property("max-buffers", *max_buffers);
                element.set_property("drop", *drop);
                element.set_property("emit-signals", false);
            }
            StageKind::InjectionSource => {
                element.set_property("is-live", true);
                element.set_property("do-timestamp", true);
                element.set_property_from_str("format", "time");
            }
            StageKind::Decoder
            | StageKind::JpegDecoder
            | StageKind::Convert
            | StageKind::Tee
            | StageKind::DisplaySink => {}
        }

        Ok(element)
    }

    fn pull(
        &self,
        sink: StageHandle,
        timeout: Duration,
        preroll: bool,
    ) -> BackendResult<Option<Box<dyn RuntimeSample>>> {
        let appsink = self.appsink(sink)?;
        let pulled = if preroll {
            appsink.try_pull_preroll(clock_time(timeout))
        } else {
            appsink.try_pull_sample(clock_time(timeout))
        };

        Ok(pulled
            .as_ref()
            .and_then(GstSample::new)
            .map(|s| Box::new(s) as Box<dyn RuntimeSample>))
    }

    fn message_from_bus(&self, msg: &gstreamer::Message) -> Option<RuntimeMessage> {
        use gstreamer::MessageView;

        let source = || {
            msg.src()
                .map(|s| s.name().to_string())
                .unwrap_or_default()
        };

        match msg.view() {
            MessageView::Eos(_) => Some(RuntimeMessage::EndOfStream),
            MessageView::Error(err) => Some(RuntimeMessage::Error {
                source: source(),
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
            }),
            MessageView::Warning(w) => Some(RuntimeMessage::Warning {
                source: source(),
                message: w.error().to_string(),
                debug: w.debug().map(|d| d.to_string()),
            }),
            MessageView::StateChanged(change) => {
                // Only the pipeline's own transitions; children report theirs too
                if msg.src() != Some(self.pipeline.upcast_ref::<gstreamer::Object>()) {
                    return None;
                }
                Some(RuntimeMessage::StateChanged {
                    old: from_gst_state(change.old()),
                    new: from_gst_state(change.current()),
                })
            }
            _ => None,
        }
    }
}

/// Point the overlay that asked for a window at the registered handle
fn hand_over_window(msg: &gstreamer::MessageRef, window: &WindowTarget, messages: &MessageQueue) {
    let Some((stage, handle)) = lock(window).clone() else {
        return;
    };
    let Some(overlay) = msg
        .src()
        .and_then(|s| s.dynamic_cast_ref::<gstreamer_video::VideoOverlay>())
    else {
        return;
    };

    // SAFETY: the handle comes from the display surface, which keeps the
    // native window alive while the pipeline is running.
    unsafe {
        overlay.set_window_handle(handle);
    }
    debug!(%stage, handle, "Window handle set on video overlay");
    lock(messages).push_back(RuntimeMessage::SurfaceReady { stage, handle });
}

impl GraphRuntime for GstRuntime {
    fn backend_type(&self) -> RuntimeBackend {
        RuntimeBackend::GStreamer
    }

    fn create_stage(&self, kind: &StageKind, name: &str) -> BackendResult<StageHandle> {
        let element = Self::make_element(kind, name)?;
        self.pipeline
            .add(&element)
            .map_err(|e| BackendError::Rejected(format!("Failed to add {}: {}", name, e)))?;

        let draw = match kind {
            StageKind::Compositor { .. } => Some(compositor::install(&element).ok_or_else(
                || BackendError::Other(format!("Failed to install draw probe on {}", name)),
            )?),
            _ => None,
        };

        let mut stages = lock(&self.stages);
        stages.push(Stage {
            name: name.to_string(),
            kind: kind.clone(),
            element,
            draw,
        });
        debug!(name, factory = kind.factory_name(), "Stage created");
        Ok(StageHandle(stages.len() - 1))
    }

    fn stage_name(&self, stage: StageHandle) -> Option<String> {
        lock(&self.stages).get(stage.0).map(|s| s.name.clone())
    }

    fn link(&self, src: StageHandle, dest: StageHandle) -> BackendResult<()> {
        let (src, dest) = (self.element(src)?, self.element(dest)?);
        src.link(&dest)
            .map_err(|e| BackendError::Rejected(format!("{} -> {}: {}", src.name(), dest.name(), e)))
    }

    fn link_deferred(&self, src: StageHandle, dest: StageHandle) -> BackendResult<()> {
        let (src, dest) = (self.element(src)?, self.element(dest)?);
        if src == dest {
            return Err(BackendError::Rejected(format!(
                "{} cannot link to itself",
                src.name()
            )));
        }

        let linked = AtomicBool::new(false);
        let dest = dest.downgrade();
        let messages = Arc::clone(&self.messages);
        src.connect_no_more_pads(move |src| {
            if linked.swap(true, Ordering::SeqCst) {
                return;
            }
            let Some(dest) = dest.upgrade() else {
                return;
            };
            match src.link(&dest) {
                Ok(()) => debug!(src = %src.name(), dest = %dest.name(), "Deferred link made"),
                Err(e) => {
                    let err = PipelineError::link_failure(src.name(), dest.name());
                    warn!(error = %e, "Deferred link failed");
                    lock(&messages).push_back(RuntimeMessage::Error {
                        source: src.name().to_string(),
                        message: err.to_string(),
                        debug: Some(e.to_string()),
                    });
                }
            }
        });
        Ok(())
    }

    fn set_state(&self, state: PipelineState) -> BackendResult<()> {
        self.pipeline
            .set_state(to_gst_state(state))
            .map(|_| ())
            .map_err(|e| BackendError::Rejected(format!("Failed to set {}: {}", state, e)))
    }

    fn current_state(&self, timeout: Duration) -> PipelineState {
        let (_result, current, _pending) = self.pipeline.state(clock_time(timeout));
        from_gst_state(current)
    }

    fn pull_sample(
        &self,
        sink: StageHandle,
        timeout: Duration,
    ) -> BackendResult<Option<Box<dyn RuntimeSample>>> {
        self.pull(sink, timeout, false)
    }

    fn pull_preroll(
        &self,
        sink: StageHandle,
        timeout: Duration,
    ) -> BackendResult<Option<Box<dyn RuntimeSample>>> {
        self.pull(sink, timeout, true)
    }

    fn set_source_caps(&self, src: StageHandle, caps: &FrameCaps) -> BackendResult<()> {
        let appsrc = self.appsrc(src)?;
        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", caps.format.as_str())
            .field("width", caps.width as i32)
            .field("height", caps.height as i32)
            .field("framerate", gstreamer::Fraction::new(0, 1))
            .build();
        appsrc.set_caps(Some(&caps));
        Ok(())
    }

    fn push_buffer(&self, src: StageHandle, data: &[u8]) -> BackendResult<()> {
        let appsrc = self.appsrc(src)?;
        let buffer = gstreamer::Buffer::from_mut_slice(data.to_vec());
        appsrc
            .push_buffer(buffer)
            .map(|_| ())
            .map_err(|e| BackendError::Rejected(format!("Failed to push buffer: {:?}", e)))
    }

    fn set_draw_callback(
        &self,
        compositor: StageHandle,
        callback: DrawCallback,
    ) -> BackendResult<()> {
        let stages = lock(&self.stages);
        let stage = stages
            .get(compositor.0)
            .ok_or(BackendError::UnknownStage(compositor))?;
        let slot = stage
            .draw
            .as_ref()
            .ok_or_else(|| BackendError::Rejected(format!("{} does not draw", stage.name)))?;
        *lock(slot) = Some(callback);
        Ok(())
    }

    fn set_window_handle(&self, sink: StageHandle, handle: usize) -> BackendResult<()> {
        self.stage_of_kind(sink, |k| matches!(k, StageKind::DisplaySink))?;
        let name = self.stage_name(sink).unwrap_or_default();
        *lock(&self.window) = Some((name, handle));
        Ok(())
    }

    fn pop_message(&self) -> Option<RuntimeMessage> {
        if let Some(message) = lock(&self.messages).pop_front() {
            return Some(message);
        }

        let bus = self.pipeline.bus()?;
        while let Some(msg) = bus.pop() {
            if let Some(message) = self.message_from_bus(&msg) {
                return Some(message);
            }
        }
        None
    }
}

impl Drop for GstRuntime {
    fn drop(&mut self) {
        debug!("Dropping GStreamer runtime");
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            error!(?e, "Failed to set pipeline to Null on drop");
        }
        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        }
    }
}
