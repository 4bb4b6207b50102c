// SPDX-License-Identifier: GPL-3.0-only

//! In-process graph runtime
//!
//! Produces a moving test pattern on its own thread while the graph is
//! paused or playing. It follows the same contracts as the GStreamer
//! runtime:
//!
//! - capture sinks hold a single frame and drop the oldest
//! - a paused capture sink keeps its preroll frame for peeking
//! - compositor draw callbacks run once per frame on the producer thread
//! - deferred links fire once when the graph first leaves READY
//! - asynchronous events are queued for [`GraphRuntime::pop_message`]
//!
//! The runtime also records what was pushed into injection sources so the
//! processing path can be observed without a display.

use super::types::*;
use super::GraphRuntime;
use crate::constants::{capture, synthetic, timing};
use crate::errors::{PipelineError, PipelineResult};
use crate::frame::{Frame, PixelFormat};
use crate::overlays::PixelCanvas;
use crate::pipelines::PipelineState;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Test-pattern settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSettings {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    /// Post end-of-stream after this many frames; None runs forever
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            width: synthetic::DEFAULT_WIDTH,
            height: synthetic::DEFAULT_HEIGHT,
            framerate: synthetic::DEFAULT_FRAMERATE,
            frame_limit: None,
        }
    }
}

impl SyntheticSettings {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::Config(format!(
                "synthetic size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.framerate == 0 {
            return Err(PipelineError::Config(
                "synthetic framerate must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Duration of one frame in nanoseconds
    pub fn frame_duration_ns(&self) -> u64 {
        1_000_000_000 / self.framerate.max(1) as u64
    }
}

/// Broad class of data on a link, for negotiation checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Media {
    Encoded,
    Raw,
    Any,
}

impl Media {
    fn compatible(self, other: Media) -> bool {
        self == Media::Any || other == Media::Any || self == other
    }
}

struct Stage {
    name: String,
    kind: StageKind,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    draw: Option<DrawCallback>,
    window_handle: Option<usize>,
    source_caps: Option<FrameCaps>,
}

impl Stage {
    fn output_media(&self) -> Media {
        match &self.kind {
            StageKind::FileSource { .. } => Media::Encoded,
            StageKind::CapsFilter { caps } if !caps.is_raw() => Media::Encoded,
            StageKind::DeviceSource { .. } | StageKind::Queue { .. } | StageKind::Tee => {
                Media::Any
            }
            _ => Media::Raw,
        }
    }

    fn input_media(&self) -> Media {
        match &self.kind {
            StageKind::JpegDecoder | StageKind::Decoder => Media::Encoded,
            StageKind::CapsFilter { caps } if !caps.is_raw() => Media::Any,
            StageKind::Queue { .. } | StageKind::Tee => Media::Any,
            _ => Media::Raw,
        }
    }
}

#[derive(Default)]
struct Inner {
    stages: Vec<Stage>,
    /// Links waiting for their source's pads
    deferred: Vec<(usize, usize)>,
    state: PipelineState,
    /// Bumped on every start so a stale producer exits
    generation: u64,
    /// Newest unread frame per capture sink
    slots: HashMap<usize, Frame>,
    /// Frame a paused capture sink holds
    prerolls: HashMap<usize, Frame>,
    messages: VecDeque<RuntimeMessage>,
    eos: bool,
    frames_produced: u64,
    draw_passes: u64,
    injected: Vec<FrameCaps>,
    last_injected: Option<Frame>,
}

impl Inner {
    fn stage(&self, handle: StageHandle) -> BackendResult<&Stage> {
        self.stages
            .get(handle.0)
            .ok_or(BackendError::UnknownStage(handle))
    }

    fn is_streaming(&self) -> bool {
        matches!(self.state, PipelineState::Paused | PipelineState::Playing)
    }

    fn check_link(&self, src: usize, dest: usize, deferred: bool) -> BackendResult<()> {
        let s = &self.stages[src];
        let d = &self.stages[dest];

        if src == dest {
            return Err(BackendError::Rejected(format!("{} links to itself", s.name)));
        }
        if !s.kind.has_output() {
            return Err(BackendError::Rejected(format!("{} has no src pad", s.name)));
        }
        if !d.kind.has_input() {
            return Err(BackendError::Rejected(format!("{} has no sink pad", d.name)));
        }
        if s.kind.has_dynamic_output() && !deferred {
            return Err(BackendError::Rejected(format!(
                "{} has no src pad until it starts decoding",
                s.name
            )));
        }
        if !s.outputs.is_empty() && s.kind != StageKind::Tee {
            return Err(BackendError::Rejected(format!(
                "{} src pad is already linked",
                s.name
            )));
        }
        if !d.inputs.is_empty() {
            return Err(BackendError::Rejected(format!(
                "{} sink pad is already linked",
                d.name
            )));
        }
        if !self.upstream_media(src).compatible(d.input_media()) {
            return Err(BackendError::Rejected(format!(
                "{} and {} could not negotiate a format",
                s.name, d.name
            )));
        }
        Ok(())
    }

    /// What actually flows out of `stage`, looking through pass-through stages
    fn upstream_media(&self, stage: usize) -> Media {
        let mut current = stage;
        loop {
            let s = &self.stages[current];
            match s.kind {
                StageKind::Queue { .. } | StageKind::Tee => match s.inputs.first() {
                    Some(&input) => current = input,
                    None => return Media::Any,
                },
                _ => return s.output_media(),
            }
        }
    }

    fn connect(&mut self, src: usize, dest: usize) {
        self.stages[src].outputs.push(dest);
        self.stages[dest].inputs.push(src);
    }

    /// Pixel format a capture sink receives, pinned by the nearest raw caps filter
    fn sink_format(&self, sink: usize) -> PixelFormat {
        let mut current = sink;
        while let Some(&input) = self.stages[current].inputs.first() {
            if let StageKind::CapsFilter { caps } = &self.stages[input].kind
                && caps.is_raw()
                && let Some(format) = caps.format
            {
                return format;
            }
            current = input;
        }
        capture::DEFAULT_FORMAT
    }

    /// Whether a stage is fed by a source stage
    fn has_source_upstream(&self, stage: usize) -> bool {
        let mut current = stage;
        let mut hops = 0;
        while let Some(&input) = self.stages[current].inputs.first() {
            if !self.stages[input].kind.has_input() {
                return self.stages[input].kind != StageKind::InjectionSource;
            }
            current = input;
            hops += 1;
            if hops > self.stages.len() {
                break;
            }
        }
        false
    }

    fn fire_deferred_links(&mut self) {
        for (src, dest) in std::mem::take(&mut self.deferred) {
            match self.check_link(src, dest, true) {
                Ok(()) => {
                    debug!(
                        src = %self.stages[src].name,
                        dest = %self.stages[dest].name,
                        "Deferred link made"
                    );
                    self.connect(src, dest);
                }
                Err(e) => {
                    let err = PipelineError::link_failure(
                        self.stages[src].name.clone(),
                        self.stages[dest].name.clone(),
                    );
                    warn!(error = %e, "Deferred link failed");
                    self.messages.push_back(RuntimeMessage::Error {
                        source: self.stages[src].name.clone(),
                        message: err.to_string(),
                        debug: Some(e.to_string()),
                    });
                }
            }
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking draw callback must not wedge the graph
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A sample backed by an owned frame
struct FrameSample {
    frame: Frame,
}

impl RuntimeSample for FrameSample {
    fn caps(&self) -> Option<SampleCaps> {
        Some(SampleCaps {
            format: self.frame.format().as_str().to_string(),
            width: self.frame.width(),
            height: self.frame.height(),
            stride: None,
        })
    }

    fn data(&self) -> &[u8] {
        self.frame.data()
    }
}

/// In-process test-pattern runtime
pub struct SyntheticRuntime {
    name: String,
    settings: SyntheticSettings,
    shared: Arc<Shared>,
    producer: Mutex<Option<(ThreadId, JoinHandle<()>)>>,
    unavailable: Vec<&'static str>,
    refused_state: Option<PipelineState>,
}

impl SyntheticRuntime {
    pub fn new(name: &str, settings: SyntheticSettings) -> Self {
        debug!(name, ?settings, "Creating synthetic runtime");
        Self {
            name: name.to_string(),
            settings,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                changed: Condvar::new(),
            }),
            producer: Mutex::new(None),
            unavailable: Vec::new(),
            refused_state: None,
        }
    }

    /// Make stages backed by `factory` fail to create, like a missing plugin
    pub fn with_unavailable_stage(mut self, factory: &'static str) -> Self {
        self.unavailable.push(factory);
        self
    }

    /// Refuse every transition to `state`
    pub fn refusing_state(mut self, state: PipelineState) -> Self {
        self.refused_state = Some(state);
        self
    }

    pub fn settings(&self) -> &SyntheticSettings {
        &self.settings
    }

    /// Frames generated since creation
    pub fn frames_produced(&self) -> u64 {
        self.shared.lock().frames_produced
    }

    /// Completed compositor draw passes
    pub fn draw_passes(&self) -> u64 {
        self.shared.lock().draw_passes
    }

    /// Caps of every buffer pushed into an injection source, in order
    pub fn injected_caps(&self) -> Vec<FrameCaps> {
        self.shared.lock().injected.clone()
    }

    /// The most recent buffer pushed into an injection source
    pub fn last_injected_frame(&self) -> Option<Frame> {
        self.shared.lock().last_injected.clone()
    }

    fn start_producer(&self, inner: &mut Inner) -> BackendResult<()> {
        let mut producer = self
            .producer
            .lock()
            .map_err(|_| BackendError::Other("producer lock poisoned".to_string()))?;
        if producer.is_some() {
            return Ok(());
        }

        inner.generation += 1;
        let generation = inner.generation;
        let shared = Arc::clone(&self.shared);
        let settings = self.settings.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-src", self.name))
            .spawn(move || produce(shared, settings, generation))
            .map_err(|e| BackendError::Other(format!("failed to spawn producer: {}", e)))?;

        *producer = Some((handle.thread().id(), handle));
        Ok(())
    }

    fn stop_producer(&self) {
        let taken = match self.producer.lock() {
            Ok(mut producer) => producer.take(),
            Err(_) => None,
        };
        if let Some((id, handle)) = taken {
            // The producer may request NULL itself (e.g. from a draw callback)
            if id == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(name = %self.name, "Producer thread panicked");
            }
        }
    }
}

impl GraphRuntime for SyntheticRuntime {
    fn backend_type(&self) -> RuntimeBackend {
        RuntimeBackend::Synthetic
    }

    fn create_stage(&self, kind: &StageKind, name: &str) -> BackendResult<StageHandle> {
        if self.unavailable.contains(&kind.factory_name()) {
            return Err(BackendError::NotAvailable(format!(
                "no element \"{}\"",
                kind.factory_name()
            )));
        }

        let mut inner = self.shared.lock();
        if inner.stages.iter().any(|s| s.name == name) {
            return Err(BackendError::Rejected(format!(
                "name \"{}\" is already in use",
                name
            )));
        }

        let handle = StageHandle(inner.stages.len());
        inner.stages.push(Stage {
            name: name.to_string(),
            kind: kind.clone(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            draw: None,
            window_handle: None,
            source_caps: None,
        });
        trace!(name, factory = kind.factory_name(), "Stage created");
        Ok(handle)
    }

    fn stage_name(&self, stage: StageHandle) -> Option<String> {
        self.shared.lock().stage(stage).ok().map(|s| s.name.clone())
    }

    fn link(&self, src: StageHandle, dest: StageHandle) -> BackendResult<()> {
        let mut inner = self.shared.lock();
        inner.stage(src)?;
        inner.stage(dest)?;
        inner.check_link(src.0, dest.0, false)?;
        inner.connect(src.0, dest.0);
        Ok(())
    }

    fn link_deferred(&self, src: StageHandle, dest: StageHandle) -> BackendResult<()> {
        let mut inner = self.shared.lock();
        inner.stage(dest)?;
        if !inner.stage(src)?.kind.has_dynamic_output() {
            // Static pads exist already
            inner.check_link(src.0, dest.0, false)?;
            inner.connect(src.0, dest.0);
            return Ok(());
        }
        inner.deferred.push((src.0, dest.0));
        Ok(())
    }

    fn set_state(&self, state: PipelineState) -> BackendResult<()> {
        if self.refused_state == Some(state) {
            return Err(BackendError::Rejected(format!(
                "state change to {} failed",
                state
            )));
        }

        let mut inner = self.shared.lock();
        let old = inner.state;
        if old == state {
            return Ok(());
        }

        let was_streaming = inner.is_streaming();
        inner.state = state;
        inner
            .messages
            .push_back(RuntimeMessage::StateChanged { old, new: state });
        debug!(name = %self.name, %old, new = %state, "State changed");

        match state {
            PipelineState::Paused | PipelineState::Playing if !was_streaming => {
                inner.fire_deferred_links();
                let ready: Vec<_> = inner
                    .stages
                    .iter()
                    .filter_map(|s| s.window_handle.map(|h| (s.name.clone(), h)))
                    .collect();
                for (stage, handle) in ready {
                    inner
                        .messages
                        .push_back(RuntimeMessage::SurfaceReady { stage, handle });
                }
                self.start_producer(&mut inner)?;
            }
            PipelineState::Null | PipelineState::Ready => {
                inner.slots.clear();
                inner.prerolls.clear();
                inner.eos = false;
                drop(inner);
                self.shared.changed.notify_all();
                self.stop_producer();
                return Ok(());
            }
            _ => {}
        }

        drop(inner);
        self.shared.changed.notify_all();
        Ok(())
    }

    fn current_state(&self, _timeout: Duration) -> PipelineState {
        // Transitions complete synchronously
        self.shared.lock().state
    }

    fn pull_sample(
        &self,
        sink: StageHandle,
        timeout: Duration,
    ) -> BackendResult<Option<Box<dyn RuntimeSample>>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.lock();
        inner.stage(sink)?;

        loop {
            if inner.state != PipelineState::Playing {
                return Ok(None);
            }
            if let Some(frame) = inner.slots.remove(&sink.0) {
                return Ok(Some(Box::new(FrameSample { frame })));
            }
            if inner.eos {
                return Ok(None);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            inner = match self.shared.changed.wait_timeout(inner, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn pull_preroll(
        &self,
        sink: StageHandle,
        timeout: Duration,
    ) -> BackendResult<Option<Box<dyn RuntimeSample>>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.lock();
        inner.stage(sink)?;

        loop {
            if !inner.is_streaming() {
                return Ok(None);
            }
            if let Some(frame) = inner.prerolls.get(&sink.0) {
                return Ok(Some(Box::new(FrameSample {
                    frame: frame.clone(),
                })));
            }
            if inner.eos {
                return Ok(None);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            inner = match self.shared.changed.wait_timeout(inner, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn set_source_caps(&self, src: StageHandle, caps: &FrameCaps) -> BackendResult<()> {
        let mut inner = self.shared.lock();
        inner.stage(src)?;
        let stage = &mut inner.stages[src.0];
        if stage.kind != StageKind::InjectionSource {
            return Err(BackendError::Rejected(format!(
                "{} is not an injection source",
                stage.name
            )));
        }
        if stage.source_caps.as_ref() != Some(caps) {
            debug!(stage = %stage.name, %caps, "Injection caps changed");
        }
        stage.source_caps = Some(*caps);
        Ok(())
    }

    fn push_buffer(&self, src: StageHandle, data: &[u8]) -> BackendResult<()> {
        let mut inner = self.shared.lock();
        let stage = inner.stage(src)?;
        let caps = stage.source_caps.ok_or_else(|| {
            BackendError::Rejected(format!("{} has no caps (not-negotiated)", stage.name))
        })?;
        if !inner.is_streaming() {
            return Err(BackendError::Rejected(format!(
                "{} is flushing",
                inner.stages[src.0].name
            )));
        }

        let frame = Frame::new(caps.format, caps.width, caps.height, data.to_vec())
            .map_err(|e| BackendError::Rejected(e.to_string()))?;
        inner.injected.push(caps);
        inner.last_injected = Some(frame);
        Ok(())
    }

    fn set_draw_callback(
        &self,
        compositor: StageHandle,
        callback: DrawCallback,
    ) -> BackendResult<()> {
        let mut inner = self.shared.lock();
        inner.stage(compositor)?;
        let stage = &mut inner.stages[compositor.0];
        if !matches!(stage.kind, StageKind::Compositor { .. }) {
            return Err(BackendError::Rejected(format!(
                "{} is not a compositor",
                stage.name
            )));
        }
        stage.draw = Some(callback);
        Ok(())
    }

    fn set_window_handle(&self, sink: StageHandle, handle: usize) -> BackendResult<()> {
        let mut inner = self.shared.lock();
        inner.stage(sink)?;
        inner.stages[sink.0].window_handle = Some(handle);
        Ok(())
    }

    fn pop_message(&self) -> Option<RuntimeMessage> {
        self.shared.lock().messages.pop_front()
    }
}

impl Drop for SyntheticRuntime {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.lock();
            inner.state = PipelineState::Null;
        }
        self.shared.changed.notify_all();
        self.stop_producer();
    }
}

/// Fill an RGB test pattern for frame `n`
fn pattern(settings: &SyntheticSettings, n: u64) -> Frame {
    let (w, h) = (settings.width, settings.height);
    let mut data = vec![0u8; PixelFormat::Rgb.frame_size(w, h)];
    let shift = (n * 4) as u32;
    for (i, px) in data.chunks_exact_mut(3).enumerate() {
        let x = i as u32 % w;
        let y = i as u32 / w;
        px[0] = ((x * 255 / w.max(1) + shift) % 256) as u8;
        px[1] = (y * 255 / h.max(1)) as u8;
        px[2] = (n % 256) as u8;
    }
    Frame::new(PixelFormat::Rgb, w, h, data)
        .unwrap_or_else(|_| Frame::filled(PixelFormat::Rgb, w, h, [0, 0, 0, 255]))
}

/// Producer thread body
fn produce(shared: Arc<Shared>, settings: SyntheticSettings, generation: u64) {
    let interval = Duration::from_nanos(settings.frame_duration_ns());
    let duration_ns = settings.frame_duration_ns();
    let mut n: u64 = 0;
    info!(
        width = settings.width,
        height = settings.height,
        framerate = settings.framerate,
        "Synthetic producer started"
    );

    loop {
        let mut inner = shared.lock();
        if inner.generation != generation || !inner.is_streaming() || inner.eos {
            break;
        }

        // A paused graph holds its preroll and produces nothing more
        if inner.state == PipelineState::Paused && n > 0 {
            let (guard, _) = match shared.changed.wait_timeout(inner, interval) {
                Ok(r) => r,
                Err(poisoned) => poisoned.into_inner(),
            };
            drop(guard);
            continue;
        }

        let frame = pattern(&settings, n);
        let pts = n * duration_ns;

        let sinks: Vec<usize> = inner
            .stages
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s.kind, StageKind::CaptureSink { .. }))
            .map(|(i, _)| i)
            .filter(|&i| inner.has_source_upstream(i))
            .collect();
        for sink in sinks {
            let converted = frame.convert(inner.sink_format(sink));
            if inner.state == PipelineState::Playing {
                // Single slot: an unread frame is replaced
                inner.slots.insert(sink, converted.clone());
            }
            inner.prerolls.insert(sink, converted);
        }

        let callbacks: Vec<(PixelFormat, DrawCallback)> = inner
            .stages
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match (&s.kind, &s.draw) {
                (StageKind::Compositor { format }, Some(draw)) if inner.has_source_upstream(i) => {
                    Some((*format, Arc::clone(draw)))
                }
                _ => None,
            })
            .collect();

        inner.frames_produced += 1;
        n += 1;
        if let Some(limit) = settings.frame_limit
            && n >= limit
        {
            info!(frames = n, "Synthetic source reached end of stream");
            inner.eos = true;
            inner.messages.push_back(RuntimeMessage::EndOfStream);
        }
        let at_eos = inner.eos;
        drop(inner);
        shared.changed.notify_all();

        // Draw callbacks run without the graph lock, like a streaming thread
        for (format, draw) in callbacks {
            let surface = frame.convert(format);
            let mut data = surface.data().to_vec();
            let stride = surface.stride();
            let mut canvas =
                PixelCanvas::new(&mut data, frame.width(), frame.height(), stride, format);
            draw(&mut canvas, pts, duration_ns);
            shared.lock().draw_passes += 1;
        }

        if n % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(frames = n, "Synthetic frames produced");
        }
        if at_eos {
            break;
        }

        let inner = shared.lock();
        if inner.generation != generation || !inner.is_streaming() {
            break;
        }
        let _ = shared.changed.wait_timeout(inner, interval);
    }

    debug!(frames = n, "Synthetic producer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> SyntheticRuntime {
        SyntheticRuntime::new(
            "test",
            SyntheticSettings {
                width: 8,
                height: 6,
                framerate: 200,
                frame_limit: None,
            },
        )
    }

    #[test]
    fn test_sink_has_no_src_pad() {
        let rt = runtime();
        let sink = rt
            .create_stage(
                &StageKind::CaptureSink {
                    max_buffers: 1,
                    drop: true,
                },
                "sink",
            )
            .unwrap();
        let convert = rt.create_stage(&StageKind::Convert, "convert").unwrap();
        assert!(matches!(
            rt.link(sink, convert),
            Err(BackendError::Rejected(_))
        ));
    }

    #[test]
    fn test_raw_filter_does_not_feed_jpeg_decoder() {
        let rt = runtime();
        let caps = rt
            .create_stage(
                &StageKind::CapsFilter {
                    caps: CapsSpec::raw(PixelFormat::Rgb),
                },
                "caps",
            )
            .unwrap();
        let dec = rt.create_stage(&StageKind::JpegDecoder, "dec").unwrap();
        assert!(rt.link(caps, dec).is_err());
    }

    #[test]
    fn test_decoder_requires_deferred_link() {
        let rt = runtime();
        let dec = rt.create_stage(&StageKind::Decoder, "dec").unwrap();
        let convert = rt.create_stage(&StageKind::Convert, "convert").unwrap();
        assert!(rt.link(dec, convert).is_err());
        assert!(rt.link_deferred(dec, convert).is_ok());
    }

    #[test]
    fn test_duplicate_stage_name_rejected() {
        let rt = runtime();
        rt.create_stage(&StageKind::Convert, "convert").unwrap();
        assert!(rt.create_stage(&StageKind::Convert, "convert").is_err());
    }

    #[test]
    fn test_state_change_posts_message() {
        let rt = runtime();
        rt.set_state(PipelineState::Ready).unwrap();
        assert_eq!(
            rt.pop_message(),
            Some(RuntimeMessage::StateChanged {
                old: PipelineState::Null,
                new: PipelineState::Ready
            })
        );
        assert_eq!(rt.pop_message(), None);
    }

    #[test]
    fn test_push_requires_caps() {
        let rt = runtime();
        let src = rt
            .create_stage(&StageKind::InjectionSource, "src")
            .unwrap();
        rt.set_state(PipelineState::Playing).unwrap();
        assert!(rt.push_buffer(src, &[0u8; 12]).is_err());

        let caps = FrameCaps {
            format: PixelFormat::Rgb,
            width: 2,
            height: 2,
        };
        rt.set_source_caps(src, &caps).unwrap();
        assert!(rt.push_buffer(src, &[0u8; 12]).is_ok());
        assert!(rt.push_buffer(src, &[0u8; 11]).is_err());
        rt.set_state(PipelineState::Null).unwrap();
    }
}
