// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline types and their builder

use crate::backends::{GraphRuntime, RuntimeMessage, StageHandle, create_runtime};
use crate::config::PipelineConfig;
use crate::display::{DisplaySurface, HeadlessDisplay, KeyAction};
use crate::errors::{PipelineError, PipelineResult};
use crate::frame::Frame;
use crate::overlays::{Overlay, OverlayId, OverlayList};
use crate::pipelines::{
    CaptureEndpoint, Endpoints, InjectionEndpoint, PipelineGraph, PipelineKind, PipelineState,
    StateController,
};
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Observer for runtime messages; sees every message before the pipeline
/// reacts to it
///
/// Runs on the thread calling `get_frame`. It must not call `get_frame` or
/// `process_events` itself.
pub type MessageHandler = Box<dyn FnMut(&RuntimeMessage) + Send>;

/// A running media graph with a capture endpoint
///
/// Dropping the pipeline stops it.
pub struct VideoPipeline {
    graph: PipelineGraph,
    controller: StateController,
    capture: CaptureEndpoint,
    handler: Mutex<Option<MessageHandler>>,
}

impl VideoPipeline {
    /// Wire up an assembled graph
    ///
    /// Fails with `MissingEndpoint` when the graph has no capture endpoint.
    pub fn new(
        graph: PipelineGraph,
        capture: Option<CaptureEndpoint>,
        display: Box<dyn DisplaySurface>,
        display_sink: Option<StageHandle>,
        config: &PipelineConfig,
    ) -> PipelineResult<Self> {
        let capture = capture.ok_or(PipelineError::MissingEndpoint("capture"))?;

        if let (Some(sink), Some(handle)) = (display_sink, display.window_handle()) {
            graph
                .runtime()
                .set_window_handle(sink, handle)
                .map_err(|e| PipelineError::Runtime(e.to_string()))?;
        }

        let controller = StateController::new(
            Arc::clone(graph.runtime()),
            display,
            config.state_timeout(),
        );

        Ok(Self {
            graph,
            controller,
            capture,
            handler: Mutex::new(None),
        })
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    pub fn runtime(&self) -> &Arc<dyn GraphRuntime> {
        self.graph.runtime()
    }

    pub fn capture(&self) -> &CaptureEndpoint {
        &self.capture
    }

    /// Register (or replace) the message observer
    pub fn set_message_handler(&self, handler: MessageHandler) {
        match self.handler.lock() {
            Ok(mut slot) => *slot = Some(handler),
            Err(poisoned) => *poisoned.into_inner() = Some(handler),
        }
    }

    pub fn start(&self) -> PipelineResult<()> {
        self.controller.start()
    }

    pub fn stop(&self) {
        self.controller.stop();
    }

    pub fn play(&self) -> PipelineResult<()> {
        self.controller.play()
    }

    pub fn pause(&self) -> PipelineResult<()> {
        self.controller.pause()
    }

    pub fn resume(&self) -> PipelineResult<()> {
        self.controller.resume()
    }

    pub fn toggle_pause(&self) -> PipelineResult<()> {
        self.controller.toggle_pause()
    }

    pub fn query_state(&self) -> PipelineState {
        self.controller.query_state()
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Whether `stop` has run; a stopped pipeline cannot be started again
    pub fn is_stopped(&self) -> bool {
        self.controller.is_stopped()
    }

    /// Start now and stop when the guard is dropped
    pub fn guard(&self) -> PipelineResult<PipelineGuard<'_>> {
        self.start()?;
        Ok(PipelineGuard { pipeline: self })
    }

    /// Run `f` between `start` and `stop`; stops on every exit path
    pub fn run_scoped<R>(&self, f: impl FnOnce() -> R) -> PipelineResult<R> {
        let _guard = self.guard()?;
        Ok(f())
    }

    /// Pump display input once and dispatch pending runtime messages
    pub fn process_events(&self) {
        let keys = self
            .controller
            .with_display(|display| display.process_pending_events());
        for key in keys {
            match key.action() {
                Some(KeyAction::Stop) => {
                    info!(?key, "Stop requested from display");
                    self.stop();
                }
                Some(KeyAction::TogglePause) => {
                    if let Err(e) = self.toggle_pause() {
                        warn!(error = %e, "Failed to toggle pause");
                    }
                }
                None => {}
            }
        }

        while let Some(message) = self.runtime().pop_message() {
            self.dispatch(message);
        }
    }

    fn dispatch(&self, message: RuntimeMessage) {
        {
            let mut handler = self
                .handler
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(handler) = handler.as_mut() {
                handler(&message);
            }
        }

        match &message {
            RuntimeMessage::EndOfStream => {
                info!("End of stream");
                self.stop();
            }
            RuntimeMessage::Error {
                source,
                message,
                debug: details,
            } => {
                error!(%source, %message, debug = details.as_deref().unwrap_or(""), "Runtime error");
                self.stop();
            }
            RuntimeMessage::Warning {
                source,
                message,
                debug: details,
            } => {
                warn!(%source, %message, debug = details.as_deref().unwrap_or(""), "Runtime warning");
            }
            RuntimeMessage::StateChanged { old, new } => {
                debug!(%old, %new, "Runtime state changed");
            }
            RuntimeMessage::SurfaceReady { stage, handle } => {
                debug!(%stage, handle, "Display surface ready");
                self.controller
                    .with_display(|display| display.attach_drawable(*handle));
            }
        }
    }

    /// Latest frame from the capture endpoint
    ///
    /// Returns None when the pipeline is stopped, when no frame arrives
    /// within the pull timeout, and when the pipeline is neither playing
    /// nor paused. While paused the preroll frame is returned.
    pub fn get_frame(&self) -> Option<Frame> {
        if !self.is_running() {
            warn!("get_frame on a pipeline that is not running");
            return None;
        }

        self.process_events();

        let _lock = self.controller.lock_pipeline();
        // stop() may have run while we waited for the lock
        if !self.is_running() {
            debug!("Pipeline stopped before pull");
            return None;
        }

        let state = self.controller.query_state();
        self.capture.acquire(self.runtime().as_ref(), state)
    }
}

impl Drop for VideoPipeline {
    fn drop(&mut self) {
        debug!("Dropping video pipeline");
        self.stop();
    }
}

/// Keeps a pipeline running for its lifetime
pub struct PipelineGuard<'a> {
    pipeline: &'a VideoPipeline,
}

impl Deref for PipelineGuard<'_> {
    type Target = VideoPipeline;

    fn deref(&self) -> &VideoPipeline {
        self.pipeline
    }
}

impl Drop for PipelineGuard<'_> {
    fn drop(&mut self) {
        self.pipeline.stop();
    }
}

/// Pipeline that draws overlays on the displayed video
pub struct OverlayPipeline {
    inner: VideoPipeline,
    overlays: OverlayList,
}

impl OverlayPipeline {
    /// Append an overlay; it is drawn on every frame until removed
    pub fn add_overlay(&self, overlay: Overlay) -> OverlayId {
        self.overlays.add(overlay)
    }

    /// Remove an overlay; fails if it was never added or is already gone
    pub fn remove_overlay(&self, id: OverlayId) -> PipelineResult<Overlay> {
        self.overlays.remove(id)
    }

    pub fn clear_overlay(&self) {
        self.overlays.clear();
    }

    /// Swap all overlays at once so no frame shows a partial update
    pub fn replace_overlays<I>(&self, overlays: I) -> Vec<OverlayId>
    where
        I: IntoIterator<Item = Overlay>,
    {
        self.overlays.replace(overlays)
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn overlays(&self) -> &OverlayList {
        &self.overlays
    }
}

impl Deref for OverlayPipeline {
    type Target = VideoPipeline;

    fn deref(&self) -> &VideoPipeline {
        &self.inner
    }
}

/// Pipeline whose display shows frames the application pushes
pub struct ProcessingPipeline {
    inner: VideoPipeline,
    injection: InjectionEndpoint,
}

impl ProcessingPipeline {
    /// Push a frame to the display
    pub fn put_frame(&self, frame: &Frame) {
        self.injection.push(self.inner.runtime().as_ref(), frame);
    }

    pub fn injection(&self) -> &InjectionEndpoint {
        &self.injection
    }
}

impl Deref for ProcessingPipeline {
    type Target = VideoPipeline;

    fn deref(&self) -> &VideoPipeline {
        &self.inner
    }
}

/// Builds overlay and processing pipelines from a [`PipelineConfig`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    runtime: Option<Arc<dyn GraphRuntime>>,
    display: Option<Box<dyn DisplaySurface>>,
    handler: Option<MessageHandler>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            runtime: None,
            display: None,
            handler: None,
        }
    }

    /// Use this runtime instead of creating one from the config
    pub fn runtime(mut self, runtime: Arc<dyn GraphRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Present to this surface; defaults to a headless display
    pub fn display(mut self, display: impl DisplaySurface + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    /// Observe every runtime message
    pub fn on_message(mut self, handler: impl FnMut(&RuntimeMessage) + Send + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn build_overlay(self) -> PipelineResult<OverlayPipeline> {
        let overlays = OverlayList::new();
        let draw = overlays.draw_callback();
        let (inner, endpoints) =
            self.build_with(PipelineKind::Overlay, |graph, config| {
                graph.assemble(PipelineKind::Overlay, config)
            })?;

        let compositor = endpoints
            .compositor
            .ok_or(PipelineError::MissingEndpoint("overlay compositor"))?;
        inner
            .runtime()
            .set_draw_callback(compositor, draw)
            .map_err(|e| PipelineError::Runtime(e.to_string()))?;

        Ok(OverlayPipeline { inner, overlays })
    }

    pub fn build_processing(self) -> PipelineResult<ProcessingPipeline> {
        let (inner, endpoints) =
            self.build_with(PipelineKind::Processing, |graph, config| {
                graph.assemble(PipelineKind::Processing, config)
            })?;

        let injection = endpoints
            .injection
            .ok_or(PipelineError::MissingEndpoint("injection"))?;
        Ok(ProcessingPipeline { inner, injection })
    }

    /// Build a pipeline from a custom graph
    ///
    /// `assemble` receives an empty graph and returns the endpoints it
    /// created. The capture endpoint is taken; the rest is handed back.
    pub fn build_with<F>(
        self,
        kind: PipelineKind,
        assemble: F,
    ) -> PipelineResult<(VideoPipeline, Endpoints)>
    where
        F: FnOnce(&mut PipelineGraph, &PipelineConfig) -> PipelineResult<Endpoints>,
    {
        self.config.validate()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => create_runtime(&self.config, kind.graph_name())?,
        };
        info!(
            pipeline = kind.graph_name(),
            backend = %runtime.backend_type(),
            "Building pipeline"
        );

        let mut graph = PipelineGraph::new(runtime);
        let mut endpoints = assemble(&mut graph, &self.config)?;

        let display = self
            .display
            .unwrap_or_else(|| Box::new(HeadlessDisplay::new()));
        let pipeline = VideoPipeline::new(
            graph,
            endpoints.capture.take(),
            display,
            endpoints.display_sink,
            &self.config,
        )?;
        if let Some(handler) = self.handler {
            pipeline.set_message_handler(handler);
        }

        Ok((pipeline, endpoints))
    }
}
