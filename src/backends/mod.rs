// SPDX-License-Identifier: GPL-3.0-only

//! Graph runtimes
//!
//! A [`GraphRuntime`] owns the actual media graph: it instantiates stages,
//! links them, drives state transitions and moves buffers in and out of the
//! application-side endpoints. The pipeline layer only talks to this trait,
//! so the same construction and control code runs on:
//!
//! - **GStreamer** (`gst`): production runtime, behind the `gstreamer` feature
//! - **Synthetic** (`synthetic`): in-process test-pattern producer used for
//!   headless runs and tests
//!
//! Runtimes call back into the application from their own threads (draw
//! callbacks) and report asynchronous events through a message queue that
//! the pipeline drains on the caller's thread.

#[cfg(feature = "gstreamer")]
pub mod gst;
pub mod synthetic;
pub mod types;

pub use synthetic::{SyntheticRuntime, SyntheticSettings};
pub use types::*;

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipelines::PipelineState;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Media graph runtime interface
///
/// All methods take `&self`; implementations synchronize internally so the
/// pipeline can share one runtime between the caller thread and handlers.
pub trait GraphRuntime: Send + Sync {
    /// Which implementation this is
    fn backend_type(&self) -> RuntimeBackend;

    /// Instantiate a stage and add it to the graph
    fn create_stage(&self, kind: &StageKind, name: &str) -> BackendResult<StageHandle>;

    /// Name the stage was created with
    fn stage_name(&self, stage: StageHandle) -> Option<String>;

    /// Connect two stages now
    fn link(&self, src: StageHandle, dest: StageHandle) -> BackendResult<()>;

    /// Connect `src` to `dest` once `src` has announced all of its output pads
    ///
    /// The link is made exactly once, from a runtime thread. A failure at
    /// that point is posted as [`RuntimeMessage::Error`].
    fn link_deferred(&self, src: StageHandle, dest: StageHandle) -> BackendResult<()>;

    /// Request a state transition
    fn set_state(&self, state: PipelineState) -> BackendResult<()>;

    /// Current state, waiting up to `timeout` for a pending transition
    fn current_state(&self, timeout: Duration) -> PipelineState;

    /// Blocking pull of the next sample from a capture sink
    ///
    /// Returns None on timeout, at end of stream or when not playing.
    fn pull_sample(
        &self,
        sink: StageHandle,
        timeout: Duration,
    ) -> BackendResult<Option<Box<dyn RuntimeSample>>>;

    /// Peek at the sample a paused capture sink is holding
    fn pull_preroll(
        &self,
        sink: StageHandle,
        timeout: Duration,
    ) -> BackendResult<Option<Box<dyn RuntimeSample>>>;

    /// Set the caps of an injection source
    fn set_source_caps(&self, src: StageHandle, caps: &FrameCaps) -> BackendResult<()>;

    /// Push one buffer into an injection source
    fn push_buffer(&self, src: StageHandle, data: &[u8]) -> BackendResult<()>;

    /// Register the per-frame draw callback of a compositor stage
    fn set_draw_callback(&self, compositor: StageHandle, callback: DrawCallback)
    -> BackendResult<()>;

    /// Native window a display sink should render into
    fn set_window_handle(&self, sink: StageHandle, handle: usize) -> BackendResult<()>;

    /// Next pending asynchronous message, without blocking
    fn pop_message(&self) -> Option<RuntimeMessage>;
}

/// Create the runtime selected by `config.backend`
pub fn create_runtime(config: &PipelineConfig, name: &str) -> PipelineResult<Arc<dyn GraphRuntime>> {
    info!(backend = %config.backend, name, "Creating graph runtime");

    match config.backend {
        #[cfg(feature = "gstreamer")]
        RuntimeBackend::GStreamer => {
            let runtime = gst::GstRuntime::new(name)
                .map_err(|e| PipelineError::Runtime(e.to_string()))?;
            Ok(Arc::new(runtime))
        }
        #[cfg(not(feature = "gstreamer"))]
        RuntimeBackend::GStreamer => Err(PipelineError::Runtime(
            "built without the gstreamer feature".to_string(),
        )),
        RuntimeBackend::Synthetic => Ok(Arc::new(SyntheticRuntime::new(
            name,
            config.synthetic.clone(),
        ))),
    }
}
