// SPDX-License-Identifier: GPL-3.0-only

//! Play / pause / stop state machine
//!
//! ```text
//! NULL ──start──▶ PLAYING ⇄ PAUSED
//!                    │         │
//!                    ▼         ▼
//!                 STOPPED (NULL, terminal)
//! ```
//!
//! A stopped controller refuses to play again; build a new pipeline to
//! resume.
//!
//! `stop` runs under the pipeline lock, the same lock frame pulls hold, so
//! once it returns no pull is in flight and every later pull sees the
//! pipeline as stopped.

use crate::backends::GraphRuntime;
use crate::display::DisplaySurface;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipelines::PipelineState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct StateController {
    runtime: Arc<dyn GraphRuntime>,
    display: Mutex<Box<dyn DisplaySurface>>,
    pipeline_lock: Mutex<()>,
    running: AtomicBool,
    stopped: AtomicBool,
    state_timeout: Duration,
}

impl StateController {
    pub fn new(
        runtime: Arc<dyn GraphRuntime>,
        display: Box<dyn DisplaySurface>,
        state_timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            display: Mutex::new(display),
            pipeline_lock: Mutex::new(()),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            state_timeout,
        }
    }

    /// Lock held by frame pulls and `stop`
    pub fn lock_pipeline(&self) -> MutexGuard<'_, ()> {
        self.pipeline_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access to the display surface
    pub fn with_display<R>(&self, f: impl FnOnce(&mut dyn DisplaySurface) -> R) -> R {
        let mut display = self
            .display
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut **display)
    }

    fn set_state(&self, state: PipelineState) -> PipelineResult<()> {
        self.runtime.set_state(state).map_err(|e| {
            warn!(%state, error = %e, "State change refused");
            PipelineError::StateChangeFail(state)
        })
    }

    /// Request PLAYING
    ///
    /// Fails with `StateChangeFail(Playing)` once `stop` has run.
    pub fn play(&self) -> PipelineResult<()> {
        if self.is_stopped() {
            warn!("Refusing to play a stopped pipeline");
            return Err(PipelineError::StateChangeFail(PipelineState::Playing));
        }
        self.set_state(PipelineState::Playing)
    }

    /// PLAYING to PAUSED; no-op in any other state
    pub fn pause(&self) -> PipelineResult<()> {
        if self.query_state() == PipelineState::Playing {
            debug!("Pausing pipeline");
            self.set_state(PipelineState::Paused)?;
        }
        Ok(())
    }

    /// PAUSED to PLAYING; no-op in any other state
    pub fn resume(&self) -> PipelineResult<()> {
        if self.query_state() == PipelineState::Paused {
            debug!("Resuming pipeline");
            self.play()?;
        }
        Ok(())
    }

    /// Flip between PLAYING and PAUSED; no-op in any other state
    pub fn toggle_pause(&self) -> PipelineResult<()> {
        match self.query_state() {
            PipelineState::Playing => self.set_state(PipelineState::Paused),
            PipelineState::Paused => self.play(),
            _ => Ok(()),
        }
    }

    /// Play, mark running and show the display
    pub fn start(&self) -> PipelineResult<()> {
        self.play()?;
        self.running.store(true, Ordering::SeqCst);
        self.with_display(|display| display.show());
        info!("Pipeline started");
        Ok(())
    }

    /// Return to NULL, hide the display and mark stopped for good
    ///
    /// Safe to call from any thread and any number of times.
    pub fn stop(&self) {
        let _guard = self.lock_pipeline();
        self.stopped.store(true, Ordering::SeqCst);

        if let Err(e) = self.runtime.set_state(PipelineState::Null) {
            warn!(error = %e, "Failed to set pipeline to NULL");
        }
        self.with_display(|display| display.hide());

        if self.running.swap(false, Ordering::SeqCst) {
            info!("Pipeline stopped");
        }
    }

    /// Current state after waiting for any pending transition to settle
    pub fn query_state(&self) -> PipelineState {
        self.runtime.current_state(self.state_timeout)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether `stop` has run; a stopped controller never plays again
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
