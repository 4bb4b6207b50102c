// SPDX-License-Identifier: GPL-3.0-only

//! Display without a window
//!
//! Clones share state, so a test can keep one clone to script key presses
//! and observe visibility while the pipeline owns another.

use super::{DisplaySurface, KeyPress};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    visible: bool,
    window_handle: Option<usize>,
    attached: Option<usize>,
    pending: VecDeque<KeyPress>,
    pumps: u64,
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessDisplay {
    state: Arc<Mutex<State>>,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend to own a native window with this handle
    pub fn with_window_handle(self, handle: usize) -> Self {
        self.lock().window_handle = Some(handle);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a key press for the next event pump
    pub fn press(&self, key: KeyPress) {
        self.lock().pending.push_back(key);
    }

    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    /// Handle passed to the last `attach_drawable`
    pub fn attached_handle(&self) -> Option<usize> {
        self.lock().attached
    }

    /// Number of times events were pumped
    pub fn pump_count(&self) -> u64 {
        self.lock().pumps
    }
}

impl DisplaySurface for HeadlessDisplay {
    fn process_pending_events(&mut self) -> Vec<KeyPress> {
        let mut state = self.lock();
        state.pumps += 1;
        state.pending.drain(..).collect()
    }

    fn window_handle(&self) -> Option<usize> {
        self.lock().window_handle
    }

    fn attach_drawable(&mut self, handle: usize) {
        debug!(handle, "Headless display attached");
        self.lock().attached = Some(handle);
    }

    fn show(&mut self) {
        self.lock().visible = true;
    }

    fn hide(&mut self) {
        self.lock().visible = false;
    }
}
