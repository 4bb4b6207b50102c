// SPDX-License-Identifier: GPL-3.0-only

//! Terminal key input
//!
//! The video itself goes to the runtime's own display sink; the terminal
//! only supplies the keyboard. Raw mode is on while the surface is shown so
//! single key presses arrive without Enter.

use super::{DisplaySurface, KeyPress};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, warn};

pub struct TerminalDisplay {
    title: String,
    raw_mode: bool,
}

impl TerminalDisplay {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            raw_mode: false,
        }
    }

    fn restore(&mut self) {
        if self.raw_mode {
            if let Err(e) = disable_raw_mode() {
                warn!(error = %e, "Failed to leave raw terminal mode");
            }
            self.raw_mode = false;
        }
    }
}

impl DisplaySurface for TerminalDisplay {
    fn process_pending_events(&mut self) -> Vec<KeyPress> {
        let mut keys = Vec::new();
        if !self.raw_mode {
            return keys;
        }

        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!(error = %e, "Terminal poll failed");
                    break;
                }
            }

            let key = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "Terminal read failed");
                    break;
                }
            };

            match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    keys.push(KeyPress::Interrupt)
                }
                KeyCode::Char(c) => keys.push(KeyPress::Char(c)),
                KeyCode::Esc => keys.push(KeyPress::Escape),
                _ => {}
            }
        }
        keys
    }

    fn window_handle(&self) -> Option<usize> {
        None
    }

    fn attach_drawable(&mut self, handle: usize) {
        debug!(handle, "Terminal display ignores native window");
    }

    fn show(&mut self) {
        if self.raw_mode {
            return;
        }
        // Raw mode needs explicit carriage returns
        let mut stdout = io::stdout();
        if let Err(e) = write!(stdout, "{}: q/Esc quit, p/space pause\r\n", self.title)
            .and_then(|()| stdout.flush())
        {
            warn!(error = %e, "Failed to print key help");
        }

        match enable_raw_mode() {
            Ok(()) => self.raw_mode = true,
            Err(e) => warn!(error = %e, "No raw terminal mode; keys disabled"),
        }
    }

    fn hide(&mut self) {
        self.restore();
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_then_hide_leaves_cooked_mode() {
        let mut display = TerminalDisplay::new("framepipe test");
        assert_eq!(display.window_handle(), None);

        // Hiding always returns to cooked mode, with or without a tty
        display.show();
        display.hide();
        assert!(!display.raw_mode);
        assert!(display.process_pending_events().is_empty());
    }
}
