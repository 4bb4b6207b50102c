// SPDX-License-Identifier: GPL-3.0-only

//! Display surfaces
//!
//! A [`DisplaySurface`] is the user-facing side of a pipeline: it can be
//! shown and hidden, hands a native window to the runtime's display sink and
//! reports key presses. The pipeline pumps it once per `get_frame` call.

mod headless;
mod terminal;

pub use headless::HeadlessDisplay;
pub use terminal::TerminalDisplay;

/// A key press reported by a display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    Char(char),
    Escape,
    /// Ctrl+C delivered as a key (raw terminal mode)
    Interrupt,
}

/// What the pipeline does in response to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Stop,
    TogglePause,
}

impl KeyPress {
    /// `q`, `Q`, Escape and Ctrl+C stop; `p` and space toggle pause
    pub fn action(&self) -> Option<KeyAction> {
        match self {
            KeyPress::Char('q' | 'Q') | KeyPress::Escape | KeyPress::Interrupt => {
                Some(KeyAction::Stop)
            }
            KeyPress::Char('p' | 'P' | ' ') => Some(KeyAction::TogglePause),
            KeyPress::Char(_) => None,
        }
    }
}

/// Window or terminal the pipeline presents to
pub trait DisplaySurface: Send {
    /// Drain pending input without blocking
    fn process_pending_events(&mut self) -> Vec<KeyPress>;

    /// Native window the display sink should render into, if any
    fn window_handle(&self) -> Option<usize>;

    /// Called when the runtime's display sink has bound to `handle`
    fn attach_drawable(&mut self, handle: usize);

    fn show(&mut self);

    fn hide(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_actions() {
        assert_eq!(KeyPress::Char('q').action(), Some(KeyAction::Stop));
        assert_eq!(KeyPress::Char('Q').action(), Some(KeyAction::Stop));
        assert_eq!(KeyPress::Escape.action(), Some(KeyAction::Stop));
        assert_eq!(KeyPress::Char(' ').action(), Some(KeyAction::TogglePause));
        assert_eq!(KeyPress::Char('p').action(), Some(KeyAction::TogglePause));
        assert_eq!(KeyPress::Char('x').action(), None);
    }
}
