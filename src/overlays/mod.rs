// SPDX-License-Identifier: GPL-3.0-only

//! Overlay compositing
//!
//! Overlays are drawn onto every displayed frame by the runtime's compositor
//! stage. The [`OverlayList`] is shared between the application, which edits
//! it, and the runtime's streaming thread, which paints it once per frame:
//!
//! ```text
//! caller thread                       runtime thread
//!  add / remove / clear ──┐      ┌── draw callback (per frame)
//!                         ▼      ▼
//!                     Mutex<overlays>
//! ```
//!
//! Both sides take the same lock, so a draw pass always sees a consistent
//! list. Do not edit the list from inside a draw callback: the lock is
//! already held there and the call would deadlock.

pub mod canvas;
pub mod font;

pub use canvas::{DrawContext, PixelCanvas, Rect, TextExtent};

use crate::backends::DrawCallback;
use crate::constants::overlay::{LINE_WIDTH, TEXT_PADDING, TEXT_SIZE};
use crate::errors::{PipelineError, PipelineResult};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// RGB color with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Class colors for detection overlays
const CLASS_PALETTE: [(u8, u8, u8); 10] = [
    (230, 25, 75),
    (60, 180, 75),
    (255, 225, 25),
    (0, 130, 200),
    (245, 130, 48),
    (145, 30, 180),
    (70, 240, 240),
    (240, 50, 230),
    (210, 245, 60),
    (250, 190, 190),
];

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    pub fn to_rgb8(&self) -> [u8; 3] {
        let q = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }

    /// BT.709 luma
    pub fn luma(&self) -> f64 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    /// Stable color for a detector class id
    pub fn for_class(class_id: i64) -> Self {
        let index = class_id.rem_euclid(CLASS_PALETTE.len() as i64) as usize;
        let (r, g, b) = CLASS_PALETTE[index];
        Self::from_rgb8(r, g, b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Black or white, whichever reads better on `background`
pub fn readable_text_color(background: Color) -> Color {
    if background.luma() > 0.5 {
        Color::BLACK
    } else {
        Color::WHITE
    }
}

/// Handle returned by [`OverlayList::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something drawn on top of every frame
///
/// Box coordinates are fractions of the surface size and are resolved on
/// each draw, so overlays follow resolution changes. Text coordinates are
/// absolute pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    /// Outlined rectangle with an optional label at its top-left corner
    BoundingBox {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        label: Option<String>,
        color: Color,
    },
    /// Alpha-blended rectangle with an optional label at its top-left corner
    FilledBox {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        label: Option<String>,
        color: Color,
        opacity: f64,
    },
    /// One or more lines of text, each on an opaque background
    Text {
        text: String,
        x: f64,
        y: f64,
        background: Color,
    },
}

impl Overlay {
    pub fn bounding_box(x: f64, y: f64, width: f64, height: f64, color: Color) -> Self {
        Overlay::BoundingBox {
            x,
            y,
            width,
            height,
            label: None,
            color,
        }
    }

    pub fn filled_box(x: f64, y: f64, width: f64, height: f64, color: Color, opacity: f64) -> Self {
        Overlay::FilledBox {
            x,
            y,
            width,
            height,
            label: None,
            color,
            opacity,
        }
    }

    pub fn text(text: impl Into<String>, x: f64, y: f64, background: Color) -> Self {
        Overlay::Text {
            text: text.into(),
            x,
            y,
            background,
        }
    }

    /// Attach a label to a box; no effect on text overlays
    pub fn with_label(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            Overlay::BoundingBox { label, .. } | Overlay::FilledBox { label, .. } => {
                *label = Some(text.into());
            }
            Overlay::Text { .. } => {}
        }
        self
    }

    /// Paint this overlay onto `ctx`
    ///
    /// `timestamp` and `duration` are the frame's presentation time and
    /// length in nanoseconds.
    pub fn draw(&self, ctx: &mut dyn DrawContext, timestamp: u64, duration: u64) {
        match self {
            Overlay::BoundingBox {
                x,
                y,
                width,
                height,
                label,
                color,
            } => {
                let rect = to_absolute(ctx, *x, *y, *width, *height);
                // The stroke is inset by one line width from the box origin
                let stroke = Rect::new(
                    rect.x + LINE_WIDTH,
                    rect.y + LINE_WIDTH,
                    rect.width,
                    rect.height,
                );
                ctx.stroke_rect(stroke, *color, LINE_WIDTH);
                draw_label(ctx, label.as_deref(), rect, *color, timestamp, duration);
            }
            Overlay::FilledBox {
                x,
                y,
                width,
                height,
                label,
                color,
                opacity,
            } => {
                let rect = to_absolute(ctx, *x, *y, *width, *height);
                ctx.fill_rect(rect, *color, opacity.clamp(0.0, 1.0));
                draw_label(ctx, label.as_deref(), rect, *color, timestamp, duration);
            }
            Overlay::Text {
                text,
                x,
                y,
                background,
            } => draw_text_block(ctx, text, *x, *y, *background),
        }
    }
}

fn to_absolute(ctx: &dyn DrawContext, x: f64, y: f64, width: f64, height: f64) -> Rect {
    let (sw, sh) = ctx.surface_size();
    let (sw, sh) = (sw as f64, sh as f64);
    Rect::new(x * sw, y * sh, width * sw, height * sh)
}

/// Labels are throwaway text overlays, rebuilt on every draw
fn draw_label(
    ctx: &mut dyn DrawContext,
    label: Option<&str>,
    rect: Rect,
    color: Color,
    timestamp: u64,
    duration: u64,
) {
    if let Some(label) = label {
        Overlay::text(label, rect.x, rect.y, color).draw(ctx, timestamp, duration);
    }
}

fn draw_text_block(ctx: &mut dyn DrawContext, text: &str, x: f64, y: f64, background: Color) {
    let foreground = readable_text_color(background);
    let x = x + LINE_WIDTH;
    let mut y = y + LINE_WIDTH;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let extent = ctx.text_extent(line, TEXT_SIZE);
        ctx.fill_rect(
            Rect::new(x, y, extent.width + TEXT_PADDING, extent.height + TEXT_PADDING),
            background,
            1.0,
        );
        ctx.draw_text(
            x + TEXT_PADDING / 2.0,
            y + TEXT_PADDING / 2.0,
            line,
            TEXT_SIZE,
            foreground,
        );
        y += extent.height + TEXT_PADDING;
    }
}

#[derive(Default)]
struct Entries {
    next_id: u64,
    items: Vec<(OverlayId, Overlay)>,
}

impl Entries {
    fn push(&mut self, overlay: Overlay) -> OverlayId {
        let id = OverlayId(self.next_id);
        self.next_id += 1;
        self.items.push((id, overlay));
        id
    }
}

/// Ordered, thread-safe overlay list
///
/// Insertion order is paint order. Clones share the same list.
#[derive(Clone, Default)]
pub struct OverlayList {
    entries: Arc<Mutex<Entries>>,
}

impl OverlayList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // A panic inside one draw pass leaves the list itself intact
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an overlay; it is painted after every existing one
    pub fn add(&self, overlay: Overlay) -> OverlayId {
        let id = self.lock().push(overlay);
        trace!(%id, "Overlay added");
        id
    }

    /// Remove the overlay added under `id`
    pub fn remove(&self, id: OverlayId) -> PipelineResult<Overlay> {
        let mut entries = self.lock();
        let index = entries
            .items
            .iter()
            .position(|(entry, _)| *entry == id)
            .ok_or(PipelineError::OverlayNotFound(id))?;
        let (_, overlay) = entries.items.remove(index);
        trace!(%id, "Overlay removed");
        Ok(overlay)
    }

    pub fn clear(&self) {
        self.lock().items.clear();
    }

    /// Swap the whole list in one critical section
    pub fn replace<I>(&self, overlays: I) -> Vec<OverlayId>
    where
        I: IntoIterator<Item = Overlay>,
    {
        let mut entries = self.lock();
        entries.items.clear();
        overlays.into_iter().map(|o| entries.push(o)).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: OverlayId) -> bool {
        self.lock().items.iter().any(|(entry, _)| *entry == id)
    }

    /// Copy of the current list in paint order
    pub fn snapshot(&self) -> Vec<Overlay> {
        self.lock().items.iter().map(|(_, o)| o.clone()).collect()
    }

    /// Paint every overlay in order, holding the list lock throughout
    pub fn draw_all(&self, ctx: &mut dyn DrawContext, timestamp: u64, duration: u64) {
        let entries = self.lock();
        for (_, overlay) in entries.items.iter() {
            overlay.draw(ctx, timestamp, duration);
        }
    }

    /// Callback for a runtime compositor stage
    pub fn draw_callback(&self) -> DrawCallback {
        let list = self.clone();
        Arc::new(move |ctx: &mut dyn DrawContext, timestamp: u64, duration: u64| {
            list.draw_all(ctx, timestamp, duration);
        })
    }
}

impl fmt::Debug for OverlayList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        f.debug_struct("OverlayList")
            .field("len", &entries.items.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readable_text_color_boundary() {
        assert_eq!(readable_text_color(Color::new(0.49, 0.49, 0.49)), Color::WHITE);
        assert_eq!(readable_text_color(Color::new(0.51, 0.51, 0.51)), Color::BLACK);
        assert_eq!(readable_text_color(Color::new(0.0, 1.0, 0.0)), Color::BLACK);
        assert_eq!(readable_text_color(Color::new(1.0, 0.0, 0.0)), Color::WHITE);
    }

    #[test]
    fn test_class_color_wraps() {
        assert_eq!(Color::for_class(0), Color::for_class(10));
        assert_eq!(Color::for_class(-1), Color::for_class(9));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let list = OverlayList::new();
        let a = list.add(Overlay::text("a", 0.0, 0.0, Color::BLACK));
        list.remove(a).unwrap();
        let b = list.add(Overlay::text("b", 0.0, 0.0, Color::BLACK));
        assert_ne!(a, b);
        assert!(list.remove(a).is_err());
    }
}
