// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for overlays and the drawing surface

use framepipe::constants::overlay::{LINE_WIDTH, TEXT_PADDING, TEXT_SIZE};
use framepipe::overlays::{DrawContext, PixelCanvas, Rect, TextExtent};
use framepipe::{Color, Overlay, OverlayList, PipelineError, PixelFormat, readable_text_color};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Stroke(Rect, Color, f64),
    Fill(Rect, Color, f64),
    Text(f64, f64, String, f64, Color),
}

/// Records draw calls; text is 10 px per character and 20 px high
struct RecordingContext {
    size: (u32, u32),
    ops: Vec<Op>,
}

impl RecordingContext {
    fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ops: Vec::new(),
        }
    }
}

impl DrawContext for RecordingContext {
    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64) {
        self.ops.push(Op::Stroke(rect, color, line_width));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color, alpha: f64) {
        self.ops.push(Op::Fill(rect, color, alpha));
    }

    fn text_extent(&self, text: &str, _size: f64) -> TextExtent {
        TextExtent {
            width: 10.0 * text.chars().count() as f64,
            height: 20.0,
        }
    }

    fn draw_text(&mut self, x: f64, y: f64, text: &str, size: f64, color: Color) {
        self.ops.push(Op::Text(x, y, text.to_string(), size, color));
    }
}

const RED: Color = Color::new(1.0, 0.0, 0.0);

#[test]
fn test_bounding_box_scales_to_surface() {
    let overlay = Overlay::bounding_box(0.25, 0.5, 0.5, 0.25, RED);
    let mut ctx = RecordingContext::new(640, 480);
    overlay.draw(&mut ctx, 0, 0);

    assert_eq!(
        ctx.ops,
        vec![Op::Stroke(
            Rect::new(160.0 + LINE_WIDTH, 240.0 + LINE_WIDTH, 320.0, 120.0),
            RED,
            LINE_WIDTH
        )]
    );
}

#[test]
fn test_bounding_box_follows_resolution_change() {
    let overlay = Overlay::bounding_box(0.5, 0.5, 0.5, 0.5, RED);

    let mut small = RecordingContext::new(100, 100);
    overlay.draw(&mut small, 0, 0);
    let mut large = RecordingContext::new(200, 100);
    overlay.draw(&mut large, 0, 0);

    let Op::Stroke(small_rect, ..) = small.ops[0] else {
        panic!("expected a stroke");
    };
    let Op::Stroke(large_rect, ..) = large.ops[0] else {
        panic!("expected a stroke");
    };
    assert_eq!(small_rect.width, 50.0);
    assert_eq!(large_rect.width, 100.0);
    assert_eq!(large_rect.height, small_rect.height);
}

#[test]
fn test_box_label_is_drawn_at_top_left_on_box_color() {
    let overlay = Overlay::bounding_box(0.1, 0.2, 0.5, 0.5, RED).with_label("cat");
    let mut ctx = RecordingContext::new(100, 100);
    overlay.draw(&mut ctx, 0, 0);

    assert_eq!(ctx.ops.len(), 3);
    // Label background uses the box color, text starts one line width in
    let x = 10.0 + LINE_WIDTH;
    let y = 20.0 + LINE_WIDTH;
    assert_eq!(
        ctx.ops[1],
        Op::Fill(
            Rect::new(x, y, 30.0 + TEXT_PADDING, 20.0 + TEXT_PADDING),
            RED,
            1.0
        )
    );
    assert_eq!(
        ctx.ops[2],
        Op::Text(
            x + TEXT_PADDING / 2.0,
            y + TEXT_PADDING / 2.0,
            "cat".to_string(),
            TEXT_SIZE,
            readable_text_color(RED)
        )
    );
}

#[test]
fn test_filled_box_opacity_is_clamped() {
    let mut ctx = RecordingContext::new(10, 10);
    Overlay::filled_box(0.0, 0.0, 1.0, 1.0, RED, 1.5).draw(&mut ctx, 0, 0);
    Overlay::filled_box(0.0, 0.0, 1.0, 1.0, RED, -0.5).draw(&mut ctx, 0, 0);

    assert_eq!(ctx.ops[0], Op::Fill(Rect::new(0.0, 0.0, 10.0, 10.0), RED, 1.0));
    assert_eq!(ctx.ops[1], Op::Fill(Rect::new(0.0, 0.0, 10.0, 10.0), RED, 0.0));
}

#[test]
fn test_filled_box_scales_to_surface() {
    let mut ctx = RecordingContext::new(640, 480);
    Overlay::filled_box(0.25, 0.5, 0.1, 0.1, RED, 0.5).draw(&mut ctx, 0, 0);

    let Op::Fill(rect, color, alpha) = ctx.ops[0] else {
        panic!("expected a fill");
    };
    assert_eq!((rect.x, rect.y), (160.0, 240.0));
    assert!((rect.width - 64.0).abs() < 1e-9);
    assert!((rect.height - 48.0).abs() < 1e-9);
    assert_eq!(color, RED);
    assert_eq!(alpha, 0.5);
}

#[test]
fn test_multiline_text_stacks_lines() {
    let mut ctx = RecordingContext::new(640, 480);
    Overlay::text("ab\r\ncdef", 0.0, 0.0, Color::WHITE).draw(&mut ctx, 0, 0);

    let fills: Vec<Rect> = ctx
        .ops
        .iter()
        .filter_map(|op| match op {
            Op::Fill(rect, ..) => Some(*rect),
            _ => None,
        })
        .collect();
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0].y, LINE_WIDTH);
    assert_eq!(fills[1].y, LINE_WIDTH + 20.0 + TEXT_PADDING);
    assert_eq!(fills[1].width, 40.0 + TEXT_PADDING);
    assert!(!fills[0].overlaps(&fills[1]));

    // Each background is laid down before its glyphs
    assert!(matches!(ctx.ops[0], Op::Fill(..)));
    assert!(matches!(&ctx.ops[1], Op::Text(_, _, text, _, color) if text == "ab" && *color == Color::BLACK));
    assert!(matches!(&ctx.ops[3], Op::Text(_, _, text, _, _) if text == "cdef"));
}

#[test]
fn test_readable_text_color() {
    assert_eq!(readable_text_color(Color::WHITE), Color::BLACK);
    assert_eq!(readable_text_color(Color::BLACK), Color::WHITE);
    // Pure blue is dark despite full intensity
    assert_eq!(readable_text_color(Color::new(0.0, 0.0, 1.0)), Color::WHITE);
    // Luma of exactly 0.5 is not light enough for black text
    let mid = Color::new(0.5, 0.5, 0.5);
    assert_eq!(mid.luma(), 0.5);
    assert_eq!(readable_text_color(mid), Color::WHITE);
    assert_eq!(readable_text_color(Color::new(0.49, 0.49, 0.49)), Color::WHITE);
    assert_eq!(readable_text_color(Color::new(0.51, 0.51, 0.51)), Color::BLACK);
}

#[test]
fn test_overlay_list_paints_in_insertion_order() {
    let list = OverlayList::new();
    list.add(Overlay::filled_box(0.0, 0.0, 0.5, 0.5, RED, 1.0));
    list.add(Overlay::filled_box(0.0, 0.0, 0.5, 0.5, Color::WHITE, 1.0));

    let mut ctx = RecordingContext::new(10, 10);
    list.draw_all(&mut ctx, 0, 0);
    assert!(matches!(ctx.ops[0], Op::Fill(_, color, _) if color == RED));
    assert!(matches!(ctx.ops[1], Op::Fill(_, color, _) if color == Color::WHITE));
}

#[test]
fn test_overlay_list_remove_and_replace() {
    let list = OverlayList::new();
    let a = list.add(Overlay::text("a", 0.0, 0.0, Color::BLACK));
    let b = list.add(Overlay::text("b", 0.0, 0.0, Color::BLACK));

    assert!(list.remove(a).is_ok());
    assert_eq!(list.remove(a), Err(PipelineError::OverlayNotFound(a)));
    assert!(list.contains(b));

    let ids = list.replace(vec![
        Overlay::text("c", 0.0, 0.0, Color::BLACK),
        Overlay::text("d", 0.0, 0.0, Color::BLACK),
    ]);
    assert_eq!(ids.len(), 2);
    assert_eq!(list.len(), 2);
    assert!(!list.contains(b));

    list.clear();
    assert!(list.is_empty());
    // Clearing an empty list is fine
    list.clear();
    assert!(list.is_empty());
}

#[test]
fn test_add_then_remove_restores_order() {
    let list = OverlayList::new();
    list.add(Overlay::text("a", 0.0, 0.0, Color::BLACK));
    list.add(Overlay::filled_box(0.0, 0.0, 0.5, 0.5, RED, 1.0));
    let before = list.snapshot();

    let id = list.add(Overlay::bounding_box(0.1, 0.1, 0.2, 0.2, RED));
    assert_eq!(list.len(), 3);
    list.remove(id).unwrap();
    assert_eq!(list.snapshot(), before);

    // Removing it again fails and changes nothing
    assert_eq!(list.remove(id), Err(PipelineError::OverlayNotFound(id)));
    assert_eq!(list.snapshot(), before);
}

#[test]
fn test_overlay_list_edits_while_drawing() {
    let list = OverlayList::new();
    let draw = list.draw_callback();

    let editor = {
        let list = list.clone();
        thread::spawn(move || {
            for i in 0..200 {
                let id = list.add(Overlay::bounding_box(0.1, 0.1, 0.2, 0.2, Color::for_class(i)));
                if i % 2 == 0 {
                    list.remove(id).unwrap();
                }
            }
        })
    };

    let drawer = {
        let draw = Arc::clone(&draw);
        thread::spawn(move || {
            for frame in 0..200u64 {
                let mut ctx = RecordingContext::new(64, 48);
                draw(&mut ctx as &mut dyn DrawContext, frame * 33_333_333, 33_333_333);
            }
        })
    };

    editor.join().unwrap();
    drawer.join().unwrap();
    assert_eq!(list.len(), 100);
}

#[test]
fn test_pixel_canvas_fills_frame_pixels() {
    let (width, height) = (100u32, 100u32);
    let mut data = vec![0u8; PixelFormat::Rgb.frame_size(width, height)];

    {
        let mut canvas =
            PixelCanvas::new(&mut data, width, height, width as usize * 3, PixelFormat::Rgb);
        Overlay::filled_box(0.1, 0.1, 0.2, 0.2, RED, 1.0).draw(&mut canvas, 0, 0);
    }

    let pixel = |x: usize, y: usize| {
        let i = (y * width as usize + x) * 3;
        [data[i], data[i + 1], data[i + 2]]
    };
    assert_eq!(pixel(15, 15), [255, 0, 0]);
    assert_eq!(pixel(5, 5), [0, 0, 0]);
    assert_eq!(pixel(50, 50), [0, 0, 0]);
}

#[test]
fn test_pixel_canvas_clips_offscreen_overlays() {
    let mut data = vec![0u8; PixelFormat::Bgra.frame_size(16, 16)];
    let mut canvas = PixelCanvas::new(&mut data, 16, 16, 64, PixelFormat::Bgra);

    Overlay::bounding_box(0.9, 0.9, 0.5, 0.5, RED)
        .with_label("far off the edge")
        .draw(&mut canvas, 0, 0);
    Overlay::text("x", -100.0, -100.0, Color::WHITE).draw(&mut canvas, 0, 0);
}
