// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Showing video with overlays
//! - Round-tripping frames through the application
//! - Annotating still images

use clap::Args;
use framepipe::backends::RuntimeBackend;
use framepipe::constants::timing;
use framepipe::display::TerminalDisplay;
use framepipe::overlays::PixelCanvas;
use framepipe::{
    Color, Frame, HeadlessDisplay, Overlay, PipelineBuilder, PipelineConfig, PixelFormat,
    VideoPipeline,
};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::info;

/// Where the video comes from and how the run ends
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Video file path or URI; the webcam is used when omitted
    #[arg(short, long)]
    pub input: Option<String>,

    /// Webcam device (e.g. /dev/video0)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Read q / p / space from the terminal
    #[arg(short, long)]
    pub keys: bool,

    /// Stop after this many frames
    #[arg(short = 'n', long)]
    pub frames: Option<u64>,
}

/// Build the effective config: file (or defaults), then flags on top
pub fn load_config(
    path: Option<&Path>,
    synthetic: bool,
    source: &SourceArgs,
) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if synthetic {
        config.backend = RuntimeBackend::Synthetic;
    }
    if let Some(input) = &source.input {
        config.video_input = Some(input.clone());
    }
    if let Some(device) = &source.device {
        config.webcam_device = Some(device.clone());
    }

    config.validate()?;
    Ok(config)
}

fn builder(config: PipelineConfig, source: &SourceArgs) -> PipelineBuilder {
    let builder = PipelineBuilder::new(config);
    let title = builder.config().title.clone();
    if source.keys {
        builder.display(TerminalDisplay::new(title))
    } else {
        builder.display(HeadlessDisplay::new())
    }
}

/// Parse `x,y,width,height[,label]` with coordinates as fractions of the frame
pub fn parse_box(spec: &str, index: usize) -> Result<Overlay, String> {
    let mut parts = spec.splitn(5, ',');
    let mut next_number = |name: &str| -> Result<f64, String> {
        let part = parts
            .next()
            .ok_or_else(|| format!("box '{}' is missing {}", spec, name))?;
        part.trim()
            .parse::<f64>()
            .map_err(|_| format!("box '{}' has an invalid {}: '{}'", spec, name, part))
    };

    let x = next_number("x")?;
    let y = next_number("y")?;
    let width = next_number("width")?;
    let height = next_number("height")?;
    if [x, y, width, height].iter().any(|v| !(0.0..=1.0).contains(v)) {
        return Err(format!("box '{}' must use fractions between 0 and 1", spec));
    }

    let overlay = Overlay::bounding_box(x, y, width, height, Color::for_class(index as i64));
    Ok(match parts.next().map(str::trim) {
        Some(label) if !label.is_empty() => overlay.with_label(label),
        _ => overlay,
    })
}

fn build_overlays(
    boxes: &[String],
    text: Option<String>,
) -> Result<Vec<Overlay>, Box<dyn std::error::Error>> {
    let mut overlays = boxes
        .iter()
        .enumerate()
        .map(|(i, spec)| parse_box(spec, i))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(text) = text {
        overlays.push(Overlay::text(text, 0.0, 0.0, Color::BLACK));
    }
    Ok(overlays)
}

/// Pull frames until the pipeline stops or the frame limit is reached
fn drain_frames(
    pipeline: &VideoPipeline,
    limit: Option<u64>,
    mut on_frame: impl FnMut(&Frame),
) -> u64 {
    let mut frames = 0u64;
    while pipeline.is_running() {
        let Some(frame) = pipeline.get_frame() else {
            // Not PLAYING or PAUSED yet; the pull returned without waiting
            thread::sleep(timing::IDLE_BACKOFF);
            continue;
        };
        frames += 1;
        on_frame(&frame);

        if limit.is_some_and(|limit| frames >= limit) {
            info!(frames, "Frame limit reached");
            pipeline.stop();
        }
    }
    frames
}

/// Show video with overlays until stopped
pub fn run_overlay(
    config: PipelineConfig,
    source: &SourceArgs,
    boxes: &[String],
    text: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let overlays = build_overlays(boxes, text)?;
    let pipeline = Arc::new(builder(config, source).build_overlay()?);
    pipeline.replace_overlays(overlays);

    // Set up Ctrl+C handler
    let stopper = Arc::clone(&pipeline);
    ctrlc::set_handler(move || stopper.stop())?;

    println!("Showing video... (press Ctrl+C to stop)");
    let start = Instant::now();
    pipeline.start()?;

    let mut last = None;
    let frames = drain_frames(&pipeline, source.frames, |frame| {
        last = Some(frame.to_string());
    });

    println!(
        "{} frames in {:.1}s{}",
        frames,
        start.elapsed().as_secs_f64(),
        last.map(|f| format!(", last: {}", f)).unwrap_or_default()
    );
    Ok(())
}

/// Invert colours; the result is RGB whatever the input format
pub fn invert(frame: &Frame) -> Result<Frame, framepipe::PipelineError> {
    let rgb = frame.convert(PixelFormat::Rgb);
    let (width, height) = rgb.size();
    let data: Vec<u8> = rgb.into_data().iter().map(|b| 255 - b).collect();
    Frame::new(PixelFormat::Rgb, width, height, data)
}

/// Pull, invert and push frames back until stopped
pub fn run_process(
    config: PipelineConfig,
    source: &SourceArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Arc::new(builder(config, source).build_processing()?);

    // Set up Ctrl+C handler
    let stopper = Arc::clone(&pipeline);
    ctrlc::set_handler(move || stopper.stop())?;

    println!("Processing video... (press Ctrl+C to stop)");
    pipeline.start()?;

    let frames = drain_frames(&pipeline, source.frames, |frame| match invert(frame) {
        Ok(inverted) => pipeline.put_frame(&inverted),
        Err(e) => tracing::warn!(error = %e, "Failed to invert frame"),
    });

    println!(
        "{} frames processed, {} pushed",
        frames,
        pipeline.injection().pushed_count()
    );
    Ok(())
}

/// Draw boxes and text on a still image
pub fn annotate(
    input: &Path,
    output: &Path,
    boxes: &[String],
    text: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let overlays = build_overlays(boxes, text)?;

    let image = image::open(input)?;
    let has_alpha = image.color().has_alpha();
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = rgba.into_raw();

    {
        let mut canvas = PixelCanvas::new(
            &mut data,
            width,
            height,
            width as usize * PixelFormat::Rgba.bytes_per_pixel(),
            PixelFormat::Rgba,
        );
        for overlay in &overlays {
            overlay.draw(&mut canvas, 0, 0);
        }
    }

    let annotated = image::RgbaImage::from_raw(width, height, data)
        .ok_or("Annotated buffer does not match the image size")?;
    let annotated = image::DynamicImage::ImageRgba8(annotated);
    if has_alpha {
        annotated.save(output)?;
    } else {
        annotated.to_rgb8().save(output)?;
    }

    println!(
        "Annotated {} ({}x{}, {} overlays): {}",
        input.display(),
        width,
        height,
        overlays.len(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use framepipe::GraphRuntime;

    #[test]
    fn test_parse_box_with_label() {
        let overlay = parse_box("0.1, 0.2, 0.3, 0.4, person", 0).unwrap();
        match overlay {
            Overlay::BoundingBox {
                x,
                y,
                width,
                height,
                label,
                ..
            } => {
                assert_eq!((x, y, width, height), (0.1, 0.2, 0.3, 0.4));
                assert_eq!(label.as_deref(), Some("person"));
            }
            other => panic!("unexpected overlay {:?}", other),
        }
    }

    #[test]
    fn test_parse_box_rejects_garbage() {
        assert!(parse_box("0.1,0.2,0.3", 0).is_err());
        assert!(parse_box("0.1,0.2,x,0.4", 0).is_err());
        assert!(parse_box("0.1,0.2,-0.1,0.4", 0).is_err());
        assert!(parse_box("10,20,30,40", 0).is_err());
    }

    fn synthetic_config() -> PipelineConfig {
        PipelineConfig {
            backend: RuntimeBackend::Synthetic,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_drain_frames_honours_limit() {
        let pipeline = PipelineBuilder::new(synthetic_config())
            .build_processing()
            .unwrap();
        pipeline.start().unwrap();

        let mut seen = 0;
        let frames = drain_frames(&pipeline, Some(3), |_| seen += 1);
        assert_eq!(frames, 3);
        assert_eq!(seen, 3);
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_drain_frames_waits_out_idle_pipeline() {
        let pipeline = PipelineBuilder::new(synthetic_config())
            .build_overlay()
            .unwrap();
        pipeline.start().unwrap();
        // Running but READY: every pull comes back empty at once
        pipeline
            .runtime()
            .set_state(framepipe::PipelineState::Ready)
            .unwrap();

        let frames = std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(timing::IDLE_BACKOFF * 5);
                pipeline.stop();
            });
            drain_frames(&pipeline, None, |_| {})
        });
        assert_eq!(frames, 0);
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_invert() {
        let frame = Frame::new(PixelFormat::Rgb, 1, 1, vec![0u8, 128, 255]).unwrap();
        assert_eq!(invert(&frame).unwrap().data(), &[255, 127, 0]);
    }
}
