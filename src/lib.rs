// SPDX-License-Identifier: GPL-3.0-only

//! framepipe - video pipelines with frame capture, frame injection and overlays
//!
//! A pipeline reads video from a file, a URI or a webcam, shows it on a
//! display surface and hands frames to the application on request.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Graph runtimes (GStreamer and an in-process synthetic one)
//! - [`pipelines`]: Graph assembly, state control and the pipeline types
//! - [`overlays`]: Overlay model and the software drawing surface
//! - [`display`]: Display surfaces and key handling
//! - [`frame`]: Pixel formats and caller-owned frames
//! - [`config`]: Pipeline configuration
//!
//! # Example
//!
//! ```no_run
//! use framepipe::{Color, Overlay, PipelineBuilder, PipelineConfig};
//!
//! let config = PipelineConfig {
//!     video_input: Some("clip.mp4".into()),
//!     ..PipelineConfig::default()
//! };
//! let pipeline = PipelineBuilder::new(config).build_overlay()?;
//! pipeline.add_overlay(Overlay::bounding_box(0.1, 0.1, 0.4, 0.3, Color::WHITE));
//! pipeline.start()?;
//! while pipeline.is_running() {
//!     if let Some(frame) = pipeline.get_frame() {
//!         println!("{}", frame);
//!     }
//! }
//! # Ok::<(), framepipe::PipelineError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod display;
pub mod errors;
pub mod frame;
pub mod overlays;
pub mod pipelines;

// Re-export commonly used types
pub use backends::{GraphRuntime, RuntimeBackend, RuntimeMessage, SyntheticRuntime};
pub use config::PipelineConfig;
pub use display::{DisplaySurface, HeadlessDisplay, KeyPress};
pub use errors::{PipelineError, PipelineResult};
pub use frame::{Frame, PixelFormat};
pub use overlays::{Color, Overlay, OverlayId, OverlayList, readable_text_color};
pub use pipelines::{
    OverlayPipeline, PipelineBuilder, PipelineState, ProcessingPipeline, VideoPipeline,
};
