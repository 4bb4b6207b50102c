// SPDX-License-Identifier: GPL-3.0-only

//! Video pipelines
//!
//! A pipeline is a media graph plus a small state machine with two surfaces
//! the application uses concurrently: pulling frames and editing overlays.
//!
//! # Pipeline Architecture
//!
//! ```text
//! overlay pipeline
//! ┌────────┐    ┌─────┐    ┌──────────────────────────────┐
//! │ source │ ─▶ │ tee │ ─▶ │ queue ▶ convert ▶ caps ▶ sink │ ─▶ get_frame()
//! └────────┘    └─────┘    └──────────────────────────────┘
//!                  │       ┌──────────────────────────────────────────────┐
//!                  └─────▶ │ queue ▶ convert ▶ compositor ▶ convert ▶ sink │ ─▶ display
//!                          └──────────────────────────────────────────────┘
//!                                         ▲ draw callback (overlay list)
//!
//! processing pipeline
//! ┌────────┐    ┌──────────────────────────────┐
//! │ source │ ─▶ │ queue ▶ convert ▶ caps ▶ sink │ ─▶ get_frame()
//! └────────┘    └──────────────────────────────┘
//! put_frame() ─▶ appsrc ▶ convert ▶ display sink
//! ```
//!
//! The source is a decoder for a file or URI when an input is configured,
//! otherwise the webcam chain.
//!
//! # Modules
//!
//! - [`graph`]: stage creation, linking and sub-graph assembly
//! - [`state`]: play / pause / stop state machine
//! - [`capture`]: frame acquisition from the capture sink
//! - [`inject`]: frame injection into the display branch
//! - [`pipeline`]: the pipeline types and their builder

pub mod capture;
pub mod graph;
pub mod inject;
pub mod pipeline;
pub mod state;

pub use capture::CaptureEndpoint;
pub use graph::{Endpoints, PipelineGraph, PipelineKind};
pub use inject::InjectionEndpoint;
pub use pipeline::{
    MessageHandler, OverlayPipeline, PipelineBuilder, PipelineGuard, ProcessingPipeline,
    VideoPipeline,
};
pub use state::StateController;

use std::fmt;

/// Pipeline state as understood by every graph runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineState {
    #[default]
    Null,
    Ready,
    Paused,
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Null => write!(f, "NULL"),
            PipelineState::Ready => write!(f, "READY"),
            PipelineState::Paused => write!(f, "PAUSED"),
            PipelineState::Playing => write!(f, "PLAYING"),
        }
    }
}
