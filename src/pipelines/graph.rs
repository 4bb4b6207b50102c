// SPDX-License-Identifier: GPL-3.0-only

//! Stage creation, linking and sub-graph assembly

use crate::backends::{CapsSpec, GraphRuntime, StageHandle, StageKind};
use crate::config::PipelineConfig;
use crate::constants::{capture, overlay, stages};
use crate::errors::{PipelineError, PipelineResult};
use crate::frame::PixelFormat;
use crate::pipelines::{CaptureEndpoint, InjectionEndpoint};
use std::sync::Arc;
use tracing::{debug, info};

/// Which sub-graphs a pipeline is assembled from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Source feeds a capture branch and a display branch with overlays
    Overlay,
    /// Source feeds a capture branch; injected frames feed the display
    Processing,
}

impl PipelineKind {
    /// Runtime name of the whole graph
    pub fn graph_name(&self) -> &'static str {
        match self {
            PipelineKind::Overlay => "video-overlay-pipeline",
            PipelineKind::Processing => "video-processing-pipeline",
        }
    }
}

/// Application-facing stages of an assembled graph
#[derive(Debug, Default)]
pub struct Endpoints {
    pub capture: Option<CaptureEndpoint>,
    pub injection: Option<InjectionEndpoint>,
    pub compositor: Option<StageHandle>,
    pub display_sink: Option<StageHandle>,
}

/// Owns the stages of one pipeline and the runtime they live in
pub struct PipelineGraph {
    runtime: Arc<dyn GraphRuntime>,
    stages: Vec<(String, StageHandle)>,
}

impl PipelineGraph {
    pub fn new(runtime: Arc<dyn GraphRuntime>) -> Self {
        Self {
            runtime,
            stages: Vec::new(),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn GraphRuntime> {
        &self.runtime
    }

    /// Handle of the stage created under `name`
    pub fn stage(&self, name: &str) -> Option<StageHandle> {
        self.stages
            .iter()
            .find(|(stage, _)| stage == name)
            .map(|(_, handle)| *handle)
    }

    /// Names of all stages in creation order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn name_of(&self, handle: StageHandle) -> String {
        self.stages
            .iter()
            .find(|(_, h)| *h == handle)
            .map(|(name, _)| name.clone())
            .or_else(|| self.runtime.stage_name(handle))
            .unwrap_or_else(|| format!("stage{}", handle.0))
    }

    /// Instantiate a stage
    pub fn create_stage(&mut self, kind: StageKind, name: &str) -> PipelineResult<StageHandle> {
        let handle = self
            .runtime
            .create_stage(&kind, name)
            .map_err(|e| PipelineError::CreateFailure {
                stage: name.to_string(),
                reason: e.to_string(),
            })?;
        debug!(name, factory = kind.factory_name(), "Created stage");
        self.stages.push((name.to_string(), handle));
        Ok(handle)
    }

    /// Link two stages with the default diagnostic
    pub fn link(&self, src: StageHandle, dest: StageHandle) -> PipelineResult<()> {
        self.link_with_diagnostic(src, dest, None)
    }

    /// Link two stages; `diagnostic` may use `{src}` and `{dest}` placeholders
    pub fn link_with_diagnostic(
        &self,
        src: StageHandle,
        dest: StageHandle,
        diagnostic: Option<&str>,
    ) -> PipelineResult<()> {
        self.runtime.link(src, dest).map_err(|e| {
            let err = PipelineError::LinkFailure {
                src: self.name_of(src),
                dest: self.name_of(dest),
                diagnostic: diagnostic.map(str::to_string),
            };
            debug!(error = %err, cause = %e, "Link failed");
            err
        })
    }

    /// Link each stage to the next
    pub fn link_chain(&self, chain: &[StageHandle]) -> PipelineResult<()> {
        for pair in chain.windows(2) {
            self.link(pair[0], pair[1])?;
        }
        Ok(())
    }

    /// Link once `src` has created its output pads
    pub fn link_deferred(&self, src: StageHandle, dest: StageHandle) -> PipelineResult<()> {
        self.runtime.link_deferred(src, dest).map_err(|e| {
            let err = PipelineError::link_failure(self.name_of(src), self.name_of(dest));
            debug!(error = %err, cause = %e, "Deferred link failed");
            err
        })
    }

    /// Build the source chain and return its raw-video output stage
    ///
    /// An input containing `://` is treated as a URI, any other input as a
    /// file path. Without an input the webcam chain is used.
    pub fn build_source(&mut self, config: &PipelineConfig) -> PipelineResult<StageHandle> {
        match config.video_input.as_deref() {
            Some(input) => self.build_input_source(input),
            None => self.build_device_source(config),
        }
    }

    fn build_input_source(&mut self, input: &str) -> PipelineResult<StageHandle> {
        let convert = self.create_stage(StageKind::Convert, stages::SOURCE_CONVERT)?;

        let decoder = if input.contains("://") {
            info!(uri = input, "Using URI source");
            self.create_stage(
                StageKind::UriDecoder {
                    uri: input.to_string(),
                },
                stages::URI_DECODE,
            )?
        } else {
            info!(path = input, "Using file source");
            let file = self.create_stage(
                StageKind::FileSource {
                    location: input.to_string(),
                },
                stages::FILE_SOURCE,
            )?;
            let decoder = self.create_stage(StageKind::Decoder, stages::FILE_DECODE)?;
            self.link(file, decoder)?;
            decoder
        };

        // The decoder's output pad only exists once it has seen the stream
        self.link_deferred(decoder, convert)?;
        Ok(convert)
    }

    fn build_device_source(&mut self, config: &PipelineConfig) -> PipelineResult<StageHandle> {
        info!(
            device = config.webcam_device.as_deref().unwrap_or("default"),
            "Using webcam source"
        );
        let device = self.create_stage(
            StageKind::DeviceSource {
                device: config.webcam_device.clone(),
            },
            stages::DEVICE_SOURCE,
        )?;

        let webcam = &config.webcam;
        let caps = CapsSpec::encoded(
            &webcam.media_type,
            (webcam.min_width, webcam.max_width),
            (webcam.min_framerate, webcam.max_framerate),
        );
        debug!(%caps, "Webcam caps");
        let filter = self.create_stage(StageKind::CapsFilter { caps }, stages::DEVICE_CAPS)?;
        let decoder = self.create_stage(StageKind::JpegDecoder, stages::DEVICE_DECODE)?;

        self.link(device, filter)?;
        self.link_with_diagnostic(
            filter,
            decoder,
            Some("Webcam caps {src} cannot feed the JPEG decoder {dest}"),
        )?;
        Ok(decoder)
    }

    /// queue(1) ▶ convert ▶ caps(format) ▶ capture sink(1, drop oldest)
    ///
    /// Returns the branch entry and the endpoint.
    pub fn build_capture(
        &mut self,
        format: PixelFormat,
        config: &PipelineConfig,
    ) -> PipelineResult<(StageHandle, CaptureEndpoint)> {
        let queue = self.create_stage(
            StageKind::Queue {
                max_buffers: capture::QUEUE_MAX_BUFFERS,
            },
            stages::CAPTURE_QUEUE,
        )?;
        let convert = self.create_stage(StageKind::Convert, stages::CAPTURE_CONVERT)?;
        let caps = self.create_stage(
            StageKind::CapsFilter {
                caps: CapsSpec::raw(format),
            },
            stages::CAPTURE_CAPS,
        )?;
        let sink = self.create_stage(
            StageKind::CaptureSink {
                max_buffers: capture::SINK_MAX_BUFFERS,
                drop: true,
            },
            stages::CAPTURE_SINK,
        )?;

        self.link_chain(&[queue, convert, caps, sink])?;
        Ok((queue, CaptureEndpoint::new(sink, format, config.pull_timeout())))
    }

    /// convert ▶ display sink; returns (entry, sink)
    pub fn build_display(&mut self) -> PipelineResult<(StageHandle, StageHandle)> {
        let convert = self.create_stage(StageKind::Convert, stages::DISPLAY_CONVERT)?;
        let sink = self.create_stage(StageKind::DisplaySink, stages::DISPLAY_SINK)?;
        self.link(convert, sink)?;
        Ok((convert, sink))
    }

    /// injection source ▶ display chain
    pub fn build_injection(&mut self) -> PipelineResult<(InjectionEndpoint, StageHandle)> {
        let src = self.create_stage(StageKind::InjectionSource, stages::INJECT_SOURCE)?;
        let (display, sink) = self.build_display()?;
        self.link(src, display)?;
        Ok((InjectionEndpoint::new(src), sink))
    }

    /// queue(1) ▶ convert ▶ compositor ▶ display chain
    ///
    /// Returns (entry, compositor, display sink).
    pub fn build_overlay_branch(
        &mut self,
    ) -> PipelineResult<(StageHandle, StageHandle, StageHandle)> {
        let queue = self.create_stage(
            StageKind::Queue {
                max_buffers: overlay::QUEUE_MAX_BUFFERS,
            },
            stages::OVERLAY_QUEUE,
        )?;
        let convert = self.create_stage(StageKind::Convert, stages::OVERLAY_CONVERT)?;
        let compositor = self.create_stage(
            StageKind::Compositor {
                format: overlay::SURFACE_FORMAT,
            },
            stages::OVERLAY_COMPOSITOR,
        )?;
        let (display, sink) = self.build_display()?;

        self.link_chain(&[queue, convert, compositor, display])?;
        Ok((queue, compositor, sink))
    }

    /// Build the full graph for `kind`
    pub fn assemble(
        &mut self,
        kind: PipelineKind,
        config: &PipelineConfig,
    ) -> PipelineResult<Endpoints> {
        info!(pipeline = kind.graph_name(), "Assembling pipeline");
        let source = self.build_source(config)?;
        let (capture_in, capture) = self.build_capture(config.capture_format, config)?;

        match kind {
            PipelineKind::Overlay => {
                let tee = self.create_stage(StageKind::Tee, stages::SOURCE_TEE)?;
                let (overlay_in, compositor, display_sink) = self.build_overlay_branch()?;
                self.link(source, tee)?;
                self.link(tee, capture_in)?;
                self.link(tee, overlay_in)?;
                Ok(Endpoints {
                    capture: Some(capture),
                    injection: None,
                    compositor: Some(compositor),
                    display_sink: Some(display_sink),
                })
            }
            PipelineKind::Processing => {
                let (injection, display_sink) = self.build_injection()?;
                self.link(source, capture_in)?;
                Ok(Endpoints {
                    capture: Some(capture),
                    injection: Some(injection),
                    compositor: None,
                    display_sink: Some(display_sink),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{SyntheticRuntime, SyntheticSettings};

    fn graph() -> PipelineGraph {
        PipelineGraph::new(Arc::new(SyntheticRuntime::new(
            "graph-test",
            SyntheticSettings::default(),
        )))
    }

    #[test]
    fn test_overlay_graph_stages() {
        let mut graph = graph();
        let endpoints = graph
            .assemble(PipelineKind::Overlay, &PipelineConfig::default())
            .unwrap();
        assert!(endpoints.capture.is_some());
        assert!(endpoints.injection.is_none());
        assert!(endpoints.compositor.is_some());
        assert!(graph.stage(stages::DEVICE_CAPS).is_some());
        assert!(graph.stage(stages::SOURCE_TEE).is_some());
        assert!(graph.stage(stages::INJECT_SOURCE).is_none());
    }

    #[test]
    fn test_uri_input_uses_uri_decoder() {
        let mut graph = graph();
        let config = PipelineConfig {
            video_input: Some("file:///tmp/clip.mp4".to_string()),
            ..Default::default()
        };
        graph.assemble(PipelineKind::Processing, &config).unwrap();
        assert!(graph.stage(stages::URI_DECODE).is_some());
        assert!(graph.stage(stages::FILE_SOURCE).is_none());
        assert!(graph.stage(stages::DEVICE_SOURCE).is_none());
    }

    #[test]
    fn test_path_input_uses_file_decoder() {
        let mut graph = graph();
        let config = PipelineConfig {
            video_input: Some("clip.mp4".to_string()),
            ..Default::default()
        };
        graph.assemble(PipelineKind::Processing, &config).unwrap();
        assert!(graph.stage(stages::FILE_SOURCE).is_some());
        assert!(graph.stage(stages::FILE_DECODE).is_some());

        // Creation order: source chain first, then capture and injection
        let names = graph.stage_names();
        assert_eq!(names[..2], [stages::FILE_SOURCE, stages::FILE_DECODE]);
        let capture = names.iter().position(|n| *n == stages::CAPTURE_SINK);
        let inject = names.iter().position(|n| *n == stages::INJECT_SOURCE);
        assert!(capture.is_some() && inject.is_some());
        assert!(capture < inject);
    }

    #[test]
    fn test_link_failure_names_stages() {
        let mut graph = graph();
        let sink = graph
            .create_stage(StageKind::DisplaySink, "display_sink")
            .unwrap();
        let convert = graph.create_stage(StageKind::Convert, "convert").unwrap();
        let err = graph.link(sink, convert).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to link elements display_sink -> convert"
        );
    }

    #[test]
    fn test_deferred_link_from_static_stage_checks_now() {
        let mut graph = graph();
        let sink = graph
            .create_stage(StageKind::DisplaySink, "display_sink")
            .unwrap();
        let convert = graph.create_stage(StageKind::Convert, "convert").unwrap();
        let err = graph.link_deferred(sink, convert).unwrap_err();
        assert_eq!(
            err,
            PipelineError::link_failure("display_sink".to_string(), "convert".to_string())
        );
        assert!(graph.link_deferred(convert, sink).is_ok());
    }
}
