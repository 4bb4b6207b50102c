// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "framepipe")]
#[command(about = "Video pipelines with frame capture, frame injection and overlays")]
#[command(version = framepipe::constants::app_info::version())]
struct Cli {
    /// JSON pipeline config; flags below override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-process test pattern instead of GStreamer
    #[arg(long, global = true)]
    synthetic: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show video with bounding boxes and a caption drawn on top
    Overlay {
        #[command(flatten)]
        source: cli::SourceArgs,

        /// Box to draw, as x,y,width,height[,label] in fractions of the frame (repeatable)
        #[arg(short, long = "box", value_name = "BOX")]
        boxes: Vec<String>,

        /// Caption shown in the top-left corner
        #[arg(short, long)]
        text: Option<String>,
    },

    /// Pull frames, invert them and push them back to the display
    Process {
        #[command(flatten)]
        source: cli::SourceArgs,
    },

    /// Draw boxes and text on a still image
    Annotate {
        /// Image to read
        input: PathBuf,

        /// Where to write the annotated image
        output: PathBuf,

        /// Box to draw, as x,y,width,height[,label] in fractions of the frame (repeatable)
        #[arg(short, long = "box", value_name = "BOX")]
        boxes: Vec<String>,

        /// Caption shown in the top-left corner
        #[arg(short, long)]
        text: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=framepipe=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Overlay {
            source,
            boxes,
            text,
        } => {
            let config = cli::load_config(cli.config.as_deref(), cli.synthetic, &source)?;
            cli::run_overlay(config, &source, &boxes, text)
        }
        Commands::Process { source } => {
            let config = cli::load_config(cli.config.as_deref(), cli.synthetic, &source)?;
            cli::run_process(config, &source)
        }
        Commands::Annotate {
            input,
            output,
            boxes,
            text,
        } => cli::annotate(&input, &output, &boxes, text),
    }
}
