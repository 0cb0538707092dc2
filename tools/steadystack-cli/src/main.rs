//! SteadyStack CLI: median-blend exposure brackets and query motion logs.
//!
//! Usage:
//!   steadystack blend <IMAGES>... -o <OUT>   Median-blend a bracket of images
//!   steadystack interpolate <LOG> <TIME>     Estimate orientation from a motion log
//!   steadystack simulate [OPTIONS]           Run a bracket against synthetic sources
//!   steadystack config                       Show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use steadystack_common::config::{AppConfig, InterpolationKind};

mod commands;

#[derive(Parser)]
#[command(
    name = "steadystack",
    about = "Motion-synchronized exposure bracketing and median blending",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Median-blend images of identical size into one
    Blend {
        /// Input images (at least two)
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        /// Output image path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Estimate orientation at a capture time from a JSONL motion log
    Interpolate {
        /// Path to the motion log
        log: PathBuf,

        /// Capture time in seconds
        #[arg(allow_hyphen_values = true)]
        time: f64,

        /// Interpolation strategy: cubic|linear (defaults to the configured one)
        #[arg(long)]
        kind: Option<InterpolationKind>,

        /// Fail instead of falling back from cubic to linear
        #[arg(long)]
        strict: bool,
    },

    /// Run one bracket against synthetic camera and motion sources
    Simulate {
        /// Directory for original.png, processed.png and motion.jsonl
        #[arg(short, long, default_value = "steadystack-sim")]
        output: PathBuf,

        /// Shots in the bracket (defaults to the configured maximum)
        #[arg(long)]
        shots: Option<usize>,

        /// Frame width
        #[arg(long, default_value = "320")]
        width: u32,

        /// Frame height
        #[arg(long, default_value = "240")]
        height: u32,

        /// Simulated yaw rate in rad/s
        #[arg(long, default_value = "0.5", allow_hyphen_values = true)]
        yaw_rate: f64,

        /// Seconds between shots
        #[arg(long, default_value = "0.05")]
        shot_spacing: f64,
    },

    /// Show the effective configuration
    Config {
        /// Print only the configuration file path
        #[arg(long)]
        path: bool,

        /// Write the effective configuration to the configuration file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.json |= cli.json_logs;
    steadystack_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Blend { inputs, output } => commands::blend::run(inputs, output).await,
        Commands::Interpolate {
            log,
            time,
            kind,
            strict,
        } => commands::interpolate::run(
            log,
            time,
            kind.unwrap_or(config.capture.interpolation),
            strict,
        ),
        Commands::Simulate {
            output,
            shots,
            width,
            height,
            yaw_rate,
            shot_spacing,
        } => {
            commands::simulate::run(
                &config,
                commands::simulate::SimulateOptions {
                    output,
                    shots,
                    width,
                    height,
                    yaw_rate,
                    shot_spacing,
                },
            )
            .await
        }
        Commands::Config { path, save } => commands::config::run(&config, path, save),
    }
}
