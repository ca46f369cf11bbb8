//! Kinetrack CLI — Command-line interface for motion track documents.
//!
//! Usage:
//!   kinetrack info <PATH>      Show document information
//!   kinetrack fill <PATH>      Autofill keyframe gaps and rebuild derivatives
//!   kinetrack derive <PATH>    Rebuild velocity and acceleration
//!   kinetrack trim <PATH>      Export a trimmed or re-strided copy

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "kinetrack",
    about = "Motion track timelines: interpolation, derivatives, and clip trimming",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show document information
    Info {
        /// Path to the track document
        path: PathBuf,
    },

    /// Interpolate between keyframes in every authored channel
    Fill {
        /// Path to the track document
        path: PathBuf,

        /// Write the result here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rebuild velocity and acceleration from positions
    Derive {
        /// Path to the track document
        path: PathBuf,

        /// Only rebuild this track
        #[arg(short, long)]
        track: Option<String>,

        /// Use the configured derivative defaults instead of each track's own
        #[arg(long)]
        from_config: bool,

        /// Algorithm: finite_diff|finite_diff_vspill2|bounce_detect
        #[arg(long)]
        algorithm: Option<String>,

        /// Velocity stencil half-width, in steps
        #[arg(long)]
        spill: Option<usize>,

        /// Acceleration stencil half-width, in steps
        #[arg(long)]
        acceleration_spill: Option<usize>,

        /// Also report rotation about the origin
        #[arg(long)]
        rotation: bool,

        /// Print the per-track summary as JSON
        #[arg(long)]
        json: bool,

        /// Write the result here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export a copy keyed to a narrower or re-strided clip
    Trim {
        /// Path to the track document
        path: PathBuf,

        /// First frame to keep
        #[arg(long)]
        start: usize,

        /// Keep every Nth frame
        #[arg(long, default_value = "1")]
        stride: usize,

        /// Number of frames to keep
        #[arg(long)]
        count: usize,

        /// Output path (defaults to `trimmed-<name>` next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = kinetrack_common::AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    kinetrack_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Info { path } => commands::info::run(path),
        Commands::Fill { path, output } => commands::fill::run(path, output),
        Commands::Derive {
            path,
            track,
            from_config,
            algorithm,
            spill,
            acceleration_spill,
            rotation,
            json,
            output,
        } => commands::derive::run(
            path,
            commands::derive::DeriveOptions {
                track,
                defaults: from_config.then(|| config.derivatives.clone()),
                algorithm,
                spill,
                acceleration_spill,
                rotation,
                json,
            },
            output,
        ),
        Commands::Trim {
            path,
            start,
            stride,
            count,
            output,
        } => commands::trim::run(path, start, stride, count, output),
    }
}
