// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tagscan — capture, straighten, and archive inspection tag photos.
//
// Entry point. Initialises logging, loads settings, and dispatches the
// `capture`, `list`, and `verify` subcommands.

mod capture;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use tagscan_archive::PairStore;
use tagscan_core::error::{Result, TagscanError};
use tagscan_core::status::{format_bytes, humanize_error};
use tagscan_core::{AppConfig, PipelineConfig, RoiRect};

use capture::{CaptureService, RoiSpace};

#[derive(Parser)]
#[command(name = "tagscan")]
#[command(about = "Straighten and archive photos of inspection tags")]
#[command(version)]
struct Cli {
    /// Settings file (JSON). Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "tagscan.json")]
    config: PathBuf,

    /// Archive directory, overriding the settings file.
    #[arg(long, global = true)]
    archive: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Straighten a tag photo and archive the original/corrected pair.
    Capture {
        /// Path to the photo.
        image: PathBuf,

        /// Search only inside this rectangle, as `x,y,w,h`.
        #[arg(long)]
        roi: Option<RoiRect>,

        /// Preview size `WxH` the ROI was drawn on; omit for source pixels.
        #[arg(long, requires = "roi")]
        display: Option<DisplaySize>,

        /// Segmentation strategy, overriding the settings file.
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,

        /// Also write the corrected image here (format from extension).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List archived pairs, newest first.
    List,
    /// Re-check an archived pair against its recorded SHA-256 digests.
    Verify {
        /// Archive id as printed by `capture` or `list`.
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// Edge map over the whole frame.
    Edge,
    /// Colour blob, usually inside an ROI.
    Color,
}

/// `WxH` preview size.
#[derive(Debug, Clone, Copy)]
struct DisplaySize {
    width: u32,
    height: u32,
}

impl FromStr for DisplaySize {
    type Err = TagscanError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TagscanError::Config(format!("display size must look like 640x480, got {s:?}"));
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = w.trim().parse().map_err(|_| invalid())?;
        let height = h.trim().parse().map_err(|_| invalid())?;
        Ok(Self { width, height })
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "tagscan failed");
            let status = humanize_error(&err);
            eprintln!("{}", status.message);
            if let Some(suggestion) = status.suggestion {
                eprintln!("{suggestion}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(dir) = cli.archive {
        config.archive_dir = dir;
    }
    tracing::info!(archive = %config.archive_dir.display(), "Tagscan starting");

    match cli.command {
        Commands::Capture {
            image,
            roi,
            display,
            strategy,
            output,
        } => {
            let roi = roi.map(|rect| match display {
                Some(size) => (rect, RoiSpace::Display(size.width, size.height)),
                None => (rect, RoiSpace::Source),
            });
            run_capture(config, &image, roi, strategy, output.as_deref())
        }
        Commands::List => run_list(&config),
        Commands::Verify { id } => run_verify(&config, &id),
    }
}

fn run_capture(
    config: AppConfig,
    image_path: &Path,
    roi: Option<(RoiRect, RoiSpace)>,
    strategy: Option<Strategy>,
    output: Option<&Path>,
) -> Result<()> {
    let pipeline = match strategy {
        Some(Strategy::Edge) => PipelineConfig {
            max_dimension: config.pipeline.max_dimension,
            ..PipelineConfig::edge_based()
        },
        Some(Strategy::Color) => PipelineConfig {
            max_dimension: config.pipeline.max_dimension,
            ..PipelineConfig::color_based()
        },
        None => config.pipeline.clone(),
    };

    tracing::info!("Loading image: {}", image_path.display());
    let bytes = std::fs::read(image_path)?;

    let mut service = CaptureService::new(config);
    let report = service.capture(&bytes, roi, &pipeline)?;

    if let Some(path) = output {
        report.corrected.save(path)?;
        tracing::info!("Corrected image written to {}", path.display());
    }

    eprintln!("{}", report.status.message);
    if let Some(suggestion) = &report.status.suggestion {
        eprintln!("{suggestion}");
    }
    println!("{}", serde_json::to_string_pretty(&report.summary())?);
    Ok(())
}

fn run_list(config: &AppConfig) -> Result<()> {
    let archive = tagscan_archive::FsArchive::new(config.archive_dir.clone(), config.max_upload_bytes);
    let entries = archive.list()?;
    if entries.is_empty() {
        eprintln!("No saved photos yet.");
        return Ok(());
    }
    for entry in &entries {
        eprintln!(
            "{}  original {}  corrected {}",
            entry.id,
            format_bytes(entry.original_size),
            format_bytes(entry.corrected_size)
        );
    }
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn run_verify(config: &AppConfig, id: &str) -> Result<()> {
    let archive = tagscan_archive::FsArchive::new(config.archive_dir.clone(), config.max_upload_bytes);
    let sidecar = archive.verify(id)?;
    eprintln!("Pair {id} is intact.");
    println!("{}", serde_json::to_string_pretty(&sidecar)?);
    Ok(())
}
