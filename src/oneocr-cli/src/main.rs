//! OneOCR - batch OCR CLI
//!
//! Recognizes text in every image of a source directory and writes one text
//! file per image into a destination directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use oneocr_cli::batch::{self, BatchRunner};
use oneocr_cli::colored_logger;
use oneocr_cli::config::{Config, OutputFormat};

#[derive(Parser)]
#[command(name = "oneocr")]
#[command(about = "Batch OCR using the OneOCR native engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize every image in a directory
    Batch {
        /// Source directory with images
        #[arg(short, long)]
        src: Option<PathBuf>,

        /// Destination directory for results
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Recognize a single image and print the result
    Recognize {
        /// Image file
        image: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Check that the native library and model are usable
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    colored_logger::init_logger(cli.verbose)?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Batch { src, dest, format } => {
            cmd_batch(config, src, dest, format)?;
        }
        Commands::Recognize { image, format } => {
            cmd_recognize(config, image, format)?;
        }
        Commands::Check => {
            cmd_check(config)?;
        }
    }

    Ok(())
}

fn cmd_batch(
    mut config: Config,
    src: Option<PathBuf>,
    dest: Option<PathBuf>,
    format: Option<OutputFormat>,
) -> Result<()> {
    if let Some(src) = src {
        config.batch.src_dir = src;
    }
    if let Some(dest) = dest {
        config.batch.dest_dir = dest;
    }
    if let Some(format) = format {
        config.batch.format = format;
    }

    let src_dir = config.batch.src_dir.clone();
    if batch::ensure_dir(&src_dir)? {
        info!("source directory created at: {:?}", src_dir);
    }
    if batch::ensure_dir(&config.batch.dest_dir)? {
        info!("destination directory created at: {:?}", config.batch.dest_dir);
    }

    let images = batch::find_images(&src_dir, &config.batch.extensions)?;
    info!(
        "found {} image(s) to process (supported: {})",
        images.len(),
        config.batch.extensions.join(", ")
    );
    if images.is_empty() {
        warn!("add images to {:?} and rerun", src_dir);
        return Ok(());
    }

    let engine = oneocr_engine::initialize(config.engine.clone())
        .context("OCR initialization failed; make sure the native library and model file are in place")?;

    // Stop between images on Ctrl+C
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        warn!("received shutdown signal, finishing current image...");
        r.store(false, Ordering::Relaxed);
    })?;

    let summary = BatchRunner::new(engine.as_ref(), config.batch)
        .with_running_flag(running)
        .run(&images)?;

    if summary.failed > 0 {
        error!("{} image(s) failed", summary.failed);
    }
    Ok(())
}

fn cmd_recognize(config: Config, image: PathBuf, format: OutputFormat) -> Result<()> {
    let engine = oneocr_engine::initialize(config.engine)?;
    let result = engine
        .recognize_path(&image)
        .with_context(|| format!("OCR failed for {:?}", image))?;

    println!("{}", batch::render(&result, format)?);
    Ok(())
}

fn cmd_check(config: Config) -> Result<()> {
    println!("checking OCR dependencies...\n");

    let library_ok = config.engine.library_path.exists();
    println!(
        "  library: {} ({})",
        if library_ok { "OK" } else { "NOT FOUND" },
        config.engine.library_path.display()
    );

    let model_ok = config.engine.model_path.exists();
    println!(
        "  model:   {} ({})",
        if model_ok { "OK" } else { "NOT FOUND" },
        config.engine.model_path.display()
    );

    let engine_ok = match oneocr_engine::initialize(config.engine) {
        Ok(_) => true,
        Err(e) => {
            println!("  engine:  FAILED ({})", e);
            false
        }
    };
    if engine_ok {
        println!("  engine:  OK");
    }

    println!();

    if engine_ok {
        println!("all checks passed!");
        Ok(())
    } else {
        println!("Place the OneOCR library, oneocr.onemodel and their runtime dependencies");
        println!("next to the executable, or set their paths in the [engine] config section.");
        Err(anyhow::anyhow!("OCR engine is not usable"))
    }
}
