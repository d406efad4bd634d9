//! Kviss CLI entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use kviss::config::Settings;
use kviss::media::sweep_storage;
use kviss::server;
use kviss::store::Store;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Kviss - Video ingestion, transcription, and question generation
///
/// Downloads YouTube audio, transcribes it, and generates educational
/// questions over an HTTP API. The name "Kviss" is the Norwegian spelling
/// of "quiz."
#[derive(Parser, Debug)]
#[command(name = "kviss")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Report (and optionally remove) audio files no row references
    Sweep {
        /// Remove orphaned files instead of only reporting them
        #[arg(long)]
        delete: bool,
    },

    /// Check system requirements and configuration
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("kviss={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    match &cli.command {
        Commands::Serve { host, port } => {
            server::run_serve(host, *port, settings).await?;
        }

        Commands::Sweep { delete } => {
            run_sweep(&settings, *delete)?;
        }

        Commands::Doctor => {
            run_doctor(&settings);
        }
    }

    Ok(())
}

fn run_sweep(settings: &Settings, delete: bool) -> Result<()> {
    let store = Store::open(&settings.database_path(), settings.embedding.dim as usize)?;
    let report = sweep_storage(&store, &settings.audio_dir(), delete)?;

    println!(
        "Scanned {} file(s) under {:?}",
        report.scanned,
        settings.audio_dir()
    );
    if report.orphans.is_empty() {
        println!("No orphaned files found.");
        return Ok(());
    }

    println!("Found {} orphaned file(s):", report.orphans.len());
    for orphan in &report.orphans {
        println!("  {}", orphan.display());
    }

    if delete {
        println!("Removed {} file(s).", report.removed);
    } else {
        println!("Run with --delete to remove them.");
    }

    Ok(())
}

fn run_doctor(settings: &Settings) {
    println!("Kviss Doctor\n");

    println!("External tools:");
    for tool in ["yt-dlp", "ffmpeg", "ffprobe"] {
        let version_arg = if tool == "yt-dlp" { "--version" } else { "-version" };
        match std::process::Command::new(tool).arg(version_arg).output() {
            Ok(output) if output.status.success() => println!("  ok      {}", tool),
            Ok(_) => println!("  BROKEN  {} (installed but not working)", tool),
            Err(_) => println!("  MISSING {} (install it and ensure it's in PATH)", tool),
        }
    }

    println!("\nDatabase:");
    match Store::open(&settings.database_path(), settings.embedding.dim as usize) {
        Ok(_) => println!("  ok      {:?}", settings.database_path()),
        Err(e) => println!("  ERROR   {:?}: {}", settings.database_path(), e),
    }

    println!("\nStorage:");
    match std::fs::create_dir_all(settings.audio_dir()) {
        Ok(()) => println!("  ok      {:?}", settings.audio_dir()),
        Err(e) => println!("  ERROR   {:?}: {}", settings.audio_dir(), e),
    }

    println!("\nConfiguration:");
    println!(
        "  transcription: {} ({})",
        settings.transcription.provider, settings.transcription.model
    );
    println!(
        "  embedding:     {} ({} dims)",
        settings.embedding.model_name, settings.embedding.dim
    );
    println!(
        "  llm:           {} @ {}",
        settings.llm.model, settings.llm.base_url
    );
    println!(
        "  chunking:      {} MB threshold, {} dB floor, {}s min silence",
        settings.chunking.max_chunk_size_mb,
        settings.chunking.silence_threshold_db,
        settings.chunking.min_silence_duration_s
    );
}
