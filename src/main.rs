#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    dead_code,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::missing_errors_doc
)]
mod backend;
mod config;
mod config_io;
mod overlays;
mod scene;
mod state;
mod tracking;

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use backend::{replay::replay_run, BackendError};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Places overlays on detected reference images and opens a product page on tap
#[derive(Default, Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Recorded session to play back
    #[arg(short, long, value_name = "FILE_PATH")]
    replay: Option<PathBuf>,

    /// Keep running after the recorded session ends
    #[arg(long)]
    keep_running: bool,

    /// Path to write logs to
    #[arg(short, long, value_name = "FILE_PATH")]
    log_to: Option<String>,
}

fn main() {
    let mut args = Args::parse();

    logging_init(&mut args);

    log::info!(
        "Welcome to {} version {}!",
        env!("CARGO_PKG_NAME"),
        env!("ANCHOR_BUILD"),
    );
    log::info!("It is {}.", chrono::Local::now().format("%c"));

    let running = Arc::new(AtomicBool::new(true));
    let _ = ctrlc::set_handler({
        let running = running.clone();
        move || {
            running.store(false, Ordering::Relaxed);
        }
    });

    match replay_run(running, args.replay.as_deref(), args.keep_running) {
        Ok(()) => {}
        Err(e @ BackendError::MissingResources { .. }) => {
            log::error!("{e}");
            std::process::exit(1);
        }
        Err(e) => {
            log::error!("{e:?}");
            std::process::exit(1);
        }
    }
}

fn logging_init(args: &mut Args) {
    let log_file_path = args
        .log_to
        .take()
        .or_else(|| std::env::var("ANCHOR_LOGFILE").ok())
        .unwrap_or_else(|| String::from("/tmp/image-anchor-overlay.log"));

    let file_writer = match std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_file_path)
    {
        Ok(file) => {
            println!("Logging to {}", &log_file_path);
            Some(file)
        }
        Err(e) => {
            println!("Failed to open log file (path: {e:?}): {log_file_path}");
            None
        }
    };

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr),
        )
        .with(
            /* read RUST_LOG env var */
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        );

    if let Some(writer) = file_writer {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .init();
    } else {
        registry.init();
    }

    log_panics::init();
}
