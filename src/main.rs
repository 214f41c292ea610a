//! bounded-buffer - Bounded Producer/Consumer Buffer
//!
//! Entry point for the demo runner.

use anyhow::{Context, Result};
use bounded_buffer::config::{CliArgs, RunConfig};
use bounded_buffer::pipeline::Coordinator;
use bounded_buffer::progress::{print_header, print_sequence, print_summary, ProgressReporter};
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose);

    // Validate and create config
    let config = RunConfig::from_args(args).context("Invalid configuration")?;

    let mut coordinator =
        Coordinator::new(config.clone()).context("Failed to initialize buffer")?;

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, draining buffer...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let progress = if config.show_progress {
        print_header(&config);
        let reporter = ProgressReporter::new(config.item_count as u64);
        let hook = reporter.clone();
        coordinator = coordinator.with_progress(Arc::new(move |item: &str| hook.item(item)));
        Some(reporter)
    } else {
        None
    };

    let result = coordinator.run().context("Run failed")?;

    if let Some(ref p) = progress {
        if result.completed {
            p.finish("done");
        } else {
            p.finish("interrupted");
        }
        print_summary(&result);
        print_sequence(&result.consumed);
    }

    if !result.completed {
        info!("Run was interrupted before all items were produced");
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("bounded_buffer=debug,warn")
    } else {
        EnvFilter::new("bounded_buffer=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(verbose)
        .with_file(false)
        .with_line_number(false)
        .init();
}
