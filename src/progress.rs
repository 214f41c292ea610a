//! Progress reporting for producer/consumer runs
//!
//! Provides a consumed-items progress bar using indicatif and a styled
//! header and summary using console.

use crate::config::RunConfig;
use crate::pipeline::RunResult;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar counting consumed items
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a reporter expecting `total` items
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Record one consumed item
    pub fn item(&self, label: &str) {
        self.bar.inc(1);
        self.bar.set_message(label.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header at the start of the run
pub fn print_header(config: &RunConfig) {
    println!();
    println!(
        "{} {}",
        style("bounded-buffer").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Items:").bold(),
        format_number(config.item_count as u64)
    );
    println!("  {} {}", style("Capacity:").bold(), config.buffer_capacity);
    println!(
        "  {} {} producers / {} consumers",
        style("Workers:").bold(),
        config.producer_count,
        config.consumer_count
    );
    println!(
        "  {} {:.3}s per put",
        style("Delay:").bold(),
        config.delay.as_secs_f64()
    );
    println!();
}

/// Print a summary of the run
pub fn print_summary(result: &RunResult) {
    let secs = result.duration.as_secs_f64();
    let rate = if secs > 0.0 {
        result.consumed.len() as f64 / secs
    } else {
        0.0
    };

    println!();
    if result.completed {
        println!("{}", style("Run Complete").green().bold());
    } else {
        println!("{}", style("Run Interrupted").yellow().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Started:").bold(),
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  {} {} by {} producers",
        style("Produced:").bold(),
        format_number(result.produced),
        result.producers
    );
    println!(
        "  {} {} by {} consumers",
        style("Consumed:").bold(),
        format_number(result.consumed.len() as u64),
        result.consumers
    );
    println!(
        "  {} peak {} | {} full waits | {} empty waits",
        style("Buffer:").bold(),
        result.buffer.peak_size,
        format_number(result.buffer.put_waits),
        format_number(result.buffer.get_waits)
    );
    println!(
        "  {} {:.2}s ({:.0} items/sec)",
        style("Duration:").bold(),
        secs,
        rate
    );
    println!();
}

/// Print the consumed sequence, one line
pub fn print_sequence(consumed: &[String]) {
    println!("  {} [{}]", style("Sequence:").bold(), consumed.join(", "));
}
