//! Configuration types for bounded-buffer
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use clap::Parser;
use std::time::Duration;

/// Maximum reasonable producer or consumer count
const MAX_WORKERS: usize = 512;

/// Default pause after each put
const DEFAULT_DELAY_SECS: f64 = 0.01;

/// Default bound on each worker join
const DEFAULT_JOIN_TIMEOUT_SECS: f64 = 30.0;

/// Producer/consumer demo over a bounded blocking buffer
#[derive(Parser, Debug, Clone)]
#[command(
    name = "bounded-buffer",
    version,
    about = "Producer/consumer demo over a bounded blocking buffer",
    long_about = "Generates labelled items, spreads them round-robin over producer threads and \
                  drains them through one shared fixed-capacity buffer with consumer threads.\n\n\
                  Producers block while the buffer is full, consumers block while it is empty. \
                  Each consumer stops on its own sentinel.",
    after_help = "EXAMPLES:\n    \
        bounded-buffer\n    \
        bounded-buffer --items 100 --buffer-capacity 3 --producers 4 --consumers 3\n    \
        bounded-buffer -n 20 -d 0 -v"
)]
pub struct CliArgs {
    /// Total number of items to produce
    #[arg(short = 'n', long, default_value_t = 8, value_name = "NUM")]
    pub items: usize,

    /// Bounded buffer capacity
    #[arg(short = 'c', long, default_value_t = 4, value_name = "NUM")]
    pub buffer_capacity: usize,

    /// Number of producer threads
    #[arg(short = 'p', long, default_value_t = 1, value_name = "NUM")]
    pub producers: usize,

    /// Number of consumer threads
    #[arg(short = 'k', long, default_value_t = 1, value_name = "NUM")]
    pub consumers: usize,

    /// Pause (seconds) after each put, to make interleaving visible
    #[arg(short = 'd', long, default_value_t = DEFAULT_DELAY_SECS, value_name = "SECS")]
    pub delay: f64,

    /// Give up on a worker that has not finished after this many seconds
    #[arg(long, default_value_t = DEFAULT_JOIN_TIMEOUT_SECS, value_name = "SECS")]
    pub join_timeout: f64,

    /// Quiet mode - suppress header, progress bar and summary
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (per-item debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Validated runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Number of labelled items to generate
    pub item_count: usize,

    /// Buffer capacity (validated by the buffer itself)
    pub buffer_capacity: usize,

    /// Number of producer threads requested
    pub producer_count: usize,

    /// Number of consumer threads
    pub consumer_count: usize,

    /// Pause after each put
    pub delay: Duration,

    /// Bound on each worker join
    pub join_timeout: Duration,

    /// Show header, progress bar and summary
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            item_count: 8,
            buffer_capacity: 4,
            producer_count: 1,
            consumer_count: 1,
            delay: Duration::from_secs_f64(DEFAULT_DELAY_SECS),
            join_timeout: Duration::from_secs_f64(DEFAULT_JOIN_TIMEOUT_SECS),
            show_progress: false,
            verbose: false,
        }
    }
}

impl RunConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.items == 0 {
            return Err(ConfigError::InvalidItemCount { count: args.items });
        }

        validate_workers("producer", args.producers)?;
        validate_workers("consumer", args.consumers)?;

        let delay = Duration::try_from_secs_f64(args.delay).map_err(|_| ConfigError::InvalidDelay {
            seconds: args.delay,
        })?;

        let join_timeout = Duration::try_from_secs_f64(args.join_timeout)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or(ConfigError::InvalidTimeout {
                seconds: args.join_timeout,
            })?;

        Ok(Self {
            item_count: args.items,
            buffer_capacity: args.buffer_capacity,
            producer_count: args.producers,
            consumer_count: args.consumers,
            delay,
            join_timeout,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}

fn validate_workers(role: &'static str, count: usize) -> Result<(), ConfigError> {
    if count == 0 || count > MAX_WORKERS {
        return Err(ConfigError::InvalidWorkerCount {
            role,
            count,
            max: MAX_WORKERS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("bounded-buffer").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_args(parse(&[])).unwrap();
        assert_eq!(
            config,
            RunConfig {
                show_progress: true,
                ..RunConfig::default()
            }
        );
    }

    #[test]
    fn test_flags() {
        let config = RunConfig::from_args(parse(&[
            "-n", "100", "-c", "3", "-p", "4", "-k", "3", "-d", "0", "-q",
        ]))
        .unwrap();

        assert_eq!(config.item_count, 100);
        assert_eq!(config.buffer_capacity, 3);
        assert_eq!(config.producer_count, 4);
        assert_eq!(config.consumer_count, 3);
        assert_eq!(config.delay, Duration::ZERO);
        assert!(!config.show_progress);
    }

    #[test]
    fn test_zero_consumers_rejected() {
        let err = RunConfig::from_args(parse(&["--consumers", "0"])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidWorkerCount {
                role: "consumer",
                count: 0,
                max: MAX_WORKERS,
            }
        );
    }

    #[test]
    fn test_zero_items_rejected() {
        let err = RunConfig::from_args(parse(&["--items", "0"])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidItemCount { count: 0 });
    }

    #[test]
    fn test_negative_delay_rejected() {
        let err = RunConfig::from_args(parse(&["--delay=-0.5"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDelay { .. }));
    }

    #[test]
    fn test_zero_join_timeout_rejected() {
        let err = RunConfig::from_args(parse(&["--join-timeout", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));
    }

    #[test]
    fn test_negative_capacity_fails_to_parse() {
        let result = CliArgs::try_parse_from(["bounded-buffer", "--buffer-capacity=-1"]);
        assert!(result.is_err());
    }
}
