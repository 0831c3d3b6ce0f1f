//! Command-line interface for dvfeed
//!
//! Provides argument parsing using clap derive macros.

use crate::config::FeederConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Speaker-embedding training data feeder
#[derive(Parser, Debug)]
#[command(name = "dvfeed", version, about = "Speaker-embedding training data feeder")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Feature cache root (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    pub in_dir: Option<PathBuf>,

    /// Directory of test WAV files (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    pub test_dir: Option<PathBuf>,

    /// Window length in seconds (overrides config)
    #[arg(long, global = true, value_name = "SECONDS")]
    pub segment_length: Option<f64>,

    /// Window overlap ratio in [0, 1) (overrides config)
    #[arg(long, global = true, value_name = "RATIO")]
    pub overlap_ratio: Option<f64>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream speaker-balanced training batches and print their shapes
    Train {
        /// Data subset under the cache root (e.g. train, validation)
        data_type: String,

        /// Number of batches to take before stopping
        #[arg(long, short = 'n', default_value = "1")]
        batches: usize,

        /// Seed for speaker and crop sampling
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Stream every pair of test WAV files and print shapes and match flags
    Test {
        /// Stop after this many pairs (default: all)
        #[arg(long, short = 'n')]
        pairs: Option<usize>,
    },

    /// Extract windows for two WAV files
    Infer {
        /// First WAV file
        wav1: PathBuf,
        /// Second WAV file
        wav2: PathBuf,
    },

    /// Build a feature cache from a directory of WAV files
    Preprocess {
        /// Directory of input WAV files
        wav_dir: PathBuf,
        /// Output cache directory
        out_dir: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

impl Cli {
    /// Applies command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, mut config: FeederConfig) -> FeederConfig {
        if let Some(dir) = &self.in_dir {
            config.in_dir = dir.clone();
        }
        if let Some(dir) = &self.test_dir {
            config.test_dir = dir.clone();
        }
        if let Some(secs) = self.segment_length {
            config.segment_length = secs;
        }
        if let Some(ratio) = self.overlap_ratio {
            config.overlap_ratio = ratio;
        }
        config
    }

    /// Default `tracing` filter directive for the verbosity flags.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_command() {
        let cli = Cli::try_parse_from(["dvfeed", "train", "validation", "-n", "3"]).unwrap();
        match cli.command {
            Commands::Train {
                data_type,
                batches,
                seed,
            } => {
                assert_eq!(data_type, "validation");
                assert_eq!(batches, 3);
                assert!(seed.is_none());
            }
            other => panic!("Expected Train, got {:?}", other),
        }
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_train_requires_data_type() {
        assert!(Cli::try_parse_from(["dvfeed", "train"]).is_err());
    }

    #[test]
    fn test_parse_test_defaults_to_all_pairs() {
        let cli = Cli::try_parse_from(["dvfeed", "test"]).unwrap();
        assert!(matches!(cli.command, Commands::Test { pairs: None }));
    }

    #[test]
    fn test_parse_infer_paths() {
        let cli = Cli::try_parse_from(["dvfeed", "infer", "a.wav", "b.wav"]).unwrap();
        match cli.command {
            Commands::Infer { wav1, wav2 } => {
                assert_eq!(wav1, PathBuf::from("a.wav"));
                assert_eq!(wav2, PathBuf::from("b.wav"));
            }
            other => panic!("Expected Infer, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_subcommand_is_error() {
        assert!(Cli::try_parse_from(["dvfeed", "eval"]).is_err());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["dvfeed", "-vv", "test"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_filter(), "trace");
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        let cli = Cli::try_parse_from(["dvfeed", "test", "-q", "-v"]).unwrap();
        assert_eq!(cli.log_filter(), "error");
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = Cli::try_parse_from([
            "dvfeed",
            "--in-dir",
            "/data/feats",
            "--segment-length",
            "2.0",
            "test",
        ])
        .unwrap();

        let config = cli.apply_overrides(FeederConfig::default());
        assert_eq!(config.in_dir, PathBuf::from("/data/feats"));
        assert_eq!(config.segment_length, 2.0);
        assert_eq!(config.overlap_ratio, FeederConfig::default().overlap_ratio);
    }
}
