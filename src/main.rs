use anyhow::{Context, Result};
use clap::Parser;
use dvfeed::cache::DirFeatureStore;
use dvfeed::cli::{Cli, Commands};
use dvfeed::config::FeederConfig;
use dvfeed::error::FeederError;
use dvfeed::features::FeatureExtractor;
use dvfeed::feeder::{Feeder, Mode};
use dvfeed::preprocess::build_cache;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = cli.apply_overrides(load_config(cli.config.as_deref())?);

    match &cli.command {
        Commands::Train {
            data_type,
            batches,
            seed,
        } => run_train(config, data_type, *batches, *seed)?,
        Commands::Test { pairs } => run_test(config, *pairs)?,
        Commands::Infer { wav1, wav2 } => {
            let feeder = Feeder::new(config, Mode::Infer)?;
            let pair = feeder.infer(wav1, wav2)?;
            println!(
                "{:?} {:?} match={}",
                pair.first.dim(),
                pair.second.dim(),
                pair.is_match
            );
        }
        Commands::Preprocess { wav_dir, out_dir } => {
            config.validate()?;
            let extractor = FeatureExtractor::new(&config)?;
            let summary = build_cache(&extractor, wav_dir, &DirFeatureStore::new(out_dir))?;
            println!(
                "{} cached, {} without speech, {} too short, {} failed",
                summary.written,
                summary.empty.len(),
                summary.short.len(),
                summary.failed.len()
            );
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from custom path or default location.
fn load_config(custom_path: Option<&std::path::Path>) -> Result<FeederConfig> {
    let config = if let Some(path) = custom_path {
        FeederConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else if let Some(default_path) = FeederConfig::default_path() {
        FeederConfig::load_or_default(&default_path)?
    } else {
        FeederConfig::default()
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

fn run_train(config: FeederConfig, data_type: &str, batches: usize, seed: Option<u64>) -> Result<()> {
    let mode = Mode::parse("train", Some(data_type))?;
    let feeder = Feeder::new(config, mode)?;
    let feeder = match seed {
        Some(seed) => feeder.with_seed(seed),
        None => feeder,
    };

    let handle = feeder.train_feed()?;
    for step in 0..batches {
        let batch = handle.take()?;
        println!(
            "batch {}: inputs {:?}, {} speakers, {} skipped",
            step,
            batch.inputs.dim(),
            batch.speakers.len(),
            batch.skipped.len()
        );
    }
    handle.stop();
    Ok(())
}

fn run_test(config: FeederConfig, limit: Option<usize>) -> Result<()> {
    let feeder = Feeder::new(config, Mode::Test)?;
    let handle = feeder.test_feed()?;

    let mut taken = 0;
    while limit.is_none_or(|limit| taken < limit) {
        let pair = match handle.take() {
            Ok(pair) => pair,
            Err(FeederError::Exhausted) => break,
            Err(e) => return Err(e.into()),
        };
        println!(
            "{} {} {:?} {:?} match={}",
            pair.paths.0.display(),
            pair.paths.1.display(),
            pair.first.dim(),
            pair.second.dim(),
            pair.is_match
        );
        taken += 1;
    }

    handle.stop();
    Ok(())
}
