//! Feeder orchestrator: mode dispatch and producer setup.
//!
//! The mode is fixed at construction. Train and test modes start a
//! background producer and return the consumer handle; infer mode extracts
//! one pair synchronously.

pub mod pairs;
pub mod train;

pub use pairs::{TestPairProducer, extract_pair, list_wavs, unordered_pairs};
pub use train::TrainBatchProducer;

use crate::cache::{DirFeatureStore, FeatureStore};
use crate::config::FeederConfig;
use crate::error::{FeederError, Result};
use crate::features::FeatureExtractor;
use crate::pipeline::{
    ErrorReporter, FeederHandle, FeederItem, LogReporter, Producer, ProducerRunner, StationError,
    TestPair, TrainBatch,
};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Operating mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Stream speaker-balanced batches from `<in_dir>/<data_type>`.
    Train { data_type: String },
    /// Stream every pair of WAV files in the test directory.
    Test,
    /// One-shot extraction of an explicit pair.
    Infer,
}

impl Mode {
    /// Parses a mode name; train mode also needs a data subset.
    pub fn parse(mode: &str, data_type: Option<&str>) -> Result<Self> {
        match mode {
            "train" => match data_type {
                Some(data_type) if !data_type.is_empty() => Ok(Mode::Train {
                    data_type: data_type.to_string(),
                }),
                _ => Err(FeederError::MissingDataType),
            },
            "test" => Ok(Mode::Test),
            "infer" => Ok(Mode::Infer),
            other => Err(FeederError::UnsupportedMode {
                mode: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Train { .. } => "train",
            Mode::Test => "test",
            Mode::Infer => "infer",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wraps a producer so its output goes through the shared `FeederItem` queue.
struct ItemProducer<P>(P);

impl<P> Producer for ItemProducer<P>
where
    P: Producer,
    P::Output: Into<FeederItem>,
{
    type Output = FeederItem;

    fn produce(&mut self) -> std::result::Result<Option<FeederItem>, StationError> {
        self.0.produce().map(|item| item.map(Into::into))
    }

    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn shutdown(&mut self) {
        self.0.shutdown();
    }
}

/// Composes the sampler, extractor and producer for one mode.
pub struct Feeder {
    config: FeederConfig,
    mode: Mode,
    extractor: FeatureExtractor,
    error_reporter: Arc<dyn ErrorReporter>,
    seed: Option<u64>,
}

impl Feeder {
    /// Validates the configuration and prepares the extractor.
    pub fn new(config: FeederConfig, mode: Mode) -> Result<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::new(&config)?;
        Ok(Self {
            config,
            mode,
            extractor,
            error_reporter: Arc::new(LogReporter),
            seed: None,
        })
    }

    /// Replaces the feature extractor (e.g. to plug in a different VAD classifier).
    pub fn with_extractor(mut self, extractor: FeatureExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Seeds the train producer's random source.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn config(&self) -> &FeederConfig {
        &self.config
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.queue.poll_interval_ms)
    }

    /// Starts the background producer for the configured mode.
    ///
    /// Infer mode has no producer and returns `NoProducer`.
    pub fn set_up(&self) -> Result<FeederHandle<FeederItem>> {
        match &self.mode {
            Mode::Train { data_type } => {
                let producer = self.train_producer(data_type)?;
                Ok(ProducerRunner::spawn(
                    ItemProducer(producer),
                    self.config.queue.train_high_water,
                    self.poll_interval(),
                    self.error_reporter.clone(),
                ))
            }
            Mode::Test => {
                let producer = self.test_producer()?;
                Ok(ProducerRunner::spawn(
                    ItemProducer(producer),
                    self.config.queue.test_high_water,
                    self.poll_interval(),
                    self.error_reporter.clone(),
                ))
            }
            Mode::Infer => Err(FeederError::NoProducer {
                mode: self.mode.to_string(),
            }),
        }
    }

    fn wrong_mode(&self, expected: &'static str) -> FeederError {
        FeederError::WrongMode {
            expected,
            actual: self.mode.as_str(),
        }
    }

    /// Starts a typed train feed over `<in_dir>/<data_type>` of the train mode.
    pub fn train_feed(&self) -> Result<FeederHandle<TrainBatch>> {
        let Mode::Train { data_type } = &self.mode else {
            return Err(self.wrong_mode("train"));
        };
        let producer = self.train_producer(data_type)?;
        Ok(ProducerRunner::spawn(
            producer,
            self.config.queue.train_high_water,
            self.poll_interval(),
            self.error_reporter.clone(),
        ))
    }

    /// Starts a typed test feed over the configured test directory.
    pub fn test_feed(&self) -> Result<FeederHandle<TestPair>> {
        if self.mode != Mode::Test {
            return Err(self.wrong_mode("test"));
        }
        let producer = self.test_producer()?;
        Ok(ProducerRunner::spawn(
            producer,
            self.config.queue.test_high_water,
            self.poll_interval(),
            self.error_reporter.clone(),
        ))
    }

    /// Extracts windows for two explicit WAV files.
    pub fn infer(&self, first: &Path, second: &Path) -> Result<TestPair> {
        if self.mode != Mode::Infer {
            return Err(self.wrong_mode("infer"));
        }
        let pair = extract_pair(&self.extractor, first, second)?;
        info!(
            first_shape = ?pair.first.dim(),
            second_shape = ?pair.second.dim(),
            is_match = pair.is_match,
            "Inference pair ready"
        );
        Ok(pair)
    }

    fn train_producer(&self, data_type: &str) -> Result<TrainBatchProducer<DirFeatureStore>> {
        let store = DirFeatureStore::new(self.config.in_dir.join(data_type));
        let utterances = store.list()?;
        if utterances.is_empty() {
            return Err(FeederError::EmptyRoster {
                path: store.root().display().to_string(),
            });
        }

        let producer = TrainBatchProducer::new(store, utterances, &self.config)
            .with_error_reporter(self.error_reporter.clone());
        if !producer.sampler().has_valid_speaker() {
            return Err(FeederError::NoValidSpeakers {
                path: self.config.in_dir.join(data_type).display().to_string(),
                required: self.config.num_utt_per_batch,
            });
        }
        let producer = match self.seed {
            Some(seed) => producer.with_seed(seed),
            None => producer,
        };
        info!(
            data_type,
            speakers = producer.sampler().roster().len(),
            window_frames = self.config.window_frames(),
            "Train feed ready"
        );
        Ok(producer)
    }

    fn test_producer(&self) -> Result<TestPairProducer> {
        let wavs = list_wavs(&self.config.test_dir)?;
        let pairs = unordered_pairs(&wavs);
        if pairs.is_empty() {
            return Err(FeederError::NoTestPairs {
                path: self.config.test_dir.display().to_string(),
            });
        }
        info!(files = wavs.len(), pairs = pairs.len(), "Test feed ready");
        Ok(TestPairProducer::new(pairs, self.extractor.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_train_requires_data_type() {
        assert_eq!(
            Mode::parse("train", Some("validation")).unwrap(),
            Mode::Train {
                data_type: "validation".to_string()
            }
        );
        assert!(matches!(
            Mode::parse("train", None),
            Err(FeederError::MissingDataType)
        ));
        assert!(matches!(
            Mode::parse("train", Some("")),
            Err(FeederError::MissingDataType)
        ));
    }

    #[test]
    fn parse_rejects_unknown_mode() {
        assert_eq!(Mode::parse("test", None).unwrap(), Mode::Test);
        assert_eq!(Mode::parse("infer", Some("ignored")).unwrap(), Mode::Infer);
        match Mode::parse("eval", None) {
            Err(FeederError::UnsupportedMode { mode }) => assert_eq!(mode, "eval"),
            other => panic!("Expected UnsupportedMode, got {:?}", other),
        }
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = FeederConfig {
            overlap_ratio: 1.0,
            ..FeederConfig::default()
        };
        assert!(matches!(
            Feeder::new(config, Mode::Test),
            Err(FeederError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn infer_mode_has_no_producer() {
        let feeder = Feeder::new(FeederConfig::default(), Mode::Infer).unwrap();
        assert!(matches!(
            feeder.set_up(),
            Err(FeederError::NoProducer { .. })
        ));
    }

    #[test]
    fn empty_cache_is_empty_roster() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("train")).unwrap();
        let config = FeederConfig {
            in_dir: dir.path().to_path_buf(),
            ..FeederConfig::default()
        };
        let feeder = Feeder::new(config, Mode::parse("train", Some("train")).unwrap()).unwrap();

        assert!(matches!(
            feeder.set_up(),
            Err(FeederError::EmptyRoster { .. })
        ));
    }

    #[test]
    fn cache_without_a_full_speaker_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = DirFeatureStore::new(dir.path().join("train"));
        let feats = ndarray::Array2::<f32>::zeros((200, 40));
        store.save("id1_a_00001", &feats).unwrap();
        store.save("id2_a_00001", &feats).unwrap();
        let config = FeederConfig {
            in_dir: dir.path().to_path_buf(),
            num_utt_per_batch: 2,
            ..FeederConfig::default()
        };
        let feeder = Feeder::new(config, Mode::parse("train", Some("train")).unwrap()).unwrap();

        assert!(matches!(
            feeder.train_feed(),
            Err(FeederError::NoValidSpeakers { required: 2, .. })
        ));
    }

    #[test]
    fn feeds_refuse_other_modes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("id1_a_00001.wav"), b"").unwrap();
        std::fs::write(dir.path().join("id1_a_00002.wav"), b"").unwrap();
        let config = FeederConfig {
            test_dir: dir.path().to_path_buf(),
            ..FeederConfig::default()
        };
        let wav = dir.path().join("id1_a_00001.wav");

        let infer = Feeder::new(config.clone(), Mode::Infer).unwrap();
        assert!(matches!(
            infer.test_feed(),
            Err(FeederError::WrongMode {
                expected: "test",
                actual: "infer"
            })
        ));
        assert!(matches!(
            infer.train_feed(),
            Err(FeederError::WrongMode {
                expected: "train",
                ..
            })
        ));

        let test = Feeder::new(config.clone(), Mode::Test).unwrap();
        assert!(matches!(
            test.train_feed(),
            Err(FeederError::WrongMode {
                expected: "train",
                actual: "test"
            })
        ));
        assert!(matches!(
            test.infer(&wav, &wav),
            Err(FeederError::WrongMode {
                expected: "infer",
                ..
            })
        ));

        let train = Feeder::new(config, Mode::parse("train", Some("train")).unwrap()).unwrap();
        assert!(matches!(
            train.test_feed(),
            Err(FeederError::WrongMode {
                expected: "test",
                actual: "train"
            })
        ));
    }

    #[test]
    fn single_wav_has_no_test_pairs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("id1_a_00001.wav"), b"").unwrap();
        let config = FeederConfig {
            test_dir: dir.path().to_path_buf(),
            ..FeederConfig::default()
        };
        let feeder = Feeder::new(config, Mode::Test).unwrap();

        assert!(matches!(
            feeder.set_up(),
            Err(FeederError::NoTestPairs { .. })
        ));
    }
}
