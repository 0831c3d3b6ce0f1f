//! Producer/consumer plumbing for feeding batches.
//!
//! One producer thread per feeder, connected to the consumer by a bounded
//! crossbeam channel for backpressure.

pub mod error;
pub mod producer;
pub mod types;

pub use error::{ErrorReporter, LogReporter, StationError};
pub use producer::{FeederHandle, Producer, ProducerRunner, StopReason};
pub use types::{FeederItem, TestPair, TrainBatch};
