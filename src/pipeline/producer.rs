//! Background producer thread and the consumer-side queue handle.
//!
//! A single producer runs in its own thread and hands items to the consumer
//! over a bounded crossbeam channel. The channel capacity is the queue's
//! high-water mark: when it is full the producer blocks in
//! `send_timeout`, waking every poll interval to observe the stop flag.

use crate::error::{FeederError, Result};
use crate::pipeline::error::{ErrorReporter, StationError};
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// How long `FeederHandle::stop` waits for the producer thread.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A source of items that runs in a background thread.
pub trait Producer: Send + 'static {
    /// The item type handed to the consumer.
    type Output: Send + 'static;

    /// Builds the next item.
    ///
    /// Returns:
    /// - `Ok(Some(item))` - an item to enqueue
    /// - `Ok(None)` - nothing left to produce; the producer stops
    /// - `Err(StationError)` - recoverable errors skip the item, fatal ones stop the producer
    fn produce(&mut self) -> std::result::Result<Option<Self::Output>, StationError>;

    /// Returns the name of this producer for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called once when the producer loop ends.
    fn shutdown(&mut self) {}
}

/// Why a producer stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// The producer had nothing left to produce.
    Exhausted,
    /// A fatal error ended production.
    Failed(String),
    /// The stop flag was cleared.
    Stopped,
    /// The consumer dropped its end of the queue.
    Disconnected,
}

#[derive(Debug)]
struct ProducerState {
    running: AtomicBool,
    reason: Mutex<Option<StopReason>>,
}

impl ProducerState {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            reason: Mutex::new(None),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn finish(&self, reason: StopReason) {
        if let Ok(mut slot) = self.reason.lock()
            && slot.is_none()
        {
            *slot = Some(reason);
        }
        self.running.store(false, Ordering::SeqCst);
    }

    fn reason(&self) -> Option<StopReason> {
        self.reason.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Spawns producers into dedicated threads.
pub struct ProducerRunner<P: Producer> {
    _phantom: PhantomData<P>,
}

impl<P: Producer> ProducerRunner<P> {
    /// Starts `producer` in a new thread.
    ///
    /// # Arguments
    /// * `producer` - The producer implementation to run
    /// * `capacity` - Queue high-water mark (channel capacity, at least 1)
    /// * `poll_interval` - How often a blocked send re-checks the stop flag
    /// * `error_reporter` - Reporter for handling errors
    pub fn spawn(
        mut producer: P,
        capacity: usize,
        poll_interval: Duration,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> FeederHandle<P::Output> {
        let name = producer.name();
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let state = Arc::new(ProducerState::new());
        let thread_state = state.clone();

        let handle = thread::spawn(move || {
            Self::run_producer(
                &mut producer,
                tx,
                &thread_state,
                poll_interval,
                error_reporter.as_ref(),
            );
        });

        debug!(station = name, capacity, "Producer started");

        FeederHandle {
            rx,
            state,
            thread: Some(handle),
            name,
        }
    }

    /// Main production loop.
    fn run_producer(
        producer: &mut P,
        tx: Sender<P::Output>,
        state: &ProducerState,
        poll_interval: Duration,
        error_reporter: &dyn ErrorReporter,
    ) {
        let name = producer.name();

        let reason = loop {
            if !state.is_running() {
                break StopReason::Stopped;
            }

            match producer.produce() {
                Ok(Some(item)) => {
                    if let Err(reason) = Self::deliver(item, &tx, state, poll_interval) {
                        break reason;
                    }
                }
                Ok(None) => {
                    info!(station = name, "Producer exhausted");
                    break StopReason::Exhausted;
                }
                Err(StationError::Recoverable(msg)) => {
                    error_reporter.report(name, &StationError::Recoverable(msg));
                }
                Err(StationError::Fatal(msg)) => {
                    error_reporter.report(name, &StationError::Fatal(msg.clone()));
                    break StopReason::Failed(msg);
                }
            }
        };

        debug!(station = name, reason = ?reason, "Producer stopping");
        state.finish(reason);
        producer.shutdown();
    }

    /// Blocks until the item is queued, the consumer hangs up, or the stop flag clears.
    fn deliver(
        mut item: P::Output,
        tx: &Sender<P::Output>,
        state: &ProducerState,
        poll_interval: Duration,
    ) -> std::result::Result<(), StopReason> {
        loop {
            match tx.send_timeout(item, poll_interval) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(pending)) => {
                    if !state.is_running() {
                        return Err(StopReason::Stopped);
                    }
                    trace!("Queue at high-water mark, producer waiting");
                    item = pending;
                }
                Err(SendTimeoutError::Disconnected(_)) => return Err(StopReason::Disconnected),
            }
        }
    }
}

/// Consumer side of a running producer.
///
/// Items arrive in production order. Dropping the handle disconnects the
/// queue and the producer exits at its next send.
pub struct FeederHandle<T> {
    rx: Receiver<T>,
    state: Arc<ProducerState>,
    thread: Option<JoinHandle<()>>,
    name: &'static str,
}

impl<T> FeederHandle<T> {
    /// Blocks until the next item is available.
    ///
    /// Once the producer has stopped and the queue is drained, returns the
    /// reason as an error (`Exhausted`, `ProducerFailed` or `Stopped`).
    pub fn take(&self) -> Result<T> {
        self.rx.recv().map_err(|_| self.stop_error())
    }

    /// Like `take`, but gives up after `timeout` with `Ok(None)`.
    pub fn take_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Ok(Some(item)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.stop_error()),
        }
    }

    /// Returns an item if one is queued, without blocking.
    pub fn try_take(&self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.stop_error()),
        }
    }

    /// Iterates over items until the producer stops.
    ///
    /// The iterator ends on any stop without saying why. Check
    /// `stop_reason()`, or call `take()` once more for the error, to tell
    /// exhaustion from a failed producer.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.take().ok())
    }

    /// Number of items currently queued.
    pub fn depth(&self) -> usize {
        self.rx.len()
    }

    /// Queue high-water mark.
    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }

    /// True while the producer loop is running.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Why the producer stopped, once it has.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.state.reason()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn stop_error(&self) -> FeederError {
        match self.state.reason() {
            Some(StopReason::Exhausted) => FeederError::Exhausted,
            Some(StopReason::Failed(message)) => FeederError::ProducerFailed { message },
            Some(StopReason::Stopped) | Some(StopReason::Disconnected) | None => {
                FeederError::Stopped
            }
        }
    }

    /// Signals the producer to stop and waits for its thread.
    ///
    /// Waits up to 5s; after that the thread is detached and dies with the process.
    pub fn stop(self) -> Option<StopReason> {
        let FeederHandle {
            rx,
            state,
            thread,
            name,
        } = self;

        state.running.store(false, Ordering::SeqCst);
        // Unblocks a producer waiting on a full queue
        drop(rx);

        if let Some(handle) = thread {
            let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                if let Err(panic_info) = handle.join() {
                    let msg = panic_info
                        .downcast_ref::<&str>()
                        .copied()
                        .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                        .unwrap_or("unknown panic");
                    error!(station = name, "Producer thread panicked: {msg}");
                }
            } else {
                warn!(station = name, "Shutdown timeout, detaching producer thread");
            }
        }

        state.reason()
    }
}
