use crate::data::snapshot::{ProbeResult, Snapshot, UnavailableReason};
use crate::probes::SensorProbe;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, warn};

thread_local! {
    static IN_PROBE_CALL: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is inside a probe's `read()`. The panic hook
/// uses this to leave the terminal alone for panics that will be contained.
pub fn in_probe_call() -> bool {
    IN_PROBE_CALL.with(Cell::get)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("a probe with id `{0}` is already registered")]
    Duplicate(String),
}

/// Per-probe bookkeeping kept across ticks.
#[derive(Clone, Debug, Default)]
pub struct ProbeHealth {
    pub reads: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub panics: u64,
    /// Ticks skipped because an abandoned read had not returned yet.
    pub busy: u64,
    pub last_duration: Duration,
    pub last_reason: Option<UnavailableReason>,
}

type ReadOutcome = thread::Result<ProbeResult>;

struct Registered {
    source_id: String,
    title: String,
    probe: Arc<Mutex<Box<dyn SensorProbe>>>,
    /// Set while a read that overran its budget is still running.
    in_flight: Option<Receiver<ReadOutcome>>,
    health: ProbeHealth,
}

impl Registered {
    /// False while an abandoned read still holds the probe. A read that
    /// finished late is dropped here.
    fn is_free(&mut self) -> bool {
        let Some(pending) = &self.in_flight else {
            return true;
        };
        match pending.try_recv() {
            Err(TryRecvError::Empty) => false,
            Ok(_) | Err(TryRecvError::Disconnected) => {
                debug!(probe = %self.source_id, "abandoned read finished");
                self.in_flight = None;
                true
            }
        }
    }

    /// Starts `read()` on a worker thread and waits at most `budget` for it.
    fn read_within(&mut self, budget: Duration) -> ProbeResult {
        let (tx, rx) = mpsc::channel();
        let probe = Arc::clone(&self.probe);
        let spawned = thread::Builder::new()
            .name(format!("probe-{}", self.source_id))
            .spawn(move || {
                let mut probe = probe.lock().unwrap_or_else(PoisonError::into_inner);
                IN_PROBE_CALL.with(|flag| flag.set(true));
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| probe.read()));
                IN_PROBE_CALL.with(|flag| flag.set(false));
                let _ = tx.send(outcome);
            });
        if let Err(err) = spawned {
            error!(probe = %self.source_id, "failed to start probe worker: {}", err);
            return ProbeResult::Unavailable(UnavailableReason::TransientError);
        }

        match rx.recv_timeout(budget) {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.health.panics += 1;
                error!(probe = %self.source_id, "probe panicked during read");
                ProbeResult::Unavailable(UnavailableReason::TransientError)
            }
            Err(RecvTimeoutError::Timeout) => {
                self.health.timeouts += 1;
                warn!(
                    probe = %self.source_id,
                    budget_ms = budget.as_millis() as u64,
                    "probe exceeded its time budget, abandoning read"
                );
                self.in_flight = Some(rx);
                ProbeResult::Unavailable(UnavailableReason::TransientError)
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!(probe = %self.source_id, "probe worker exited without a result");
                ProbeResult::Unavailable(UnavailableReason::TransientError)
            }
        }
    }
}

/// Runs every registered probe once per tick, in registration order.
///
/// Each read runs on its own worker thread and is waited on for at most the
/// probe timeout, one probe at a time. A read that overruns is abandoned and
/// the probe reports [`UnavailableReason::TransientError`] until that read
/// returns; a second read of the same probe is never started meanwhile.
pub struct SampleAggregator {
    probes: Vec<Registered>,
    probe_timeout: Duration,
}

impl SampleAggregator {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            probe_timeout,
        }
    }

    pub fn register(&mut self, probe: Box<dyn SensorProbe>) -> Result<(), RegistrationError> {
        let source_id = probe.source_id().to_string();
        if self.probes.iter().any(|r| r.source_id == source_id) {
            return Err(RegistrationError::Duplicate(source_id));
        }
        self.probes.push(Registered {
            title: probe.title().to_string(),
            source_id,
            probe: Arc::new(Mutex::new(probe)),
            in_flight: None,
            health: ProbeHealth::default(),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// `(source_id, title)` in registration order.
    pub fn descriptors(&self) -> Vec<(String, String)> {
        self.probes
            .iter()
            .map(|r| (r.source_id.clone(), r.title.clone()))
            .collect()
    }

    pub fn health(&self, source_id: &str) -> Option<&ProbeHealth> {
        self.probes
            .iter()
            .find(|r| r.source_id == source_id)
            .map(|r| &r.health)
    }

    /// Total wall time is bounded by the sum of the per-probe budgets.
    pub fn collect(&mut self, tick: u64) -> Snapshot {
        let started = Instant::now();
        let mut results = Vec::with_capacity(self.probes.len());

        for registered in &mut self.probes {
            let mut result = if registered.is_free() {
                let probe_started = Instant::now();
                let result = registered.read_within(self.probe_timeout);
                registered.health.reads += 1;
                registered.health.last_duration = probe_started.elapsed();
                result
            } else {
                registered.health.busy += 1;
                debug!(probe = %registered.source_id, "previous read still running, skipping");
                ProbeResult::Unavailable(UnavailableReason::TransientError)
            };

            if let ProbeResult::Ok(readings) = &mut result {
                readings.retain(|reading| reading.value.is_finite());
                for reading in readings.iter_mut() {
                    reading.timestamp = tick;
                }
            }

            let health = &mut registered.health;
            health.last_reason = result.reason();
            if result.reason().is_some() {
                health.failures += 1;
            }

            results.push((registered.source_id.clone(), result));
        }

        debug!(
            tick,
            probes = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "collected snapshot"
        );
        Snapshot::new(tick, results)
    }
}
