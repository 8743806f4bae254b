//! Repeated trace fetching with a cooperative stop flag.

use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::types::{SParameter, TraceSet};
use crate::vna::InstrumentClient;

/// Shared stop flag for a running [`TraceStreamer`].
///
/// Clone it into a Ctrl+C handler or another thread. The loop checks it
/// between sweeps; a fetch already blocked on the instrument finishes (or
/// times out) first.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the handle can drive another run
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub sweeps: usize,
    /// Fetches that returned an error or an empty trace
    pub failed_fetches: usize,
    pub elapsed: Duration,
}

/// Polls the analyzer for traces until stopped.
///
/// The pause between sweeps starts when the previous sweep has been fetched
/// and handed to the callback, so a slow instrument lowers the update rate
/// instead of queueing work.
#[derive(Debug, Clone)]
pub struct TraceStreamer {
    interval: Duration,
    parameters: Vec<SParameter>,
    max_sweeps: Option<usize>,
    stop: StopHandle,
}

impl Default for TraceStreamer {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            parameters: SParameter::ALL.to_vec(),
            max_sweeps: None,
            stop: StopHandle::new(),
        }
    }
}

impl TraceStreamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn parameters(mut self, parameters: &[SParameter]) -> Self {
        self.parameters = parameters.to_vec();
        self
    }

    /// Stop on its own after this many sweeps
    pub fn max_sweeps(mut self, max_sweeps: Option<usize>) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    /// Use an existing stop flag instead of the streamer's own
    pub fn stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Fetch every configured parameter once and merge the non-empty results
    /// into `latest`. Returns the number of failed or empty fetches.
    pub fn fetch_sweep(&self, client: &mut InstrumentClient, latest: &mut TraceSet) -> usize {
        let mut fresh = TraceSet::new();
        let mut failed = 0;

        for &parameter in &self.parameters {
            match client.get_trace_data(parameter) {
                Ok(samples) if !samples.is_empty() => fresh.insert(parameter, samples),
                Ok(_) => {
                    debug!("{parameter}: empty trace, keeping previous data");
                    failed += 1;
                }
                Err(e) => {
                    debug!("{parameter}: {e}, keeping previous data");
                    failed += 1;
                }
            }
        }

        latest.merge(fresh);
        failed
    }

    fn limit_reached(&self, sweeps: usize) -> bool {
        self.max_sweeps.is_some_and(|max| sweeps >= max)
    }

    /// Run until the stop flag is set or `max_sweeps` is reached.
    ///
    /// `on_sweep` sees the merged snapshot after every sweep.
    pub fn run<F>(
        &self,
        client: &mut InstrumentClient,
        latest: &mut TraceSet,
        mut on_sweep: F,
    ) -> StreamStats
    where
        F: FnMut(&TraceSet),
    {
        let started = Instant::now();
        let mut stats = StreamStats::default();
        info!("Streaming {:?} every {:?}", self.parameters, self.interval);

        while !self.stop.is_stopped() && !self.limit_reached(stats.sweeps) {
            stats.failed_fetches += self.fetch_sweep(client, latest);
            stats.sweeps += 1;
            on_sweep(latest);

            if self.limit_reached(stats.sweeps) {
                break;
            }
            thread::sleep(self.interval);
        }

        stats.elapsed = started.elapsed();
        info!(
            "Streaming stopped after {} sweeps ({} failed fetches)",
            stats.sweeps, stats.failed_fetches
        );
        stats
    }
}
