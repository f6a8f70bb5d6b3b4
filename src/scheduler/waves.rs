//! Wave-based fan-out with a fixed in-flight limit.
//!
//! Tasks are split into waves of at most `concurrency` items. Every task of
//! a wave is polled concurrently and the wave settles completely before the
//! inter-wave delay starts. No delay follows the final wave, so a caller
//! that runs two batches back to back still observes the barrier between
//! them.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of tasks in flight per wave.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Default pause between two waves.
pub const DEFAULT_INTER_WAVE_DELAY_MS: u64 = 1000;

/// Scheduling limits for one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveConfig {
    pub concurrency: usize,
    pub inter_wave_delay_ms: u64,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            inter_wave_delay_ms: DEFAULT_INTER_WAVE_DELAY_MS,
        }
    }
}

/// What a fan-out produced, keyed by the index of the input item.
#[derive(Debug)]
pub struct WaveReport<T, E> {
    /// Successful outputs in input order.
    pub succeeded: Vec<(usize, T)>,
    /// Failed items in input order.
    pub failed: Vec<(usize, E)>,
    pub waves: usize,
}

impl<T, E> WaveReport<T, E> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs tasks in bounded waves.
#[derive(Debug, Clone)]
pub struct WaveScheduler {
    concurrency: usize,
    inter_wave_delay: Duration,
}

impl WaveScheduler {
    /// A concurrency of zero is treated as one.
    pub fn new(concurrency: usize, inter_wave_delay: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            inter_wave_delay,
        }
    }

    pub fn from_config(config: &WaveConfig) -> Self {
        Self::new(
            config.concurrency,
            Duration::from_millis(config.inter_wave_delay_ms),
        )
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of waves needed for `tasks` items.
    pub fn waves_for(&self, tasks: usize) -> usize {
        tasks.div_ceil(self.concurrency)
    }

    /// Run `task` over every item and collect outcomes by item index.
    ///
    /// Failures are logged here and returned in the report. They never stop
    /// the remaining waves.
    pub async fn run<I, T, E, F, Fut>(&self, items: &[I], task: F) -> WaveReport<T, E>
    where
        F: Fn(usize, &I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut report = WaveReport {
            succeeded: Vec::with_capacity(items.len()),
            failed: Vec::new(),
            waves: 0,
        };
        let total_waves = self.waves_for(items.len());

        for (wave, chunk) in items.chunks(self.concurrency).enumerate() {
            let offset = wave * self.concurrency;
            let futures = chunk
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let index = offset + i;
                    let fut = task(index, item);
                    async move { (index, fut.await) }
                })
                .collect::<Vec<_>>();

            let results = futures::future::join_all(futures).await;
            report.waves += 1;

            let mut wave_failures = 0usize;
            for (index, result) in results {
                match result {
                    Ok(value) => report.succeeded.push((index, value)),
                    Err(err) => {
                        wave_failures += 1;
                        tracing::warn!(task = index, error = %err, "Task dropped from wave");
                        report.failed.push((index, err));
                    }
                }
            }

            tracing::debug!(
                wave = wave + 1,
                waves = total_waves,
                tasks = chunk.len(),
                failed = wave_failures,
                "Wave settled"
            );

            if wave + 1 < total_waves && !self.inter_wave_delay.is_zero() {
                tokio::time::sleep(self.inter_wave_delay).await;
            }
        }

        report
    }
}

impl Default for WaveScheduler {
    fn default() -> Self {
        Self::from_config(&WaveConfig::default())
    }
}
