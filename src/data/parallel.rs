// ============================================================
// Layer 4 — Parallel Batch Source
// ============================================================
// Replicates the processed dataset across worker threads.
//
// Per worker w (w = 0 when running inline):
//   seed_w = base_seed + w
//   clone the dataset, re-seed the clone with seed_w, then pull
//   `batch_size` examples at a time forever, sending each group
//   over a bounded channel.
//
// The parent takes batch k from worker (k mod num_workers):
//
//   batch:   0   1   2   3   4   5 ...
//   worker:  0   1   2   0   1   2 ...     (num_workers = 3)
//
// Each worker owns its buffer and RNGs outright; only the
// read-only corpora and tokenizer are shared through Arcs. With
// base_seed, num_workers and batch_size fixed, the batch sequence
// is therefore identical from run to run.
//
// The channel capacity bounds how far a worker runs ahead. There
// is no timeout: a stalled worker stalls next_examples().

use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use crate::data::dataset::ProcessedDataset;
use crate::domain::example::ProcessedExample;
use crate::error::{DataError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub batch_size: usize,
    /// 0 runs the stream on the caller's thread
    pub num_workers: usize,
    pub seed: u64,
    /// Finished batches each worker may queue ahead of the consumer
    pub prefetch_batches: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            batch_size:       64,
            num_workers:      8,
            seed:             42,
            prefetch_batches: 2,
        }
    }
}

// ─── ExampleStream ────────────────────────────────────────────────────────────
/// Endless stream of examples from one re-seeded dataset replica.
/// Restarting it means building a new stream with a seed.
pub struct ExampleStream {
    dataset:      ProcessedDataset,
    worker_index: usize,
}

impl ExampleStream {
    pub fn new(mut dataset: ProcessedDataset, base_seed: u64, worker_index: usize) -> Self {
        dataset.reseed(base_seed.wrapping_add(worker_index as u64));
        Self { dataset, worker_index }
    }

    /// Pull the next `n` examples, stopping at the first error.
    pub fn next_group(&mut self, n: usize) -> Result<Vec<ProcessedExample>> {
        self.by_ref().take(n).collect()
    }
}

impl Iterator for ExampleStream {
    type Item = Result<ProcessedExample>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.dataset.get_example())
    }
}

// ─── ParallelBatchSource ──────────────────────────────────────────────────────
type BatchReceiver = Receiver<Result<Vec<ProcessedExample>>>;

pub struct ParallelBatchSource {
    config:      SourceConfig,
    inline:      Option<ExampleStream>,
    receivers:   Vec<BatchReceiver>,
    handles:     Vec<JoinHandle<()>>,
    next_worker: usize,
}

impl ParallelBatchSource {
    /// Start the workers. Each one gets its own clone of `dataset`.
    pub fn new(dataset: ProcessedDataset, config: SourceConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(DataError::InvalidConfig("batch_size must be positive".into()));
        }

        if config.num_workers == 0 {
            return Ok(Self {
                config,
                inline:      Some(ExampleStream::new(dataset, config.seed, 0)),
                receivers:   Vec::new(),
                handles:     Vec::new(),
                next_worker: 0,
            });
        }

        let mut receivers = Vec::with_capacity(config.num_workers);
        let mut handles   = Vec::with_capacity(config.num_workers);

        for index in 0..config.num_workers {
            let (tx, rx) = sync_channel(config.prefetch_batches.max(1));
            let mut stream = ExampleStream::new(dataset.clone(), config.seed, index);
            let batch_size = config.batch_size;

            let handle = thread::Builder::new()
                .name(format!("mlm-worker-{index}"))
                .spawn(move || loop {
                    let group  = stream.next_group(batch_size);
                    let failed = group.is_err();
                    if failed {
                        tracing::warn!(worker = stream.worker_index, "Data worker stopped on error");
                    }
                    // A closed channel means the source was dropped.
                    if tx.send(group).is_err() || failed {
                        break;
                    }
                })
                .map_err(|source| DataError::Spawn { index, source })?;

            receivers.push(rx);
            handles.push(handle);
        }

        tracing::info!(
            workers = config.num_workers,
            batch_size = config.batch_size,
            seed = config.seed,
            "Started data workers"
        );

        Ok(Self { config, inline: None, receivers, handles, next_worker: 0 })
    }

    /// The examples of the next batch, in collation order.
    pub fn next_examples(&mut self) -> Result<Vec<ProcessedExample>> {
        if let Some(stream) = self.inline.as_mut() {
            return stream.next_group(self.config.batch_size);
        }

        let worker = self.next_worker;
        self.next_worker = (worker + 1) % self.receivers.len();

        match self.receivers[worker].recv() {
            Ok(group) => group,
            Err(_)    => Err(DataError::WorkerDisconnected(worker)),
        }
    }
}

impl Drop for ParallelBatchSource {
    fn drop(&mut self) {
        // Closing the receivers makes every worker's next send fail.
        self.receivers.clear();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Data worker panicked during shutdown");
            }
        }
    }
}
