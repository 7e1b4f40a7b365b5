// ============================================================
// Layer 4 — Processed Dataset Wrapper
// ============================================================
// The one entry point the trainer uses: get_batch().
//
//   ParallelBatchSource ──examples──▶ MlmBatcher ──▶ ProcessedBatch
//                                                   │ to_device
//                                                   ▼
//                                              trainer
//
// Keep seed, batch_size and num_workers unchanged and get_batch()
// returns the same sequence of batches on every run.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::batcher::{MlmBatcher, ProcessedBatch};
use crate::data::dataset::ProcessedDataset;
use crate::data::parallel::{ParallelBatchSource, SourceConfig};
use crate::error::Result;

pub struct ProcessedDatasetWrapper<B: Backend> {
    source:  ParallelBatchSource,
    batcher: MlmBatcher<B>,
    device:  B::Device,
}

impl<B: Backend> ProcessedDatasetWrapper<B> {
    /// Start the workers and remember the target device. Batches are
    /// stacked on the backend's default device and then moved.
    pub fn new(dataset: ProcessedDataset, device: B::Device, config: SourceConfig) -> Result<Self> {
        let source  = ParallelBatchSource::new(dataset, config)?;
        let batcher = MlmBatcher::new(B::Device::default());
        Ok(Self { source, batcher, device })
    }

    /// Next batch, resident on the configured device.
    pub fn get_batch(&mut self) -> Result<ProcessedBatch<B>> {
        let examples = self.source.next_examples()?;
        let batch    = self.batcher.batch(examples);
        tracing::trace!(dims = ?batch.dims(), "Collated batch");
        Ok(batch.to_device(&self.device))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::processed_dataset;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn wrapper(num_workers: usize, seed: u64) -> ProcessedDatasetWrapper<TestBackend> {
        let config = SourceConfig { batch_size: 3, num_workers, seed, prefetch_batches: 2 };
        ProcessedDatasetWrapper::new(processed_dataset(), Default::default(), config).unwrap()
    }

    fn flatten(batch: ProcessedBatch<TestBackend>) -> (Vec<i64>, Vec<bool>, Vec<i64>) {
        (
            batch.tokens.into_data().convert::<i64>().to_vec().unwrap(),
            batch.mask_mask.into_data().to_vec().unwrap(),
            batch.masked_tokens.into_data().convert::<i64>().to_vec().unwrap(),
        )
    }

    #[test]
    fn test_batch_shape() {
        let mut w = wrapper(2, 42);
        let batch = w.get_batch().unwrap();
        assert_eq!(batch.dims(), [3, 128]);
        assert_eq!(batch.mask_mask.dims(), [3, 128]);
        assert_eq!(batch.masked_tokens.dims(), [3, 128]);
    }

    #[test]
    fn test_identical_configs_give_identical_batches() {
        let mut a = wrapper(2, 7);
        let mut b = wrapper(2, 7);
        for _ in 0..4 {
            assert_eq!(flatten(a.get_batch().unwrap()), flatten(b.get_batch().unwrap()));
        }
    }

    #[test]
    fn test_different_seeds_give_different_batches() {
        let mut a = wrapper(1, 7);
        let mut b = wrapper(1, 8);
        assert_ne!(flatten(a.get_batch().unwrap()), flatten(b.get_batch().unwrap()));
    }

    #[test]
    fn test_inline_mode() {
        let mut w = wrapper(0, 3);
        let (tokens, mask, masked) = flatten(w.get_batch().unwrap());
        assert_eq!(tokens.len(), 3 * 128);
        for i in 0..tokens.len() {
            if !mask[i] {
                assert_eq!(tokens[i], masked[i]);
            }
        }
    }
}
