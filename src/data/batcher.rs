// ============================================================
// Layer 4 — Masked-LM Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<ProcessedExample>
// into three tensors of shape [batch_size, max_total_length]:
//
//   tokens        Int   original ids      (prediction targets)
//   mask_mask     Bool  positions to predict
//   masked_tokens Int   model input
//
// Every example is already padded to the same length, so stacking
// is a flatten followed by a reshape:
//   [e1_t1, ..., e1_tL, e2_t1, ..., eB_tL] → [B, L]
//
// Mismatched lengths are a bug upstream, never something to pad
// over here, so they abort with an assertion.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::example::ProcessedExample;

// ─── ProcessedBatch ───────────────────────────────────────────────────────────
/// A batch of masked examples ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct ProcessedBatch<B: Backend> {
    /// Original token ids (shape [batch_size, seq_len])
    pub tokens: Tensor<B, 2, Int>,

    /// true = position the loss is computed on (shape [batch_size, seq_len])
    pub mask_mask: Tensor<B, 2, Bool>,

    /// Model input with masked positions replaced (shape [batch_size, seq_len])
    pub masked_tokens: Tensor<B, 2, Int>,
}

impl<B: Backend> ProcessedBatch<B> {
    /// [batch_size, seq_len]
    pub fn dims(&self) -> [usize; 2] {
        self.tokens.dims()
    }

    /// Replace every tensor with a copy resident on `device`.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            tokens:        self.tokens.to_device(device),
            mask_mask:     self.mask_mask.to_device(device),
            masked_tokens: self.masked_tokens.to_device(device),
        }
    }
}

// ─── MlmBatcher ───────────────────────────────────────────────────────────────
/// Holds the device the batch tensors are first created on.
#[derive(Clone, Debug)]
pub struct MlmBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> MlmBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ProcessedExample, ProcessedBatch<B>> for MlmBatcher<B> {
    fn batch(&self, items: Vec<ProcessedExample>) -> ProcessedBatch<B> {
        assert!(!items.is_empty(), "cannot collate an empty batch");

        let batch_size = items.len();
        let seq_len    = items[0].len();

        for (i, item) in items.iter().enumerate() {
            assert!(
                item.is_consistent() && item.len() == seq_len,
                "example {i} has lengths tokens={} mask_mask={} masked_tokens={}, expected {seq_len}",
                item.tokens.len(),
                item.mask_mask.len(),
                item.masked_tokens.len(),
            );
        }

        let tokens_flat: Vec<i32> = items
            .iter()
            .flat_map(|e| e.tokens.iter().map(|&t| t as i32))
            .collect();

        let masked_flat: Vec<i32> = items
            .iter()
            .flat_map(|e| e.masked_tokens.iter().map(|&t| t as i32))
            .collect();

        // Bool tensors are built as 0/1 ints and compared against 1
        let mask_flat: Vec<i32> = items
            .iter()
            .flat_map(|e| e.mask_mask.iter().map(|&m| m as i32))
            .collect();

        let tokens = Tensor::<B, 1, Int>::from_ints(tokens_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);

        let masked_tokens = Tensor::<B, 1, Int>::from_ints(masked_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);

        let mask_mask = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
            .equal_elem(1);

        assert_eq!(tokens.dims(), masked_tokens.dims());
        assert_eq!(tokens.dims(), mask_mask.dims());

        ProcessedBatch { tokens, mask_mask, masked_tokens }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn example(tokens: Vec<u32>, mask: Vec<bool>, masked: Vec<u32>) -> ProcessedExample {
        ProcessedExample { tokens, mask_mask: mask, masked_tokens: masked }
    }

    #[test]
    fn test_batch_shapes_and_values() {
        let batcher = MlmBatcher::<TestBackend>::new(Default::default());
        let batch   = batcher.batch(vec![
            example(vec![5, 6, 0], vec![false, true, false], vec![5, 103, 0]),
            example(vec![7, 8, 9], vec![true, false, false], vec![7, 8, 9]),
        ]);

        assert_eq!(batch.dims(), [2, 3]);
        assert_eq!(batch.mask_mask.dims(), [2, 3]);
        assert_eq!(batch.masked_tokens.dims(), [2, 3]);

        let tokens: Vec<i64> = batch.tokens.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(tokens, vec![5, 6, 0, 7, 8, 9]);

        let masked: Vec<i64> = batch.masked_tokens.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(masked, vec![5, 103, 0, 7, 8, 9]);

        let mask: Vec<bool> = batch.mask_mask.into_data().to_vec().unwrap();
        assert_eq!(mask, vec![false, true, false, true, false, false]);
    }

    #[test]
    #[should_panic]
    fn test_mismatched_example_lengths_panic() {
        let batcher = MlmBatcher::<TestBackend>::new(Default::default());
        let _ = batcher.batch(vec![
            example(vec![1, 2], vec![false, false], vec![1, 2]),
            example(vec![1, 2, 3], vec![false, false, false], vec![1, 2, 3]),
        ]);
    }

    #[test]
    #[should_panic]
    fn test_inconsistent_example_panics() {
        let batcher = MlmBatcher::<TestBackend>::new(Default::default());
        let _ = batcher.batch(vec![example(vec![1, 2], vec![false], vec![1, 2])]);
    }

    #[test]
    fn test_to_device_keeps_contents() {
        let device: <TestBackend as Backend>::Device = Default::default();
        let batcher = MlmBatcher::<TestBackend>::new(device.clone());
        let batch   = batcher
            .batch(vec![example(vec![4, 0], vec![true, false], vec![103, 0])])
            .to_device(&device);
        assert_eq!(batch.dims(), [1, 2]);
    }
}
