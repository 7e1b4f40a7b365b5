// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw corpus text to device-resident masked-LM
// batches. The pipeline flows in this order:
//
//   wiki articles        book sentences
//         │                    │
//         └──────┬─────────────┘
//                ▼
//   CorpusMixer          → draws documents, chunks them, buffers
//                          and shuffles the chunks
//                ▼
//   SentenceProcessor    → tokenize, pad, pick positions to mask,
//                          apply the replacement policy
//                ▼
//   ProcessedDataset     → mixer + processor behind one seed
//                ▼
//   ParallelBatchSource  → N worker threads, each with its own
//                          reseeded dataset copy, round-robin
//                ▼
//   MlmBatcher           → stacks examples into [B, L] tensors
//                ▼
//   ProcessedDatasetWrapper → get_batch() on the target device
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §16 (Fearless Concurrency)

/// Reads the wiki and book corpora from disk
pub mod loader;

/// Wiki windows and greedy book-sentence gluing
pub mod chunker;

/// mask / random / original replacement distribution
pub mod masking;

/// One chunk of text → one masked example
pub mod processor;

/// Wiki/book mixing with a shuffled chunk buffer
pub mod mixer;

/// Mixer + processor, infinite example source
pub mod dataset;

/// Worker threads feeding whole batches
pub mod parallel;

/// Implements Burn's Batcher trait for processed examples
pub mod batcher;

/// get_batch() facade over the parallel source
pub mod wrapper;

#[cfg(test)]
pub(crate) mod test_support;
