// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   tokenizer_store.rs: HuggingFace tokenizer adapter
//                        Loads tokenizer.json or fetches a hub
//                        tokenizer, or builds a word-level one
//                        from the corpus. Exposes it to the
//                        pipeline as a TextTokenizer.
//
//   checkpoint.rs     : Saving and loading model weights
//                        with Burn's CompactRecorder, plus the
//                        run's TrainConfig as JSON.
//
//   metrics.rs        : Step-level loss CSV
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Tokenizer adapter, building, saving and loading
pub mod tokenizer_store;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
