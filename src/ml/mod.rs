// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The consumer side of the data pipeline: a reference encoder
// that is trained on ProcessedBatch values, and the hooks used
// by the weight-recycling experiments.
//
//   model.rs   : Transformer encoder with a masked-LM head
//                 • Token + positional embeddings
//                 • Multi-head self-attention
//                 • Feed-forward blocks (ReLU), the recycling target
//                 • mask_loss: CE only at masked positions
//
//   recycle.rs : Scheduler / Pruner traits
//                 DelayedConstScheduler
//                 Random / magnitude recyclers, unstructured
//                 and per-neuron
//
//   trainer.rs : Step loop: prune → retrain → batch → loss →
//                 backward → after_backprop → optimiser step,
//                 plus running loss reports and periodic eval
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Devlin et al. (2019) BERT

/// Transformer encoder masked-LM model
pub mod model;

/// Pruning schedule and weight recycling
pub mod recycle;

/// Step-based training loop with eval and recycling hooks
pub mod trainer;
