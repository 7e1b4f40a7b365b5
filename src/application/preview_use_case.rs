// ============================================================
// Layer 2 — Preview Use Case
// ============================================================
// Runs the masking pipeline without a model and returns a few
// examples in readable form, to eyeball chunking and masking
// before committing to a long training run.
//
//   tokens        → decoded original text
//   masked_tokens → decoded model input ([MASK] / random / kept)
//   positions     → indices where mask_mask is true

use anyhow::Result;
use std::sync::Arc;

use crate::application::train_use_case::{build_dataset, load_corpora, resolve_tokenizer, TrainConfig};
use crate::data::parallel::ExampleStream;
use crate::domain::traits::TextTokenizer;

#[derive(Debug, Clone)]
pub struct ExamplePreview {
    pub original:  String,
    pub masked:    String,
    pub positions: Vec<usize>,
}

pub struct PreviewUseCase {
    config: TrainConfig,
    count:  usize,
}

impl PreviewUseCase {
    pub fn new(config: TrainConfig, count: usize) -> Self {
        Self { config, count }
    }

    /// Draws `count` examples from the same stream worker 0 of a
    /// training run with this seed would see.
    pub fn execute(&self) -> Result<Vec<ExamplePreview>> {
        let cfg       = &self.config;
        let corpora   = load_corpora(cfg)?;
        let tokenizer: Arc<dyn TextTokenizer> = Arc::new(resolve_tokenizer(cfg, &corpora)?);
        let dataset   = build_dataset(cfg, &corpora, tokenizer.clone())?;

        let mut stream = ExampleStream::new(dataset, cfg.seed, 0);
        let examples   = stream.next_group(self.count)?;

        examples
            .into_iter()
            .map(|ex| -> Result<ExamplePreview> {
                Ok(ExamplePreview {
                    original:  tokenizer.decode(&ex.tokens)?,
                    masked:    tokenizer.decode(&ex.masked_tokens)?,
                    positions: ex
                        .mask_mask
                        .iter()
                        .enumerate()
                        .filter_map(|(i, &m)| m.then_some(i))
                        .collect(),
                })
            })
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::fixtures::tiny_run;

    #[test]
    fn test_preview_returns_requested_count() {
        let (_dir, cfg) = tiny_run();
        let previews = PreviewUseCase::new(cfg.clone(), 3).execute().unwrap();

        assert_eq!(previews.len(), 3);
        for p in &previews {
            assert!(!p.original.is_empty());
            assert!(p.positions.iter().all(|&i| i < cfg.max_total_length));
        }
    }

    #[test]
    fn test_preview_is_seeded() {
        let (_dir, cfg) = tiny_run();
        let a = PreviewUseCase::new(cfg.clone(), 4).execute().unwrap();
        let b = PreviewUseCase::new(cfg, 4).execute().unwrap();
        let masked = |v: &[ExamplePreview]| v.iter().map(|p| p.masked.clone()).collect::<Vec<_>>();
        assert_eq!(masked(&a), masked(&b));
    }
}
