// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full masked-LM training run in order:
//
//   Step 1: Load wiki + book corpora      (Layer 4 - data)
//   Step 2: Resolve the tokenizer         (Layer 6 - infra)
//   Step 3: Build the masking pipeline    (Layer 4 - data)
//   Step 4: Start train / eval sources    (Layer 4 - data)
//   Step 5: Save config                   (Layer 6 - infra)
//   Step 6: Build model + recycling hooks (Layer 5 - ml)
//   Step 7: Run the step loop             (Layer 5 - ml)
//
// The train and eval sources share the corpora and the tokenizer
// and differ only in their seed.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::{optim::AdamConfig, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};

use crate::data::{
    dataset::ProcessedDataset,
    loader::{BookLinesLoader, CorpusLoader, WikiDirLoader},
    masking::MaskingReplacementConfig,
    mixer::{CorpusMixer, MixerConfig},
    parallel::SourceConfig,
    processor::{ProcessorConfig, SentenceProcessor},
    wrapper::ProcessedDatasetWrapper,
};
use crate::domain::{corpus::InMemoryCorpus, traits::TextTokenizer};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tokenizer_store::{HfTokenizer, TokenizerStore},
};
use crate::ml::{
    model::TransformerMlmConfig,
    recycle::{DelayedConstScheduler, RecycleKind},
    trainer::{MlmTrainer, TrainReport, TrainerConfig},
};

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Saved next to the
// checkpoints so the architecture can be rebuilt later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub wiki_dir:          String,
    pub book_file:         String,
    pub checkpoint_dir:    String,
    /// tokenizer.json path or hub id; None builds one from the corpus
    pub tokenizer:         Option<String>,
    /// Only used when building a tokenizer
    pub vocab_size:        usize,

    // ── pipeline ──
    pub max_total_length:  usize,
    pub mask_percent:      f64,
    /// mask / random / original split for selected positions
    pub mask_replace:      MaskingReplacementConfig,
    pub batch_size:        usize,
    pub num_workers:       usize,
    pub seed:              u64,
    pub eval_seed:         u64,
    pub buffer_refill_to:  usize,
    pub book_lines:        usize,
    pub book_chance:       Option<f64>,

    // ── model ──
    pub d_model:           usize,
    pub num_heads:         usize,
    pub num_layers:        usize,
    pub d_ff:              usize,
    pub dropout:           f64,

    // ── optimisation ──
    pub lr:                f64,
    pub lr_warmup_steps:   usize,
    pub n_steps:           usize,
    pub n_steps_eval:      usize,
    pub eval_batches:      usize,
    pub log_acc_steps:     usize,

    // ── recycling, prune_every = 0 disables it ──
    pub prune_every:       usize,
    pub prune_prob:        f64,
    pub prune_delay:       usize,
    pub recycler:          RecycleKind,
    /// Steps of recycled-only training after each prune
    pub retrain_steps:     Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        let mixer = MixerConfig::default();
        let processor = ProcessorConfig::default();
        let source = SourceConfig::default();
        let trainer = TrainerConfig::default();
        Self {
            wiki_dir:         "data/wiki".to_string(),
            book_file:        "data/books.txt".to_string(),
            checkpoint_dir:   "checkpoints".to_string(),
            tokenizer:        None,
            vocab_size:       30522,
            max_total_length: processor.max_total_length,
            mask_percent:     processor.mask_percent,
            mask_replace:     processor.mask_replace,
            batch_size:       source.batch_size,
            num_workers:      source.num_workers,
            seed:             source.seed,
            eval_seed:        1337,
            buffer_refill_to: mixer.buffer_refill_to,
            book_lines:       mixer.book_lines,
            book_chance:      mixer.book_chance,
            d_model:          256,
            num_heads:        8,
            num_layers:       4,
            d_ff:             1024,
            dropout:          0.1,
            lr:               trainer.lr,
            lr_warmup_steps:  trainer.lr_warmup_steps,
            n_steps:          trainer.n_steps,
            n_steps_eval:     trainer.n_steps_eval,
            eval_batches:     trainer.eval_batches,
            log_acc_steps:    trainer.log_acc_steps,
            prune_every:      0,
            prune_prob:       0.1,
            prune_delay:      0,
            recycler:         RecycleKind::default(),
            retrain_steps:    None,
        }
    }
}

impl TrainConfig {
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            max_total_length: self.max_total_length,
            mask_percent:     self.mask_percent,
            mask_replace:     self.mask_replace,
        }
    }

    pub fn mixer_config(&self) -> MixerConfig {
        MixerConfig {
            buffer_refill_to: self.buffer_refill_to,
            book_lines:       self.book_lines,
            book_chance:      self.book_chance,
            ..MixerConfig::default()
        }
    }

    pub fn source_config(&self, seed: u64) -> SourceConfig {
        SourceConfig {
            batch_size:  self.batch_size,
            num_workers: self.num_workers,
            seed,
            ..SourceConfig::default()
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            n_steps:          self.n_steps,
            n_steps_eval:     self.n_steps_eval,
            eval_batches:     self.eval_batches,
            log_acc_steps:    self.log_acc_steps,
            lr:               self.lr,
            lr_warmup_steps:  self.lr_warmup_steps,
            mask_percent:     self.mask_percent,
            mask_loss_weight: 1.0,
        }
    }
}

// ─── Shared pipeline assembly ─────────────────────────────────────────────────
pub(crate) struct Corpora {
    pub wiki: Arc<InMemoryCorpus>,
    pub book: Arc<InMemoryCorpus>,
}

pub(crate) fn load_corpora(cfg: &TrainConfig) -> Result<Corpora> {
    let wiki = WikiDirLoader::new(&cfg.wiki_dir).load()?;
    let book = BookLinesLoader::new(&cfg.book_file).load()?;
    Ok(Corpora { wiki: Arc::new(wiki), book: Arc::new(book) })
}

/// An existing file is loaded, any other string is a hub id, and
/// no setting builds (or reuses) a word-level tokenizer in the
/// checkpoint directory.
pub(crate) fn resolve_tokenizer(cfg: &TrainConfig, corpora: &Corpora) -> Result<HfTokenizer> {
    match &cfg.tokenizer {
        Some(source) if Path::new(source).is_file() => HfTokenizer::from_file(source),
        Some(source) => HfTokenizer::from_pretrained(source),
        None => {
            let texts: Vec<String> = corpora
                .wiki
                .records()
                .iter()
                .chain(corpora.book.records())
                .cloned()
                .collect();
            TokenizerStore::new(&cfg.checkpoint_dir).load_or_build(&texts, cfg.vocab_size)
        }
    }
}

pub(crate) fn build_dataset(
    cfg:       &TrainConfig,
    corpora:   &Corpora,
    tokenizer: Arc<dyn TextTokenizer>,
) -> Result<ProcessedDataset> {
    let mixer     = CorpusMixer::new(corpora.wiki.clone(), corpora.book.clone(), cfg.mixer_config())
        .context("Invalid mixer configuration")?;
    let processor = SentenceProcessor::new(tokenizer, cfg.processor_config())
        .context("Invalid processor configuration")?;
    Ok(ProcessedDataset::new(mixer, processor))
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train on the default WGPU device.
    pub fn execute(&self) -> Result<TrainReport> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.execute_on::<MyBackend>(device)
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: corpora ───────────────────────────────────────────────────
        let corpora = load_corpora(cfg)?;

        // ── Step 2: tokenizer ─────────────────────────────────────────────────
        let tokenizer  = resolve_tokenizer(cfg, &corpora)?;
        let vocab_size = tokenizer.vocab_size();
        let tokenizer: Arc<dyn TextTokenizer> = Arc::new(tokenizer);
        tracing::info!("Tokenizer ready: {} ids", vocab_size);

        // ── Step 3: pipeline ──────────────────────────────────────────────────
        let dataset = build_dataset(cfg, &corpora, tokenizer)?;

        // ── Step 4: train / eval sources ──────────────────────────────────────
        let train_data = ProcessedDatasetWrapper::<B>::new(
            dataset.clone(),
            device.clone(),
            cfg.source_config(cfg.seed),
        )?;
        let eval_data = ProcessedDatasetWrapper::<B::InnerBackend>::new(
            dataset,
            device.clone(),
            cfg.source_config(cfg.eval_seed),
        )?;

        // ── Step 5: persist config ────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: model + hooks ─────────────────────────────────────────────
        let model = TransformerMlmConfig::new(
            vocab_size, cfg.max_total_length, cfg.d_model,
            cfg.num_heads, cfg.num_layers, cfg.d_ff, cfg.dropout,
        )
        .init::<B>(&device);
        tracing::info!("Model ready: {} layers, d_model={}", cfg.num_layers, cfg.d_model);

        let mut trainer = MlmTrainer::new(cfg.trainer_config(), train_data, eval_data)
            .with_metrics(metrics)
            .with_checkpoints(ckpt);
        if cfg.prune_every > 0 {
            trainer = trainer.with_recycling(
                Box::new(DelayedConstScheduler::new(
                    cfg.prune_every, cfg.prune_prob, cfg.prune_delay, cfg.retrain_steps,
                )),
                cfg.recycler.pruner(),
            );
            tracing::info!(recycler = %cfg.recycler, every = cfg.prune_every, "Recycling enabled");
        }

        // ── Step 7: train ─────────────────────────────────────────────────────
        let (_, report) = trainer.fit(model, || AdamConfig::new().with_epsilon(1e-8).init())?;
        Ok(report)
    }
}
