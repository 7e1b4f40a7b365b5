// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `preview`, and all
// their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use crate::application::train_use_case::TrainConfig;
use crate::data::masking::MaskingReplacementConfig;
use crate::ml::recycle::RecycleKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the masked-LM model on the wiki + book corpora
    Train(TrainArgs),

    /// Print a few masked examples from the pipeline
    Preview(PreviewArgs),
}

/// Where the text and tokenizer come from. Shared by both commands.
#[derive(Args, Debug, Clone)]
pub struct CorpusArgs {
    /// Directory of *.txt wiki articles, one per file
    #[arg(long, default_value = "data/wiki")]
    pub wiki_dir: String,

    /// Book corpus, one sentence per line
    #[arg(long, default_value = "data/books.txt")]
    pub book_file: String,

    /// Directory for checkpoints, metrics and a built tokenizer
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// tokenizer.json path or HuggingFace hub id (e.g. bert-base-uncased).
    /// Without it a word-level tokenizer is built from the corpus.
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Size of a built vocabulary, reserved ids included
    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    /// Tokens per example after padding / truncation
    #[arg(long, default_value_t = 128)]
    pub max_total_length: usize,

    /// Per-token probability of being selected for prediction
    #[arg(long, default_value_t = 0.15)]
    pub mask_percent: f64,

    /// Share of selected positions replaced by [MASK]
    #[arg(long, default_value_t = 0.8)]
    pub replace_mask: f64,

    /// Share of selected positions replaced by a random token
    #[arg(long, default_value_t = 0.1)]
    pub replace_random: f64,

    /// Share of selected positions left unchanged.
    /// The three shares must sum to 1.
    #[arg(long, default_value_t = 0.1)]
    pub replace_original: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fixed probability of drawing from the book corpus.
    /// Derived from the corpus sizes when omitted.
    #[arg(long)]
    pub book_chance: Option<f64>,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Worker threads producing batches; 0 runs inline
    #[arg(long, default_value_t = 8)]
    pub num_workers: usize,

    #[arg(long, default_value_t = 1337)]
    pub eval_seed: u64,

    #[arg(long, default_value_t = 10_000)]
    pub n_steps: usize,

    #[arg(long, default_value_t = 100)]
    pub n_steps_eval: usize,

    #[arg(long, default_value_t = 10)]
    pub eval_batches: usize,

    /// Report the running train loss every N steps
    #[arg(long, default_value_t = 100)]
    pub log_acc_steps: usize,

    #[arg(long, default_value_t = 2e-4)]
    pub lr: f64,

    #[arg(long, default_value_t = 0)]
    pub lr_warmup_steps: usize,

    /// Hidden dimension of the transformer
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Recycle feed-forward weights every N steps; 0 disables
    #[arg(long, default_value_t = 0)]
    pub prune_every: usize,

    /// Share of weights (or neurons, for structural recyclers)
    /// recycled per prune
    #[arg(long, default_value_t = 0.1)]
    pub prune_prob: f64,

    /// First step at which recycling may happen
    #[arg(long, default_value_t = 0)]
    pub prune_delay: usize,

    /// random-unstruct, random-struct, unstruct-magnitude or struct-magnitude
    #[arg(long, default_value_t = RecycleKind::RandomUnstruct)]
    pub recycler: RecycleKind,

    /// Train only the recycled weights for N steps after each prune
    #[arg(long)]
    pub retrain_steps: Option<usize>,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Number of examples to print
    #[arg(long, default_value_t = 5)]
    pub count: usize,
}

impl From<CorpusArgs> for TrainConfig {
    fn from(a: CorpusArgs) -> Self {
        TrainConfig {
            wiki_dir:         a.wiki_dir,
            book_file:        a.book_file,
            checkpoint_dir:   a.checkpoint_dir,
            tokenizer:        a.tokenizer,
            vocab_size:       a.vocab_size,
            max_total_length: a.max_total_length,
            mask_percent:     a.mask_percent,
            mask_replace:     MaskingReplacementConfig {
                replace_with_mask:     a.replace_mask,
                replace_with_random:   a.replace_random,
                replace_with_original: a.replace_original,
            },
            seed:             a.seed,
            book_chance:      a.book_chance,
            ..TrainConfig::default()
        }
    }
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            batch_size:      a.batch_size,
            num_workers:     a.num_workers,
            eval_seed:       a.eval_seed,
            n_steps:         a.n_steps,
            n_steps_eval:    a.n_steps_eval,
            eval_batches:    a.eval_batches,
            log_acc_steps:   a.log_acc_steps,
            lr:              a.lr,
            lr_warmup_steps: a.lr_warmup_steps,
            d_model:         a.d_model,
            num_heads:       a.num_heads,
            num_layers:      a.num_layers,
            d_ff:            a.d_ff,
            dropout:         a.dropout,
            prune_every:     a.prune_every,
            prune_prob:      a.prune_prob,
            prune_delay:     a.prune_delay,
            recycler:        a.recycler,
            retrain_steps:   a.retrain_steps,
            ..TrainConfig::from(a.corpus)
        }
    }
}
