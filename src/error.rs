// ============================================================
// Pipeline Errors
// ============================================================
// Every failure the data pipeline can report. All of them are
// fatal for the batch being assembled. Configuration mistakes
// surface at construction; corpus sizing bugs and worker
// failures surface from the first draw or get_batch().

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("masking replacement weights must be non-negative and sum to 1.0, got {mask} + {random} + {original} = {sum}")]
    InvalidReplacementSplit {
        mask: f64,
        random: f64,
        original: f64,
        sum: f64,
    },

    #[error("mask_percent must lie in [0, 1], got {0}")]
    InvalidMaskPercent(f64),

    #[error("random token range {start}..{end} is empty")]
    EmptyRandomTokenRange { start: u32, end: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("index {index} out of range for corpus '{corpus}' of length {len}")]
    CorpusIndex {
        corpus: String,
        index: usize,
        len: usize,
    },

    #[error("corpus '{corpus}' has {len} records, at least {required} required")]
    CorpusTooSmall {
        corpus: String,
        len: usize,
        required: usize,
    },

    #[error("buffer refill drew {0} consecutive documents without producing a chunk")]
    Starved(usize),

    #[error("example buffer is empty after refill")]
    BufferEmpty,

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {0} stopped before producing a batch")]
    WorkerDisconnected(usize),
}

pub type Result<T> = std::result::Result<T, DataError>;
