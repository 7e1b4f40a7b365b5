// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records running losses to a CSV file while training.
//
// One row per logging event:
//   - step:      optimiser step the value was recorded at
//   - split:     "train" (running mean since the last row), "eval",
//                or "retrain" (mean over one retrain phase)
//   - mask_loss: masked-LM loss, see ml::model::mask_loss
//
// Output file: <dir>/metrics.csv
//
// Example CSV output:
//   step,split,mask_loss
//   100,train,7.412300
//   200,train,6.981100
//   200,eval,6.950400
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Eval,
    Retrain,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train   => write!(f, "train"),
            Split::Eval    => write!(f, "eval"),
            Split::Retrain => write!(f, "retrain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub step:      usize,
    pub split:     Split,
    pub mask_loss: f64,
}

impl StepMetrics {
    pub fn new(step: usize, split: Split, mask_loss: f64) -> Self {
        Self { step, split, mask_loss }
    }
}

/// Appends step metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so
    /// repeated runs append to the same log.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "step,split,mask_loss")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{},{},{:.6}", m.step, m.split, m.mask_loss)?;

        tracing::debug!("Logged step {} {} mask_loss={:.4}", m.step, m.split, m.mask_loss);
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rows_are_appended_under_header() {
        let dir    = TempDir::new().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&StepMetrics::new(100, Split::Train, 7.4123)).unwrap();
        logger.log(&StepMetrics::new(100, Split::Eval, 6.95)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(
            text,
            "step,split,mask_loss\n100,train,7.412300\n100,eval,6.950000\n"
        );
    }

    #[test]
    fn test_reopening_keeps_existing_rows() {
        let dir = TempDir::new().unwrap();
        MetricsLogger::new(dir.path())
            .unwrap()
            .log(&StepMetrics::new(1, Split::Train, 1.0))
            .unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
