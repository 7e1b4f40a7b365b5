// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (.mpk, half precision): at every eval step
//   2. latest_step.json            : which step was last saved
//   3. train_config.json           : the run's TrainConfig
//
// The config is needed to rebuild the same architecture before
// weights can be loaded back into it.
//
// File naming convention:
//   checkpoints/
//     model_step_0.mpk
//     model_step_100.mpk
//     ...
//     latest_step.json
//     train_config.json
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::TransformerMlmModel;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Writes {dir}/model_step_{step}.mpk and moves the latest pointer.
    pub fn save_model<B: Backend>(&self, model: &TransformerMlmModel<B>, step: usize) -> Result<()> {
        // recorder adds the extension
        let path = self.dir.join(format!("model_step_{step}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join("latest_step.json");
        fs::write(&latest_path, serde_json::to_string(&step)?)
            .with_context(|| "Failed to write latest_step.json")?;

        tracing::debug!("Saved checkpoint: step {}", step);
        Ok(())
    }

    /// Load the latest checkpoint into a model of the same architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  TransformerMlmModel<B>,
        device: &B::Device,
    ) -> Result<TransformerMlmModel<B>> {
        let step = self.latest_step()?;
        let path = self.dir.join(format!("model_step_{step}"));

        tracing::info!("Loading checkpoint from step {}", step);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn latest_step(&self) -> Result<usize> {
        let path = self.dir.join("latest_step.json");
        let s = fs::read_to_string(&path)
            .with_context(|| "Cannot find 'latest_step.json'. Has a checkpoint been saved?")?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
