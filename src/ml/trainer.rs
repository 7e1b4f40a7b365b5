// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Step-based masked-LM training over two infinite batch sources.
//
// One step:
//   1. scheduler says prune?  → pruner.prune(model, prob)
//        then, if the scheduler asks for it, a retrain phase:
//        n_steps_retrain extra steps with a fresh optimiser whose
//        lr warms up over the first half, updating only the
//        recycled entries (every other gradient is dropped)
//   2. batch = train.get_batch()
//   3. loss  = mask_loss(model(masked_tokens), tokens, mask_mask)
//   4. loss.backward() → pruner.after_backprop(step) → optimiser step
//
// Every `log_acc_steps` steps the running mean of the train loss
// is reported and reset. Every `n_steps_eval` steps the
// non-autodiff model is scored on `eval_batches` eval batches and,
// if a checkpoint manager is attached, the weights are saved.
//
// Key Burn insight:
//   - Training uses B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - so the eval source must batch onto B::InnerBackend too
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    module::{AutodiffModule, ParamId},
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::wrapper::ProcessedDatasetWrapper;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{MetricsLogger, Split, StepMetrics},
};
use crate::ml::model::TransformerMlmModel;
use crate::ml::recycle::{NoPruner, NoScheduler, Pruner, Scheduler};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub n_steps:          usize,
    /// 0 disables evaluation
    pub n_steps_eval:     usize,
    pub eval_batches:     usize,
    pub log_acc_steps:    usize,
    pub lr:               f64,
    /// Linear ramp from 0 to `lr` over this many steps
    pub lr_warmup_steps:  usize,
    /// Must match the processor's mask_percent
    pub mask_percent:     f64,
    pub mask_loss_weight: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_steps:          10_000,
            n_steps_eval:     100,
            eval_batches:     10,
            log_acc_steps:    100,
            lr:               2e-4,
            lr_warmup_steps:  0,
            mask_percent:     0.15,
            mask_loss_weight: 1.0,
        }
    }
}

impl TrainerConfig {
    pub fn learning_rate(&self, step: usize) -> f64 {
        if self.lr_warmup_steps > 0 && step <= self.lr_warmup_steps {
            self.lr * step as f64 / self.lr_warmup_steps as f64
        } else {
            self.lr
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    pub steps:         usize,
    pub prunes:        usize,
    /// Extra steps spent in retrain phases
    pub retrain_steps: usize,
    /// (step, running mean) per report
    pub train_losses: Vec<(usize, f64)>,
    /// (step, mean over eval batches)
    pub eval_losses:  Vec<(usize, f64)>,
}

#[derive(Debug, Default)]
struct RunningLoss {
    sum:   f64,
    steps: usize,
}

impl RunningLoss {
    fn push(&mut self, loss: f64) {
        self.sum   += loss;
        self.steps += 1;
    }

    fn take_mean(&mut self) -> Option<f64> {
        let mean = (self.steps > 0).then(|| self.sum / self.steps as f64);
        *self = Self::default();
        mean
    }
}

pub struct MlmTrainer<B: AutodiffBackend> {
    config:      TrainerConfig,
    train_data:  ProcessedDatasetWrapper<B>,
    eval_data:   ProcessedDatasetWrapper<B::InnerBackend>,
    scheduler:   Box<dyn Scheduler>,
    pruner:      Box<dyn Pruner<B>>,
    metrics:     Option<MetricsLogger>,
    checkpoints: Option<CheckpointManager>,
    running:     RunningLoss,
}

impl<B: AutodiffBackend> MlmTrainer<B> {
    pub fn new(
        config:     TrainerConfig,
        train_data: ProcessedDatasetWrapper<B>,
        eval_data:  ProcessedDatasetWrapper<B::InnerBackend>,
    ) -> Self {
        Self {
            config,
            train_data,
            eval_data,
            scheduler:   Box::new(NoScheduler),
            pruner:      Box::new(NoPruner),
            metrics:     None,
            checkpoints: None,
            running:     RunningLoss::default(),
        }
    }

    pub fn with_recycling(mut self, scheduler: Box<dyn Scheduler>, pruner: Box<dyn Pruner<B>>) -> Self {
        self.scheduler = scheduler;
        self.pruner    = pruner;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsLogger) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: CheckpointManager) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    /// Run `n_steps` steps and return the trained model. `new_optim`
    /// builds the main optimiser and one fresh optimiser per retrain
    /// phase.
    pub fn fit<O, F>(
        &mut self,
        mut model:     TransformerMlmModel<B>,
        mut new_optim: F,
    ) -> Result<(TransformerMlmModel<B>, TrainReport)>
    where
        O: Optimizer<TransformerMlmModel<B>, B>,
        F: FnMut() -> O,
    {
        let mut optim  = new_optim();
        let mut report = TrainReport::default();
        tracing::info!(
            n_steps = self.config.n_steps,
            lr = self.config.lr,
            "Starting masked-LM training"
        );

        for step in 0..self.config.n_steps {
            // ── Recycling ─────────────────────────────────────────────────────
            if self.scheduler.is_time_to_prune(step) {
                model = self.pruner.prune(model, self.scheduler.prob());
                report.prunes += 1;
                tracing::info!(step, prob = self.scheduler.prob(), "Pruned");

                if let Some(n_steps) = self.scheduler.n_steps_retrain() {
                    model = self.retrain(model, new_optim(), n_steps, step)?;
                    report.retrain_steps += n_steps;
                }
            }

            // ── Train step ────────────────────────────────────────────────────
            let (next, loss) = self.train_step(model, &mut optim, step)?;
            model = next;
            self.running.push(loss);
            report.steps += 1;

            if step > 0 && step % self.config.log_acc_steps.max(1) == 0 {
                if let Some(mean) = self.running.take_mean() {
                    tracing::info!(step, mask_loss = mean, "Train loss");
                    self.record(StepMetrics::new(step, Split::Train, mean))?;
                    report.train_losses.push((step, mean));
                }
            }

            // ── Eval step ─────────────────────────────────────────────────────
            if self.config.n_steps_eval > 0 && step % self.config.n_steps_eval == 0 {
                let eval_loss = self.eval_step(&model)?;
                tracing::info!(step, mask_loss = eval_loss, "Eval loss");
                self.record(StepMetrics::new(step, Split::Eval, eval_loss))?;
                report.eval_losses.push((step, eval_loss));

                if let Some(ckpt) = &self.checkpoints {
                    ckpt.save_model(&model, step)?;
                }
            }
        }

        tracing::info!("Training complete!");
        Ok((model, report))
    }

    fn train_step<O>(
        &mut self,
        model: TransformerMlmModel<B>,
        optim: &mut O,
        step:  usize,
    ) -> Result<(TransformerMlmModel<B>, f64)>
    where
        O: Optimizer<TransformerMlmModel<B>, B>,
    {
        let batch = self.train_data.get_batch()?;
        let loss  = model.forward_mask_loss(batch, self.config.mask_percent);
        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

        let grads = (loss * self.config.mask_loss_weight).backward();
        self.pruner.after_backprop(step);
        let grads = GradientsParams::from_grads(grads, &model);
        let model = optim.step(self.config.learning_rate(step), model, grads);

        tracing::trace!(step, mask_loss = loss_val, "Step");
        Ok((model, loss_val))
    }

    /// Train only the entries of the latest prune for `n_steps` steps.
    /// The lr ramps linearly up to `lr` over the first half of the phase.
    fn retrain<O>(
        &mut self,
        mut model: TransformerMlmModel<B>,
        mut optim: O,
        n_steps:   usize,
        step:      usize,
    ) -> Result<TransformerMlmModel<B>>
    where
        O: Optimizer<TransformerMlmModel<B>, B>,
    {
        let masks: Vec<(ParamId, Tensor<B::InnerBackend, 2, Bool>)> = self
            .pruner
            .recycled()
            .iter()
            .map(|m| (m.param_id, m.recycled.clone().inner()))
            .collect();
        let warmup      = (n_steps / 2).max(1);
        let mut running = RunningLoss::default();

        for i in 0..n_steps {
            let batch = self.train_data.get_batch()?;
            let loss  = model.forward_mask_loss(batch, self.config.mask_percent);
            running.push(loss.clone().into_scalar().elem::<f64>());

            let grads     = (loss * self.config.mask_loss_weight).backward();
            let mut grads = GradientsParams::from_grads(grads, &model);
            let mut only_recycled = GradientsParams::new();
            for (id, recycled) in &masks {
                if let Some(grad) = grads.remove::<B::InnerBackend, 2>(*id) {
                    only_recycled.register(*id, grad.mask_fill(recycled.clone().bool_not(), 0.0));
                }
            }

            let lr = self.config.lr * ((i + 1) as f64 / warmup as f64).min(1.0);
            model  = optim.step(lr, model, only_recycled);
        }

        if let Some(mean) = running.take_mean() {
            tracing::info!(step, n_steps, mask_loss = mean, "Retrained recycled weights");
            self.record(StepMetrics::new(step, Split::Retrain, mean))?;
        }
        Ok(model)
    }

    /// Mean mask loss over `eval_batches` batches, dropout disabled.
    fn eval_step(&mut self, model: &TransformerMlmModel<B>) -> Result<f64> {
        let model_valid = model.valid();
        let batches     = self.config.eval_batches.max(1);

        let mut total = 0.0f64;
        for _ in 0..batches {
            let batch = self.eval_data.get_batch()?;
            total += model_valid
                .forward_mask_loss(batch, self.config.mask_percent)
                .into_scalar()
                .elem::<f64>();
        }
        Ok(total / batches as f64)
    }

    fn record(&self, m: StepMetrics) -> Result<()> {
        match &self.metrics {
            Some(logger) => logger.log(&m),
            None => Ok(()),
        }
    }
}
