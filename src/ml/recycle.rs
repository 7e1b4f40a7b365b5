// ============================================================
// Layer 5 — Weight Recycling
// ============================================================
// Hooks the trainer calls around each optimiser step:
//
//   Scheduler::is_time_to_prune(step) ──yes──▶ Pruner::prune(model, prob)
//                                     └─▶ optional retrain phase on
//                                         Pruner::recycled() only
//   loss.backward() ─▶ Pruner::after_backprop(step) ─▶ optimiser step
//
// Four recyclers, all acting on the feed-forward linears:
//
//   RandomUnstructRecycle    each weight with probability `prob`
//   RandomStructRecycle      each d_ff neuron with probability `prob`
//   UnstructMagnitudeRecycle the round(prob · n) smallest |w|
//   StructMagnitudeRecycle   the round(prob · d_ff) neurons with the
//                            smallest Σ lin1² · Σ lin2²
//
// A recycled neuron gets a fresh lin1 column, a fresh lin2 row and
// a zero lin1 bias. Fresh values are drawn from U(-bound, bound):
//
//   random / structural:     bound = √3 · kaiming(a = √5) = √(3 / fan_in)
//   unstructured magnitude:  bound = kaiming(a = √15)    = √(3 / (8 · fan_in))
//
// Reference: He et al. (2015) Delving Deep into Rectifiers

use std::{fmt, str::FromStr};

use burn::{
    module::{Param, ParamId},
    nn::Linear,
    prelude::*,
    tensor::Distribution,
};
use serde::{Deserialize, Serialize};

use crate::ml::model::{FeedForward, TransformerMlmModel};

// ─── Scheduler ────────────────────────────────────────────────────────────────
pub trait Scheduler {
    fn is_time_to_prune(&self, step: usize) -> bool;

    /// Fraction of weights recycled per prune.
    fn prob(&self) -> f64;

    /// Length of the retrain phase that follows each prune.
    fn n_steps_retrain(&self) -> Option<usize> {
        None
    }
}

/// Never prunes.
pub struct NoScheduler;

impl Scheduler for NoScheduler {
    fn is_time_to_prune(&self, _step: usize) -> bool {
        false
    }

    fn prob(&self) -> f64 {
        0.0
    }
}

/// Prunes every `n_steps_prune` steps once `delay` steps have passed.
#[derive(Debug, Clone, Copy)]
pub struct DelayedConstScheduler {
    n_steps_prune:   usize,
    prob:            f64,
    delay:           usize,
    n_steps_retrain: Option<usize>,
}

impl DelayedConstScheduler {
    pub fn new(n_steps_prune: usize, prob: f64, delay: usize, n_steps_retrain: Option<usize>) -> Self {
        assert!(n_steps_prune > 0, "n_steps_prune must be positive");
        assert!((0.0..=1.0).contains(&prob), "prune prob must be in [0, 1]");
        Self { n_steps_prune, prob, delay, n_steps_retrain }
    }
}

impl Scheduler for DelayedConstScheduler {
    fn is_time_to_prune(&self, step: usize) -> bool {
        step >= self.delay && step % self.n_steps_prune == 0
    }

    fn prob(&self) -> f64 {
        self.prob
    }

    fn n_steps_retrain(&self) -> Option<usize> {
        self.n_steps_retrain.filter(|&n| n > 0)
    }
}

// ─── Pruner ───────────────────────────────────────────────────────────────────
/// Entries of one weight matrix redrawn by a prune.
#[derive(Debug, Clone)]
pub struct RecycleMask<B: Backend> {
    pub param_id: ParamId,
    /// true where the weight was redrawn
    pub recycled: Tensor<B, 2, Bool>,
}

pub trait Pruner<B: Backend> {
    /// Runs between the backward pass and the optimiser step.
    fn after_backprop(&mut self, _step: usize) {}

    fn prune(&mut self, model: TransformerMlmModel<B>, prob: f64) -> TransformerMlmModel<B>;

    /// Masks of the latest prune; empty before the first one.
    fn recycled(&self) -> &[RecycleMask<B>] {
        &[]
    }
}

pub struct NoPruner;

impl<B: Backend> Pruner<B> for NoPruner {
    fn prune(&mut self, model: TransformerMlmModel<B>, _prob: f64) -> TransformerMlmModel<B> {
        model
    }
}

/// Which recycler a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecycleKind {
    #[default]
    RandomUnstruct,
    RandomStruct,
    UnstructMagnitude,
    StructMagnitude,
}

impl RecycleKind {
    pub const ALL: [RecycleKind; 4] = [
        RecycleKind::RandomUnstruct,
        RecycleKind::RandomStruct,
        RecycleKind::UnstructMagnitude,
        RecycleKind::StructMagnitude,
    ];

    pub fn pruner<B: Backend>(self) -> Box<dyn Pruner<B>> {
        match self {
            RecycleKind::RandomUnstruct    => Box::new(RandomUnstructRecycle::<B>::new()),
            RecycleKind::RandomStruct      => Box::new(RandomStructRecycle::<B>::new()),
            RecycleKind::UnstructMagnitude => Box::new(UnstructMagnitudeRecycle::<B>::new()),
            RecycleKind::StructMagnitude   => Box::new(StructMagnitudeRecycle::<B>::new()),
        }
    }
}

impl fmt::Display for RecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecycleKind::RandomUnstruct    => "random-unstruct",
            RecycleKind::RandomStruct      => "random-struct",
            RecycleKind::UnstructMagnitude => "unstruct-magnitude",
            RecycleKind::StructMagnitude   => "struct-magnitude",
        };
        f.write_str(name)
    }
}

impl FromStr for RecycleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| {
                let names: Vec<String> = Self::ALL.iter().map(|k| k.to_string()).collect();
                format!("unknown recycler '{s}', expected one of: {}", names.join(", "))
            })
    }
}

fn log_recycle<B: Backend>(kind: RecycleKind, prob: f64, masks: &[RecycleMask<B>]) {
    tracing::debug!(%kind, prob, matrices = masks.len(), "Recycled feed-forward weights");
}

/// Unstructured random recycling. Biases are left untouched.
#[derive(Debug, Default)]
pub struct RandomUnstructRecycle<B: Backend> {
    last: Vec<RecycleMask<B>>,
}

impl<B: Backend> RandomUnstructRecycle<B> {
    pub fn new() -> Self {
        Self { last: Vec::new() }
    }
}

/// Structured random recycling of whole d_ff neurons.
#[derive(Debug, Default)]
pub struct RandomStructRecycle<B: Backend> {
    last: Vec<RecycleMask<B>>,
}

impl<B: Backend> RandomStructRecycle<B> {
    pub fn new() -> Self {
        Self { last: Vec::new() }
    }
}

/// Unstructured recycling of the smallest-magnitude weights.
#[derive(Debug, Default)]
pub struct UnstructMagnitudeRecycle<B: Backend> {
    last: Vec<RecycleMask<B>>,
}

impl<B: Backend> UnstructMagnitudeRecycle<B> {
    pub fn new() -> Self {
        Self { last: Vec::new() }
    }
}

/// Structured recycling of the weakest neurons.
#[derive(Debug, Default)]
pub struct StructMagnitudeRecycle<B: Backend> {
    last: Vec<RecycleMask<B>>,
}

impl<B: Backend> StructMagnitudeRecycle<B> {
    pub fn new() -> Self {
        Self { last: Vec::new() }
    }
}

impl<B: Backend> Pruner<B> for RandomUnstructRecycle<B> {
    fn prune(&mut self, model: TransformerMlmModel<B>, prob: f64) -> TransformerMlmModel<B> {
        let (model, masks) = recycle_layers(model, |ff| {
            recycle_entries(ff, init_bound, |w| {
                Tensor::<B, 2>::random(w.shape(), Distribution::Uniform(0.0, 1.0), &w.device())
                    .lower_equal_elem(prob)
            })
        });
        log_recycle(RecycleKind::RandomUnstruct, prob, &masks);
        self.last = masks;
        model
    }

    fn recycled(&self) -> &[RecycleMask<B>] {
        &self.last
    }
}

impl<B: Backend> Pruner<B> for RandomStructRecycle<B> {
    fn prune(&mut self, model: TransformerMlmModel<B>, prob: f64) -> TransformerMlmModel<B> {
        let (model, masks) = recycle_layers(model, |ff| {
            let [_, d_ff] = ff.lin1.weight.val().dims();
            let device    = ff.lin1.weight.val().device();
            let neurons   = Tensor::<B, 1>::random([d_ff], Distribution::Uniform(0.0, 1.0), &device)
                .lower_equal_elem(prob);
            recycle_neurons(ff, neurons)
        });
        log_recycle(RecycleKind::RandomStruct, prob, &masks);
        self.last = masks;
        model
    }

    fn recycled(&self) -> &[RecycleMask<B>] {
        &self.last
    }
}

impl<B: Backend> Pruner<B> for UnstructMagnitudeRecycle<B> {
    fn prune(&mut self, model: TransformerMlmModel<B>, prob: f64) -> TransformerMlmModel<B> {
        let (model, masks) = recycle_layers(model, |ff| {
            recycle_entries(ff, magnitude_bound, |w| smallest(w.abs(), prob))
        });
        log_recycle(RecycleKind::UnstructMagnitude, prob, &masks);
        self.last = masks;
        model
    }

    fn recycled(&self) -> &[RecycleMask<B>] {
        &self.last
    }
}

impl<B: Backend> Pruner<B> for StructMagnitudeRecycle<B> {
    fn prune(&mut self, model: TransformerMlmModel<B>, prob: f64) -> TransformerMlmModel<B> {
        let (model, masks) = recycle_layers(model, |ff| {
            let neurons = smallest(neuron_scores(&ff), prob);
            recycle_neurons(ff, neurons)
        });
        log_recycle(RecycleKind::StructMagnitude, prob, &masks);
        self.last = masks;
        model
    }

    fn recycled(&self) -> &[RecycleMask<B>] {
        &self.last
    }
}

// ─── Recycling primitives ─────────────────────────────────────────────────────
fn recycle_layers<B, F>(mut model: TransformerMlmModel<B>, mut f: F) -> (TransformerMlmModel<B>, Vec<RecycleMask<B>>)
where
    B: Backend,
    F: FnMut(FeedForward<B>) -> (FeedForward<B>, Vec<RecycleMask<B>>),
{
    let mut masks = Vec::with_capacity(2 * model.layers.len());
    model.layers = model
        .layers
        .into_iter()
        .map(|mut block| {
            let (ff, layer_masks) = f(block.ff);
            block.ff = ff;
            masks.extend(layer_masks);
            block
        })
        .collect();
    (model, masks)
}

/// Each linear picks its own entries with `select`.
fn recycle_entries<B, S>(ff: FeedForward<B>, bound: fn(usize) -> f64, mut select: S) -> (FeedForward<B>, Vec<RecycleMask<B>>)
where
    B: Backend,
    S: FnMut(Tensor<B, 2>) -> Tensor<B, 2, Bool>,
{
    let replace1   = select(ff.lin1.weight.val());
    let (lin1, m1) = redraw_linear(ff.lin1, replace1, bound);
    let replace2   = select(ff.lin2.weight.val());
    let (lin2, m2) = redraw_linear(ff.lin2, replace2, bound);
    (FeedForward { lin1, lin2 }, vec![m1, m2])
}

/// Redraw every weight feeding into or out of the selected neurons
/// and zero their lin1 bias. `neurons` has shape [d_ff].
fn recycle_neurons<B: Backend>(ff: FeedForward<B>, neurons: Tensor<B, 1, Bool>) -> (FeedForward<B>, Vec<RecycleMask<B>>) {
    // lin1: [d_model, d_ff], lin2: [d_ff, d_model]
    let [d_model, d_ff] = ff.lin1.weight.val().dims();
    let columns = neurons.clone().reshape([1, d_ff]).expand([d_model, d_ff]);
    let rows    = neurons.clone().reshape([d_ff, 1]).expand([d_ff, d_model]);

    let (mut lin1, m1) = redraw_linear(ff.lin1, columns, init_bound);
    lin1.bias = lin1
        .bias
        .map(|bias| bias.map(|b| relink(b, |b| b.mask_fill(neurons, 0.0))));
    let (lin2, m2) = redraw_linear(ff.lin2, rows, init_bound);

    (FeedForward { lin1, lin2 }, vec![m1, m2])
}

/// Linear weights are stored [d_input, d_output], so fan_in is dim 0.
fn redraw_linear<B: Backend>(
    mut linear: Linear<B>,
    replace:    Tensor<B, 2, Bool>,
    bound:      fn(usize) -> f64,
) -> (Linear<B>, RecycleMask<B>) {
    let mask = RecycleMask { param_id: linear.weight.id, recycled: replace.clone() };
    linear.weight = redraw(linear.weight, replace, bound);
    (linear, mask)
}

fn redraw<B: Backend>(weight: Param<Tensor<B, 2>>, replace: Tensor<B, 2, Bool>, bound: fn(usize) -> f64) -> Param<Tensor<B, 2>> {
    weight.map(|w| {
        let shape = w.shape();
        let b     = bound(shape.dims[0]);
        let fresh = Tensor::random(shape, Distribution::Uniform(-b, b), &w.device());
        relink(w, |w| w.mask_where(replace, fresh))
    })
}

/// Apply `f` to a parameter's values as a new leaf that keeps the
/// parameter's require-grad flag. The old autodiff graph is dropped.
fn relink<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
    f:      impl FnOnce(Tensor<B, D>) -> Tensor<B, D>,
) -> Tensor<B, D> {
    let tracked = tensor.is_require_grad();
    f(tensor.set_require_grad(false)).set_require_grad(tracked)
}

/// true at the round(prob · n) smallest entries of `scores`.
fn smallest<B: Backend, const D: usize>(scores: Tensor<B, D>, prob: f64) -> Tensor<B, D, Bool> {
    let shape  = scores.shape();
    let numel  = shape.num_elements();
    let device = scores.device();
    let n      = ((prob * numel as f64).round() as usize).min(numel);

    let flat     = scores.reshape([numel]);
    let mut hits = Tensor::<B, 1>::zeros([numel], &device);
    if n > 0 {
        let order = flat.argsort(0).slice([0..n]);
        hits = hits.scatter(0, order, Tensor::ones([n], &device));
    }
    hits.greater_elem(0.5).reshape(shape)
}

/// Σ_m lin1[m, f]² · Σ_m lin2[f, m]² per neuron f.
fn neuron_scores<B: Backend>(ff: &FeedForward<B>) -> Tensor<B, 1> {
    let w1 = ff.lin1.weight.val();
    let w2 = ff.lin2.weight.val();
    let [_, d_ff] = w1.dims();
    let incoming = (w1.clone() * w1).sum_dim(0).reshape([d_ff]);
    let outgoing = (w2.clone() * w2).sum_dim(1).reshape([d_ff]);
    incoming * outgoing
}

/// torch's kaiming-uniform bound with negative slope `a`.
fn kaiming_bound(fan_in: usize, a: f64) -> f64 {
    let gain = (2.0 / (1.0 + a * a)).sqrt();
    gain * (3.0 / fan_in as f64).sqrt()
}

fn init_bound(fan_in: usize) -> f64 {
    3f64.sqrt() * kaiming_bound(fan_in, 5f64.sqrt())
}

fn magnitude_bound(fan_in: usize) -> f64 {
    kaiming_bound(fan_in, 15f64.sqrt())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::TransformerMlmConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    // d_model = 16, d_ff = 32
    fn tiny_model<B: Backend>() -> TransformerMlmModel<B> {
        TransformerMlmConfig::new(40, 8, 16, 2, 2, 32, 0.0).init(&Default::default())
    }

    fn values<B: Backend, const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec().unwrap()
    }

    fn ff_weights(model: &TransformerMlmModel<TestBackend>) -> Vec<Vec<f32>> {
        model
            .layers
            .iter()
            .flat_map(|b| [b.ff.lin1.weight.val(), b.ff.lin2.weight.val()])
            .map(values)
            .collect()
    }

    fn changed(old: &[f32], new: &[f32]) -> Vec<bool> {
        old.iter().zip(new).map(|(a, b)| a != b).collect()
    }

    #[test]
    fn test_delayed_schedule() {
        let s = DelayedConstScheduler::new(10, 0.1, 25, None);
        let pruned: Vec<usize> = (0..60).filter(|&i| s.is_time_to_prune(i)).collect();
        assert_eq!(pruned, vec![30, 40, 50]);
        assert_eq!(s.prob(), 0.1);
    }

    #[test]
    fn test_retrain_length() {
        assert_eq!(DelayedConstScheduler::new(10, 0.1, 0, Some(3)).n_steps_retrain(), Some(3));
        assert_eq!(DelayedConstScheduler::new(10, 0.1, 0, Some(0)).n_steps_retrain(), None);
        assert_eq!(DelayedConstScheduler::new(10, 0.1, 0, None).n_steps_retrain(), None);
        assert_eq!(NoScheduler.n_steps_retrain(), None);
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in RecycleKind::ALL {
            assert_eq!(kind.to_string().parse::<RecycleKind>(), Ok(kind));
        }
        assert!("magnitude".parse::<RecycleKind>().is_err());
    }

    #[test]
    fn test_kaiming_bounds() {
        assert!((init_bound(16) - (3.0f64 / 16.0).sqrt()).abs() < 1e-12);
        assert!((magnitude_bound(16) - (3.0f64 / 128.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_no_pruner_keeps_model() {
        let model  = tiny_model::<TestBackend>();
        let before = ff_weights(&model);
        let after  = ff_weights(&NoPruner.prune(model, 1.0));
        assert_eq!(before, after);
    }

    #[test]
    fn test_prob_zero_keeps_weights() {
        for kind in RecycleKind::ALL {
            let model  = tiny_model::<TestBackend>();
            let before = ff_weights(&model);
            let after  = ff_weights(&kind.pruner::<TestBackend>().prune(model, 0.0));
            assert_eq!(before, after, "{kind}");
        }
    }

    #[test]
    fn test_prob_one_redraws_within_bound() {
        let model  = tiny_model::<TestBackend>();
        let before = ff_weights(&model);
        let mut pruner = RandomUnstructRecycle::<TestBackend>::new();
        assert!(pruner.recycled().is_empty());
        let after  = ff_weights(&pruner.prune(model, 1.0));
        // lin1 + lin2 of both layers
        assert_eq!(pruner.recycled().len(), 4);

        for (old, new) in before.iter().zip(&after) {
            let n = changed(old, new).into_iter().filter(|c| *c).count();
            assert!(n as f64 > 0.99 * old.len() as f64);
        }
        // lin1 fan_in = d_model = 16, lin2 fan_in = d_ff = 32
        let bound1 = init_bound(16) as f32;
        let bound2 = init_bound(32) as f32;
        assert!(after[0].iter().all(|w| w.abs() <= bound1));
        assert!(after[1].iter().all(|w| w.abs() <= bound2));
    }

    #[test]
    fn test_masks_match_changed_weights() {
        let model  = tiny_model::<TestBackend>();
        let before = ff_weights(&model);
        let mut pruner = RandomUnstructRecycle::<TestBackend>::new();
        let after  = ff_weights(&pruner.prune(model, 0.3));

        for ((old, new), mask) in before.iter().zip(&after).zip(pruner.recycled()) {
            let recycled: Vec<bool> = mask.recycled.clone().into_data().to_vec().unwrap();
            assert_eq!(changed(old, new), recycled);
        }
    }

    #[test]
    fn test_random_struct_recycles_whole_neurons() {
        let model = tiny_model::<TestBackend>();
        let bias_before: Vec<f32> = values(model.layers[0].ff.lin1.bias.as_ref().unwrap().val());
        let mut pruner = RandomStructRecycle::<TestBackend>::new();
        let model = pruner.prune(model, 0.5);

        let lin1: Vec<bool> = pruner.recycled()[0].recycled.clone().into_data().to_vec().unwrap();
        let lin2: Vec<bool> = pruner.recycled()[1].recycled.clone().into_data().to_vec().unwrap();
        let (d_model, d_ff) = (16, 32);
        let neurons: Vec<bool> = lin1[..d_ff].to_vec();
        assert!(neurons.iter().any(|n| *n) && neurons.iter().any(|n| !*n));

        for f in 0..d_ff {
            // lin1 column f and lin2 row f follow the neuron
            assert!((0..d_model).all(|m| lin1[m * d_ff + f] == neurons[f]));
            assert!((0..d_model).all(|m| lin2[f * d_model + m] == neurons[f]));
        }

        let bias_after = values(model.layers[0].ff.lin1.bias.as_ref().unwrap().val());
        for f in 0..d_ff {
            let expected = if neurons[f] { 0.0 } else { bias_before[f] };
            assert_eq!(bias_after[f], expected);
        }
    }

    #[test]
    fn test_unstruct_magnitude_picks_smallest_weights() {
        let model  = tiny_model::<TestBackend>();
        let before = ff_weights(&model);
        let mut pruner = UnstructMagnitudeRecycle::<TestBackend>::new();
        pruner.prune(model, 0.25);

        for (old, mask) in before.iter().zip(pruner.recycled()) {
            let recycled: Vec<bool> = mask.recycled.clone().into_data().to_vec().unwrap();
            let n = (0.25 * old.len() as f64).round() as usize;
            assert_eq!(recycled.iter().filter(|r| **r).count(), n);

            let largest_recycled = old
                .iter()
                .zip(&recycled)
                .filter(|(_, r)| **r)
                .map(|(w, _)| w.abs())
                .fold(0.0f32, f32::max);
            let smallest_kept = old
                .iter()
                .zip(&recycled)
                .filter(|(_, r)| !**r)
                .map(|(w, _)| w.abs())
                .fold(f32::INFINITY, f32::min);
            assert!(largest_recycled <= smallest_kept);
        }
    }

    #[test]
    fn test_struct_magnitude_picks_weakest_neurons() {
        let model  = tiny_model::<TestBackend>();
        let scores = values(neuron_scores(&model.layers[0].ff));
        let mut pruner = StructMagnitudeRecycle::<TestBackend>::new();
        pruner.prune(model, 0.25);

        let lin1: Vec<bool> = pruner.recycled()[0].recycled.clone().into_data().to_vec().unwrap();
        let neurons = &lin1[..32];
        assert_eq!(neurons.iter().filter(|n| **n).count(), 8);

        let mut sorted = scores.clone();
        sorted.sort_by(f32::total_cmp);
        let threshold = sorted[7];
        for (score, recycled) in scores.iter().zip(neurons) {
            assert_eq!(*recycled, *score <= threshold);
        }
    }

    #[test]
    fn test_recycled_model_still_trains_under_autodiff() {
        type Ad = Autodiff<NdArray>;
        let device = Default::default();

        for kind in RecycleKind::ALL {
            let model = kind.pruner::<Ad>().prune(tiny_model::<Ad>(), 0.5);
            let ids   = Tensor::<Ad, 2, Int>::zeros([2, 8], &device);
            let grads = model.forward(ids).sum().backward();

            let ff = &model.layers[0].ff;
            assert!(ff.lin1.weight.val().grad(&grads).is_some(), "{kind}: lin1");
            assert!(ff.lin2.weight.val().grad(&grads).is_some(), "{kind}: lin2");
            let bias = ff.lin1.bias.as_ref().unwrap().val();
            assert!(bias.grad(&grads).is_some(), "{kind}: lin1 bias");
        }
    }
}
