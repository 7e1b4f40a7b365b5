use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{log_softmax, relu},
};

use crate::data::batcher::ProcessedBatch;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally; do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct TransformerMlmConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
}

impl TransformerMlmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerMlmModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let lm_head    = LinearConfig::new(self.d_model, self.vocab_size).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        TransformerMlmModel {
            token_embedding, position_embedding, layers,
            final_norm, lm_head, dropout,
            max_seq_len: self.max_seq_len,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ff = FeedForward {
            lin1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            lin2: LinearConfig::new(self.d_ff, self.d_model).init(device),
        };
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ff, norm1, norm2, dropout }
    }
}

/// d_model → d_ff → d_model with ReLU. The recycling pruners
/// re-initialise weights of these two linears.
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub lin1: Linear<B>,
    pub lin2: Linear<B>,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        self.lin2.forward(relu(self.lin1.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn: MultiHeadAttention<B>,
    pub ff:        FeedForward<B>,
    pub norm1:     LayerNorm<B>,
    pub norm2:     LayerNorm<B>,
    pub dropout:   Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attn_output = self.self_attn.forward(MhaInput::self_attn(x.clone())).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ff_out = self.ff.forward(x.clone());
        self.norm2.forward(x + self.dropout.forward(ff_out))
    }
}

#[derive(Module, Debug)]
pub struct TransformerMlmModel<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub lm_head:            Linear<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
}

impl<B: Backend> TransformerMlmModel<B> {
    /// input_ids: [batch, seq_len] → logits: [batch, seq_len, vocab_size]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();

        let tok_emb = self.token_embedding.forward(input_ids);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x);
        }
        self.lm_head.forward(self.final_norm.forward(x))
    }

    /// Predict the original tokens from the masked ones and score
    /// only the selected positions.
    pub fn forward_mask_loss(&self, batch: ProcessedBatch<B>, mask_percent: f64) -> Tensor<B, 1> {
        let logits = self.forward(batch.masked_tokens);
        mask_loss(logits, batch.tokens, batch.mask_mask, mask_percent)
    }
}

/// Cross-entropy at every position, zeroed where `mask` is false,
/// averaged over all positions and divided by `mask_percent` so the
/// value approximates the mean loss per masked token.
pub fn mask_loss<B: Backend>(
    logits:       Tensor<B, 3>,
    targets:      Tensor<B, 2, Int>,
    mask:         Tensor<B, 2, Bool>,
    mask_percent: f64,
) -> Tensor<B, 1> {
    let [batch_size, seq_len, vocab_size] = logits.dims();
    let n = batch_size * seq_len;

    let log_probs = log_softmax(logits.reshape([n, vocab_size]), 1);
    let nll = log_probs
        .gather(1, targets.reshape([n, 1]))
        .reshape([n])
        .neg();
    let selected = mask.reshape([n]).float();

    (nll * selected).mean().div_scalar(mask_percent)
}
