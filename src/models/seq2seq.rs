// Encoder-decoder model seam

use anyhow::Result;
use ndarray::{Array2, Array3};

/// Token ids the decoder needs besides the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub decoder_start: u32,
    pub eos: u32,
    /// Token forced at the first decoding step (BART language/bos token)
    pub forced_bos: Option<u32>,
}

/// Encoder result for a single source sequence
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// [1, source_len, hidden]
    pub hidden_states: Array3<f32>,
    /// [1, source_len]
    pub attention_mask: Array2<i64>,
}

impl EncoderOutput {
    pub fn source_len(&self) -> usize {
        self.attention_mask.ncols()
    }
}

/// A loaded encoder-decoder model in inference mode
pub trait Seq2SeqModel: Send {
    fn name(&self) -> &str;

    fn special_tokens(&self) -> SpecialTokens;

    /// Run the encoder once over the source ids
    fn encode(&mut self, input_ids: &[u32]) -> Result<EncoderOutput>;

    /// Next-token logits for every decoder prefix, shape [prefixes, vocab].
    /// All prefixes have the same length.
    fn next_token_logits(&mut self, encoder: &EncoderOutput, prefixes: &[&[u32]]) -> Result<Array2<f32>>;
}
