// Generation controller
//
// Encodes a prompt, runs the beam search the policy describes against the
// leased model and decodes the single best sequence.

use anyhow::{bail, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::policy::GenerationPolicy;
use super::search::{BeamSearch, DecoderStep};
use crate::errors::RewriteError;
use crate::models::{sentinel_token_ids, EncoderOutput, ModelLease, Seq2SeqModel};

pub const DEFAULT_MAX_INPUT_TOKENS: usize = 256;

/// Runs one generation pass against a leased model
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        lease: &mut ModelLease,
        prompt: &str,
        policy: &GenerationPolicy,
    ) -> Result<String, RewriteError>;
}

#[derive(Debug, Clone)]
pub struct GenerationController {
    max_input_tokens: usize,
    seed: Option<u64>,
}

impl Default for GenerationController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INPUT_TOKENS, None)
    }
}

impl GenerationController {
    pub fn new(max_input_tokens: usize, seed: Option<u64>) -> Self {
        Self {
            max_input_tokens: max_input_tokens.max(1),
            seed,
        }
    }

    fn run(&self, lease: &mut ModelLease, prompt: &str, policy: &GenerationPolicy) -> Result<String> {
        policy.validate()?;
        let (codec, model) = lease.parts_mut()?;
        let special = model.special_tokens();

        let encoded = codec.encode(prompt)?;
        let input_ids = truncate_input(encoded, self.max_input_tokens, special.eos);
        if input_ids.is_empty() {
            bail!("prompt encoded to no tokens");
        }

        let mut forbidden = policy.forbidden_token_groups.clone();
        if policy.sentinel_bank > 0 {
            let sentinels = sentinel_token_ids(codec, policy.sentinel_bank);
            debug!(count = sentinels.len(), "Forbidding sentinel tokens");
            forbidden.extend(sentinels.into_iter().map(|id| vec![id]));
        }

        let encoder = model.encode(&input_ids)?;
        let mut step = ModelStep {
            model,
            encoder: &encoder,
        };
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        debug!(
            model = step.model.name(),
            input_tokens = input_ids.len(),
            beams = policy.beam_width,
            groups = policy.num_beam_groups,
            sample = policy.do_sample,
            "Starting generation"
        );
        let search = BeamSearch::new(policy, special, &input_ids, &forbidden);
        let output_ids = search.run(&mut step, &mut rng)?;
        debug!(output_tokens = output_ids.len(), "Generation finished");

        codec.decode(&output_ids)
    }
}

impl TextGenerator for GenerationController {
    fn generate(
        &self,
        lease: &mut ModelLease,
        prompt: &str,
        policy: &GenerationPolicy,
    ) -> Result<String, RewriteError> {
        self.run(lease, prompt, policy).map_err(RewriteError::Generation)
    }
}

/// Clip the encoded prompt to `max` tokens, keeping a trailing EOS in place
pub fn truncate_input(mut ids: Vec<u32>, max: usize, eos: u32) -> Vec<u32> {
    if ids.len() <= max {
        return ids;
    }
    if ids.last() == Some(&eos) && max > 0 {
        ids.truncate(max - 1);
        ids.push(eos);
    } else {
        ids.truncate(max);
    }
    ids
}

struct ModelStep<'a> {
    model: &'a mut dyn Seq2SeqModel,
    encoder: &'a EncoderOutput,
}

impl DecoderStep for ModelStep<'_> {
    fn next_logits(&mut self, prefixes: &[&[u32]]) -> Result<Array2<f32>> {
        self.model.next_token_logits(self.encoder, prefixes)
    }
}
