// Beam search
//
// One routine covers the three decoding modes the policies ask for:
// deterministic beam search, beam sampling and diverse beam-group search.
// Beams are split into `num_beam_groups` groups of `group_size`; each group
// keeps its own running beams and finished hypotheses and groups are
// advanced in order so later groups see the tokens earlier groups picked.

use anyhow::{anyhow, bail, Result};
use ndarray::{s, Array2};
use rand::Rng;

use super::policy::GenerationPolicy;
use super::processors::{
    apply_diversity_penalty, apply_encoder_no_repeat_ngram, apply_forbidden_groups,
    apply_no_repeat_ngram, apply_repetition_penalty, apply_temperature, apply_top_p, ban,
    force_token, log_softmax_inplace, softmax,
};
use crate::models::SpecialTokens;

/// Produces next-token logits for a batch of decoder prefixes
pub trait DecoderStep {
    /// Shape [prefixes, vocab]; all prefixes have the same length
    fn next_logits(&mut self, prefixes: &[&[u32]]) -> Result<Array2<f32>>;
}

#[derive(Clone, Debug)]
struct Hypothesis {
    /// Includes the decoder start token
    tokens: Vec<u32>,
    score: f32,
}

impl Hypothesis {
    fn normalized_score(&self, length_penalty: f32) -> f32 {
        let generated = self.tokens.len().saturating_sub(1) as f32;
        let lp = if generated > 0.0 {
            generated.powf(length_penalty)
        } else {
            1.0
        };
        self.score / lp
    }
}

struct FinishedHypotheses {
    hypotheses: Vec<Hypothesis>,
    capacity: usize,
    length_penalty: f32,
    worst_score: f32,
}

impl FinishedHypotheses {
    fn new(capacity: usize, length_penalty: f32) -> Self {
        Self {
            hypotheses: Vec::with_capacity(capacity),
            capacity,
            length_penalty,
            worst_score: f32::NEG_INFINITY,
        }
    }

    fn add(&mut self, hypothesis: Hypothesis) {
        if hypothesis.score == f32::NEG_INFINITY {
            return;
        }
        let lp = self.length_penalty;
        let score = hypothesis.normalized_score(lp);
        if self.hypotheses.len() < self.capacity || score > self.worst_score {
            self.hypotheses.push(hypothesis);
            self.hypotheses.sort_by(|a, b| {
                b.normalized_score(lp)
                    .partial_cmp(&a.normalized_score(lp))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            self.hypotheses.truncate(self.capacity);
            self.worst_score = self
                .hypotheses
                .last()
                .map(|h| h.normalized_score(lp))
                .unwrap_or(f32::NEG_INFINITY);
        }
    }

    fn is_done(&self, early_stopping: bool, best_running_score: f32, generated_len: usize) -> bool {
        if self.hypotheses.len() < self.capacity {
            return false;
        }
        if early_stopping {
            return true;
        }
        let lp = if generated_len > 0 {
            (generated_len as f32).powf(self.length_penalty)
        } else {
            1.0
        };
        self.worst_score >= best_running_score / lp
    }
}

struct BeamGroup {
    beams: Vec<Hypothesis>,
    finished: FinishedHypotheses,
    done: bool,
}

/// A scored candidate continuation: (score, beam index within group, token)
type Candidate = (f32, usize, u32);

pub struct BeamSearch<'a> {
    policy: &'a GenerationPolicy,
    special: SpecialTokens,
    encoder_ids: &'a [u32],
    forbidden: &'a [Vec<u32>],
}

impl<'a> BeamSearch<'a> {
    pub fn new(
        policy: &'a GenerationPolicy,
        special: SpecialTokens,
        encoder_ids: &'a [u32],
        forbidden: &'a [Vec<u32>],
    ) -> Self {
        Self {
            policy,
            special,
            encoder_ids,
            forbidden,
        }
    }

    fn sampling(&self) -> bool {
        self.policy.do_sample && !self.policy.is_diverse()
    }

    /// Run the search and return the best sequence without the decoder start
    /// token and trailing EOS
    pub fn run<D, R>(&self, decoder: &mut D, rng: &mut R) -> Result<Vec<u32>>
    where
        D: DecoderStep + ?Sized,
        R: Rng + ?Sized,
    {
        self.policy.validate()?;
        let group_size = self.policy.group_size();
        let start = self.special.decoder_start;

        let mut groups: Vec<BeamGroup> = (0..self.policy.num_beam_groups)
            .map(|_| BeamGroup {
                beams: (0..group_size)
                    .map(|i| Hypothesis {
                        tokens: vec![start],
                        score: if i == 0 { 0.0 } else { f32::NEG_INFINITY },
                    })
                    .collect(),
                finished: FinishedHypotheses::new(group_size, self.policy.length_penalty),
                done: false,
            })
            .collect();

        for step in 0..self.policy.max_new_tokens {
            let active: Vec<usize> = (0..groups.len()).filter(|&g| !groups[g].done).collect();
            if active.is_empty() {
                break;
            }

            let logits = {
                let prefixes: Vec<&[u32]> = active
                    .iter()
                    .flat_map(|&g| groups[g].beams.iter().map(|b| b.tokens.as_slice()))
                    .collect();
                let logits = decoder.next_logits(&prefixes)?;
                if logits.nrows() != prefixes.len() {
                    bail!(
                        "decoder returned {} rows for {} prefixes",
                        logits.nrows(),
                        prefixes.len()
                    );
                }
                logits
            };

            let mut picked_this_step: Vec<u32> = Vec::new();
            for (position, &g) in active.iter().enumerate() {
                let offset = position * group_size;
                let group_logits = logits.slice(s![offset..offset + group_size, ..]).to_owned();
                let tokens = self.advance_group(&mut groups[g], group_logits, step, &picked_this_step, rng);
                picked_this_step.extend(tokens);
            }
        }

        let lp = self.policy.length_penalty;
        let mut best: Option<Hypothesis> = None;
        for group in groups.iter_mut() {
            if !group.done {
                for beam in std::mem::take(&mut group.beams) {
                    group.finished.add(beam);
                }
            }
            for hypothesis in group.finished.hypotheses.drain(..) {
                let better = best
                    .as_ref()
                    .map_or(true, |b| hypothesis.normalized_score(lp) > b.normalized_score(lp));
                if better {
                    best = Some(hypothesis);
                }
            }
        }

        let best = best.ok_or_else(|| anyhow!("beam search produced no hypotheses"))?;
        let mut tokens = best.tokens;
        if tokens.first() == Some(&start) {
            tokens.remove(0);
        }
        if tokens.last() == Some(&self.special.eos) {
            tokens.pop();
        }
        Ok(tokens)
    }

    /// Score, select and reorder one group's beams. Returns the tokens the
    /// group's surviving beams just picked.
    fn advance_group<R: Rng + ?Sized>(
        &self,
        group: &mut BeamGroup,
        mut scores: Array2<f32>,
        step: usize,
        picked_by_earlier_groups: &[u32],
        rng: &mut R,
    ) -> Vec<u32> {
        let group_size = group.beams.len();
        let min_keep = if self.policy.beam_width > 1 { 2 } else { 1 };

        for (beam, mut row) in group.beams.iter().zip(scores.outer_iter_mut()) {
            if beam.score == f32::NEG_INFINITY {
                row.fill(f32::NEG_INFINITY);
                continue;
            }
            log_softmax_inplace(&mut row);
            self.process_row(&mut row, &beam.tokens, step, picked_by_earlier_groups);
            if self.sampling() {
                apply_temperature(&mut row, self.policy.temperature);
                apply_top_p(&mut row, self.policy.top_p, min_keep);
            }
            row.mapv_inplace(|x| x + beam.score);
        }

        let wanted = 2 * group_size;
        let candidates = if self.sampling() {
            sample_candidates(&scores, wanted, rng)
        } else {
            top_candidates(&scores, wanted)
        };

        let eos = self.special.eos;
        let mut next: Vec<Hypothesis> = Vec::with_capacity(group_size);
        for (rank, (score, beam_idx, token)) in candidates.into_iter().enumerate() {
            let mut tokens = group.beams[beam_idx].tokens.clone();
            tokens.push(token);
            if token == eos {
                if rank >= group_size {
                    continue;
                }
                group.finished.add(Hypothesis { tokens, score });
            } else {
                next.push(Hypothesis { tokens, score });
                if next.len() == group_size {
                    break;
                }
            }
        }

        let best_running = next.first().map(|h| h.score).unwrap_or(f32::NEG_INFINITY);
        if next.is_empty() || group.finished.is_done(self.policy.early_stopping, best_running, step + 1) {
            group.done = true;
            group.beams.clear();
            return Vec::new();
        }

        let picked: Vec<u32> = next.iter().filter_map(|h| h.tokens.last().copied()).collect();
        while next.len() < group_size {
            let tokens = next.last().map(|h| h.tokens.clone()).unwrap_or_default();
            next.push(Hypothesis {
                tokens,
                score: f32::NEG_INFINITY,
            });
        }
        group.beams = next;
        picked
    }

    fn process_row(
        &self,
        row: &mut ndarray::ArrayViewMut1<'_, f32>,
        tokens: &[u32],
        step: usize,
        picked_by_earlier_groups: &[u32],
    ) {
        if step == 0 {
            if let Some(forced) = self.special.forced_bos {
                force_token(row, forced);
                return;
            }
        }
        let policy = self.policy;
        if policy.diversity_penalty > 0.0 && !picked_by_earlier_groups.is_empty() {
            apply_diversity_penalty(row, picked_by_earlier_groups, policy.diversity_penalty);
        }
        apply_repetition_penalty(row, tokens, policy.repetition_penalty);
        if policy.no_repeat_ngram_size > 0 {
            apply_no_repeat_ngram(row, tokens, policy.no_repeat_ngram_size);
        }
        if policy.encoder_no_repeat_ngram_size > 0 {
            apply_encoder_no_repeat_ngram(
                row,
                self.encoder_ids,
                tokens,
                policy.encoder_no_repeat_ngram_size,
            );
        }
        apply_forbidden_groups(row, tokens, self.forbidden);
        if step < policy.min_new_tokens {
            ban(row, self.special.eos);
        }
    }
}

fn by_score_desc(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal)
}

/// Best `k` finite candidates across all beams of the group
fn top_candidates(scores: &Array2<f32>, k: usize) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = scores
        .indexed_iter()
        .filter(|(_, score)| score.is_finite())
        .map(|((beam, token), &score)| (score, beam, token as u32))
        .collect();
    if candidates.len() > k {
        candidates.select_nth_unstable_by(k, by_score_desc);
        candidates.truncate(k);
    }
    candidates.sort_by(by_score_desc);
    candidates
}

/// Draw up to `k` distinct candidates proportionally to softmax over the
/// flattened group scores, then order them by score
fn sample_candidates<R: Rng + ?Sized>(scores: &Array2<f32>, k: usize, rng: &mut R) -> Vec<Candidate> {
    let vocab = scores.ncols();
    let flat: Vec<f32> = scores.iter().copied().collect();
    let mut weights = softmax(&flat);
    let available = weights.iter().filter(|&&w| w > 0.0).count();

    let mut candidates: Vec<Candidate> = Vec::with_capacity(k.min(available));
    for _ in 0..k.min(available) {
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            break;
        }
        let mut target = rng.gen::<f32>() * total;
        let mut chosen = None;
        let mut last_nonzero = None;
        for (idx, &w) in weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            last_nonzero = Some(idx);
            target -= w;
            if target <= 0.0 {
                chosen = Some(idx);
                break;
            }
        }
        // Rounding can leave a tiny remainder; fall back to the last live entry
        let Some(idx) = chosen.or(last_nonzero) else {
            break;
        };
        weights[idx] = 0.0;
        candidates.push((flat[idx], idx / vocab, (idx % vocab) as u32));
    }
    candidates.sort_by(by_score_desc);
    candidates
}
