// Logits processors
//
// Every processor edits one row of next-token scores in place. Banned tokens
// are set to -inf; the search never selects a -inf candidate.

use ndarray::{ArrayBase, DataMut, Ix1};
use std::collections::HashSet;

/// Replace scores with log-probabilities. A fully masked row is left as is.
pub fn log_softmax_inplace<S>(row: &mut ArrayBase<S, Ix1>)
where
    S: DataMut<Elem = f32>,
{
    let max = row.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
    if max == f32::NEG_INFINITY {
        return;
    }
    let log_sum = row.iter().map(|&x| (x - max).exp()).sum::<f32>().ln();
    row.mapv_inplace(|x| x - max - log_sum);
}

/// Softmax over a flat score list; -inf entries get probability 0
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return vec![0.0; scores.len()];
    }
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Penalize every token already present in `tokens`, once per distinct token
pub fn apply_repetition_penalty<S>(row: &mut ArrayBase<S, Ix1>, tokens: &[u32], penalty: f32)
where
    S: DataMut<Elem = f32>,
{
    if penalty == 1.0 {
        return;
    }
    let seen: HashSet<u32> = tokens.iter().copied().collect();
    for token in seen {
        let idx = token as usize;
        if idx < row.len() {
            let score = row[idx];
            row[idx] = if score < 0.0 { score * penalty } else { score / penalty };
        }
    }
}

/// Ban tokens that would complete an n-gram already present in `tokens`
pub fn apply_no_repeat_ngram<S>(row: &mut ArrayBase<S, Ix1>, tokens: &[u32], ngram_size: usize)
where
    S: DataMut<Elem = f32>,
{
    let n = ngram_size;
    if n == 0 || tokens.len() + 1 < n {
        return;
    }
    let current_prefix = &tokens[tokens.len() - (n - 1)..];
    for window in tokens.windows(n) {
        if &window[..n - 1] == current_prefix {
            ban(row, window[n - 1]);
        }
    }
}

/// Ban tokens that would reproduce an n-gram of the encoder input
pub fn apply_encoder_no_repeat_ngram<S>(
    row: &mut ArrayBase<S, Ix1>,
    encoder_ids: &[u32],
    tokens: &[u32],
    ngram_size: usize,
) where
    S: DataMut<Elem = f32>,
{
    let n = ngram_size;
    if n == 0 || tokens.len() + 1 < n || encoder_ids.len() < n {
        return;
    }
    let current_prefix = &tokens[tokens.len() - (n - 1)..];
    for window in encoder_ids.windows(n) {
        if &window[..n - 1] == current_prefix {
            ban(row, window[n - 1]);
        }
    }
}

/// Ban forbidden sequences. Single-token groups are always banned; longer
/// groups ban their last token once the rest has just been generated.
pub fn apply_forbidden_groups<S>(row: &mut ArrayBase<S, Ix1>, tokens: &[u32], groups: &[Vec<u32>])
where
    S: DataMut<Elem = f32>,
{
    for group in groups {
        let Some((&last, prefix)) = group.split_last() else {
            continue;
        };
        if tokens.ends_with(prefix) {
            ban(row, last);
        }
    }
}

/// Lower scores of tokens other beam groups already picked at this step
pub fn apply_diversity_penalty<S>(row: &mut ArrayBase<S, Ix1>, picked: &[u32], penalty: f32)
where
    S: DataMut<Elem = f32>,
{
    if penalty == 0.0 {
        return;
    }
    for &token in picked {
        let idx = token as usize;
        if idx < row.len() {
            row[idx] -= penalty;
        }
    }
}

/// Allow only `token` (forced first token)
pub fn force_token<S>(row: &mut ArrayBase<S, Ix1>, token: u32)
where
    S: DataMut<Elem = f32>,
{
    let idx = token as usize;
    if idx < row.len() {
        row.fill(f32::NEG_INFINITY);
        row[idx] = 0.0;
    }
}

pub fn apply_temperature<S>(row: &mut ArrayBase<S, Ix1>, temperature: f32)
where
    S: DataMut<Elem = f32>,
{
    if temperature != 1.0 && temperature > 0.0 {
        row.mapv_inplace(|x| x / temperature);
    }
}

/// Nucleus filter: drop the least likely tokens whose cumulative probability
/// stays within `1 - top_p`, always keeping `min_keep` tokens
pub fn apply_top_p<S>(row: &mut ArrayBase<S, Ix1>, top_p: f32, min_keep: usize)
where
    S: DataMut<Elem = f32>,
{
    if top_p >= 1.0 {
        return;
    }
    let scores: Vec<f32> = row.iter().copied().collect();
    let probs = softmax(&scores);

    let mut ascending: Vec<usize> = (0..scores.len()).collect();
    ascending.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let removable = ascending.len().saturating_sub(min_keep);
    let mut cumulative = 0.0;
    for &idx in &ascending[..removable] {
        cumulative += probs[idx];
        if cumulative > 1.0 - top_p {
            break;
        }
        row[idx] = f32::NEG_INFINITY;
    }
}

pub fn ban<S>(row: &mut ArrayBase<S, Ix1>, token: u32)
where
    S: DataMut<Elem = f32>,
{
    let idx = token as usize;
    if idx < row.len() {
        row[idx] = f32::NEG_INFINITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_log_softmax_matches_ln_softmax() {
        let mut row = array![1.0f32, 2.0, 3.0];
        let probs = softmax(&[1.0, 2.0, 3.0]);
        log_softmax_inplace(&mut row);
        for i in 0..3 {
            assert!((row[i] - probs[i].ln()).abs() < 1e-5);
        }
    }

    #[test]
    fn test_log_softmax_keeps_masked_row() {
        let mut row = array![f32::NEG_INFINITY, f32::NEG_INFINITY];
        log_softmax_inplace(&mut row);
        assert!(row.iter().all(|&x| x == f32::NEG_INFINITY));
    }

    #[test]
    fn test_repetition_penalty_counts_each_token_once() {
        let mut row = array![-1.0f32, 2.0, 0.5];
        apply_repetition_penalty(&mut row, &[0, 0, 1], 2.0);
        assert_eq!(row[0], -2.0);
        assert_eq!(row[1], 1.0);
        assert_eq!(row[2], 0.5);
    }

    #[test]
    fn test_no_repeat_ngram_bans_completion() {
        // history "5 6 7 5 6" -> next 7 would repeat the trigram "5 6 7"
        let mut row = ndarray::Array1::<f32>::zeros(10);
        apply_no_repeat_ngram(&mut row, &[5, 6, 7, 5, 6], 3);
        assert_eq!(row[7], f32::NEG_INFINITY);
        assert_eq!(row[8], 0.0);
    }

    #[test]
    fn test_no_repeat_ngram_short_history() {
        let mut row = ndarray::Array1::<f32>::zeros(4);
        apply_no_repeat_ngram(&mut row, &[1], 3);
        assert!(row.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_encoder_no_repeat_ngram() {
        let mut row = ndarray::Array1::<f32>::zeros(10);
        // source contains "3 4 5"; output ends with "3 4"
        apply_encoder_no_repeat_ngram(&mut row, &[1, 3, 4, 5, 9], &[0, 3, 4], 3);
        assert_eq!(row[5], f32::NEG_INFINITY);
        assert_eq!(row[9], 0.0);
    }

    #[test]
    fn test_forbidden_groups() {
        let mut row = ndarray::Array1::<f32>::zeros(10);
        let groups = vec![vec![8], vec![2, 3]];
        apply_forbidden_groups(&mut row, &[0, 1], &groups);
        assert_eq!(row[8], f32::NEG_INFINITY);
        assert_eq!(row[3], 0.0);

        let mut row = ndarray::Array1::<f32>::zeros(10);
        apply_forbidden_groups(&mut row, &[0, 2], &groups);
        assert_eq!(row[3], f32::NEG_INFINITY);
    }

    #[test]
    fn test_diversity_penalty_per_occurrence() {
        let mut row = array![0.0f32, 0.0, 0.0];
        apply_diversity_penalty(&mut row, &[1, 1, 2], 0.5);
        assert_eq!(row[0], 0.0);
        assert_eq!(row[1], -1.0);
        assert_eq!(row[2], -0.5);
    }

    #[test]
    fn test_force_token() {
        let mut row = array![0.3f32, 0.1, 0.9];
        force_token(&mut row, 1);
        assert_eq!(row[1], 0.0);
        assert_eq!(row[0], f32::NEG_INFINITY);
        assert_eq!(row[2], f32::NEG_INFINITY);
    }

    #[test]
    fn test_top_p_keeps_nucleus() {
        // probabilities roughly 0.64, 0.24, 0.09, 0.03
        let mut row = array![3.0f32, 2.0, 1.0, 0.0];
        apply_top_p(&mut row, 0.8, 1);
        assert!(row[0].is_finite());
        assert!(row[1].is_finite());
        assert_eq!(row[2], f32::NEG_INFINITY);
        assert_eq!(row[3], f32::NEG_INFINITY);
    }

    #[test]
    fn test_top_p_min_keep() {
        let mut row = array![10.0f32, 0.0, 0.0];
        apply_top_p(&mut row, 0.5, 2);
        let kept = row.iter().filter(|x| x.is_finite()).count();
        assert_eq!(kept, 2);
    }

    #[test]
    fn test_temperature_scales() {
        let mut row = array![1.0f32, -2.0];
        apply_temperature(&mut row, 0.5);
        assert_eq!(row[0], 2.0);
        assert_eq!(row[1], -4.0);
    }
}
