// Lexical similarity between a source text and a generated candidate

use std::collections::HashSet;

/// Similarity above which a candidate counts as a copy of its source
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.72;

/// Jaccard similarity of the lower-cased whitespace token sets
/// (0.0 = disjoint, 1.0 = same set)
///
/// Returns `None` when either side has no tokens.
pub fn jaccard_similarity(text1: &str, text2: &str) -> Option<f64> {
    let words1 = tokenize(text1);
    let words2 = tokenize(text2);

    if words1.is_empty() || words2.is_empty() {
        return None;
    }

    let intersection = words1.intersection(&words2).count();
    let union = words1.union(&words2).count();

    // Jaccard similarity: |A ∩ B| / |A ∪ B|
    Some(intersection as f64 / union as f64)
}

/// Tokenize text into lower-cased whitespace-separated words
fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// Decides whether a paraphrase-style candidate stayed too close to its source
#[derive(Debug, Clone, Copy)]
pub struct SimilarityGate {
    threshold: f64,
}

impl Default for SimilarityGate {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl SimilarityGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Similarity in 0.0..=1.0; an empty side scores 1.0
    pub fn similarity(&self, source: &str, candidate: &str) -> f64 {
        jaccard_similarity(source, candidate).unwrap_or(1.0)
    }

    /// True when the candidate should be regenerated with stronger decoding
    ///
    /// An empty token set on either side is always too similar, so a
    /// degenerate near-empty output forces escalation.
    pub fn too_similar(&self, source: &str, candidate: &str) -> bool {
        match jaccard_similarity(source, candidate) {
            Some(similarity) => similarity > self.threshold,
            None => true,
        }
    }
}
