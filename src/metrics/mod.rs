// Metrics module
// Source/candidate similarity used to decide when to escalate decoding

mod similarity;

pub use similarity::{jaccard_similarity, SimilarityGate, DEFAULT_SIMILARITY_THRESHOLD};
