// Constrained decoding: policies, logits processors and beam search

pub mod controller;
pub mod policy;
pub mod processors;
pub mod search;

pub use controller::{truncate_input, GenerationController, TextGenerator, DEFAULT_MAX_INPUT_TOKENS};
pub use policy::{GenerationPolicy, PairOverride, PolicyOverride, PolicyOverrides, PolicyStrength, PolicyTable};
pub use search::{BeamSearch, DecoderStep};
