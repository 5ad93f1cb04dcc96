// Qalam - Style-aware text rewriting engine
// Library exports

pub mod config;
pub mod errors;
pub mod generation; // Constrained decoding: policies, processors, beam search
pub mod language;
pub mod logging;
pub mod metrics;
pub mod models; // Model catalog, scoped leases, ONNX encoder/decoder backend
pub mod normalizer;
pub mod prompts;
pub mod server; // HTTP surface for the three rewrite operations
pub mod service; // Request validation and orchestration
