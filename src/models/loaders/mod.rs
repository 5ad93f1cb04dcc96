// Model loaders: ONNX Runtime encoder/decoder graphs
pub mod onnx;
pub mod onnx_config;

pub use onnx::{OnnxSeq2SeqLoader, OnnxSeq2SeqModel};
pub use onnx_config::{ExecutionProvider, Seq2SeqModelConfig};
