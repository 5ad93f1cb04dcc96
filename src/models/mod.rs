// Models: catalog resolution, scoped leases and the ONNX encoder/decoder backend

pub mod catalog;
pub mod codec;
pub mod lease;
pub mod loaders;
pub mod seq2seq;

pub use catalog::{ModelCatalog, ModelDescriptor, ModelSource};
pub use codec::{sentinel_token_ids, TextCodec};
pub use lease::{MemoryReclaimer, ModelLease, SystemMemoryReclaimer};
pub use loaders::{OnnxSeq2SeqLoader, OnnxSeq2SeqModel};
pub use seq2seq::{EncoderOutput, Seq2SeqModel, SpecialTokens};
