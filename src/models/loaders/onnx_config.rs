use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::config::BackendDevice;
use crate::models::seq2seq::SpecialTokens;

/// Fields of a Hugging Face `config.json` the decoder loop needs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seq2SeqModelConfig {
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub decoder_start_token_id: Option<u32>,
    #[serde(default)]
    pub eos_token_id: Option<u32>,
    #[serde(default)]
    pub pad_token_id: Option<u32>,
    #[serde(default)]
    pub forced_bos_token_id: Option<u32>,
}

impl Seq2SeqModelConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Special tokens with T5 conventions filling the gaps
    /// (pad 0, eos 1, decoder start = pad)
    pub fn special_tokens(&self) -> SpecialTokens {
        // T5 starts decoding from the pad token
        let pad = self.pad_token_id.unwrap_or(0);
        SpecialTokens {
            decoder_start: self.decoder_start_token_id.unwrap_or(pad),
            eos: self.eos_token_id.unwrap_or(1),
            forced_bos: self.forced_bos_token_id,
        }
    }
}

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    /// CPU (fallback, works everywhere)
    CPU,
    /// CUDA (NVIDIA GPUs, Linux/Windows)
    #[cfg_attr(not(feature = "cuda"), allow(dead_code))]
    CUDA,
}

impl ExecutionProvider {
    /// Providers to request for a configured device, CPU always last
    pub fn for_device(device: BackendDevice) -> Vec<Self> {
        match device.effective() {
            #[cfg(feature = "cuda")]
            BackendDevice::Cuda => vec![ExecutionProvider::CUDA, ExecutionProvider::CPU],
            _ => vec![ExecutionProvider::CPU],
        }
    }

    /// Get name string for logging
    pub fn name(&self) -> &str {
        match self {
            ExecutionProvider::CPU => "CPU",
            ExecutionProvider::CUDA => "CUDA",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bart_config() {
        let config: Seq2SeqModelConfig = serde_json::from_str(
            r#"{
                "model_type": "bart",
                "bos_token_id": 0,
                "decoder_start_token_id": 2,
                "eos_token_id": 2,
                "forced_bos_token_id": 0,
                "pad_token_id": 1,
                "vocab_size": 50265
            }"#,
        )
        .unwrap();
        let special = config.special_tokens();
        assert_eq!(special.decoder_start, 2);
        assert_eq!(special.eos, 2);
        assert_eq!(special.forced_bos, Some(0));
    }

    #[test]
    fn test_t5_defaults() {
        let config: Seq2SeqModelConfig =
            serde_json::from_str(r#"{"model_type": "t5", "eos_token_id": 1, "pad_token_id": 0}"#).unwrap();
        let special = config.special_tokens();
        assert_eq!(special.decoder_start, 0);
        assert_eq!(special.eos, 1);
        assert_eq!(special.forced_bos, None);
    }

    #[test]
    fn test_cpu_is_always_last() {
        let providers = ExecutionProvider::for_device(BackendDevice::Auto);
        assert_eq!(providers.last(), Some(&ExecutionProvider::CPU));
        assert_eq!(ExecutionProvider::for_device(BackendDevice::Cpu), vec![ExecutionProvider::CPU]);
    }
}
