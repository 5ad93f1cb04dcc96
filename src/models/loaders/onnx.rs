use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array2, Array3, ArrayView1};
use ort::{
    ep,
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::onnx_config::{ExecutionProvider, Seq2SeqModelConfig};
use crate::config::BackendDevice;
use crate::models::catalog::ModelDescriptor;
use crate::models::codec::TextCodec;
use crate::models::seq2seq::{EncoderOutput, Seq2SeqModel, SpecialTokens};

/// Loads exported encoder/decoder ONNX graphs plus their tokenizer
#[derive(Debug, Clone)]
pub struct OnnxSeq2SeqLoader {
    intra_threads: usize,
}

impl OnnxSeq2SeqLoader {
    pub fn new(intra_threads: usize) -> Self {
        Self {
            intra_threads: intra_threads.max(1),
        }
    }

    /// Create ONNX Runtime session with execution providers
    fn create_session(&self, model_path: &Path, device: BackendDevice) -> Result<Session> {
        debug!("Creating ONNX session from: {:?}", model_path);

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.intra_threads)?;

        let providers = Self::get_execution_providers(device);
        if !providers.is_empty() {
            builder = builder.with_execution_providers(providers)?;
        }

        let session = builder
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to create ONNX session for {}", model_path.display()))?;

        Ok(session)
    }

    fn get_execution_providers(device: BackendDevice) -> Vec<ep::ExecutionProviderDispatch> {
        let mut providers = vec![];
        for provider in ExecutionProvider::for_device(device) {
            debug!(provider = provider.name(), "Requesting execution provider");
            match provider {
                ExecutionProvider::CUDA => {
                    #[cfg(feature = "cuda")]
                    {
                        providers.push(ep::CUDA::default().build());
                    }
                }
                ExecutionProvider::CPU => providers.push(ep::CPU::default().build()),
            }
        }
        providers
    }

    /// Load tokenizer, special tokens and both graphs of a resolved model
    pub fn load(&self, descriptor: &ModelDescriptor) -> Result<(Box<dyn TextCodec>, Box<dyn Seq2SeqModel>)> {
        if !descriptor.artifacts_exist() {
            let root = descriptor.dir.parent().unwrap_or(&descriptor.dir);
            bail!("model '{}' not found under {}", descriptor.name, root.display());
        }
        info!(
            model = %descriptor.name,
            device = descriptor.device.name(),
            precision = ?descriptor.precision,
            "Loading model"
        );

        let tokenizer = Self::load_tokenizer(&descriptor.tokenizer_path)?;
        let config = Seq2SeqModelConfig::from_file(&descriptor.config_path)?;
        let encoder = self.create_session(&descriptor.encoder_path, descriptor.device)?;
        let decoder = self.create_session(&descriptor.decoder_path, descriptor.device)?;

        let model = OnnxSeq2SeqModel {
            name: descriptor.name.clone(),
            special: config.special_tokens(),
            encoder,
            decoder,
        };
        debug!(model = %descriptor.name, special = ?model.special, model_type = ?config.model_type, "Model ready");

        Ok((Box::new(tokenizer), Box::new(model)))
    }

    fn load_tokenizer(tokenizer_path: &Path) -> Result<Tokenizer> {
        if !tokenizer_path.exists() {
            bail!("Tokenizer file not found: {:?}", tokenizer_path);
        }
        Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {:?}: {}", tokenizer_path, e))
    }
}

/// Encoder and decoder sessions of one exported model. The decoder is the
/// plain (no past key values) export, so every step re-reads the prefix.
pub struct OnnxSeq2SeqModel {
    name: String,
    special: SpecialTokens,
    encoder: Session,
    decoder: Session,
}

impl Seq2SeqModel for OnnxSeq2SeqModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    fn encode(&mut self, input_ids: &[u32]) -> Result<EncoderOutput> {
        let len = input_ids.len();
        if len == 0 {
            bail!("cannot encode an empty input");
        }
        let ids = Array2::from_shape_vec((1, len), input_ids.iter().map(|&t| t as i64).collect())
            .context("Failed to create ndarray for input_ids")?;
        let attention_mask = Array2::<i64>::ones((1, len));

        let outputs = self.encoder.run(ort::inputs![
            "input_ids" => Value::from_array(ids)?,
            "attention_mask" => Value::from_array(attention_mask.clone())?
        ])?;

        let hidden = outputs
            .get("last_hidden_state")
            .ok_or_else(|| anyhow!("encoder output last_hidden_state missing"))?;
        let (shape, data) = hidden
            .try_extract_tensor::<f32>()
            .context("Failed to extract encoder hidden states")?;
        if shape.len() != 3 {
            bail!("Expected 3D encoder output, got shape: {:?}", shape);
        }
        let hidden_states = Array3::from_shape_vec(
            (shape[0] as usize, shape[1] as usize, shape[2] as usize),
            data.to_vec(),
        )?;

        Ok(EncoderOutput {
            hidden_states,
            attention_mask,
        })
    }

    fn next_token_logits(&mut self, encoder: &EncoderOutput, prefixes: &[&[u32]]) -> Result<Array2<f32>> {
        let batch = prefixes.len();
        let steps = prefixes.first().map(|p| p.len()).unwrap_or(0);
        if batch == 0 || steps == 0 {
            bail!("decoder needs at least one non-empty prefix");
        }

        let mut ids = Vec::with_capacity(batch * steps);
        for prefix in prefixes {
            if prefix.len() != steps {
                bail!("decoder prefixes must share one length");
            }
            ids.extend(prefix.iter().map(|&t| t as i64));
        }
        let input_ids = Array2::from_shape_vec((batch, steps), ids)?;

        let source_len = encoder.source_len();
        let hidden = encoder.hidden_states.dim().2;
        let hidden_states = encoder
            .hidden_states
            .broadcast((batch, source_len, hidden))
            .ok_or_else(|| anyhow!("cannot broadcast encoder states to batch {}", batch))?
            .to_owned();
        let mask = encoder
            .attention_mask
            .broadcast((batch, source_len))
            .ok_or_else(|| anyhow!("cannot broadcast attention mask to batch {}", batch))?
            .to_owned();

        let outputs = self.decoder.run(ort::inputs![
            "input_ids" => Value::from_array(input_ids)?,
            "encoder_attention_mask" => Value::from_array(mask)?,
            "encoder_hidden_states" => Value::from_array(hidden_states)?
        ])?;

        let logits = outputs
            .get("logits")
            .ok_or_else(|| anyhow!("decoder output logits missing"))?;
        let (shape, data) = logits
            .try_extract_tensor::<f32>()
            .context("Failed to extract f32 tensor from output")?;
        if shape.len() != 3 {
            bail!("Expected 3D output tensor, got shape: {:?}", shape);
        }
        let out_steps = shape[1] as usize;
        let vocab = shape[2] as usize;

        // Only the last position of every row is needed
        let mut last = Array2::<f32>::zeros((batch, vocab));
        for row in 0..batch {
            let offset = (row * out_steps + out_steps - 1) * vocab;
            let slice = data
                .get(offset..offset + vocab)
                .ok_or_else(|| anyhow!("decoder logits shorter than expected"))?;
            last.row_mut(row).assign(&ArrayView1::from(slice));
        }
        Ok(last)
    }
}

impl std::fmt::Debug for OnnxSeq2SeqModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSeq2SeqModel")
            .field("name", &self.name)
            .field("special", &self.special)
            .finish()
    }
}
