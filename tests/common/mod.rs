// Shared fakes for integration tests
#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use ndarray::{Array2, Array3};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use qalam::config::{BackendDevice, Precision};
use qalam::errors::RewriteError;
use qalam::generation::{GenerationController, GenerationPolicy, PolicyTable, TextGenerator};
use qalam::language::Language;
use qalam::metrics::SimilarityGate;
use qalam::models::{
    EncoderOutput, MemoryReclaimer, ModelDescriptor, ModelLease, ModelSource, Seq2SeqModel,
    SpecialTokens, TextCodec,
};
use qalam::prompts::Task;
use qalam::service::RewriteService;

pub const PAD: u32 = 0;
pub const EOS: u32 = 1;
pub const UNK: u32 = 2;

/// Whitespace word tokenizer over a fixed vocabulary
pub struct WordCodec {
    vocab: Vec<String>,
}

impl WordCodec {
    pub fn new(words: &[&str]) -> Self {
        let mut vocab: Vec<String> = ["<pad>", "</s>", "<unk>"].iter().map(|s| s.to_string()).collect();
        vocab.extend(words.iter().map(|w| w.to_string()));
        Self { vocab }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn ids(&self, text: &str) -> Vec<u32> {
        text.split_whitespace()
            .map(|w| self.token_to_id(w).unwrap_or(UNK))
            .collect()
    }
}

impl TextCodec for WordCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let mut ids = self.ids(text);
        ids.push(EOS);
        Ok(ids)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let words: Vec<&str> = ids
            .iter()
            .filter(|id| **id > UNK)
            .map(|id| {
                self.vocab
                    .get(*id as usize)
                    .map(String::as_str)
                    .ok_or_else(|| anyhow!("unknown id {}", id))
            })
            .collect::<Result<_>>()?;
        Ok(words.join(" "))
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.iter().position(|w| w == token).map(|i| i as u32)
    }

    fn unk_token_id(&self) -> Option<u32> {
        Some(UNK)
    }
}

/// Decoder that emits a fixed token script regardless of the source
pub struct ScriptedModel {
    script: Vec<u32>,
    vocab_size: usize,
    fail: bool,
}

impl ScriptedModel {
    pub fn new(script: Vec<u32>, vocab_size: usize) -> Self {
        Self {
            script,
            vocab_size,
            fail: false,
        }
    }

    pub fn failing(vocab_size: usize) -> Self {
        Self {
            script: vec![],
            vocab_size,
            fail: true,
        }
    }
}

impl Seq2SeqModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens {
            decoder_start: PAD,
            eos: EOS,
            forced_bos: None,
        }
    }

    fn encode(&mut self, input_ids: &[u32]) -> Result<EncoderOutput> {
        if self.fail {
            bail!("backend fault");
        }
        Ok(EncoderOutput {
            hidden_states: Array3::zeros((1, input_ids.len(), 4)),
            attention_mask: Array2::ones((1, input_ids.len())),
        })
    }

    fn next_token_logits(&mut self, _encoder: &EncoderOutput, prefixes: &[&[u32]]) -> Result<Array2<f32>> {
        let mut logits = Array2::zeros((prefixes.len(), self.vocab_size));
        for (row, prefix) in prefixes.iter().enumerate() {
            // Prefix starts with the decoder start token
            let target = self.script.get(prefix.len() - 1).copied().unwrap_or(EOS);
            logits[[row, target as usize]] = 10.0;
            if target != EOS {
                logits[[row, EOS as usize]] = -5.0;
            }
        }
        Ok(logits)
    }
}

/// Counts releases; optionally fails them
#[derive(Default)]
pub struct CountingReclaimer {
    pub releases: AtomicUsize,
    pub fail: bool,
}

impl CountingReclaimer {
    pub fn count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl MemoryReclaimer for CountingReclaimer {
    fn reclaim(&self, _descriptor: &ModelDescriptor) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("device reset failed");
        }
        Ok(())
    }
}

/// Model source that hands out scripted models and counts acquisitions
pub struct FakeSource {
    words: Vec<&'static str>,
    script: Vec<&'static str>,
    resolvable: bool,
    failing_model: bool,
    pub reclaimer: Arc<CountingReclaimer>,
    pub acquisitions: AtomicUsize,
    pub requested: Mutex<Vec<(Language, Task)>>,
}

impl FakeSource {
    /// Every lease decodes to `output`
    pub fn scripted(output: &'static str) -> Self {
        let words: Vec<&'static str> = output.split_whitespace().collect();
        Self {
            script: words.clone(),
            words,
            resolvable: true,
            failing_model: false,
            reclaimer: Arc::new(CountingReclaimer::default()),
            acquisitions: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Leases whose model is never called (paired with RecordingGenerator)
    pub fn inert() -> Self {
        Self::scripted("")
    }

    pub fn unresolvable() -> Self {
        Self {
            resolvable: false,
            ..Self::inert()
        }
    }

    pub fn with_failing_model(mut self) -> Self {
        self.failing_model = true;
        self
    }

    pub fn with_failing_release(mut self) -> Self {
        self.reclaimer = Arc::new(CountingReclaimer {
            fail: true,
            ..CountingReclaimer::default()
        });
        self
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.reclaimer.count()
    }
}

impl ModelSource for FakeSource {
    fn acquire(&self, language: Language, task: Task) -> Result<ModelLease, RewriteError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requested) = self.requested.lock() {
            requested.push((language, task));
        }
        if !self.resolvable {
            return Err(RewriteError::resolution(language, task, "no candidate artifacts"));
        }

        let codec = WordCodec::new(&self.words);
        let model: Box<dyn Seq2SeqModel> = if self.failing_model {
            Box::new(ScriptedModel::failing(codec.vocab_size()))
        } else {
            let script = codec.ids(&self.script.join(" "));
            Box::new(ScriptedModel::new(script, codec.vocab_size()))
        };
        let descriptor = ModelDescriptor::at(
            "scripted-model",
            PathBuf::from("/nonexistent/scripted-model"),
            Precision::Fp32,
            BackendDevice::Cpu,
            false,
        );
        Ok(ModelLease::new(
            descriptor,
            Box::new(codec),
            model,
            self.reclaimer.clone(),
        ))
    }
}

/// Generator that returns canned outputs in order and records each policy
pub struct RecordingGenerator {
    outputs: Vec<&'static str>,
    fail: bool,
    pub policies: Mutex<Vec<GenerationPolicy>>,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    /// Call `n` returns `outputs[n]` (the last output repeats)
    pub fn new(outputs: &[&'static str]) -> Self {
        Self {
            outputs: outputs.to_vec(),
            fail: false,
            policies: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.policies.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn recorded_policies(&self) -> Vec<GenerationPolicy> {
        self.policies.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl TextGenerator for RecordingGenerator {
    fn generate(
        &self,
        _lease: &mut ModelLease,
        prompt: &str,
        policy: &GenerationPolicy,
    ) -> Result<String, RewriteError> {
        let call = {
            let mut policies = self.policies.lock().map_err(|_| RewriteError::Generation(anyhow!("poisoned")))?;
            policies.push(policy.clone());
            policies.len() - 1
        };
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if self.fail {
            return Err(RewriteError::Generation(anyhow!("backend fault")));
        }
        let output = self
            .outputs
            .get(call)
            .or_else(|| self.outputs.last())
            .copied()
            .unwrap_or_default();
        Ok(output.to_string())
    }
}

/// Service over a fake source and a canned generator
pub fn service_with(source: Arc<FakeSource>, generator: Arc<RecordingGenerator>) -> RewriteService {
    RewriteService::new(source, generator, PolicyTable::default(), SimilarityGate::default())
}

/// Service over a fake source and the real beam-search controller
pub fn decoding_service(source: Arc<FakeSource>) -> RewriteService {
    RewriteService::new(
        source,
        Arc::new(GenerationController::new(256, Some(7))),
        PolicyTable::default(),
        SimilarityGate::default(),
    )
}
