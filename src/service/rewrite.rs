// Rewrite orchestration
//
// validate → detect language → acquire model → compose prompt → generate
// → (similarity gate → one stronger pass) → normalize → release
//
// The lease is released on every path. A release failure is logged and
// never replaces the result (or the primary error) of the request.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::request::RewriteRequest;
use super::stage::{RewriteStage, StageTrail};
use crate::config::{Config, StyleDefaults};
use crate::errors::RewriteError;
use crate::generation::{GenerationController, PolicyStrength, PolicyTable, TextGenerator};
use crate::language::{detect_language, Language};
use crate::metrics::SimilarityGate;
use crate::models::{ModelCatalog, ModelLease, ModelSource};
use crate::normalizer::ResultNormalizer;
use crate::prompts::{output_labels, PromptComposer, Task};

/// Result of one successful rewrite
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    /// Decoded model output before label stripping
    pub raw_text: String,
    /// Text returned to the client
    pub normalized_text: String,
    /// Lexical similarity between the source and `normalized_text`
    pub similarity_to_source: f64,
    /// Whether the strong policy was used
    pub escalated: bool,
    pub language: Language,
    pub model_name: String,
    /// Number of generation passes (1 or 2)
    pub generation_passes: usize,
}

/// One normalizer per task, built once
#[derive(Debug, Clone)]
struct Normalizers {
    grammar: ResultNormalizer,
    paraphrase: ResultNormalizer,
    evasion: ResultNormalizer,
}

impl Normalizers {
    fn new() -> Self {
        Self {
            grammar: ResultNormalizer::new(output_labels(Task::GrammarCorrection)),
            paraphrase: ResultNormalizer::new(output_labels(Task::Paraphrase)),
            evasion: ResultNormalizer::new(output_labels(Task::DetectorEvasion)),
        }
    }

    fn for_task(&self, task: Task) -> &ResultNormalizer {
        match task {
            Task::GrammarCorrection => &self.grammar,
            Task::Paraphrase => &self.paraphrase,
            Task::DetectorEvasion => &self.evasion,
        }
    }
}

/// Orchestrates a rewrite request from raw inputs to a normalized result
pub struct RewriteService {
    source: Arc<dyn ModelSource>,
    generator: Arc<dyn TextGenerator>,
    composer: PromptComposer,
    gate: SimilarityGate,
    policies: PolicyTable,
    style_defaults: StyleDefaults,
    normalizers: Normalizers,
}

impl RewriteService {
    pub fn new(
        source: Arc<dyn ModelSource>,
        generator: Arc<dyn TextGenerator>,
        policies: PolicyTable,
        gate: SimilarityGate,
    ) -> Self {
        Self {
            source,
            generator,
            composer: PromptComposer::new(),
            gate,
            policies,
            style_defaults: StyleDefaults::default(),
            normalizers: Normalizers::new(),
        }
    }

    pub fn with_style_defaults(mut self, defaults: StyleDefaults) -> Self {
        self.style_defaults = defaults;
        self
    }

    /// Build the production service: model catalog + ONNX generation controller
    pub fn from_config(config: &Config) -> Result<Self> {
        config.styles.validate()?;
        let policies = PolicyTable::with_overrides(&config.generation.policies)?;

        let catalog = ModelCatalog::new(config.catalog.clone());
        let controller = GenerationController::new(
            config.generation.max_input_tokens,
            config.generation.seed,
        );

        info!(
            root = %config.catalog.root.display(),
            device = config.catalog.effective_device().name(),
            precision = ?config.catalog.precision,
            "Rewrite service ready"
        );

        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(controller),
            policies,
            SimilarityGate::new(config.generation.similarity_threshold),
        )
        .with_style_defaults(config.styles.clone()))
    }

    /// Validate raw inputs for `task`
    pub fn validate(
        &self,
        task: Task,
        text: Option<&str>,
        style: Option<&str>,
    ) -> Result<RewriteRequest, RewriteError> {
        Ok(RewriteRequest::validate(task, text, style, &self.style_defaults)?)
    }

    /// Validate and run one request
    pub fn handle(
        &self,
        task: Task,
        text: Option<&str>,
        style: Option<&str>,
    ) -> Result<GenerationOutcome, RewriteError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("rewrite", %request_id, operation = task.operation());
        let _guard = span.enter();

        let request = match self.validate(task, text, style) {
            Ok(request) => request,
            Err(e) => {
                info!(error = %e, "Rejected request");
                return Err(e);
            }
        };
        self.execute(&request)
    }

    /// Run an already validated request
    pub fn rewrite(&self, request: &RewriteRequest) -> Result<GenerationOutcome, RewriteError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("rewrite", %request_id, operation = request.task().operation());
        let _guard = span.enter();
        self.execute(request)
    }

    fn execute(&self, request: &RewriteRequest) -> Result<GenerationOutcome, RewriteError> {
        let mut trail = StageTrail::new();
        let task = request.task();

        let language = detect_language(&request.text);
        trail.advance(RewriteStage::LanguageResolved);
        debug!(%language, style = request.style.as_str(), chars = request.text.chars().count(), "Resolved language");

        let mut lease = match self.source.acquire(language, task) {
            Ok(lease) => lease,
            Err(e) => {
                error!(kind = %e.kind(), error = %e, "Model acquisition failed");
                trail.advance(RewriteStage::Failed);
                trail.advance(RewriteStage::Released);
                return Err(e);
            }
        };
        trail.advance(RewriteStage::ModelAcquired);

        let result = self.generate_with_lease(&mut lease, request, language, &mut trail);
        if result.is_err() {
            trail.advance(RewriteStage::Failed);
        }

        if let Err(cleanup) = lease.release() {
            error!(error = %cleanup, "Model release failed");
        }
        trail.advance(RewriteStage::Released);

        match result {
            Ok(outcome) => {
                trail.advance(RewriteStage::Responded);
                info!(
                    model = %outcome.model_name,
                    passes = outcome.generation_passes,
                    escalated = outcome.escalated,
                    similarity = outcome.similarity_to_source,
                    "Rewrite complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(kind = %e.kind(), error = %e, "Rewrite failed");
                Err(e)
            }
        }
    }

    fn generate_with_lease(
        &self,
        lease: &mut ModelLease,
        request: &RewriteRequest,
        language: Language,
        trail: &mut StageTrail,
    ) -> Result<GenerationOutcome, RewriteError> {
        let task = request.task();
        let model_name = lease.descriptor().name.clone();

        let prompt = self.composer.build(request.style, language, &request.text);
        trail.advance(RewriteStage::Prompted);

        let normal = self.policies.policy(task, language, PolicyStrength::Normal);
        let mut raw_text = self.generator.generate(lease, &prompt, normal)?;
        let mut generation_passes = 1;
        trail.advance(RewriteStage::Generated);

        let mut escalated = false;
        let too_similar = task.requires_divergence() && self.gate.too_similar(&request.text, &raw_text);
        trail.advance(RewriteStage::GateChecked);

        if too_similar {
            warn!(
                similarity = self.gate.similarity(&request.text, &raw_text),
                threshold = self.gate.threshold(),
                "Candidate too close to source, regenerating with strong policy"
            );
            let strong = self.policies.policy(task, language, PolicyStrength::Strong);
            raw_text = self.generator.generate(lease, &prompt, strong)?;
            generation_passes += 1;
            escalated = true;
            trail.advance(RewriteStage::Regenerated);
        }

        let normalized_text = self.normalizers.for_task(task).trim(&raw_text);
        trail.advance(RewriteStage::Normalized);

        let similarity_to_source = self.gate.similarity(&request.text, &normalized_text);

        Ok(GenerationOutcome {
            raw_text,
            normalized_text,
            similarity_to_source,
            escalated,
            language,
            model_name,
            generation_passes,
        })
    }
}
