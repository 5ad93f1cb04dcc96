// Model catalog
//
// Resolves (language, task) to one exported encoder-decoder model through an
// ordered candidate chain and hands it out as a request-scoped lease.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::lease::{MemoryReclaimer, ModelLease, SystemMemoryReclaimer};
use super::loaders::OnnxSeq2SeqLoader;
use crate::config::{BackendDevice, CatalogConfig, Precision};
use crate::errors::RewriteError;
use crate::language::Language;
use crate::prompts::Task;

/// Source of request-scoped models
pub trait ModelSource: Send + Sync {
    fn acquire(&self, language: Language, task: Task) -> Result<ModelLease, RewriteError>;
}

/// Where a resolved model's artifacts live and how to run it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    pub dir: PathBuf,
    pub encoder_path: PathBuf,
    pub decoder_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub config_path: PathBuf,
    pub precision: Precision,
    pub device: BackendDevice,
    /// Chosen as the chain's unconditional fallback, not because it was found
    pub fallback: bool,
}

impl ModelDescriptor {
    /// Describe the model in `dir`. Graphs under `onnx/` win over graphs at
    /// the root; if neither exists the root paths are used.
    pub fn at(
        name: impl Into<String>,
        dir: PathBuf,
        precision: Precision,
        device: BackendDevice,
        fallback: bool,
    ) -> Self {
        let (encoder_path, decoder_path) = locate_graphs(&dir, precision)
            .unwrap_or_else(|| (dir.join(precision.encoder_file()), dir.join(precision.decoder_file())));
        Self {
            name: name.into(),
            tokenizer_path: dir.join("tokenizer.json"),
            config_path: dir.join("config.json"),
            encoder_path,
            decoder_path,
            dir,
            precision,
            device,
            fallback,
        }
    }

    /// Encoder and decoder graphs are both present
    pub fn artifacts_exist(&self) -> bool {
        self.encoder_path.exists() && self.decoder_path.exists()
    }
}

fn locate_graphs(dir: &Path, precision: Precision) -> Option<(PathBuf, PathBuf)> {
    [dir.join("onnx"), dir.to_path_buf()].into_iter().find_map(|base| {
        let encoder = base.join(precision.encoder_file());
        let decoder = base.join(precision.decoder_file());
        (encoder.exists() && decoder.exists()).then_some((encoder, decoder))
    })
}

/// Resolves candidate chains from configuration and loads models on demand
pub struct ModelCatalog {
    config: CatalogConfig,
    loader: OnnxSeq2SeqLoader,
    reclaimer: Arc<dyn MemoryReclaimer>,
}

impl ModelCatalog {
    pub fn new(config: CatalogConfig) -> Self {
        let loader = OnnxSeq2SeqLoader::new(config.intra_threads);
        Self {
            config,
            loader,
            reclaimer: Arc::new(SystemMemoryReclaimer),
        }
    }

    pub fn with_reclaimer(mut self, reclaimer: Arc<dyn MemoryReclaimer>) -> Self {
        self.reclaimer = reclaimer;
        self
    }

    pub fn candidates(&self, language: Language, task: Task) -> &[String] {
        self.config.chains.candidates(language, task)
    }

    fn candidate_dir(&self, candidate: &str) -> PathBuf {
        let path = Path::new(candidate);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.root.join(path)
        }
    }

    fn describe(&self, candidate: &str, fallback: bool) -> ModelDescriptor {
        let dir = self.candidate_dir(candidate);
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| candidate.to_string());
        ModelDescriptor::at(
            name,
            dir,
            self.config.precision,
            self.config.effective_device(),
            fallback,
        )
    }

    /// Pick the first candidate whose graphs exist, else the chain's last
    /// entry as the unconditional fallback
    pub fn resolve(&self, language: Language, task: Task) -> Result<ModelDescriptor, RewriteError> {
        let chain = self.candidates(language, task);
        let Some((last, preferred)) = chain.split_last() else {
            return Err(RewriteError::resolution(language, task, "candidate chain is empty"));
        };

        for candidate in preferred {
            let descriptor = self.describe(candidate, false);
            if descriptor.artifacts_exist() {
                info!(%language, %task, model = %descriptor.name, "Resolved model");
                return Ok(descriptor);
            }
            debug!(%language, %task, candidate = %candidate, "Candidate not present, trying next");
        }

        let exists = self.describe(last, false);
        if exists.artifacts_exist() {
            info!(%language, %task, model = %exists.name, "Resolved model");
            return Ok(exists);
        }

        let descriptor = self.describe(last, true);
        warn!(
            %language,
            %task,
            model = %descriptor.name,
            dir = %descriptor.dir.display(),
            "No candidate found on disk, using fallback"
        );
        Ok(descriptor)
    }
}

impl ModelSource for ModelCatalog {
    fn acquire(&self, language: Language, task: Task) -> Result<ModelLease, RewriteError> {
        let descriptor = self.resolve(language, task)?;
        let (codec, model) = self
            .loader
            .load(&descriptor)
            .map_err(|e| RewriteError::resolution(language, task, format!("{:#}", e)))?;
        Ok(ModelLease::new(descriptor, codec, model, self.reclaimer.clone()))
    }
}
