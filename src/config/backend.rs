// Backend Configuration - Device selection and model catalog

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::language::Language;
use crate::prompts::Task;

/// Backend device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendDevice {
    /// NVIDIA CUDA GPU (Windows/Linux, fast)
    #[cfg(feature = "cuda")]
    Cuda,

    /// CPU fallback (slow, works everywhere)
    Cpu,

    /// Auto-detect best available device
    Auto,
}

impl BackendDevice {
    /// Get short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "cuda")]
            BackendDevice::Cuda => "CUDA (GPU)",
            BackendDevice::Cpu => "CPU",
            BackendDevice::Auto => "Auto",
        }
    }

    /// Whether this device holds model memory outside the process heap
    pub fn is_accelerator(&self) -> bool {
        match self {
            #[cfg(feature = "cuda")]
            BackendDevice::Cuda => true,
            BackendDevice::Cpu => false,
            BackendDevice::Auto => BackendDevice::auto_select().is_accelerator(),
        }
    }

    /// Select best available device automatically
    pub fn auto_select() -> BackendDevice {
        #[cfg(feature = "cuda")]
        {
            return BackendDevice::Cuda;
        }

        #[cfg(not(feature = "cuda"))]
        BackendDevice::Cpu
    }

    /// Resolve Auto to a concrete device
    pub fn effective(&self) -> BackendDevice {
        match self {
            BackendDevice::Auto => BackendDevice::auto_select(),
            device => *device,
        }
    }
}

/// Numeric precision of the exported ONNX graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Fp32,
    Fp16,
    Quantized,
}

impl Precision {
    /// File-name suffix used by optimum exports (`encoder_model_fp16.onnx`)
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Precision::Fp32 => "",
            Precision::Fp16 => "_fp16",
            Precision::Quantized => "_quantized",
        }
    }

    pub fn encoder_file(&self) -> String {
        format!("encoder_model{}.onnx", self.file_suffix())
    }

    pub fn decoder_file(&self) -> String {
        format!("decoder_model{}.onnx", self.file_suffix())
    }
}

/// Ordered candidate model names for each task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChains {
    pub grammar: Vec<String>,
    pub paraphrase: Vec<String>,
    pub evasion: Vec<String>,
}

impl TaskChains {
    pub fn for_task(&self, task: Task) -> &[String] {
        match task {
            Task::GrammarCorrection => &self.grammar,
            Task::Paraphrase => &self.paraphrase,
            Task::DetectorEvasion => &self.evasion,
        }
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Candidate chains keyed by language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelChains {
    pub english: TaskChains,
    pub arabic: TaskChains,
}

impl Default for ModelChains {
    fn default() -> Self {
        Self {
            english: TaskChains {
                grammar: names(&["bart_base", "flan_t5_base", "flan_t5_small"]),
                paraphrase: names(&["flan_t5_base", "flan_t5_small"]),
                evasion: names(&["flan_t5_base", "flan_t5_small"]),
            },
            arabic: TaskChains {
                grammar: names(&["mt5_base"]),
                paraphrase: names(&["mt5_base"]),
                evasion: names(&["mt5_base"]),
            },
        }
    }
}

impl ModelChains {
    pub fn candidates(&self, language: Language, task: Task) -> &[String] {
        match language {
            Language::English => self.english.for_task(task),
            Language::Arabic => self.arabic.for_task(task),
        }
    }
}

/// Model catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory holding one sub-directory per exported model
    pub root: PathBuf,

    /// Which graph variant to load
    pub precision: Precision,

    /// Selected device for inference
    pub device: BackendDevice,

    /// Threads used inside a single ONNX operator
    pub intra_threads: usize,

    /// Candidate order per language and task
    pub chains: ModelChains,
}

fn default_catalog_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".qalam/models"))
        .unwrap_or_else(|| PathBuf::from("models"))
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: default_catalog_root(),
            precision: Precision::Fp32,
            device: BackendDevice::Cpu,
            intra_threads: 4,
            chains: ModelChains::default(),
        }
    }
}

impl CatalogConfig {
    /// Create catalog config rooted at a directory, everything else default
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Get the effective device (resolve Auto to concrete device)
    pub fn effective_device(&self) -> BackendDevice {
        self.device.effective()
    }
}
