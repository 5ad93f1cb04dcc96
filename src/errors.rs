// Error taxonomy and user-friendly error messages
//
// RewriteError is the only error type that crosses the orchestration
// boundary. Lower layers use anyhow and are folded into one of its kinds.
//
// Localization Support:
// The generic failure message returned to clients is localized by the
// configured locale. Currently supported: Arabic (default) and English.

use std::fmt;
use thiserror::Error;

use crate::language::Language;
use crate::prompts::Task;

/// Request rejected before any model is touched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("text is required")]
    MissingText,

    #[error("Invalid style. Allowed: {}", format_allowed(.allowed))]
    InvalidStyle { allowed: Vec<&'static str> },
}

/// Render a sorted style list the way clients have always received it:
/// `['academic', 'standard', 'technical']`
fn format_allowed(allowed: &[&'static str]) -> String {
    let quoted: Vec<String> = allowed.iter().map(|s| format!("'{}'", s)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Failure kinds of a rewrite request
#[derive(Debug, Error)]
pub enum RewriteError {
    /// Missing text or disallowed style
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No candidate model could be resolved or loaded
    #[error("no model resolvable for {language}/{task}: {reason}")]
    ModelResolution {
        language: Language,
        task: Task,
        reason: String,
    },

    /// Tokenization, inference or decoding failed
    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),

    /// Releasing model resources failed
    #[error("cleanup failed: {0:#}")]
    Cleanup(anyhow::Error),
}

/// Error kind without payload, for logging and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    ModelResolution,
    Generation,
    Cleanup,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::ModelResolution => "model_resolution",
            ErrorKind::Generation => "generation",
            ErrorKind::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RewriteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RewriteError::Validation(_) => ErrorKind::Validation,
            RewriteError::ModelResolution { .. } => ErrorKind::ModelResolution,
            RewriteError::Generation(_) => ErrorKind::Generation,
            RewriteError::Cleanup(_) => ErrorKind::Cleanup,
        }
    }

    /// Whether the failure is the caller's fault (reported verbatim, 400)
    pub fn is_client_error(&self) -> bool {
        matches!(self, RewriteError::Validation(_))
    }

    /// The reason is folded onto one line so it logs as a single event
    pub fn resolution(language: Language, task: Task, reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        RewriteError::ModelResolution {
            language,
            task,
            reason: reason.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Localized text helper
fn t(locale: &str, key: &str) -> &'static str {
    match (locale, key) {
        // Arabic (default)
        ("ar", "processing_failed") => "خطأ في معالجة النص",

        // English
        ("en", "processing_failed") => "Error processing text",

        // Default fallback
        (_, _) => "خطأ في معالجة النص",
    }
}

/// Generic client-facing message for every non-validation failure
pub fn generic_error_message(locale: &str) -> &'static str {
    let locale = locale.trim().to_lowercase();
    let locale = if locale.starts_with("en") { "en" } else { "ar" };
    t(locale, "processing_failed")
}

/// Format a model resolution error with helpful suggestions
pub fn model_not_found_error(model_name: &str, root: &str) -> String {
    format!(
        "Model '{}' could not be loaded\n\n\
        \x1b[1;33mPossible causes:\x1b[0m\n\
        • Model has not been exported to ONNX yet\n\
        • Wrong catalog root\n\
        • Missing tokenizer.json or config.json\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Check the catalog directory:\n\
           \x1b[36mls {}/{}\x1b[0m\n\n\
        2. Expected files:\n\
           encoder_model.onnx, decoder_model.onnx, tokenizer.json, config.json\n\n\
        3. Verify the catalog root in config:\n\
           \x1b[36mcat ~/.qalam/config.toml\x1b[0m",
        model_name, root, model_name
    )
}

/// Format a config parse error with helpful suggestions
pub fn config_parse_error(error: &str) -> String {
    format!(
        "Failed to parse config file\n\n\
        \x1b[1;33mError:\x1b[0m {}\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Check config file syntax:\n\
           \x1b[36mcat ~/.qalam/config.toml\x1b[0m\n\n\
        2. Point QALAM_CONFIG at another file, or remove it to use defaults\n\n\
        3. Common mistakes:\n\
           • Missing quotes around strings\n\
           • Unknown precision or device names",
        error
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_text_message() {
        let err = RewriteError::from(ValidationError::MissingText);
        assert_eq!(err.to_string(), "text is required");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_invalid_style_lists_sorted_set() {
        let err = ValidationError::InvalidStyle {
            allowed: Task::DetectorEvasion.allowed_styles(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid style. Allowed: ['advanced', 'creative', 'standard']"
        );
    }

    #[test]
    fn test_internal_errors_are_not_client_errors() {
        let err = RewriteError::resolution(Language::English, Task::Paraphrase, "nothing on disk");
        assert!(!err.is_client_error());
        assert_eq!(err.kind(), ErrorKind::ModelResolution);
        assert!(err.to_string().contains("english/paraphrase"));

        let err = RewriteError::Generation(anyhow::anyhow!("ort exploded"));
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.to_string().contains("ort exploded"));
    }

    #[test]
    fn test_resolution_reason_is_one_line() {
        let err = RewriteError::resolution(
            Language::English,
            Task::Paraphrase,
            "load failed:\n  bad graph\n",
        );
        assert_eq!(
            err.to_string(),
            "no model resolvable for english/paraphrase: load failed: bad graph"
        );
    }

    #[test]
    fn test_generic_message_locales() {
        assert_eq!(generic_error_message("ar"), "خطأ في معالجة النص");
        assert_eq!(generic_error_message("en_US"), "Error processing text");
        assert_eq!(generic_error_message("fr"), "خطأ في معالجة النص");
    }

    #[test]
    fn test_model_not_found_has_suggestions() {
        let msg = model_not_found_error("flan_t5_small", "/srv/models");
        assert!(msg.contains("ls /srv/models/flan_t5_small"));
        assert!(msg.contains("encoder_model.onnx"));
    }
}
