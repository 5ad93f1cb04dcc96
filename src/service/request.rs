// Request validation
//
// Runs before anything expensive: a request that fails here never reaches
// the model catalog.

use crate::config::StyleDefaults;
use crate::errors::ValidationError;
use crate::prompts::{Style, Task};

/// A validated rewrite request. The task is carried by the style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRequest {
    pub text: String,
    pub style: Style,
}

impl RewriteRequest {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn task(&self) -> Task {
        self.style.task()
    }

    /// Validate raw inputs for `task`.
    ///
    /// Whitespace-only text counts as missing. A missing style takes the
    /// deployment default; a given style is trimmed and lower-cased and must
    /// belong to the task's set.
    pub fn validate(
        task: Task,
        text: Option<&str>,
        style: Option<&str>,
        defaults: &StyleDefaults,
    ) -> Result<Self, ValidationError> {
        let text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ValidationError::MissingText)?;

        let name = style.unwrap_or_else(|| defaults.name_for(task));
        let style = Style::parse(task, name).ok_or_else(|| ValidationError::InvalidStyle {
            allowed: task.allowed_styles(),
        })?;

        Ok(Self::new(text, style))
    }
}
