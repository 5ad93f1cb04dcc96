// Task and style enumerations
//
// Each task owns a closed set of styles. Adding or removing a style is a
// type-checked change: the composer matches every variant exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three rewriting transformations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    GrammarCorrection,
    Paraphrase,
    DetectorEvasion,
}

impl Task {
    pub const ALL: [Task; 3] = [Task::GrammarCorrection, Task::Paraphrase, Task::DetectorEvasion];

    /// Operation name as exposed on the HTTP surface
    pub fn operation(&self) -> &'static str {
        match self {
            Task::GrammarCorrection => "grammar_check",
            Task::Paraphrase => "paraphrase",
            Task::DetectorEvasion => "aiBypass",
        }
    }

    /// Key under which the task's output is returned
    pub fn response_field(&self) -> &'static str {
        match self {
            Task::GrammarCorrection => "corrected_text",
            Task::Paraphrase => "paraphrased_text",
            Task::DetectorEvasion => "aiBypass_text",
        }
    }

    /// Style names accepted for this task, sorted
    pub fn allowed_styles(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = match self {
            Task::GrammarCorrection => GrammarStyle::ALL.iter().map(|s| s.as_str()).collect(),
            Task::Paraphrase => ParaphraseStyle::ALL.iter().map(|s| s.as_str()).collect(),
            Task::DetectorEvasion => EvasionStyle::ALL.iter().map(|s| s.as_str()).collect(),
        };
        names.sort_unstable();
        names
    }

    /// Whether the output must be kept away from the source wording
    pub fn requires_divergence(&self) -> bool {
        !matches!(self, Task::GrammarCorrection)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation())
    }
}

impl std::str::FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grammar" | "grammar_check" | "grammar-correction" | "grammar_correction" => {
                Ok(Task::GrammarCorrection)
            }
            "paraphrase" => Ok(Task::Paraphrase),
            "ai-bypass" | "aibypass" | "ai_bypass" | "evasion" | "detector-evasion" => {
                Ok(Task::DetectorEvasion)
            }
            other => Err(format!("unknown task '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarStyle {
    Standard,
    Academic,
    Technical,
}

impl GrammarStyle {
    pub const ALL: [GrammarStyle; 3] = [Self::Standard, Self::Academic, Self::Technical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Academic => "academic",
            Self::Technical => "technical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParaphraseStyle {
    Shortened,
    Expanded,
    Academic,
    Casual,
    Professional,
}

impl ParaphraseStyle {
    pub const ALL: [ParaphraseStyle; 5] = [
        Self::Shortened,
        Self::Expanded,
        Self::Academic,
        Self::Casual,
        Self::Professional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shortened => "shortened",
            Self::Expanded => "expanded",
            Self::Academic => "academic",
            Self::Casual => "casual",
            Self::Professional => "professional",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvasionStyle {
    Standard,
    Advanced,
    Creative,
}

impl EvasionStyle {
    pub const ALL: [EvasionStyle; 3] = [Self::Standard, Self::Advanced, Self::Creative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Advanced => "advanced",
            Self::Creative => "creative",
        }
    }
}

/// A style bound to its task. The task is implied by the variant, so a
/// style can never be paired with a task that does not own it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Grammar(GrammarStyle),
    Paraphrase(ParaphraseStyle),
    Evasion(EvasionStyle),
}

impl Style {
    /// Parse a (trimmed, lower-cased) style name within `task`'s set
    pub fn parse(task: Task, name: &str) -> Option<Style> {
        let name = name.trim().to_lowercase();
        match task {
            Task::GrammarCorrection => GrammarStyle::ALL
                .into_iter()
                .find(|s| s.as_str() == name)
                .map(Style::Grammar),
            Task::Paraphrase => ParaphraseStyle::ALL
                .into_iter()
                .find(|s| s.as_str() == name)
                .map(Style::Paraphrase),
            Task::DetectorEvasion => EvasionStyle::ALL
                .into_iter()
                .find(|s| s.as_str() == name)
                .map(Style::Evasion),
        }
    }

    pub fn task(&self) -> Task {
        match self {
            Style::Grammar(_) => Task::GrammarCorrection,
            Style::Paraphrase(_) => Task::Paraphrase,
            Style::Evasion(_) => Task::DetectorEvasion,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Grammar(s) => s.as_str(),
            Style::Paraphrase(s) => s.as_str(),
            Style::Evasion(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.task(), self.as_str())
    }
}
