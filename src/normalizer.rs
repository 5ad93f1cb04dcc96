// Output normalizer
// Strips instruction labels the model echoes back at the start of its output

use regex::{Regex, RegexBuilder};

/// Removes leading echoed labels ("Corrected:", "Paraphrase:", ...) from
/// decoded text.
///
/// Matching is case-insensitive. Labels are stripped repeatedly until none
/// is left at the start, which makes `trim` idempotent.
#[derive(Debug, Clone)]
pub struct ResultNormalizer {
    leading_label: Option<Regex>,
}

impl ResultNormalizer {
    /// Build a normalizer for the given label candidates (empty labels are ignored)
    pub fn new(labels: &[&str]) -> Self {
        let mut alternatives: Vec<String> = labels
            .iter()
            .map(|label| label.trim())
            .filter(|label| !label.is_empty())
            .map(regex::escape)
            .collect();
        // Longest first so "Paraphrase -" wins over a shorter shared prefix
        alternatives.sort_by(|a, b| b.len().cmp(&a.len()));

        let leading_label = if alternatives.is_empty() {
            None
        } else {
            let pattern = format!("^(?:{})", alternatives.join("|"));
            match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    // Escaped literals always compile; keep going without stripping if not
                    tracing::warn!(error = %e, "Failed to build label pattern");
                    None
                }
            }
        };

        Self { leading_label }
    }

    /// Strip any leading labels and surrounding whitespace
    pub fn trim(&self, raw: &str) -> String {
        let mut text = raw.trim();
        if let Some(regex) = &self.leading_label {
            while let Some(found) = regex.find(text) {
                text = text[found.end()..].trim();
            }
        }
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{output_labels, Task};

    #[test]
    fn test_strips_echoed_label() {
        let normalizer = ResultNormalizer::new(output_labels(Task::GrammarCorrection));
        assert_eq!(normalizer.trim("Corrected: He went to school."), "He went to school.");
        assert_eq!(normalizer.trim("  corrected:He went."), "He went.");
        assert_eq!(normalizer.trim("النص المصحح: ذهب الولد"), "ذهب الولد");
    }

    #[test]
    fn test_label_only_stripped_at_start() {
        let normalizer = ResultNormalizer::new(output_labels(Task::Paraphrase));
        assert_eq!(
            normalizer.trim("He said Paraphrase: twice"),
            "He said Paraphrase: twice"
        );
    }

    #[test]
    fn test_evasion_labels() {
        let normalizer = ResultNormalizer::new(output_labels(Task::DetectorEvasion));
        assert_eq!(normalizer.trim("REWRITTEN: the text"), "the text");
        assert_eq!(normalizer.trim("Rewrite: the text"), "the text");
        assert_eq!(normalizer.trim("Paraphrase: the text"), "the text");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Paraphrase: Paraphrase: stacked labels",
            "  Paraphrase - dashed ",
            "",
            "   ",
            "Paraphrase:",
            "no label here",
            "paraphrase —   em dash label",
        ];
        for task in Task::ALL {
            let normalizer = ResultNormalizer::new(output_labels(task));
            for sample in samples {
                let once = normalizer.trim(sample);
                assert_eq!(normalizer.trim(&once), once, "not idempotent for {:?}", sample);
            }
        }
    }

    #[test]
    fn test_empty_label_set_only_trims_whitespace() {
        let normalizer = ResultNormalizer::new(&["", "  "]);
        assert_eq!(normalizer.trim("  Corrected: x  "), "Corrected: x");
    }
}
