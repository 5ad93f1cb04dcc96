// Instruction templates
//
// Every composed prompt ends with an output label ("Corrected:",
// "Paraphrase:", "Rewritten:" or the Arabic label) which the normalizer
// later strips if the model echoes it.

use super::styles::{EvasionStyle, GrammarStyle, ParaphraseStyle, Style, Task};
use crate::language::Language;

const CORRECTED_LABEL: &str = "Corrected:";
const ARABIC_CORRECTED_LABEL: &str = "النص المصحح:";
const PARAPHRASE_LABEL: &str = "Paraphrase:";
const REWRITTEN_LABEL: &str = "Rewritten:";

const GRAMMAR_LABELS: &[&str] = &[CORRECTED_LABEL, ARABIC_CORRECTED_LABEL];
const PARAPHRASE_LABELS: &[&str] = &[PARAPHRASE_LABEL, "Paraphrase -", "Paraphrase —"];
const EVASION_LABELS: &[&str] = &["Rewrite:", PARAPHRASE_LABEL, REWRITTEN_LABEL];

/// Labels a model may echo at the start of its output for `task`
pub fn output_labels(task: Task) -> &'static [&'static str] {
    match task {
        Task::GrammarCorrection => GRAMMAR_LABELS,
        Task::Paraphrase => PARAPHRASE_LABELS,
        Task::DetectorEvasion => EVASION_LABELS,
    }
}

/// Builds task/style specific prompts
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptComposer;

impl PromptComposer {
    pub fn new() -> Self {
        Self
    }

    /// Compose the full prompt for `text`
    ///
    /// Grammar correction switches instruction and label to Arabic for
    /// Arabic input; paraphrase and detector evasion use one instruction set.
    pub fn build(&self, style: Style, language: Language, text: &str) -> String {
        match style {
            Style::Grammar(style) if language.is_arabic() => arabic_grammar(style, text),
            Style::Grammar(style) => english_grammar(style, text),
            Style::Paraphrase(style) => paraphrase(style, text),
            Style::Evasion(style) => evasion(style, text),
        }
    }
}

fn english_grammar(style: GrammarStyle, text: &str) -> String {
    let instruction = match style {
        GrammarStyle::Standard => {
            "Correct grammar, spelling, and punctuation. Keep the same meaning."
        }
        GrammarStyle::Academic => {
            "Correct grammar and rewrite in a formal, academic tone. Keep meaning."
        }
        GrammarStyle::Technical => {
            "Correct grammar and rewrite in a precise, technical style. Keep meaning."
        }
    };
    format!("{}\nOriginal: {}\n{}", instruction, text, CORRECTED_LABEL)
}

fn arabic_grammar(style: GrammarStyle, text: &str) -> String {
    let instruction = match style {
        GrammarStyle::Standard => {
            "صحح الأخطاء النحوية والإملائية وعلامات الترقيم في الجملة التالية \
             مع الحفاظ على نفس المعنى. اكتب الجملة المصححة فقط دون أي شروح أو رموز خاصة:"
        }
        GrammarStyle::Academic => {
            "صحح الأخطاء وأعد صياغة الجملة بأسلوب أكاديمي رسمي وواضح، \
             ثم اكتب الجملة المصححة فقط دون أي شروح أو رموز خاصة:"
        }
        GrammarStyle::Technical => {
            "صحح الأخطاء وأعد صياغة الجملة بأسلوب تقني دقيق مع مصطلحات مناسبة، \
             ثم اكتب الجملة المصححة فقط دون أي شروح أو رموز خاصة:"
        }
    };
    format!("{}\n{}\n{}", instruction, text, ARABIC_CORRECTED_LABEL)
}

/// One-shot example that biases a paraphrase style away from verbatim copying
struct Shot {
    instruction: &'static str,
    original: &'static str,
    paraphrase: &'static str,
}

const ANTI_COPY: &str =
    "using different wording. Do NOT repeat 3-word phrases from the original. Keep the meaning the same.";

fn paraphrase(style: ParaphraseStyle, text: &str) -> String {
    let shot = match style {
        ParaphraseStyle::Shortened => {
            return format!(
                "Paraphrase concisely without losing meaning: {}\n{}",
                text, PARAPHRASE_LABEL
            )
        }
        ParaphraseStyle::Expanded => {
            return format!(
                "Paraphrase with a bit more detail and clarity: {}\n{}",
                text, PARAPHRASE_LABEL
            )
        }
        ParaphraseStyle::Academic => Shot {
            instruction: "Rewrite the sentence in a formal, academic tone",
            original: "The study shows people sleep less during the summer.",
            paraphrase: "The findings indicate that individuals tend to obtain less sleep in the summer months.",
        },
        ParaphraseStyle::Casual => Shot {
            instruction: "Rewrite the sentence in a relaxed, conversational tone",
            original: "The device malfunctioned during the demonstration.",
            paraphrase: "The gadget messed up while we were showing it off.",
        },
        ParaphraseStyle::Professional => Shot {
            instruction: "Rewrite the sentence in a clear, concise, professional tone",
            original: "We will try to resolve the issue as soon as possible.",
            paraphrase: "We will address the issue promptly.",
        },
    };

    format!(
        "{} {}\nOriginal: {}\n{} {}\nOriginal: {}\n{}",
        shot.instruction,
        ANTI_COPY,
        shot.original,
        PARAPHRASE_LABEL,
        shot.paraphrase,
        text,
        PARAPHRASE_LABEL
    )
}

fn evasion(style: EvasionStyle, text: &str) -> String {
    let instruction = match style {
        EvasionStyle::Standard => {
            "Rewrite the following text so it completely avoids detection by AI detectors, \
             while keeping the meaning exactly the same. Use different structure, synonyms, and phrasing."
        }
        EvasionStyle::Advanced => {
            "Rewrite the following text in a way that bypasses AI detection and appears entirely human-written. \
             Change sentence structure, reorder ideas, and replace words with synonyms while keeping meaning identical."
        }
        EvasionStyle::Creative => {
            "Transform the following text so it bypasses AI detection while keeping the meaning the same. \
             Add subtle creative variations, figurative language, and unique expressions."
        }
    };
    format!("{}\nText: {}\n{}", instruction, text, REWRITTEN_LABEL)
}
