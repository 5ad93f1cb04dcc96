// Prompt module
// Tasks, their closed style sets, and the instruction templates for each

mod styles;
mod templates;

pub use styles::{EvasionStyle, GrammarStyle, ParaphraseStyle, Style, Task};
pub use templates::{output_labels, PromptComposer};
