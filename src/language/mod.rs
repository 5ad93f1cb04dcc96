// Language detection module
// Classifies input text so the catalog and prompt composer can pick a path

mod detector;

pub use detector::{detect_language, Language};
