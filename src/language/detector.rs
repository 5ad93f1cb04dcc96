// Arabic script detector

use serde::{Deserialize, Serialize};
use std::fmt;

/// Languages the rewriting engine distinguishes between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Text containing at least one character from the Arabic block
    Arabic,
    /// Everything else (served by the English model chain)
    #[serde(alias = "non_arabic", alias = "nonarabic")]
    English,
}

impl Language {
    /// Short name used in logs and config keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Arabic => "arabic",
            Language::English => "english",
        }
    }

    pub fn is_arabic(&self) -> bool {
        matches!(self, Language::Arabic)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arabic" | "ar" => Ok(Language::Arabic),
            "english" | "en" | "non_arabic" | "non-arabic" => Ok(Language::English),
            other => Err(format!("unknown language '{}'", other)),
        }
    }
}

const ARABIC_BLOCK: std::ops::RangeInclusive<char> = '\u{0600}'..='\u{06FF}';

/// Detect the language of `text`
///
/// Arabic if any code point falls in U+0600..=U+06FF, English otherwise.
/// Total and pure: the empty string is English.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(|c| ARABIC_BLOCK.contains(&c)) {
        Language::Arabic
    } else {
        Language::English
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arabic_text() {
        assert_eq!(detect_language("ذهب الولد إلى المدرسة"), Language::Arabic);
    }

    #[test]
    fn test_mixed_text_is_arabic() {
        assert_eq!(detect_language("The word كتاب means book"), Language::Arabic);
    }

    #[test]
    fn test_block_boundaries() {
        assert_eq!(detect_language("\u{0600}"), Language::Arabic);
        assert_eq!(detect_language("\u{06FF}"), Language::Arabic);
        // Arabic Supplement sits outside the block
        assert_eq!(detect_language("\u{0750}"), Language::English);
        assert_eq!(detect_language("\u{05FF}"), Language::English);
    }

    #[test]
    fn test_ascii_and_empty() {
        assert_eq!(detect_language("He go school yesterday."), Language::English);
        assert_eq!(detect_language(""), Language::English);
    }

    #[test]
    fn test_parse_language() {
        assert_eq!("Arabic".parse::<Language>().unwrap(), Language::Arabic);
        assert_eq!("en".parse::<Language>().unwrap(), Language::English);
        assert!("klingon".parse::<Language>().is_err());
    }
}
