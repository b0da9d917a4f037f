// src/bot/classifier.rs - Blocked word and link detection

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Link pattern used when the configuration does not override it
pub const DEFAULT_LINK_PATTERN: &str = r"(https?://[^\s]+)";

/// Words blocked out of the box; editable from the control surface
pub const DEFAULT_OFFENSIVE_WORDS: &[&str] = &[
    "porra", "merda", "caralho", "puta", "fdp", "desgraçado",
    "otario", "idiota", "burro", "imbecil", "cuzão", "babaca",
];

/// Why a message was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    OffensiveWord,
    UnauthorizedLink,
}

impl ViolationKind {
    /// Wording used inside warning notices
    pub fn describe(&self) -> &'static str {
        match self {
            ViolationKind::OffensiveWord => "palavra ofensiva",
            ViolationKind::UnauthorizedLink => "link não autorizado",
        }
    }
}

/// Pure text classifier. Holds the blocklist (lowercased for matching) and the link pattern.
#[derive(Debug, Clone)]
pub struct Classifier {
    words: Vec<String>,
    lowered: Vec<String>,
    link_regex: Regex,
}

impl Classifier {
    pub fn new(words: Vec<String>, link_pattern: &str) -> Result<Self> {
        let link_regex = RegexBuilder::new(link_pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid link pattern '{}'", link_pattern))?;

        let mut classifier = Self {
            words: Vec::new(),
            lowered: Vec::new(),
            link_regex,
        };
        classifier.set_words(words);
        Ok(classifier)
    }

    pub fn with_defaults() -> Self {
        let words = DEFAULT_OFFENSIVE_WORDS.iter().map(|w| w.to_string()).collect();
        Self::new(words, DEFAULT_LINK_PATTERN).expect("default link pattern compiles")
    }

    /// Blocklist exactly as configured
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn set_words(&mut self, words: Vec<String>) {
        // An empty entry would match every message
        self.lowered = words
            .iter()
            .map(|w| w.to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        self.words = words;
    }

    /// Offensive words win over links when a message contains both.
    pub fn classify(&self, text: &str) -> Option<ViolationKind> {
        if text.is_empty() {
            return None;
        }

        let lowered = text.to_lowercase();
        if self.lowered.iter().any(|word| lowered.contains(word.as_str())) {
            return Some(ViolationKind::OffensiveWord);
        }

        if self.link_regex.is_match(text) {
            return Some(ViolationKind::UnauthorizedLink);
        }

        None
    }
}
