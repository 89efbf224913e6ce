// Regex lexicons: ordered pattern lists with rolling hit counters.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Collapse newlines and whitespace runs into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove every whitespace character.
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Clone, Default)]
enum Compiled {
    #[default]
    Pending,
    Ready(Regex),
    Invalid,
}

/// A pattern and how often it matched since the last report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub pattern: String,
    #[serde(default)]
    pub hits: u64,
    #[serde(skip)]
    compiled: Compiled,
}

impl LexiconEntry {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            hits: 0,
            compiled: Compiled::Pending,
        }
    }

    /// Compile on first use. Bad patterns are remembered and skipped.
    fn regex(&mut self) -> Option<&Regex> {
        if let Compiled::Pending = self.compiled {
            self.compiled = match RegexBuilder::new(&self.pattern)
                .case_insensitive(true)
                .multi_line(true)
                .dot_matches_new_line(true)
                .build()
            {
                Ok(re) => Compiled::Ready(re),
                Err(e) => {
                    tracing::warn!(pattern = %self.pattern, "Skipping invalid lexicon pattern: {}", e);
                    Compiled::Invalid
                }
            };
        }

        match &self.compiled {
            Compiled::Ready(re) => Some(re),
            _ => None,
        }
    }
}

/// Patterns are tried in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lexicon {
    entries: Vec<LexiconEntry>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patterns<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            entries: patterns.into_iter().map(LexiconEntry::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn hits(&self, pattern: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.pattern == pattern)
            .map(|e| e.hits)
    }

    /// Pattern -> hit count, in lexicon order.
    pub fn counts(&self) -> Vec<(String, u64)> {
        self.entries
            .iter()
            .map(|e| (e.pattern.clone(), e.hits))
            .collect()
    }

    pub fn reset_counts(&mut self) {
        for entry in &mut self.entries {
            entry.hits = 0;
        }
    }

    /// Swap in a new pattern list. Patterns that survive keep their counts.
    pub fn replace_patterns(&mut self, patterns: Vec<String>) {
        let mut next = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let hits = self.hits(&pattern).unwrap_or(0);
            let mut entry = LexiconEntry::new(pattern);
            entry.hits = hits;
            next.push(entry);
        }
        self.entries = next;
    }

    /// Try every pattern against `text`, retrying each one against the
    /// whitespace-stripped text. The first hit gets its counter bumped and
    /// its pattern returned; nothing after it is tried.
    pub fn record_first_match(&mut self, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }

        let normalized = normalize_whitespace(text);
        let stripped = strip_whitespace(&normalized);

        for entry in &mut self.entries {
            let matched = match entry.regex() {
                Some(re) => re.is_match(&normalized) || re.is_match(&stripped),
                None => false,
            };

            if matched {
                entry.hits += 1;
                return Some(entry.pattern.clone());
            }
        }

        None
    }
}
