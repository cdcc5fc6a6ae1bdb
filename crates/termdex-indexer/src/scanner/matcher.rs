//! Pattern matching against file content.
//!
//! Rules are compiled once from [`TextPattern`] entries. Content is matched as
//! raw bytes so files that are not valid UTF-8 are still scanned and every
//! reported location is a true byte offset.

use crate::document::MatchRecord;
use crate::IndexerError;
use regex::bytes::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// An extraction rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPattern {
    /// Regular expression source
    pub pattern: String,
    /// Capture group whose text becomes the index key
    #[serde(default)]
    pub key: usize,
}

impl TextPattern {
    /// Create a pattern entry.
    pub fn new(pattern: impl Into<String>, key: usize) -> Self {
        Self {
            pattern: pattern.into(),
            key,
        }
    }
}

/// A compiled pattern plus the capture group used as the key.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    regex: Regex,
    key: usize,
}

/// A single match produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// Text of the key capture group (empty if the group did not participate)
    pub key: String,
    /// The match itself
    pub record: MatchRecord,
}

impl ExtractionRule {
    /// Compile a rule, checking that its key group exists.
    pub fn compile(source: &TextPattern) -> Result<Self, IndexerError> {
        let regex = Regex::new(&source.pattern).map_err(|e| IndexerError::Pattern {
            pattern: source.pattern.clone(),
            message: e.to_string(),
        })?;

        if source.key >= regex.captures_len() {
            return Err(IndexerError::InvalidKeyGroup {
                pattern: source.pattern.clone(),
                key: source.key,
            });
        }

        Ok(Self {
            regex,
            key: source.key,
        })
    }

    /// The pattern source.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// The key capture group index.
    pub fn key_group(&self) -> usize {
        self.key
    }

    /// All non-overlapping matches in `content`, left to right.
    pub fn find_matches(&self, content: &[u8]) -> Vec<RuleMatch> {
        self.regex
            .captures_iter(content)
            .map(|caps| self.to_rule_match(&caps))
            .collect()
    }

    fn to_rule_match(&self, caps: &Captures<'_>) -> RuleMatch {
        let location = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let captures: Vec<String> = (0..caps.len())
            .map(|i| caps.get(i).map(|g| lossy(g.as_bytes())).unwrap_or_default())
            .collect();

        RuleMatch {
            key: captures.get(self.key).cloned().unwrap_or_default(),
            record: MatchRecord {
                location,
                matched: captures.first().cloned().unwrap_or_default(),
                captures,
            },
        }
    }
}

/// The active rule set. Rules that failed to compile are left out.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ExtractionRule>,
    disabled: usize,
}

impl RuleSet {
    /// Compile every pattern, logging and skipping the ones that fail.
    pub fn compile(patterns: &[TextPattern]) -> Self {
        let mut rules = Vec::with_capacity(patterns.len());
        let mut disabled = 0;

        for source in patterns {
            match ExtractionRule::compile(source) {
                Ok(rule) => {
                    debug!(pattern = %source.pattern, key = source.key, "Rule compiled");
                    rules.push(rule);
                }
                Err(e) => {
                    error!(pattern = %source.pattern, error = %e, "Problem compiling rule, disabled");
                    disabled += 1;
                }
            }
        }

        Self { rules, disabled }
    }

    /// Build a set from already compiled rules.
    pub fn from_rules(rules: Vec<ExtractionRule>) -> Self {
        Self { rules, disabled: 0 }
    }

    /// Rules that take part in scanning.
    pub fn active(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Number of rules that failed to compile.
    pub fn disabled_count(&self) -> usize {
        self.disabled
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
