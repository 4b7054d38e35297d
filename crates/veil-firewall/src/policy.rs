//! Policy rules and PII detection

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{FirewallError, Result};

/// Replacement text for redacted PII
pub const REDACTION: &str = "[REDACTED]";

/// Built-in PII patterns: SSN-like, phone-like, email-like
const PII_PATTERNS: [&str; 3] = [
    r"\b\d{3}-\d{2}-\d{4}\b",
    r"\b\d{3}[.-]\d{3}[.-]\d{4}\b",
    r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
];

/// A rule loaded from the contract's firewall policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyRule {
    /// Case-insensitive substring match against the composite context
    KeywordBlock {
        #[serde(default)]
        keywords: Vec<String>,
    },
    /// Regular-expression match against the composite context
    PatternBlock {
        #[serde(default)]
        patterns: Vec<String>,
    },
}

/// Compiled PII patterns
#[derive(Debug, Clone)]
pub struct PiiDetector {
    patterns: Vec<Regex>,
}

impl PiiDetector {
    pub fn new() -> Result<Self> {
        let patterns = PII_PATTERNS
            .iter()
            .map(|p| compile(p, false))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn detect(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    /// `text` with every PII match replaced by [`REDACTION`]
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for p in &self.patterns {
            out = p.replace_all(&out, REDACTION).into_owned();
        }
        out
    }
}

/// Policy rules prepared for matching
#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    /// (as configured, lowercased)
    keywords: Vec<(String, String)>,
    patterns: Vec<(String, Regex)>,
}

impl CompiledRules {
    pub fn compile(rules: &[PolicyRule]) -> Result<Self> {
        let mut compiled = Self::default();
        for rule in rules {
            match rule {
                PolicyRule::KeywordBlock { keywords } => {
                    for kw in keywords.iter().filter(|k| !k.is_empty()) {
                        compiled.keywords.push((kw.clone(), kw.to_lowercase()));
                    }
                }
                PolicyRule::PatternBlock { patterns } => {
                    for p in patterns {
                        compiled.patterns.push((p.clone(), compile(p, true)?));
                    }
                }
            }
        }
        Ok(compiled)
    }

    /// One violation string per matching keyword or pattern
    pub fn violations(&self, composite: &str) -> Vec<String> {
        let lowered = composite.to_lowercase();
        let mut out = Vec::new();
        for (keyword, lower) in &self.keywords {
            if lowered.contains(lower.as_str()) {
                out.push(format!("Blocked keyword detected: {}", keyword));
            }
        }
        for (source, regex) in &self.patterns {
            if regex.is_match(composite) {
                out.push(format!("Blocked pattern detected: {}", source));
            }
        }
        out
    }
}

fn compile(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| FirewallError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}
