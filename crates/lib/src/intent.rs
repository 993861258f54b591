//! Intent classification: ordered, named predicate rules over normalized message text.
//!
//! Rules are checked in order and the first match wins. The explicit Friday rule must
//! come before the deploy-today rule because both share the modal/subject/verb prefix.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// "should we deploy on friday"
    ExplicitFridayQuery,
    /// "can i ship today?"
    DeployTodayQuery,
    /// Anything else; routed to the model unless it mentions deploying.
    Generic,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::ExplicitFridayQuery => "explicit_friday_query",
            Intent::DeployTodayQuery => "deploy_today_query",
            Intent::Generic => "generic",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const MODALS: &[&str] = &["should", "can", "could"];
const SUBJECTS: &[&str] = &["i", "we", "you"];
const VERBS: &[&str] = &["deploy", "release", "push", "ship"];
const ON_THIS: &[&str] = &["on", "this"];
const FRIDAY: &[&str] = &["friday"];
const TODAY_NOW: &[&str] = &["today", "now"];
const THIS: &[&str] = &["this"];
const TIME: &[&str] = &["time"];

/// Lowercased words with leading/trailing punctuation and possessive endings removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    raw_lower: String,
    tokens: Vec<String>,
}

impl NormalizedText {
    pub fn new(text: &str) -> Self {
        let raw_lower = text.to_lowercase();
        let tokens = raw_lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .map(strip_possessive)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { raw_lower, tokens }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.raw_lower.contains(needle)
    }

    /// True if consecutive tokens match each slot (one of the slot's words) somewhere.
    fn has_sequence(&self, slots: &[&[&str]]) -> bool {
        if slots.is_empty() || self.tokens.len() < slots.len() {
            return false;
        }
        self.tokens.windows(slots.len()).any(|window| {
            window
                .iter()
                .zip(slots)
                .all(|(token, words)| words.contains(&token.as_str()))
        })
    }
}

/// "friday's" -> "friday". Plain words ending in "s" are left alone.
fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s")
        .or_else(|| word.strip_suffix("\u{2019}s"))
        .unwrap_or(word)
}

/// A named predicate that maps to an intent when it matches.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub intent: Intent,
    matches: fn(&NormalizedText) -> bool,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("intent", &self.intent)
            .finish()
    }
}

impl Rule {
    pub fn matches(&self, text: &NormalizedText) -> bool {
        (self.matches)(text)
    }
}

fn explicit_friday_question(text: &NormalizedText) -> bool {
    text.has_sequence(&[MODALS, SUBJECTS, VERBS, ON_THIS, FRIDAY])
}

fn deploy_timing_question(text: &NormalizedText) -> bool {
    text.has_sequence(&[MODALS, SUBJECTS, VERBS, TODAY_NOW])
        || text.has_sequence(&[MODALS, SUBJECTS, VERBS, THIS, TIME])
}

/// Result of classification with the rule that fired (for logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub rule: Option<&'static str>,
    /// Raw text contains "deploy" (case-insensitive). Drives the deploy-chatter route
    /// when no rule matched.
    pub mentions_deploy: bool,
}

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<Rule>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Rule {
                    name: "explicit-friday-question",
                    intent: Intent::ExplicitFridayQuery,
                    matches: explicit_friday_question,
                },
                Rule {
                    name: "deploy-timing-question",
                    intent: Intent::DeployTodayQuery,
                    matches: deploy_timing_question,
                },
            ],
        }
    }

    pub fn classify(&self, text: &str) -> Intent {
        self.classify_detailed(text).intent
    }

    pub fn classify_detailed(&self, text: &str) -> Classification {
        let normalized = NormalizedText::new(text);
        let mentions_deploy = normalized.contains("deploy");
        for rule in &self.rules {
            if rule.matches(&normalized) {
                return Classification {
                    intent: rule.intent,
                    rule: Some(rule.name),
                    mentions_deploy,
                };
            }
        }
        Classification {
            intent: Intent::Generic,
            rule: None,
            mentions_deploy,
        }
    }
}
