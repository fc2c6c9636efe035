//! Pure filtering decisions over normalized listings.
//!
//! `decide` is deterministic and does no I/O. Checks run in a strict
//! order with the first failing check winning, because the reason code
//! is part of the audit trail persisted with every listing.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::Listing;

/// Operator-supplied filter rules, immutable for the duration of a run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterRules {
    /// Case-insensitive substrings that disqualify a title outright.
    #[serde(default)]
    pub excluded_keywords: Vec<String>,
    /// At least one of these regexes must match the title.
    #[serde(default)]
    pub target_patterns: Vec<String>,
    /// Minimum acceptable hourly rate extracted from compensation text.
    #[serde(default)]
    pub min_hourly: f64,
}

/// Outcome of one filter decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub accept: bool,
    pub reason: String,
}

impl Decision {
    fn accept() -> Self {
        Self {
            accept: true,
            reason: "passed_filters".to_string(),
        }
    }

    fn reject(reason: String) -> Self {
        Self {
            accept: false,
            reason,
        }
    }
}

/// Candidate hourly rates are 2-3 digit numbers in the compensation
/// text; values outside this range are assumed to be something else
/// (a yearly salary, a project budget).
const HOURLY_MIN_PLAUSIBLE: u32 = 10;
const HOURLY_MAX_PLAUSIBLE: u32 = 200;

/// Compiled filter rules. Built once at start-up so that bad patterns
/// abort before any run starts.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    /// (as configured, lowercased) pairs: matching is case-insensitive
    /// but the reason code echoes the operator's configured casing.
    excluded_keywords: Vec<(String, String)>,
    target_patterns: Vec<Regex>,
    min_hourly: f64,
    pay_token: Regex,
}

impl FilterEngine {
    pub fn compile(rules: &FilterRules) -> Result<Self, AppError> {
        let target_patterns = rules
            .target_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        AppError::ConfigError(format!("invalid target pattern '{pattern}': {e}"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pay_token = Regex::new(r"\$?(\d{2,3})")
            .map_err(|e| AppError::ConfigError(format!("pay token regex: {e}")))?;

        Ok(Self {
            excluded_keywords: rules
                .excluded_keywords
                .iter()
                .map(|kw| (kw.clone(), kw.to_lowercase()))
                .collect(),
            target_patterns,
            min_hourly: rules.min_hourly,
            pay_token,
        })
    }

    /// Decide whether a listing should be delivered.
    ///
    /// Order matters and short-circuits:
    /// 1. excluded keyword in title      -> `excluded_keyword:<kw>`
    /// 2. no target pattern matches      -> `no_target_pattern`
    /// 3. plausible hourly rate too low  -> `hourly_too_low:<value>`
    /// 4. otherwise                      -> `passed_filters`
    pub fn decide(&self, listing: &Listing) -> Decision {
        let title = listing.title.to_lowercase();

        for (configured, lowered) in &self.excluded_keywords {
            if title.contains(lowered) {
                return Decision::reject(format!("excluded_keyword:{configured}"));
            }
        }

        if !self
            .target_patterns
            .iter()
            .any(|pattern| pattern.is_match(&listing.title))
        {
            return Decision::reject("no_target_pattern".to_string());
        }

        // Unparsable compensation text passes through: "cannot determine
        // pay" is treated as "does not fail the pay check".
        for capture in self.pay_token.captures_iter(&listing.compensation) {
            let Ok(value) = capture[1].parse::<u32>() else {
                continue;
            };
            if (HOURLY_MIN_PLAUSIBLE..=HOURLY_MAX_PLAUSIBLE).contains(&value)
                && f64::from(value) < self.min_hourly
            {
                return Decision::reject(format!("hourly_too_low:{value}"));
            }
        }

        Decision::accept()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str, compensation: &str) -> Listing {
        Listing {
            identity: "test:1".into(),
            source: "test".into(),
            title: title.into(),
            organization: "Acme".into(),
            url: "https://example.com/job".into(),
            compensation: compensation.into(),
            description: String::new(),
            posted_at: None,
            raw: serde_json::json!({}),
            found_at: None,
            sent_at: None,
            filtered_reason: None,
        }
    }

    fn engine(excluded: &[&str], patterns: &[&str], min_hourly: f64) -> FilterEngine {
        FilterEngine::compile(&FilterRules {
            excluded_keywords: excluded.iter().map(|s| s.to_string()).collect(),
            target_patterns: patterns.iter().map(|s| s.to_string()).collect(),
            min_hourly,
        })
        .unwrap()
    }

    #[test]
    fn excluded_keyword_rejects() {
        let engine = engine(&["unpaid"], &["engineer"], 0.0);
        let decision = engine.decide(&listing("Unpaid Engineer Internship", ""));
        assert!(!decision.accept);
        assert_eq!(decision.reason, "excluded_keyword:unpaid");
    }

    #[test]
    fn excluded_keyword_reason_echoes_configured_casing() {
        // Matching ignores case; the audit reason reports the keyword
        // exactly as the operator wrote it.
        let engine = engine(&["Crypto"], &["engineer"], 0.0);
        let decision = engine.decide(&listing("Senior CRYPTO Engineer", ""));
        assert!(!decision.accept);
        assert_eq!(decision.reason, "excluded_keyword:Crypto");
    }

    #[test]
    fn excluded_keyword_wins_over_pattern_miss() {
        // Fails both checks; the first check's reason must be reported.
        let engine = engine(&["intern"], &["engineer"], 0.0);
        let decision = engine.decide(&listing("Marketing Intern", ""));
        assert_eq!(decision.reason, "excluded_keyword:intern");
    }

    #[test]
    fn no_target_pattern_rejects() {
        let engine = engine(&[], &["engineer", "developer"], 0.0);
        let decision = engine.decide(&listing("Data Entry Clerk", ""));
        assert!(!decision.accept);
        assert_eq!(decision.reason, "no_target_pattern");
    }

    #[test]
    fn target_pattern_is_case_insensitive() {
        let engine = engine(&[], &["engineer"], 0.0);
        assert!(engine.decide(&listing("Senior ENGINEER", "")).accept);
    }

    #[test]
    fn hourly_below_minimum_rejects_with_first_low_value() {
        let engine = engine(&[], &["engineer"], 50.0);
        let decision = engine.decide(&listing("Software Engineer", "$45-60/hr"));
        assert!(!decision.accept);
        assert_eq!(decision.reason, "hourly_too_low:45");
    }

    #[test]
    fn hourly_at_or_above_minimum_passes() {
        let engine = engine(&[], &["engineer"], 50.0);
        let decision = engine.decide(&listing("Software Engineer", "$75/hr"));
        assert!(decision.accept);
        assert_eq!(decision.reason, "passed_filters");
    }

    #[test]
    fn unparsable_compensation_passes_through() {
        let engine = engine(&[], &["engineer"], 50.0);
        let decision = engine.decide(&listing("Software Engineer", "negotiable"));
        assert!(decision.accept);
        assert_eq!(decision.reason, "passed_filters");
    }

    #[test]
    fn implausible_numbers_are_ignored() {
        // 4-digit numbers read as salaries, single digits as noise.
        let engine = engine(&[], &["engineer"], 50.0);
        assert!(engine.decide(&listing("Engineer", "around 5000 per month")).accept);
        assert!(engine.decide(&listing("Engineer", "5 openings")).accept);
    }

    #[test]
    fn decide_is_deterministic() {
        let engine = engine(&["unpaid"], &["engineer"], 50.0);
        let item = listing("Software Engineer", "$45/hr");
        let first = engine.decide(&item);
        for _ in 0..10 {
            assert_eq!(engine.decide(&item), first);
        }
    }

    #[test]
    fn invalid_pattern_fails_compilation() {
        let result = FilterEngine::compile(&FilterRules {
            excluded_keywords: vec![],
            target_patterns: vec!["(unclosed".into()],
            min_hourly: 0.0,
        });
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
