//! Compiled pattern tables for signal detection.
//!
//! Patterns are compiled once on first use. The pattern strings are fixed
//! at compile time so `Regex::new` cannot fail at runtime; the expect here
//! would only fire on a typo caught by the unit test below.

use std::sync::OnceLock;

use regex::Regex;

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("invalid built-in pattern"))
        .collect()
}

/// Warm-signal families scanned per message in a thread. Each family
/// contributes at most one hit per message.
pub fn warm_signal_families() -> &'static [(&'static str, Vec<Regex>)] {
    static FAMILIES: OnceLock<Vec<(&'static str, Vec<Regex>)>> = OnceLock::new();
    FAMILIES.get_or_init(|| {
        vec![
            (
                "pricing",
                compile_all(&[r"(?i)\b(?:pricing|price|cost|quote|budget|investment)\b"]),
            ),
            (
                "meeting_request",
                compile_all(&[
                    r"(?i)\b(?:schedule|call|meeting|demo|zoom|calendly|book a time)\b",
                ]),
            ),
            (
                "explicit_ask",
                compile_all(&[r"(?i)\b(?:interested in|looking for|evaluating|considering)\b"]),
            ),
            (
                "follow_up",
                compile_all(&[
                    r"(?i)\b(?:following up|circling back|checking in|just wanted to)\b",
                ]),
            ),
            // Title casing is the signal here, so no (?i)
            (
                "decision_maker",
                compile_all(&[r"\b(?:CEO|CTO|VP|Director|Head of|Founder)\b"]),
            ),
            (
                "budget_indicator",
                compile_all(&[
                    r"\$[\d,]+(?:\.\d{2})?",
                    r"(?i)\b\d+[kK]\s*(?:ARR|MRR|budget)\b",
                ]),
            ),
        ]
    })
}

/// Content markers that a sender is an existing vendor relationship.
pub fn vendor_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile_all(&[
            r"(?i)\b(?:invoice|receipt|payment|subscription|billing|renewal)\b",
            r"(?i)\b(?:your (?:account|plan|subscription|license|trial))\b",
            r"(?i)\b(?:service (?:update|notification|alert))\b",
            r"(?i)\b(?:onboarding|getting started|welcome to)\b",
            r"(?i)\b(?:support ticket|case \#|helpdesk)\b",
        ])
    })
}

/// Content markers that a sender is interested in the user's services.
pub fn prospect_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile_all(&[
            r"(?i)\b(?:interested in (?:your|learning about))\b",
            r"(?i)\b(?:can you (?:help|tell me|share))\b",
            r"(?i)\b(?:looking for (?:a|an|someone|help))\b",
            r"(?i)\b(?:referr(?:ed|al) (?:by|from))\b",
            r"(?i)\b(?:saw your (?:work|talk|article|post))\b",
        ])
    })
}

/// Cold-outreach markers: someone is selling to the user.
pub fn selling_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile_all(&[
            r"(?i)\b(?:I (?:wanted to|thought you|noticed your))\b",
            r"(?i)\b(?:quick question|touching base|reaching out)\b",
            r"(?i)\b(?:book a (?:demo|call|meeting))\b",
            r"(?i)\b(?:free trial|special offer|limited time)\b",
            r"(?i)\b(?:would you be (?:open|interested))\b",
        ])
    })
}

/// Markers that a conversation concluded; a dormant thread ending this way
/// is finished business, not an opportunity.
pub fn completion_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile_all(&[
            r"(?i)\b(?:final (?:deliverable|report|version))\b",
            r"(?i)\b(?:project (?:complete|finished|wrapped))\b",
            r"(?i)\b(?:great working with you)\b",
            r"(?i)\b(?:contract (?:ended|expired|concluded))\b",
            r"(?i)\b(?:closing out|wrapping up)\b",
            r"(?i)\b(?:all set,?\s*thanks)\b",
        ])
    })
}

/// Markers that a distribution channel accepts outside content.
pub fn distribution_content_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile_all(&[
            r"(?i)\bguest post\b",
            r"(?i)\bspeaker application\b",
            r"(?i)\bcall for papers\b",
            r"(?i)\bpodcast interview\b",
            r"(?i)\bsponsorship\b",
            r"(?i)\bcontributor\b",
            r"(?i)\bsubmit (?:your|a) (?:talk|session|abstract)\b",
            r"(?i)\bfeature (?:story|article|piece)\b",
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtin_patterns_compile() {
        assert_eq!(warm_signal_families().len(), 6);
        assert!(!vendor_patterns().is_empty());
        assert!(!prospect_patterns().is_empty());
        assert!(!selling_patterns().is_empty());
        assert!(!completion_patterns().is_empty());
        assert!(!distribution_content_patterns().is_empty());
    }

    #[test]
    fn budget_patterns_match_dollar_amounts_and_arr() {
        let (_, budget) = &warm_signal_families()[5];
        assert!(budget.iter().any(|r| r.is_match("budget of $12,500.00")));
        assert!(budget.iter().any(|r| r.is_match("around 50k ARR")));
        assert!(!budget.iter().any(|r| r.is_match("fifty dollars")));
    }

    #[test]
    fn decision_maker_family_is_case_sensitive() {
        let (name, patterns) = &warm_signal_families()[4];
        assert_eq!(*name, "decision_maker");
        assert!(patterns[0].is_match("our CTO will join"));
        assert!(!patterns[0].is_match("the cto will join"));
    }

    #[test]
    fn completion_patterns_catch_wrap_up_language() {
        assert!(completion_patterns()
            .iter()
            .any(|r| r.is_match("We're wrapping up the engagement")));
        assert!(completion_patterns()
            .iter()
            .any(|r| r.is_match("all set, thanks!")));
    }
}
