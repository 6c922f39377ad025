//! Known-entity suppression lists and subdomain collapsing.
//!
//! Known entities are infrastructure and institutional senders (payment
//! processors, banks, SaaS platforms the user already runs on) that should
//! never surface as opportunities. The list lives in a JSON file mapping
//! category to domains:
//!
//! ```json
//! {"infrastructure": ["stripe.com", "aws.amazon.com"],
//!  "institutional": ["irs.gov"]}
//! ```

use std::collections::HashMap;
use std::path::Path;

use crate::types::RelationshipType;

/// Category -> domain list, as loaded from disk.
pub type KnownEntities = HashMap<String, Vec<String>>;

/// Load known-entity lists from a JSON file. A missing file is not an
/// error: it means no suppression lists are configured.
pub fn load_known_entities(path: &Path) -> KnownEntities {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return KnownEntities::new(),
    };
    match serde_json::from_str::<KnownEntities>(&raw) {
        Ok(map) => map,
        Err(e) => {
            log::warn!("ignoring malformed known-entities file {}: {e}", path.display());
            KnownEntities::new()
        }
    }
}

/// Match a domain against the known-entity lists, subdomain-aware. Returns
/// the matching category name.
pub fn is_known_entity<'a>(domain: &str, known: &'a KnownEntities) -> Option<&'a str> {
    if domain.is_empty() || known.is_empty() {
        return None;
    }
    let collapsed = collapse_subdomain(domain);
    for (category, domains) in known {
        if domains.iter().any(|d| d == &collapsed || d == domain) {
            return Some(category);
        }
    }
    None
}

/// Map a known-entity category to the relationship it implies.
pub fn category_relationship(category: &str) -> Option<RelationshipType> {
    match category {
        "infrastructure" | "marketing_platforms" => Some(RelationshipType::MyInfrastructure),
        "institutional" => Some(RelationshipType::Institutional),
        _ => None,
    }
}

// Country-code second-level suffixes that need three labels to identify the
// registrable domain.
const MULTI_PART_TLDS: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "com.au", "net.au", "org.au", "co.nz", "co.jp",
    "co.in", "co.za", "com.br", "com.mx", "com.sg",
];

/// Collapse a subdomain to its registrable domain:
/// `mail.hubspot.com` -> `hubspot.com`, `x.mail.example.co.uk` ->
/// `example.co.uk`. Inputs that are already bare (or not domains at all)
/// come back unchanged.
pub fn collapse_subdomain(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() <= 2 {
        return domain;
    }
    let last_two = labels[labels.len() - 2..].join(".");
    let keep = if MULTI_PART_TLDS.contains(&last_two.as_str()) {
        3
    } else {
        2
    };
    if labels.len() <= keep {
        return domain;
    }
    labels[labels.len() - keep..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_single_subdomain() {
        assert_eq!(collapse_subdomain("mail.example.com"), "example.com");
    }

    #[test]
    fn collapses_deep_subdomains() {
        assert_eq!(
            collapse_subdomain("bounce.email.marketing.stripe.com"),
            "stripe.com"
        );
    }

    #[test]
    fn preserves_multi_part_tlds() {
        assert_eq!(collapse_subdomain("mail.example.co.uk"), "example.co.uk");
        assert_eq!(collapse_subdomain("example.co.uk"), "example.co.uk");
    }

    #[test]
    fn bare_and_degenerate_inputs_are_unchanged() {
        assert_eq!(collapse_subdomain("example.com"), "example.com");
        assert_eq!(collapse_subdomain("localhost"), "localhost");
        assert_eq!(collapse_subdomain(""), "");
        assert_eq!(collapse_subdomain("com"), "com");
    }

    #[test]
    fn known_entity_matches_through_subdomain() {
        let mut known = KnownEntities::new();
        known.insert("infrastructure".into(), vec!["stripe.com".into()]);
        assert_eq!(
            is_known_entity("notifications.stripe.com", &known),
            Some("infrastructure")
        );
        assert_eq!(is_known_entity("stripe.com", &known), Some("infrastructure"));
        assert_eq!(is_known_entity("acme.com", &known), None);
        assert_eq!(is_known_entity("", &known), None);
    }

    #[test]
    fn category_maps_to_relationship() {
        assert_eq!(
            category_relationship("infrastructure"),
            Some(RelationshipType::MyInfrastructure)
        );
        assert_eq!(
            category_relationship("marketing_platforms"),
            Some(RelationshipType::MyInfrastructure)
        );
        assert_eq!(
            category_relationship("institutional"),
            Some(RelationshipType::Institutional)
        );
        assert_eq!(category_relationship("other"), None);
    }
}
