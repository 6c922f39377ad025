//! Relationship-aware opportunity scoring.
//!
//! Every gem for a sender carries the same sender-level score: the score
//! ranks WHO to engage, the gem type says WHY. The formula has three
//! tiers plus a relationship cap:
//!
//! 1. inbound signal (who initiates, whether the user engages)
//! 2. base profile (reachability, relevance, recency, contacts, money)
//! 3. gem bonus (diversity plus specific high-value types)

use std::collections::{HashMap, HashSet};

use crate::config::{ScoringConfig, UserContext};
use crate::db::{DbError, DbProfile, SieveDb};
use crate::types::RelationshipType;
use crate::util::days_since;

/// Component view of one sender's score, for explainability.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreBreakdown {
    pub inbound_signal: f64,
    pub base_profile: f64,
    pub gem_bonus: f64,
    pub cap: i64,
    pub total: i64,
}

/// Compute the opportunity score for one sender. `gem_types` is the set of
/// gem type strings currently stored for the sender.
pub fn opportunity_score(
    profile: &DbProfile,
    gem_types: &HashSet<String>,
    relationship: RelationshipType,
    scoring: &ScoringConfig,
    user_context: &UserContext,
) -> ScoreBreakdown {
    let weights = &scoring.weights;
    let mut breakdown = ScoreBreakdown::default();

    // Tier 1: inbound signal. Missing metrics contribute nothing rather
    // than being treated as zero.
    if let Some(initiation) = profile.thread_initiation_ratio {
        breakdown.inbound_signal += (1.0 - initiation) * weights.inbound_initiation;
    }
    if let Some(reply_rate) = profile.user_reply_rate {
        breakdown.inbound_signal += reply_rate * weights.inbound_engagement;
    }

    // Tier 2: base profile
    breakdown.base_profile += match profile.company_size.as_str() {
        "small" => weights.reachability,
        "medium" => weights.reachability * 0.67,
        _ => weights.reachability * 0.2,
    };

    if user_context
        .target_industries
        .iter()
        .any(|i| i == &profile.industry)
    {
        breakdown.base_profile += weights.relevance;
    } else {
        breakdown.base_profile += weights.relevance * 0.3;
    }

    if let Some(days) = profile.last_contact.as_deref().and_then(days_since) {
        if days <= 30 {
            breakdown.base_profile += weights.recency;
        } else if days <= 90 {
            breakdown.base_profile += weights.recency * 0.5;
        }
    }

    if profile.known_contacts.iter().any(|c| !c.role.is_empty()) {
        breakdown.base_profile += weights.known_contacts;
    } else if !profile.known_contacts.is_empty() {
        breakdown.base_profile += weights.known_contacts * 0.2;
    }

    // Monetary evidence only counts where money could plausibly flow to us
    let monetary_eligible = matches!(
        relationship,
        RelationshipType::InboundProspect
            | RelationshipType::WarmContact
            | RelationshipType::Unknown
            | RelationshipType::PotentialPartner
    );
    if monetary_eligible && !profile.monetary_signals.is_empty() {
        breakdown.base_profile += weights.monetary_signals;
    }

    // Tier 3: gem bonus
    breakdown.gem_bonus += f64::min(
        gem_types.len() as f64 * weights.gem_diversity_per_type,
        weights.gem_diversity_cap,
    );
    if gem_types.contains("dormant_warm_thread") {
        breakdown.gem_bonus += weights.dormant_thread_bonus;
    }
    if gem_types.contains("partner_program") {
        breakdown.gem_bonus += weights.partner_bonus;
    }
    if gem_types.contains("procurement_signal") {
        breakdown.gem_bonus += weights.procurement_bonus;
    }

    breakdown.cap = scoring.cap_for(relationship);
    let raw = (breakdown.inbound_signal + breakdown.base_profile + breakdown.gem_bonus) as i64;
    breakdown.total = raw.min(breakdown.cap).min(100);
    breakdown
}

/// Re-score every stored gem with the relationship-aware formula.
/// Returns the count of gems updated.
pub fn score_gems(
    db: &SieveDb,
    scoring: &ScoringConfig,
    user_context: &UserContext,
) -> Result<usize, DbError> {
    let relationships: HashMap<String, RelationshipType> = db
        .list_relationships()?
        .into_iter()
        .map(|r| (r.sender_domain, r.relationship_type))
        .collect();

    let gems = db.list_gems()?;
    let mut profiles: HashMap<String, Option<DbProfile>> = HashMap::new();
    let mut gem_types_by_domain: HashMap<&str, HashSet<String>> = HashMap::new();
    for gem in &gems {
        gem_types_by_domain
            .entry(&gem.sender_domain)
            .or_default()
            .insert(gem.gem_type.clone());
    }

    let mut scored = 0;
    for gem in &gems {
        let domain = &gem.sender_domain;
        let profile = match profiles.entry(domain.clone()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => e.insert(db.get_profile(domain)?),
        };
        let Some(profile) = profile else {
            log::warn!("gem {} references domain {domain} with no profile", gem.id);
            continue;
        };

        let relationship = relationships
            .get(domain)
            .copied()
            .unwrap_or(RelationshipType::Unknown);
        let gem_types = gem_types_by_domain
            .get(domain.as_str())
            .cloned()
            .unwrap_or_default();

        let breakdown =
            opportunity_score(profile, &gem_types, relationship, scoring, user_context);
        db.update_gem_score(gem.id, breakdown.total)?;
        scored += 1;
    }

    log::info!("scored {scored} gems");
    Ok(scored)
}
