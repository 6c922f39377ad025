//! Relationship classification.
//!
//! Classifies every profiled sender into a relationship type through three
//! tiers: an existing stored row wins outright, then known-entity lists,
//! then signal-based scoring over engagement metrics and content patterns.
//! Detection proposes; it only persists when asked to, and it never
//! overwrites an existing row.

use std::path::Path;

use crate::db::{DbError, DbProfile, SieveDb};
use crate::error::EngineError;
use crate::known_entities::{category_relationship, is_known_entity, KnownEntities};
use crate::signals::patterns::{
    completion_patterns, prospect_patterns, selling_patterns, vendor_patterns,
};
use crate::types::{GemSignal, RelationshipSource, RelationshipType};

const APPLY_THRESHOLD: f64 = 0.6;
const CONTENT_SAMPLE: usize = 10;

/// One classification proposal, persisted only when applied.
#[derive(Debug, Clone)]
pub struct RelationshipProposal {
    pub sender_domain: String,
    pub proposed_type: RelationshipType,
    pub confidence: f64,
    pub signals: Vec<GemSignal>,
}

/// Classify all profiled senders. With `apply`, high-confidence proposals
/// for still-unclassified domains are written as auto rows; existing rows
/// of any provenance are left alone.
pub fn detect_relationships(
    db: &SieveDb,
    known_entities: &KnownEntities,
    apply: bool,
) -> Result<Vec<RelationshipProposal>, DbError> {
    let profiles = db.list_profiles()?;
    let mut proposals = Vec::with_capacity(profiles.len());

    for profile in &profiles {
        let (proposed_type, confidence, signals) = classify(db, profile, known_entities)?;
        let domain = profile.sender_domain.clone();

        if apply && confidence >= APPLY_THRESHOLD {
            // An existing row already won classification verbatim; rewriting
            // it would only churn its note and provenance
            if db.get_relationship(&domain)?.is_none() {
                let top: Vec<&str> = signals.iter().take(3).map(|s| s.signal.as_str()).collect();
                db.upsert_relationship(
                    &domain,
                    proposed_type,
                    Some(&format!("Auto-detected: {}", top.join(", "))),
                    proposed_type.suppresses_gems_by_default(),
                    RelationshipSource::Auto,
                )?;
            }
        }

        proposals.push(RelationshipProposal {
            sender_domain: domain,
            proposed_type,
            confidence,
            signals,
        });
    }

    log::info!("classified {} senders", proposals.len());
    Ok(proposals)
}

fn classify(
    db: &SieveDb,
    profile: &DbProfile,
    known_entities: &KnownEntities,
) -> Result<(RelationshipType, f64, Vec<GemSignal>), DbError> {
    let domain = &profile.sender_domain;

    // 1. A stored row wins, whatever its source
    if let Some(existing) = db.get_relationship(domain)? {
        return Ok((
            existing.relationship_type,
            1.0,
            vec![GemSignal::new("existing_classification", "")],
        ));
    }

    // 2. Known-entity lists
    if let Some(category) = is_known_entity(domain, known_entities) {
        let rel = category_relationship(category).unwrap_or(RelationshipType::Unknown);
        return Ok((
            rel,
            0.9,
            vec![GemSignal::new(format!("known_entity:{category}"), domain)],
        ));
    }

    // 3. Signal scoring; first listed type wins ties
    let (vendor_score, vendor_signals) = scan_vendor_signals(db, profile)?;
    let (prospect_score, prospect_signals) = scan_prospect_signals(db, profile)?;
    let (selling_score, selling_signals) = scan_selling_signals(db, profile)?;

    let scored = [
        (RelationshipType::MyVendor, vendor_score, vendor_signals),
        (
            RelationshipType::InboundProspect,
            prospect_score,
            prospect_signals,
        ),
        (
            RelationshipType::SellingToMe,
            selling_score,
            selling_signals,
        ),
    ];
    let (best_type, best_score, best_signals) = scored
        .into_iter()
        .reduce(|best, next| if next.1 > best.1 { next } else { best })
        .unwrap_or((RelationshipType::Unknown, 0.0, Vec::new()));

    if best_score < 0.3 {
        if profile.has_segment("distribution_map") {
            return Ok((
                RelationshipType::Community,
                0.6,
                vec![GemSignal::new("distribution_segment", "")],
            ));
        }
        if let (Some(initiation), Some(reply_rate)) =
            (profile.thread_initiation_ratio, profile.user_reply_rate)
        {
            if initiation > 0.2 && initiation < 0.8 && reply_rate > 0.5 {
                return Ok((
                    RelationshipType::WarmContact,
                    0.5,
                    vec![GemSignal::new(
                        "bidirectional_engagement",
                        format!("initiation={initiation:.2}, reply_rate={reply_rate:.2}"),
                    )],
                ));
            }
        }
        return Ok((RelationshipType::Unknown, 0.2, Vec::new()));
    }

    Ok((best_type, best_score, best_signals))
}

fn scan_vendor_signals(
    db: &SieveDb,
    profile: &DbProfile,
) -> Result<(f64, Vec<GemSignal>), DbError> {
    let mut signals = Vec::new();
    let mut score = 0.0;

    // User reaching out first is vendor-shaped behavior
    if let Some(initiation) = profile.thread_initiation_ratio {
        if initiation > 0.7 {
            signals.push(GemSignal::new(
                "user_initiates_contact",
                format!("ratio={initiation:.2}"),
            ));
            score += 0.3;
        }
    }

    let content = db.content_for_domain(&profile.sender_domain, false, Some(CONTENT_SAMPLE))?;
    let mut vendor_hits = 0;
    for cr in &content {
        if let Some(p) = vendor_patterns().iter().find(|p| p.is_match(&cr.body_clean)) {
            vendor_hits += 1;
            if signals.len() < 5 {
                signals.push(GemSignal::new("vendor_content", truncate(p.as_str(), 60)));
            }
        }
    }
    if vendor_hits >= 3 {
        score += 0.4;
    } else if vendor_hits >= 1 {
        score += 0.2;
    }

    if profile.has_segment("spend_map") {
        signals.push(GemSignal::new("spend_map_segment", ""));
        score += 0.2;
    }

    Ok((f64::min(score, 1.0), signals))
}

fn scan_prospect_signals(
    db: &SieveDb,
    profile: &DbProfile,
) -> Result<(f64, Vec<GemSignal>), DbError> {
    let mut signals = Vec::new();
    let mut score = 0.0;

    if let Some(initiation) = profile.thread_initiation_ratio {
        if initiation < 0.3 {
            signals.push(GemSignal::new(
                "they_initiate_contact",
                format!("ratio={initiation:.2}"),
            ));
            score += 0.2;
        }
    }
    if let Some(reply_rate) = profile.user_reply_rate {
        if reply_rate > 0.5 {
            signals.push(GemSignal::new(
                "high_user_engagement",
                format!("reply_rate={reply_rate:.2}"),
            ));
            score += 0.2;
        }
    }

    let content = db.content_for_domain(&profile.sender_domain, true, Some(CONTENT_SAMPLE))?;
    for cr in &content {
        if let Some(p) = prospect_patterns()
            .iter()
            .find(|p| p.is_match(&cr.body_clean))
        {
            signals.push(GemSignal::new("prospect_language", truncate(p.as_str(), 60)));
            score += 0.3;
        }
    }

    if matches!(profile.company_size.as_str(), "small" | "")
        && profile.total_messages <= 5
    {
        signals.push(GemSignal::new("small_unknown_company", ""));
        score += 0.1;
    }

    Ok((f64::min(score, 1.0), signals))
}

fn scan_selling_signals(
    db: &SieveDb,
    profile: &DbProfile,
) -> Result<(f64, Vec<GemSignal>), DbError> {
    let mut signals = Vec::new();
    let mut score = 0.0;

    if let Some(reply_rate) = profile.user_reply_rate {
        if reply_rate < 0.1 {
            signals.push(GemSignal::new(
                "no_user_participation",
                format!("reply_rate={reply_rate:.2}"),
            ));
            score += 0.3;
        }
        if profile.total_messages >= 5 && reply_rate < 0.2 {
            signals.push(GemSignal::new(
                "high_volume_one_way",
                format!("{} messages, no replies", profile.total_messages),
            ));
            score += 0.2;
        }
    }

    let content = db.content_for_domain(&profile.sender_domain, true, Some(CONTENT_SAMPLE))?;
    for cr in &content {
        if let Some(p) = selling_patterns()
            .iter()
            .find(|p| p.is_match(&cr.body_clean))
        {
            signals.push(GemSignal::new("selling_language", truncate(p.as_str(), 60)));
            score += 0.2;
        }
    }

    let cold_count: i64 = db.conn_ref().query_row(
        "SELECT COUNT(*) FROM ai_classification ac
         JOIN parsed_metadata pm ON ac.message_id = pm.message_id
         WHERE pm.sender_domain = ?1 AND ac.sender_intent = 'cold_outreach'",
        [&profile.sender_domain],
        |r| r.get(0),
    )?;
    if cold_count > 0 {
        signals.push(GemSignal::new(
            "cold_outreach_intent",
            format!("{cold_count} messages"),
        ));
        score += 0.3;
    }

    Ok((f64::min(score, 1.0), signals))
}

/// Scan the last three messages of a thread for wrap-up language.
pub fn scan_completion_signals(db: &SieveDb, thread_id: &str) -> Result<Vec<String>, DbError> {
    let texts = db.thread_message_texts(thread_id)?;
    let mut found = Vec::new();
    for (_, text) in texts.iter().rev().take(3) {
        for pattern in completion_patterns() {
            if let Some(m) = pattern.find(text) {
                found.push(m.as_str().to_string());
            }
        }
    }
    Ok(found)
}

/// Bulk import relationships from a JSON file mapping relationship type to
/// domain lists:
///
/// ```json
/// {"my_vendor": ["stripe.com", "heroku.com"],
///  "institutional": ["rippling.com"]}
/// ```
pub fn import_relationships(db: &SieveDb, path: &Path) -> Result<usize, EngineError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return Ok(0),
    };
    let data: std::collections::HashMap<String, Vec<String>> =
        serde_json::from_str(&raw).map_err(|source| EngineError::ConfigParse {
            path: path.display().to_string(),
            source,
        })?;

    let mut count = 0;
    for (rel_name, domains) in &data {
        let rel_type = RelationshipType::parse(rel_name);
        if rel_type == RelationshipType::Unknown && rel_name != "unknown" {
            return Err(EngineError::UnknownRelationship(rel_name.clone()));
        }
        for domain in domains {
            db.upsert_relationship(
                domain,
                rel_type,
                Some(&format!("Imported from {}", path.display())),
                rel_type.suppresses_gems_by_default(),
                RelationshipSource::Import,
            )?;
            count += 1;
        }
    }
    Ok(count)
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
