//! Segment assignment.
//!
//! Expands each profile's coarse economic segments into sub-segments with
//! confidence values, adds the dormant-threads segment, and evaluates any
//! user-defined rules. Assignments are rebuilt wholesale per run.

use serde_json::Value;

use crate::config::{Config, CustomSegmentRule, SegmentCondition};
use crate::db::{DbError, DbProfile, DbSegment, SieveDb};
use crate::util::days_since;

const DORMANT_SEGMENT_MIN_DAYS: i64 = 14;

/// Assign segments for every profiled sender. Returns the number of
/// assignments written.
pub fn assign_segments(db: &SieveDb, config: &Config) -> Result<usize, DbError> {
    db.with_transaction(|db| {
        let mut assignments = 0;
        for profile in db.list_profiles()? {
            let domain = profile.sender_domain.clone();
            let mut segments: Vec<DbSegment> = Vec::new();

            for segment in &profile.economic_segments {
                let subs = match segment.as_str() {
                    "spend_map" => classify_spend(&profile),
                    "partner_map" => classify_partner(&profile),
                    "prospect_map" => classify_prospect(&profile),
                    "distribution_map" => classify_distribution(&profile),
                    "procurement_map" => classify_procurement(db, &profile)?,
                    _ => vec![("general", 0.5)],
                };
                for (sub, confidence) in subs {
                    segments.push(DbSegment {
                        sender_domain: domain.clone(),
                        segment: segment.clone(),
                        sub_segment: sub.to_string(),
                        confidence,
                    });
                }
            }

            if db.has_dormant_awaiting_thread(&domain, DORMANT_SEGMENT_MIN_DAYS)? {
                segments.push(DbSegment {
                    sender_domain: domain.clone(),
                    segment: "dormant_threads".into(),
                    sub_segment: "unanswered".into(),
                    confidence: 0.9,
                });
            }

            for rule in &config.custom_segments {
                if matches_rule(&profile, rule) {
                    segments.push(DbSegment {
                        sender_domain: domain.clone(),
                        segment: format!("custom:{}", rule.name),
                        sub_segment: rule.priority.clone(),
                        confidence: 0.8,
                    });
                }
            }

            assignments += segments.len();
            db.replace_segments(&domain, &segments)?;
        }
        log::info!("assigned {assignments} segments");
        Ok(assignments)
    })
}

fn classify_spend(profile: &DbProfile) -> Vec<(&'static str, f64)> {
    let churned = profile
        .last_contact
        .as_deref()
        .and_then(days_since)
        .is_some_and(|days| days > 180);
    if churned {
        vec![("churned_vendor", 0.8)]
    } else if !profile.renewal_dates.is_empty() {
        vec![("upcoming_renewal", 0.9)]
    } else {
        vec![("active_subscription", 0.7)]
    }
}

fn classify_partner(profile: &DbProfile) -> Vec<(&'static str, f64)> {
    if profile.partner_program_urls.is_empty() {
        vec![("general", 0.5)]
    } else {
        vec![("referral_program", 0.8)]
    }
}

fn classify_prospect(profile: &DbProfile) -> Vec<(&'static str, f64)> {
    let soph = profile.marketing_sophistication_avg;
    if soph <= 3.0 {
        vec![("hot_lead", 0.8)]
    } else if soph <= 5.0 {
        vec![("warm_prospect", 0.6)]
    } else {
        vec![("intelligence_value", 0.4)]
    }
}

fn classify_distribution(profile: &DbProfile) -> Vec<(&'static str, f64)> {
    let dist = &profile.offer_type_distribution;
    let mut subs = Vec::new();
    if dist.contains_key("newsletter") || dist.contains_key("digest") {
        subs.push(("newsletter", 0.8));
    }
    if dist.contains_key("event_invitation")
        || dist.contains_key("event")
        || dist.contains_key("webinar")
    {
        subs.push(("event_organizer", 0.7));
    }
    if dist.contains_key("community") || dist.contains_key("forum") {
        subs.push(("community", 0.6));
    }
    if subs.is_empty() {
        subs.push(("newsletter", 0.7));
    }
    subs
}

fn classify_procurement(
    db: &SieveDb,
    profile: &DbProfile,
) -> Result<Vec<(&'static str, f64)>, DbError> {
    let entities = db.entities_for_domain(&profile.sender_domain)?;
    let keywords: String = entities
        .iter()
        .filter(|e| e.entity_type == "procurement_signal")
        .map(|e| e.entity_value.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if keywords.is_empty() {
        return Ok(vec![("evaluation", 0.6)]);
    }

    let mut subs = Vec::new();
    if ["security", "compliance", "soc", "gdpr", "hipaa"]
        .iter()
        .any(|kw| keywords.contains(kw))
    {
        subs.push(("security_compliance", 0.8));
    }
    if ["rfp", "request for proposal", "rfq", "bid"]
        .iter()
        .any(|kw| keywords.contains(kw))
    {
        subs.push(("formal_rfp", 0.9));
    }
    if ["evaluation", "trial", "poc", "proof of concept", "pilot"]
        .iter()
        .any(|kw| keywords.contains(kw))
    {
        subs.push(("evaluation", 0.7));
    }
    if subs.is_empty() {
        subs.push(("evaluation", 0.6));
    }
    Ok(subs)
}

fn matches_rule(profile: &DbProfile, rule: &CustomSegmentRule) -> bool {
    !rule.conditions.is_empty() && rule.conditions.iter().all(|c| matches_condition(profile, c))
}

fn matches_condition(profile: &DbProfile, cond: &SegmentCondition) -> bool {
    if let Some(segment) = &cond.segment_includes {
        return profile.has_segment(segment);
    }

    let Some(actual) = field_value(profile, &cond.field) else {
        return false;
    };

    if let Some(expected) = &cond.equals {
        return value_eq(&actual, expected);
    }
    if let Some(options) = &cond.one_of {
        return options.iter().any(|v| value_eq(&actual, v));
    }
    if let Some(limit) = cond.lt {
        return actual.as_f64().is_some_and(|v| v < limit);
    }
    if let Some(limit) = cond.gt {
        return actual.as_f64().is_some_and(|v| v > limit);
    }
    false
}

fn value_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (a, b) if a.is_number() && b.is_number() => a.as_f64() == b.as_f64(),
        _ => stringify(actual) == stringify(expected),
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The subset of profile fields addressable from custom rules.
fn field_value(profile: &DbProfile, field: &str) -> Option<Value> {
    match field {
        "industry" => Some(Value::String(profile.industry.clone())),
        "company_size" => Some(Value::String(profile.company_size.clone())),
        "company_name" => Some(Value::String(profile.company_name.clone())),
        "esp_used" => profile.esp_used.clone().map(Value::String),
        "authentication_quality" => {
            Some(Value::String(profile.authentication_quality.clone()))
        }
        "marketing_sophistication_avg" => {
            serde_json::Number::from_f64(profile.marketing_sophistication_avg).map(Value::Number)
        }
        "total_messages" => Some(Value::Number(profile.total_messages.into())),
        "has_personalization" => Some(Value::Bool(profile.has_personalization)),
        "has_partner_program" => Some(Value::Bool(profile.has_partner_program)),
        "thread_initiation_ratio" => profile
            .thread_initiation_ratio
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "user_reply_rate" => profile
            .user_reply_rate
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use chrono::{Duration, Utc};

    fn profile(domain: &str) -> DbProfile {
        DbProfile {
            sender_domain: domain.into(),
            last_contact: Some(Utc::now().to_rfc3339()),
            ..Default::default()
        }
    }

    #[test]
    fn spend_map_distinguishes_churned_renewal_and_active() {
        let mut p = profile("a.com");
        p.last_contact = Some((Utc::now() - Duration::days(200)).to_rfc3339());
        assert_eq!(classify_spend(&p), vec![("churned_vendor", 0.8)]);

        let mut p = profile("a.com");
        p.renewal_dates = vec!["2026-10-01".into()];
        assert_eq!(classify_spend(&p), vec![("upcoming_renewal", 0.9)]);

        assert_eq!(classify_spend(&profile("a.com")), vec![("active_subscription", 0.7)]);
    }

    #[test]
    fn prospect_map_by_sophistication() {
        let mut p = profile("a.com");
        p.marketing_sophistication_avg = 2.0;
        assert_eq!(classify_prospect(&p), vec![("hot_lead", 0.8)]);
        p.marketing_sophistication_avg = 4.5;
        assert_eq!(classify_prospect(&p), vec![("warm_prospect", 0.6)]);
        p.marketing_sophistication_avg = 7.0;
        assert_eq!(classify_prospect(&p), vec![("intelligence_value", 0.4)]);
    }

    #[test]
    fn distribution_map_defaults_to_newsletter() {
        let mut p = profile("a.com");
        assert_eq!(classify_distribution(&p), vec![("newsletter", 0.7)]);
        p.offer_type_distribution.insert("webinar".into(), 2);
        p.offer_type_distribution.insert("community".into(), 1);
        assert_eq!(
            classify_distribution(&p),
            vec![("event_organizer", 0.7), ("community", 0.6)]
        );
    }

    #[test]
    fn assign_segments_rebuilds_per_run() {
        let db = test_db();
        let mut p = profile("news.com");
        p.economic_segments = vec!["distribution_map".into()];
        db.upsert_profile(&p).unwrap();

        let cfg = Config::default();
        assert_eq!(assign_segments(&db, &cfg).unwrap(), 1);
        assert_eq!(assign_segments(&db, &cfg).unwrap(), 1);
        let segs = db.segments_for_domain("news.com").unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].segment, "distribution_map");
        assert_eq!(segs[0].sub_segment, "newsletter");
    }

    #[test]
    fn dormant_thread_segment_from_thread_state() {
        let db = test_db();
        db.upsert_profile(&profile("slow.com")).unwrap();
        db.conn_ref()
            .execute_batch(
                "INSERT INTO threads (thread_id, days_dormant, awaiting_response_from)
                 VALUES ('t1', 30, 'user');
                 INSERT INTO messages (message_id, thread_id) VALUES ('m1', 't1');
                 INSERT INTO parsed_metadata (message_id, sender_domain)
                 VALUES ('m1', 'slow.com');",
            )
            .unwrap();

        assign_segments(&db, &Config::default()).unwrap();
        let segs = db.segments_for_domain("slow.com").unwrap();
        assert!(segs
            .iter()
            .any(|s| s.segment == "dormant_threads" && s.sub_segment == "unanswered"));
    }

    #[test]
    fn custom_rules_match_field_predicates() {
        let db = test_db();
        let mut p = profile("small.com");
        p.company_size = "small".into();
        p.marketing_sophistication_avg = 2.0;
        p.economic_segments = vec!["prospect_map".into()];
        db.upsert_profile(&p).unwrap();

        let cfg: Config = serde_json::from_str(
            r#"{"custom_segments": [{
                  "name": "easy_wins",
                  "priority": "hot",
                  "conditions": [
                    {"field": "company_size", "one_of": ["small", "medium"]},
                    {"field": "marketing_sophistication_avg", "lt": 3.5},
                    {"segment_includes": "prospect_map"}
                  ]}]}"#,
        )
        .unwrap();

        assign_segments(&db, &cfg).unwrap();
        let segs = db.segments_for_domain("small.com").unwrap();
        let custom = segs.iter().find(|s| s.segment == "custom:easy_wins").unwrap();
        assert_eq!(custom.sub_segment, "hot");
        assert_eq!(custom.confidence, 0.8);
    }
}
