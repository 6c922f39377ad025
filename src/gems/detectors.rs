//! The gem detectors.
//!
//! Each detector takes a sender profile plus shared context and returns
//! zero or more candidates. Detectors are pure reads; persistence and
//! eligibility filtering happen in the orchestrator.

use std::collections::{BTreeSet, HashSet};

use crate::config::Config;
use crate::db::{DbError, DbProfile, SieveDb};
use crate::relationships::scan_completion_signals;
use crate::signals::patterns::distribution_content_patterns;
use crate::signals::warm::scan_thread;
use crate::types::{
    EstimatedValue, GemCandidate, GemExplanation, GemSignal, GemType, Urgency,
};

/// Shared inputs for a detection run.
pub struct DetectContext<'a> {
    pub config: &'a Config,
    /// Domains where most messages are bulk mail.
    pub bulk_senders: &'a HashSet<String>,
}

impl DetectContext<'_> {
    fn is_bulk(&self, domain: &str) -> bool {
        self.bulk_senders.contains(domain)
    }
}

pub fn detect_dormant_warm_thread(
    db: &SieveDb,
    profile: &DbProfile,
    ctx: &DetectContext<'_>,
) -> Result<Vec<GemCandidate>, DbError> {
    let domain = &profile.sender_domain;
    if ctx.is_bulk(domain) {
        return Ok(Vec::new());
    }
    let dormant_cfg = &ctx.config.dormant_thread;

    let mut gems = Vec::new();
    for thread in db.threads_for_domain(domain)? {
        if thread.awaiting_response_from.as_deref() != Some("user")
            || thread.days_dormant < dormant_cfg.min_dormant_days
            || thread.days_dormant > dormant_cfg.max_dormant_days
            || !thread.user_participated
            || thread.message_count < 2
        {
            continue;
        }

        let warm = scan_thread(db, &thread.thread_id)?;
        if dormant_cfg.require_human_sender && warm.distinct_families() < 2 {
            continue;
        }

        let intents = db.thread_intents(&thread.thread_id)?;
        if intents
            .iter()
            .any(|i| i == "transactional" || i == "re_engagement")
        {
            continue;
        }

        // A thread that wrapped up cleanly is finished business
        if !scan_completion_signals(db, &thread.thread_id)?.is_empty() {
            continue;
        }

        let mut signals = warm.signals;
        let mut score = 40 + warm.boost;

        if thread.user_participated {
            signals.push(GemSignal::new(
                "user_participated",
                "You were part of this conversation",
            ));
        }
        if thread.days_dormant < 60 {
            score += 15;
        } else if thread.days_dormant < 120 {
            score += 10;
        }
        if thread.message_count > 2 {
            signals.push(GemSignal::new(
                "multi_message_thread",
                format!("{} messages exchanged", thread.message_count),
            ));
            score += 5;
        }

        let estimated_value = if warm.boost >= 15 {
            EstimatedValue::High
        } else if warm.boost == 0 {
            EstimatedValue::Low
        } else {
            EstimatedValue::Medium
        };
        let urgency = if thread.days_dormant < 30 {
            Urgency::High
        } else if thread.days_dormant > 180 {
            Urgency::Low
        } else {
            Urgency::Medium
        };

        let subject = thread.subject.clone().unwrap_or_default();
        gems.push(GemCandidate {
            gem_type: GemType::DormantWarmThread,
            thread_id: Some(thread.thread_id.clone()),
            score: score.min(100),
            explanation: GemExplanation {
                summary: format!(
                    "Thread '{subject}' has been dormant for {} days. You owe a reply.",
                    thread.days_dormant
                ),
                signals,
                confidence: 0.8,
                estimated_value,
                urgency,
            },
            recommended_actions: vec!["Reply to thread with new value-add".into()],
            source_message_ids: db.message_ids_for_thread(&thread.thread_id)?,
        });
    }
    Ok(gems)
}

pub fn detect_unanswered_ask(
    db: &SieveDb,
    profile: &DbProfile,
    ctx: &DetectContext<'_>,
) -> Result<Vec<GemCandidate>, DbError> {
    let domain = &profile.sender_domain;
    if ctx.is_bulk(domain) {
        return Ok(Vec::new());
    }

    let mut gems = Vec::new();
    for thread in db.threads_for_domain(domain)? {
        if thread.awaiting_response_from.as_deref() != Some("user")
            || thread.days_dormant < 3
            || thread.days_dormant >= 14
            || thread.message_count < 2
            || !thread.user_participated
        {
            continue;
        }

        let subject = thread.subject.clone().unwrap_or_default();
        let last_sender = thread.last_sender.clone().unwrap_or_default();
        gems.push(GemCandidate {
            gem_type: GemType::UnansweredAsk,
            thread_id: Some(thread.thread_id.clone()),
            score: 50,
            explanation: GemExplanation {
                summary: format!(
                    "'{subject}' — {last_sender} is waiting for your reply ({} days).",
                    thread.days_dormant
                ),
                signals: vec![GemSignal::new(
                    "awaiting_response",
                    format!("Last message from {last_sender}"),
                )],
                confidence: 0.9,
                estimated_value: EstimatedValue::MediumHigh,
                urgency: Urgency::High,
            },
            recommended_actions: vec!["Reply promptly".into()],
            source_message_ids: db.message_ids_for_thread(&thread.thread_id)?,
        });
    }
    Ok(gems)
}

pub fn detect_weak_marketing_lead(
    _db: &SieveDb,
    profile: &DbProfile,
    ctx: &DetectContext<'_>,
) -> Result<Vec<GemCandidate>, DbError> {
    // Bulk senders ARE the marketers, not leads
    if ctx.is_bulk(&profile.sender_domain) {
        return Ok(Vec::new());
    }
    if profile.total_messages < 3 || profile.industry.is_empty() {
        return Ok(Vec::new());
    }

    let soph = profile.marketing_sophistication_avg;
    let size = profile.company_size.as_str();
    if soph > 5.0 || size == "enterprise" {
        return Ok(Vec::new());
    }

    let mut score = 30;
    let mut signals = Vec::new();
    if soph <= 3.0 {
        signals.push(GemSignal::new(
            "low_sophistication",
            format!("Marketing sophistication: {soph:.1}/10"),
        ));
        score += 20;
    } else {
        signals.push(GemSignal::new(
            "moderate_sophistication",
            format!("Marketing sophistication: {soph:.1}/10"),
        ));
        score += 10;
    }
    match size {
        "small" => score += 10,
        "medium" => score += 5,
        _ => {}
    }

    let estimated_value = if size == "medium" {
        EstimatedValue::MediumHigh
    } else {
        EstimatedValue::Medium
    };

    Ok(vec![GemCandidate {
        gem_type: GemType::WeakMarketingLead,
        thread_id: None,
        score: score.min(100),
        explanation: GemExplanation {
            summary: format!(
                "{} ({}) has marketing gaps you could address.",
                profile.company_name, profile.sender_domain
            ),
            signals,
            confidence: 0.7,
            estimated_value,
            urgency: Urgency::Low,
        },
        recommended_actions: vec!["Send audit-style outreach highlighting specific gaps".into()],
        source_message_ids: Vec::new(),
    }])
}

pub fn detect_partner_program(
    _db: &SieveDb,
    profile: &DbProfile,
    _ctx: &DetectContext<'_>,
) -> Result<Vec<GemCandidate>, DbError> {
    if !profile.has_partner_program {
        return Ok(Vec::new());
    }

    let mut score = 40;
    let mut signals = vec![GemSignal::new(
        "partner_program_detected",
        "Partner/affiliate program links found",
    )];
    if !profile.partner_program_urls.is_empty() {
        signals.push(GemSignal::new(
            "direct_urls",
            format!("{} partner program URL(s)", profile.partner_program_urls.len()),
        ));
        score += 15;
    }

    Ok(vec![GemCandidate {
        gem_type: GemType::PartnerProgram,
        thread_id: None,
        score: score.min(100),
        explanation: GemExplanation {
            summary: format!(
                "{} has a partner/affiliate program you could join.",
                profile.company_name
            ),
            signals,
            confidence: 0.8,
            estimated_value: EstimatedValue::Medium,
            urgency: Urgency::Low,
        },
        recommended_actions: vec![
            "Apply to partner program".into(),
            "Review commission structure".into(),
        ],
        source_message_ids: Vec::new(),
    }])
}

pub fn detect_renewal_leverage(
    _db: &SieveDb,
    profile: &DbProfile,
    ctx: &DetectContext<'_>,
) -> Result<Vec<GemCandidate>, DbError> {
    if ctx.is_bulk(&profile.sender_domain) {
        return Ok(Vec::new());
    }
    let in_spend_map = profile.has_segment("spend_map");
    if profile.renewal_dates.is_empty() && !in_spend_map {
        return Ok(Vec::new());
    }

    let mut score = 35;
    let mut signals = Vec::new();
    if !profile.renewal_dates.is_empty() {
        signals.push(GemSignal::new(
            "renewal_dates",
            format!("Renewal dates found: {}", profile.renewal_dates.join(", ")),
        ));
        score += 20;
    }
    if in_spend_map {
        signals.push(GemSignal::new("active_vendor", "You're an active customer"));
        score += 10;
    }

    let estimated_value = if profile.monetary_signals.is_empty() {
        EstimatedValue::Medium
    } else {
        EstimatedValue::High
    };
    let urgency = if profile.renewal_dates.is_empty() {
        Urgency::Medium
    } else {
        Urgency::High
    };

    Ok(vec![GemCandidate {
        gem_type: GemType::RenewalLeverage,
        thread_id: None,
        score: score.min(100),
        explanation: GemExplanation {
            summary: format!(
                "Upcoming renewal window with {} — negotiation opportunity.",
                profile.company_name
            ),
            signals,
            confidence: 0.75,
            estimated_value,
            urgency,
        },
        recommended_actions: vec![
            "Prepare negotiation strategy".into(),
            "Research competitive alternatives".into(),
        ],
        source_message_ids: Vec::new(),
    }])
}

pub fn detect_distribution_channel(
    db: &SieveDb,
    profile: &DbProfile,
    _ctx: &DetectContext<'_>,
) -> Result<Vec<GemCandidate>, DbError> {
    if !profile.has_segment("distribution_map") {
        return Ok(Vec::new());
    }

    let mut score = 30;
    let mut signals = vec![GemSignal::new(
        "distribution_channel",
        "Sender is a newsletter/event/community",
    )];
    if profile.total_messages > 10 {
        signals.push(GemSignal::new(
            "active_publication",
            format!("{} messages received", profile.total_messages),
        ));
        score += 15;
    }

    // Channels asking for guest content or sponsors are actionable now
    let content = db.content_for_domain(&profile.sender_domain, true, None)?;
    for cr in &content {
        if let Some(m) = distribution_content_patterns()
            .iter()
            .find_map(|p| p.find(&cr.body_clean))
        {
            signals.push(GemSignal::new(
                "content_opportunity",
                m.as_str().chars().take(80).collect::<String>(),
            ));
            score += 15;
        }
    }

    let estimated_value = if profile.total_messages > 10 {
        EstimatedValue::Medium
    } else {
        EstimatedValue::Low
    };

    Ok(vec![GemCandidate {
        gem_type: GemType::DistributionChannel,
        thread_id: None,
        score: score.min(100),
        explanation: GemExplanation {
            summary: format!(
                "{} could amplify your reach through their audience.",
                profile.company_name
            ),
            signals,
            confidence: 0.65,
            estimated_value,
            urgency: Urgency::Low,
        },
        recommended_actions: vec!["Pitch guest content or sponsorship".into()],
        source_message_ids: Vec::new(),
    }])
}

const AUDIENCE_STOP_WORDS: &[&str] = &[
    "and", "the", "for", "to", "of", "a", "an", "in", "on", "with", "who", "that", "are", "is",
];

pub fn detect_co_marketing(
    _db: &SieveDb,
    profile: &DbProfile,
    ctx: &DetectContext<'_>,
) -> Result<Vec<GemCandidate>, DbError> {
    if profile.industry.is_empty() || profile.target_audience.is_empty() {
        return Ok(Vec::new());
    }
    // Enterprise senders play in a different league
    if profile.company_size == "enterprise" {
        return Ok(Vec::new());
    }

    let user_keywords: BTreeSet<String> = ctx
        .config
        .user_context
        .audience_keywords
        .iter()
        .flat_map(|k| k.to_lowercase().split_whitespace().map(String::from).collect::<Vec<_>>())
        .filter(|w| !AUDIENCE_STOP_WORDS.contains(&w.as_str()))
        .collect();
    if user_keywords.is_empty() {
        return Ok(Vec::new());
    }

    let target_keywords: BTreeSet<String> = profile
        .target_audience
        .to_lowercase()
        .split_whitespace()
        .map(String::from)
        .filter(|w| !AUDIENCE_STOP_WORDS.contains(&w.as_str()))
        .collect();

    let overlap: Vec<&String> = user_keywords.intersection(&target_keywords).collect();
    if overlap.len() < 2 {
        return Ok(Vec::new());
    }

    let shared: Vec<&str> = overlap.iter().take(5).map(|s| s.as_str()).collect();
    let mut signals = vec![
        GemSignal::new(
            "audience_overlap",
            format!("Shared keywords: {}", shared.join(", ")),
        ),
        GemSignal::new("target_audience", profile.target_audience.clone()),
    ];
    if ["newsletter", "event", "webinar"]
        .iter()
        .any(|k| profile.offer_type_distribution.contains_key(*k))
    {
        signals.push(GemSignal::new(
            "has_distribution",
            "Has newsletter/event distribution",
        ));
    }

    let score = 35 + overlap.len() as i64 * 5;
    Ok(vec![GemCandidate {
        gem_type: GemType::CoMarketing,
        thread_id: None,
        score: score.min(100),
        explanation: GemExplanation {
            summary: format!(
                "{} targets a similar audience — co-marketing opportunity.",
                profile.company_name
            ),
            signals,
            confidence: 0.6,
            estimated_value: EstimatedValue::Medium,
            urgency: Urgency::Low,
        },
        recommended_actions: vec![
            "Propose co-marketing campaign".into(),
            "Explore content collaboration".into(),
        ],
        source_message_ids: Vec::new(),
    }])
}

pub fn detect_industry_intel(
    _db: &SieveDb,
    profile: &DbProfile,
    ctx: &DetectContext<'_>,
) -> Result<Vec<GemCandidate>, DbError> {
    if ctx.is_bulk(&profile.sender_domain) {
        return Ok(Vec::new());
    }
    if profile.total_messages < 10 || profile.industry.is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![GemCandidate {
        gem_type: GemType::IndustryIntel,
        thread_id: None,
        score: 20,
        explanation: GemExplanation {
            summary: format!(
                "{} provides market intelligence for the {} industry.",
                profile.company_name, profile.industry
            ),
            signals: vec![GemSignal::new(
                "message_volume",
                format!("{} messages analyzed", profile.total_messages),
            )],
            confidence: 0.5,
            estimated_value: EstimatedValue::Low,
            urgency: Urgency::Low,
        },
        recommended_actions: vec!["Include in industry analysis report".into()],
        source_message_ids: Vec::new(),
    }])
}

pub fn detect_procurement_signal(
    db: &SieveDb,
    profile: &DbProfile,
    _ctx: &DetectContext<'_>,
) -> Result<Vec<GemCandidate>, DbError> {
    let entities = db.entities_for_domain(&profile.sender_domain)?;
    let procurement: Vec<_> = entities
        .iter()
        .filter(|e| e.entity_type == "procurement_signal")
        .collect();
    if procurement.is_empty() {
        return Ok(Vec::new());
    }

    let signals = procurement
        .iter()
        .take(5)
        .map(|e| GemSignal::new("procurement_keyword", e.entity_value.clone()))
        .collect();

    Ok(vec![GemCandidate {
        gem_type: GemType::ProcurementSignal,
        thread_id: None,
        score: 45,
        explanation: GemExplanation {
            summary: format!("Procurement signals detected from {}.", profile.company_name),
            signals,
            confidence: 0.7,
            estimated_value: EstimatedValue::High,
            urgency: Urgency::High,
        },
        recommended_actions: vec![
            "Review procurement context".into(),
            "Prepare response if applicable".into(),
        ],
        source_message_ids: Vec::new(),
    }])
}
