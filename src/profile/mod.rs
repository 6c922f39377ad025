//! Sender profile aggregation.
//!
//! Builds one `sender_profiles` row per sender domain by folding together
//! message headers, parsed content, extracted entities, AI classifications,
//! and thread structure. Profiles are the single input surface for
//! relationship classification, gem detection, and scoring; nothing
//! downstream reads the message tables for aggregates.

pub mod thread_metrics;

pub use thread_metrics::compute_thread_metrics;

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::db::{DbClassification, DbError, DbProfile, SieveDb};
use crate::util::parse_mail_date;

const ENTERPRISE_ESPS: &[&str] = &[
    "HubSpot",
    "Klaviyo",
    "ActiveCampaign",
    "salesforce_mc",
    "Marketo",
    "Pardot",
];
const MID_ESPS: &[&str] = &["SendGrid", "amazon_ses", "postmark", "Mailgun", "SparkPost"];

/// Header- and content-derived inputs for the deterministic score.
#[derive(Debug, Default)]
pub struct SophisticationInputs<'a> {
    pub esp: Option<&'a str>,
    pub has_personalization: bool,
    pub has_utm: bool,
    pub template_complexity: i64,
    pub spf: Option<&'a str>,
    pub dkim: Option<&'a str>,
    pub dmarc: Option<&'a str>,
    pub has_unsubscribe: bool,
    pub unique_campaign_count: usize,
}

/// Deterministic 10-point marketing sophistication score.
///
/// ESP tier contributes 1-3 points, personalization 2, and one point each
/// for UTM tracking, template quality (complexity >= 50), segmentation
/// (>= 3 unique campaigns), full authentication, and a working unsubscribe.
pub fn compute_sophistication_score(inputs: &SophisticationInputs<'_>) -> i64 {
    let mut score = match inputs.esp {
        Some(esp) if ENTERPRISE_ESPS.contains(&esp) => 3,
        Some(esp) if MID_ESPS.contains(&esp) => 2,
        _ => 1,
    };
    if inputs.has_personalization {
        score += 2;
    }
    if inputs.has_utm {
        score += 1;
    }
    if inputs.template_complexity >= 50 {
        score += 1;
    }
    if inputs.unique_campaign_count >= 3 {
        score += 1;
    }
    if inputs.spf == Some("pass") && inputs.dmarc == Some("pass") && inputs.dkim.is_some() {
        score += 1;
    }
    if inputs.has_unsubscribe {
        score += 1;
    }
    score.min(10)
}

/// Build or rebuild profiles for every sender domain. Returns the count of
/// profiles written.
pub fn build_profiles(db: &SieveDb) -> Result<usize, DbError> {
    let domains = db.distinct_sender_domains()?;
    let mut built = 0;
    for domain in domains {
        if build_single_profile(db, &domain)? {
            built += 1;
        }
    }
    log::info!("built {built} sender profiles");
    Ok(built)
}

fn build_single_profile(db: &SieveDb, domain: &str) -> Result<bool, DbError> {
    let mut messages = db.messages_for_domain(domain)?;
    if messages.is_empty() {
        return Ok(false);
    }
    messages.sort_by_key(|m| m.date.as_deref().and_then(parse_mail_date));

    let classifications = db.classifications_for_domain(domain)?;
    let content_rows = db.content_for_domain(domain, false, None)?;
    let meta = db.metadata_for_domain(domain)?;
    let entities = db.entities_for_domain(domain)?;
    let avg_frequency_days = db.avg_frequency_days(domain)?;

    let first = &messages[0];
    let primary_email = (!first.from_address.is_empty()).then(|| first.from_address.clone());
    let reply_to_email = first.reply_to.clone();
    let company_name = infer_company_name(domain, &messages);
    let first_contact = first.date.clone();
    let last_contact = messages.last().and_then(|m| m.date.clone());

    let industry = majority_vote(classifications.iter().map(|c| c.industry.as_str()));
    let company_size = majority_vote(
        classifications
            .iter()
            .map(|c| c.company_size_estimate.as_str()),
    );

    // AI sophistication average and trend, ignoring unscored rows
    let soph_scores: Vec<f64> = classifications
        .iter()
        .filter(|c| c.marketing_sophistication > 0)
        .map(|c| c.marketing_sophistication as f64)
        .collect();
    let ai_soph_avg = if soph_scores.is_empty() {
        0.0
    } else {
        soph_scores.iter().sum::<f64>() / soph_scores.len() as f64
    };
    let soph_trend = sophistication_trend(&soph_scores);

    // Most recent classification wins for product fields
    let latest = classifications.last();
    let product_type = latest.map(|c| c.product_type.clone()).unwrap_or_default();
    let product_description = latest
        .map(|c| c.product_description.clone())
        .unwrap_or_default();
    let pain_points = latest.map(|c| c.pain_points.clone()).unwrap_or_default();
    let target_audience = latest
        .map(|c| c.target_audience.clone())
        .unwrap_or_default();

    // Fold content rows
    let mut offer_dist: HashMap<String, i64> = HashMap::new();
    let mut all_ctas: Vec<String> = Vec::new();
    let mut all_utm_names: Vec<String> = Vec::new();
    let mut has_personalization = false;
    let mut social_links: HashMap<String, String> = HashMap::new();
    let mut physical_address: Option<String> = None;
    let mut partner_urls: BTreeSet<String> = BTreeSet::new();
    let mut max_template_complexity = 0i64;

    for cr in &content_rows {
        for offer in &cr.offer_types {
            *offer_dist.entry(offer.clone()).or_insert(0) += 1;
        }
        all_ctas.extend(cr.cta_texts.iter().cloned());
        if cr.has_personalization {
            has_personalization = true;
        }
        social_links.extend(cr.social_links.clone());
        for utm in &cr.utm_campaigns {
            if let Some(name) = utm.get("utm_campaign") {
                all_utm_names.push(name.clone());
            }
        }
        if cr.has_physical_address {
            if let Some(text) = &cr.physical_address_text {
                physical_address = Some(text.clone());
            }
        }
        if let Some(urls) = cr.link_intents.get("partner_program") {
            partner_urls.extend(urls.iter().cloned());
        }
        max_template_complexity = max_template_complexity.max(cr.template_complexity_score);
    }

    // Known contacts from person entities, deduped by name
    let mut known_contacts = Vec::new();
    let mut seen_names: HashSet<&str> = HashSet::new();
    for ent in &entities {
        if ent.entity_type == "person" && seen_names.insert(&ent.entity_value) {
            let role = match &ent.entity_normalized {
                Some(norm) if norm != &ent.entity_value => norm.clone(),
                _ => String::new(),
            };
            known_contacts.push(crate::types::KnownContact {
                name: ent.entity_value.clone(),
                email: String::new(),
                role,
            });
        }
    }

    let monetary_signals: Vec<crate::types::MonetarySignal> = entities
        .iter()
        .filter(|e| e.entity_type == "money")
        .map(|e| crate::types::MonetarySignal {
            amount: e.entity_value.clone(),
            context: e.context.clone().unwrap_or_default(),
        })
        .collect();

    let renewal_dates: Vec<String> = entities
        .iter()
        .filter(|e| {
            e.entity_type == "date"
                && matches!(e.context.as_deref(), Some("renewal") | Some("expiration"))
        })
        .map(|e| e.entity_value.clone())
        .collect();

    let has_partner_program = !partner_urls.is_empty()
        || classifications.iter().any(|c| c.partner_program_detected);

    let authentication_quality = authentication_quality(meta.as_ref());
    let meta = meta.unwrap_or_default();

    let unique_campaigns: BTreeSet<&String> = all_utm_names.iter().collect();
    let det_score = compute_sophistication_score(&SophisticationInputs {
        esp: meta.esp_identified.as_deref(),
        has_personalization,
        has_utm: !all_utm_names.is_empty(),
        template_complexity: max_template_complexity,
        spf: meta.spf_result.as_deref(),
        dkim: meta.dkim_domain.as_deref(),
        dmarc: meta.dmarc_result.as_deref(),
        has_unsubscribe: meta
            .list_unsubscribe_url
            .as_deref()
            .is_some_and(|u| !u.is_empty()),
        unique_campaign_count: unique_campaigns.len(),
    });
    let marketing_sophistication_avg = if ai_soph_avg > 0.0 {
        0.6 * det_score as f64 + 0.4 * ai_soph_avg
    } else {
        det_score as f64
    };

    let economic_segments = determine_segments(
        &classifications,
        &offer_dist,
        has_partner_program,
        !renewal_dates.is_empty(),
    );

    let metrics = compute_thread_metrics(db, domain)?;

    // Dedupe CTAs preserving first occurrence, keep a bounded sample
    let mut seen_ctas = HashSet::new();
    let cta_texts_all: Vec<String> = all_ctas
        .into_iter()
        .filter(|c| seen_ctas.insert(c.clone()))
        .take(50)
        .collect();

    let utm_campaign_names: Vec<String> = unique_campaigns.into_iter().cloned().collect();

    db.upsert_profile(&DbProfile {
        sender_domain: domain.to_string(),
        company_name,
        primary_email,
        reply_to_email,
        industry,
        company_size,
        marketing_sophistication_avg,
        marketing_sophistication_trend: soph_trend,
        esp_used: meta.esp_identified.clone(),
        product_type,
        product_description,
        pain_points,
        target_audience,
        known_contacts,
        total_messages: messages.len() as i64,
        first_contact,
        last_contact,
        avg_frequency_days,
        offer_type_distribution: offer_dist,
        cta_texts_all,
        social_links,
        physical_address,
        utm_campaign_names,
        has_personalization,
        has_partner_program,
        partner_program_urls: partner_urls.into_iter().collect(),
        renewal_dates,
        monetary_signals,
        authentication_quality,
        unsubscribe_url: meta.list_unsubscribe_url.clone(),
        economic_segments,
        thread_initiation_ratio: metrics.initiation_ratio,
        user_reply_rate: metrics.reply_rate,
    })?;

    Ok(true)
}

/// Trend over AI sophistication scores in arrival order. Needs at least
/// three samples; compares second-half mean against first-half mean.
fn sophistication_trend(scores: &[f64]) -> String {
    if scores.len() < 3 {
        return "stable".into();
    }
    let mid = scores.len() / 2;
    let first: f64 = scores[..mid].iter().sum::<f64>() / mid as f64;
    let second: f64 = scores[mid..].iter().sum::<f64>() / (scores.len() - mid) as f64;
    if second - first > 1.0 {
        "improving".into()
    } else if first - second > 1.0 {
        "declining".into()
    } else {
        "stable".into()
    }
}

fn authentication_quality(meta: Option<&crate::db::DbMetadata>) -> String {
    let Some(meta) = meta else {
        return "unknown".into();
    };
    let passing = [&meta.spf_result, &meta.dmarc_result]
        .iter()
        .filter(|r| r.as_deref() == Some("pass"))
        .count();
    let has_dkim = meta.dkim_domain.as_deref().is_some_and(|d| !d.is_empty());
    if passing == 2 && has_dkim {
        "excellent".into()
    } else if passing >= 1 || has_dkim {
        "good".into()
    } else {
        "poor".into()
    }
}

/// Coarse economic segments from classification intents and offer mix.
pub(crate) fn determine_segments(
    classifications: &[DbClassification],
    offer_dist: &HashMap<String, i64>,
    has_partner_program: bool,
    has_renewal_dates: bool,
) -> Vec<String> {
    let primary_intent = majority_vote(
        classifications
            .iter()
            .map(|c| c.sender_intent.as_str()),
    );

    let mut segments = Vec::new();
    if primary_intent == "transactional" || offer_dist.contains_key("renewal") || has_renewal_dates
    {
        segments.push("spend_map".into());
    }
    if has_partner_program || offer_dist.contains_key("partnership") {
        segments.push("partner_map".into());
    }
    if matches!(
        primary_intent.as_str(),
        "promotional" | "nurture_sequence" | "cold_outreach"
    ) {
        segments.push("prospect_map".into());
    }
    if matches!(
        primary_intent.as_str(),
        "newsletter" | "event_invitation" | "community"
    ) {
        segments.push("distribution_map".into());
    }
    if primary_intent == "procurement" || offer_dist.contains_key("procurement") {
        segments.push("procurement_map".into());
    }
    segments
}

/// Most common non-empty value; ties break toward earliest first occurrence.
fn majority_vote<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for v in values {
        if v.is_empty() {
            continue;
        }
        let entry = counts.entry(v).or_insert(0);
        if *entry == 0 {
            order.push(v);
        }
        *entry += 1;
    }
    let mut best = "";
    let mut best_count = 0;
    for v in order {
        if counts[v] > best_count {
            best = v;
            best_count = counts[v];
        }
    }
    best.to_string()
}

/// Company name from the most common human sender display name, falling
/// back to the domain's first label.
fn infer_company_name(domain: &str, messages: &[crate::db::DbMessage]) -> String {
    let names = messages
        .iter()
        .filter(|m| !m.from_name.is_empty() && !m.from_name.contains('@'))
        .map(|m| m.from_name.as_str());
    let voted = majority_vote(names);
    if !voted.is_empty() {
        return voted;
    }
    let label = domain.split('.').next().unwrap_or(domain);
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => domain.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    #[test]
    fn sophistication_score_components() {
        let base = SophisticationInputs::default();
        assert_eq!(compute_sophistication_score(&base), 1);

        let maxed = SophisticationInputs {
            esp: Some("HubSpot"),
            has_personalization: true,
            has_utm: true,
            template_complexity: 75,
            spf: Some("pass"),
            dkim: Some("k1.example.com"),
            dmarc: Some("pass"),
            has_unsubscribe: true,
            unique_campaign_count: 4,
        };
        assert_eq!(compute_sophistication_score(&maxed), 10);

        let mid_esp = SophisticationInputs {
            esp: Some("SendGrid"),
            ..Default::default()
        };
        assert_eq!(compute_sophistication_score(&mid_esp), 2);

        // partial auth earns nothing
        let partial_auth = SophisticationInputs {
            spf: Some("pass"),
            dmarc: Some("fail"),
            dkim: Some("k1"),
            ..Default::default()
        };
        assert_eq!(compute_sophistication_score(&partial_auth), 1);
    }

    #[test]
    fn trend_needs_three_samples() {
        assert_eq!(sophistication_trend(&[2.0, 8.0]), "stable");
        assert_eq!(sophistication_trend(&[2.0, 2.0, 6.0, 7.0]), "improving");
        assert_eq!(sophistication_trend(&[8.0, 8.0, 3.0, 2.0]), "declining");
        assert_eq!(sophistication_trend(&[5.0, 5.0, 5.0]), "stable");
    }

    #[test]
    fn majority_vote_ignores_empty_and_breaks_ties_by_order() {
        let values = ["", "saas", "fintech", "saas"];
        assert_eq!(majority_vote(values.iter().copied()), "saas");
        let tied = ["fintech", "saas"];
        assert_eq!(majority_vote(tied.iter().copied()), "fintech");
        assert_eq!(majority_vote(std::iter::empty()), "");
    }

    #[test]
    fn segments_from_intent_and_offers() {
        let classify = |intent: &str| DbClassification {
            sender_intent: intent.into(),
            ..Default::default()
        };
        let empty = HashMap::new();

        let segs = determine_segments(&[classify("transactional")], &empty, false, false);
        assert_eq!(segs, vec!["spend_map"]);

        let segs = determine_segments(&[classify("newsletter")], &empty, true, false);
        assert_eq!(segs, vec!["partner_map", "distribution_map"]);

        let segs = determine_segments(&[classify("cold_outreach")], &empty, false, false);
        assert_eq!(segs, vec!["prospect_map"]);

        let mut offers = HashMap::new();
        offers.insert("procurement".to_string(), 1i64);
        let segs = determine_segments(&[], &offers, false, true);
        assert_eq!(segs, vec!["spend_map", "procurement_map"]);
    }

    #[test]
    fn builds_profile_from_fixture_rows() {
        let db = test_db();
        db.conn_ref()
            .execute_batch(
                "INSERT INTO messages (message_id, thread_id, date, from_address, from_name, is_sent)
                 VALUES ('m1', 't1', '2024-01-01T10:00:00Z', 'amy@acme.com', 'Acme Inc', 0),
                        ('m2', 't1', '2024-02-01T10:00:00Z', 'amy@acme.com', 'Acme Inc', 0);
                 INSERT INTO parsed_metadata (message_id, sender_domain, esp_identified, spf_result, dmarc_result, dkim_domain, list_unsubscribe_url)
                 VALUES ('m1', 'acme.com', 'Klaviyo', 'pass', 'pass', 'k.acme.com', 'https://u.acme.com'),
                        ('m2', 'acme.com', 'Klaviyo', 'pass', 'pass', 'k.acme.com', 'https://u.acme.com');
                 INSERT INTO parsed_content (message_id, offer_types, cta_texts, has_personalization, template_complexity_score)
                 VALUES ('m1', '[\"newsletter\"]', '[\"Read more\"]', 1, 60),
                        ('m2', '[\"newsletter\"]', '[\"Read more\"]', 0, 20);
                 INSERT INTO ai_classification (message_id, industry, company_size_estimate, marketing_sophistication, sender_intent)
                 VALUES ('m1', 'saas', 'small', 6, 'newsletter'),
                        ('m2', 'saas', 'small', 6, 'newsletter');
                 INSERT INTO threads (thread_id, user_participated, message_count)
                 VALUES ('t1', 0, 2);",
            )
            .unwrap();

        assert_eq!(build_profiles(&db).unwrap(), 1);
        let profile = db.get_profile("acme.com").unwrap().unwrap();
        assert_eq!(profile.company_name, "Acme Inc");
        assert_eq!(profile.industry, "saas");
        assert_eq!(profile.company_size, "small");
        assert_eq!(profile.total_messages, 2);
        assert_eq!(profile.authentication_quality, "excellent");
        assert!(profile.has_segment("distribution_map"));
        assert_eq!(profile.thread_initiation_ratio, Some(0.0));
        assert_eq!(profile.user_reply_rate, Some(0.0));
        // ESP 3 + personalization 2 + template 1 + auth 1 + unsubscribe 1 = 8
        // blended 0.6 * 8 + 0.4 * 6 = 7.2
        assert!((profile.marketing_sophistication_avg - 7.2).abs() < 1e-9);
        assert_eq!(profile.marketing_sophistication_trend, "stable");
    }
}
