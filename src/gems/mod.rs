//! Gem detection orchestration.
//!
//! Runs the detector table over every profiled sender, filters candidates
//! through relationship eligibility, and rebuilds the `gems` table inside
//! one transaction. Re-running detection always yields the same rows for
//! the same inputs.

pub mod detectors;
pub mod eligibility;

pub use eligibility::{eligible_gems, is_eligible, ACTIVE_GEM_TYPES};

use std::collections::HashSet;

use crate::config::Config;
use crate::db::{DbError, DbProfile, SieveDb};
use crate::types::{GemCandidate, GemType, RelationshipType};

use detectors::DetectContext;

type DetectorFn =
    fn(&SieveDb, &DbProfile, &DetectContext<'_>) -> Result<Vec<GemCandidate>, DbError>;

/// The active detectors, in the order they run. `GemType::VendorUpsell`
/// has no entry here; the variant exists only so stored rows still parse.
const DETECTORS: &[(GemType, DetectorFn)] = &[
    (GemType::DormantWarmThread, detectors::detect_dormant_warm_thread),
    (GemType::UnansweredAsk, detectors::detect_unanswered_ask),
    (GemType::WeakMarketingLead, detectors::detect_weak_marketing_lead),
    (GemType::PartnerProgram, detectors::detect_partner_program),
    (GemType::RenewalLeverage, detectors::detect_renewal_leverage),
    (GemType::DistributionChannel, detectors::detect_distribution_channel),
    (GemType::CoMarketing, detectors::detect_co_marketing),
    (GemType::IndustryIntel, detectors::detect_industry_intel),
    (GemType::ProcurementSignal, detectors::detect_procurement_signal),
];

/// Detect gems for every profiled sender, replacing all existing gems.
/// Returns the number of gems written.
pub fn detect_gems(db: &SieveDb, config: &Config) -> Result<usize, DbError> {
    db.with_transaction(|db| {
        db.clear_gems()?;

        let bulk_senders: HashSet<String> = db.bulk_sender_domains()?;
        let excluded = db.excluded_domains()?;
        let ctx = DetectContext {
            config,
            bulk_senders: &bulk_senders,
        };

        let mut written = 0;
        for profile in db.list_profiles()? {
            let domain = &profile.sender_domain;
            if excluded.contains(domain) {
                continue;
            }

            let relationship = db.get_relationship(domain)?;
            if relationship.as_ref().is_some_and(|r| r.suppress_gems) {
                continue;
            }
            let rel_type = relationship
                .map(|r| r.relationship_type)
                .unwrap_or(RelationshipType::Unknown);

            for (gem_type, detect) in DETECTORS {
                if !is_eligible(rel_type, *gem_type) {
                    continue;
                }
                for candidate in detect(db, &profile, &ctx)? {
                    db.insert_gem(domain, &candidate)?;
                    written += 1;
                }
            }
        }

        log::info!("detected {written} gems");
        Ok(written)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::types::RelationshipSource;
    use rusqlite::params;

    fn seed_profile(db: &SieveDb, profile: DbProfile) {
        db.upsert_profile(&profile).unwrap();
    }

    fn partner_profile(domain: &str) -> DbProfile {
        DbProfile {
            sender_domain: domain.into(),
            company_name: "Partner Co".into(),
            has_partner_program: true,
            partner_program_urls: vec!["https://p.example/partners".into()],
            ..Default::default()
        }
    }

    #[test]
    fn unknown_sender_gets_all_eligible_detectors() {
        let db = test_db();
        seed_profile(&db, partner_profile("p.com"));

        let n = detect_gems(&db, &Config::default()).unwrap();
        assert_eq!(n, 1);
        let gems = db.gems_for_domain("p.com").unwrap();
        assert_eq!(gems[0].gem_type, "partner_program");
        // 40 base + 15 for direct URLs
        assert_eq!(gems[0].score, 55);
    }

    #[test]
    fn eligibility_filters_by_relationship() {
        let db = test_db();
        seed_profile(&db, partner_profile("p.com"));
        // service providers admit only renewal_leverage
        db.upsert_relationship(
            "p.com",
            RelationshipType::MyServiceProvider,
            None,
            false,
            RelationshipSource::Manual,
        )
        .unwrap();

        assert_eq!(detect_gems(&db, &Config::default()).unwrap(), 0);
    }

    #[test]
    fn suppressed_relationships_yield_nothing() {
        let db = test_db();
        seed_profile(&db, partner_profile("p.com"));
        db.upsert_relationship(
            "p.com",
            RelationshipType::Unknown,
            None,
            true,
            RelationshipSource::Manual,
        )
        .unwrap();

        assert_eq!(detect_gems(&db, &Config::default()).unwrap(), 0);
    }

    #[test]
    fn excluded_domains_are_skipped() {
        let db = test_db();
        seed_profile(&db, partner_profile("p.com"));
        db.conn_ref()
            .execute(
                "INSERT INTO domain_exclusions (domain, reason) VALUES ('p.com', 'own company')",
                [],
            )
            .unwrap();

        assert_eq!(detect_gems(&db, &Config::default()).unwrap(), 0);
    }

    #[test]
    fn detection_is_idempotent() {
        let db = test_db();
        seed_profile(&db, partner_profile("p.com"));

        detect_gems(&db, &Config::default()).unwrap();
        let first = db.list_gems().unwrap();
        // a draft referencing the gem must not block re-detection
        db.conn_ref()
            .execute(
                "INSERT INTO engagement_drafts (gem_id, sender_domain, strategy)
                 VALUES (?1, 'p.com', 'apply')",
                params![first[0].id],
            )
            .unwrap();

        detect_gems(&db, &Config::default()).unwrap();
        let second = db.list_gems().unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn renewal_leverage_for_vendor_with_dates() {
        let db = test_db();
        seed_profile(
            &db,
            DbProfile {
                sender_domain: "v.com".into(),
                company_name: "Vendor".into(),
                economic_segments: vec!["spend_map".into()],
                renewal_dates: vec!["2026-10-01".into()],
                monetary_signals: vec![crate::types::MonetarySignal {
                    amount: "$1,200/yr".into(),
                    context: "renewal".into(),
                }],
                ..Default::default()
            },
        );
        db.upsert_relationship(
            "v.com",
            RelationshipType::MyVendor,
            None,
            false,
            RelationshipSource::Manual,
        )
        .unwrap();

        detect_gems(&db, &Config::default()).unwrap();
        let gems = db.gems_for_domain("v.com").unwrap();
        assert_eq!(gems.len(), 1);
        assert_eq!(gems[0].gem_type, "renewal_leverage");
        // 35 + 20 dates + 10 spend_map
        assert_eq!(gems[0].score, 65);
        let exp = gems[0].explanation.as_ref().unwrap();
        assert_eq!(exp.estimated_value, crate::types::EstimatedValue::High);
        assert_eq!(exp.urgency, crate::types::Urgency::High);
    }

    #[test]
    fn bulk_sender_skips_lead_detectors() {
        let db = test_db();
        seed_profile(
            &db,
            DbProfile {
                sender_domain: "spam.com".into(),
                company_name: "Spam Co".into(),
                industry: "martech".into(),
                company_size: "small".into(),
                marketing_sophistication_avg: 2.0,
                total_messages: 4,
                ..Default::default()
            },
        );
        for i in 0..4 {
            db.conn_ref()
                .execute(
                    "INSERT INTO parsed_metadata (message_id, sender_domain, is_bulk)
                     VALUES (?1, 'spam.com', 1)",
                    params![format!("m{i}")],
                )
                .unwrap();
        }

        assert_eq!(detect_gems(&db, &Config::default()).unwrap(), 0);
    }

    #[test]
    fn weak_marketing_lead_scores_by_sophistication_and_size() {
        let db = test_db();
        seed_profile(
            &db,
            DbProfile {
                sender_domain: "lead.com".into(),
                company_name: "Lead Co".into(),
                industry: "retail".into(),
                company_size: "small".into(),
                marketing_sophistication_avg: 2.5,
                total_messages: 4,
                ..Default::default()
            },
        );

        detect_gems(&db, &Config::default()).unwrap();
        let gems = db.gems_for_domain("lead.com").unwrap();
        assert_eq!(gems.len(), 1);
        // 30 + 20 low sophistication + 10 small
        assert_eq!(gems[0].score, 60);
    }

    #[test]
    fn co_marketing_requires_audience_overlap() {
        let db = test_db();
        seed_profile(
            &db,
            DbProfile {
                sender_domain: "co.com".into(),
                company_name: "Co Co".into(),
                industry: "saas".into(),
                company_size: "small".into(),
                target_audience: "indie saas founders and developers".into(),
                total_messages: 2,
                ..Default::default()
            },
        );

        let mut config = Config::default();
        // no keywords configured: detector stays quiet
        assert_eq!(detect_gems(&db, &config).unwrap(), 0);

        config.user_context.audience_keywords =
            vec!["saas founders".into(), "developers".into()];
        detect_gems(&db, &config).unwrap();
        let gems = db.gems_for_domain("co.com").unwrap();
        assert_eq!(gems.len(), 1);
        assert_eq!(gems[0].gem_type, "co_marketing");
        // 35 + 3 overlapping keywords * 5
        assert_eq!(gems[0].score, 50);
    }
}
