//! Persistence for `sender_profiles` rows.

use rusqlite::params;

use super::{DbError, DbProfile, SieveDb};
use crate::util::parse_json_or_default;

impl SieveDb {
    /// Insert or replace the profile for a sender domain. Collection fields
    /// are serialized to JSON columns; serialization of these types cannot
    /// fail so errors surface as SQLite errors only.
    pub fn upsert_profile(&self, profile: &DbProfile) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sender_profiles (
                sender_domain, company_name, primary_email, reply_to_email,
                industry, company_size,
                marketing_sophistication_avg, marketing_sophistication_trend,
                esp_used, product_type, product_description, pain_points,
                target_audience, known_contacts, total_messages,
                first_contact, last_contact, avg_frequency_days,
                offer_type_distribution, cta_texts_all, social_links,
                physical_address, utm_campaign_names, has_personalization,
                has_partner_program, partner_program_urls, renewal_dates,
                monetary_signals, authentication_quality, unsubscribe_url,
                economic_segments, thread_initiation_ratio, user_reply_rate
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                ?27, ?28, ?29, ?30, ?31, ?32, ?33
            )",
            params![
                profile.sender_domain,
                profile.company_name,
                profile.primary_email,
                profile.reply_to_email,
                profile.industry,
                profile.company_size,
                profile.marketing_sophistication_avg,
                profile.marketing_sophistication_trend,
                profile.esp_used,
                profile.product_type,
                profile.product_description,
                serde_json::to_string(&profile.pain_points).unwrap_or_default(),
                profile.target_audience,
                serde_json::to_string(&profile.known_contacts).unwrap_or_default(),
                profile.total_messages,
                profile.first_contact,
                profile.last_contact,
                profile.avg_frequency_days,
                serde_json::to_string(&profile.offer_type_distribution).unwrap_or_default(),
                serde_json::to_string(&profile.cta_texts_all).unwrap_or_default(),
                serde_json::to_string(&profile.social_links).unwrap_or_default(),
                profile.physical_address,
                serde_json::to_string(&profile.utm_campaign_names).unwrap_or_default(),
                profile.has_personalization,
                profile.has_partner_program,
                serde_json::to_string(&profile.partner_program_urls).unwrap_or_default(),
                serde_json::to_string(&profile.renewal_dates).unwrap_or_default(),
                serde_json::to_string(&profile.monetary_signals).unwrap_or_default(),
                profile.authentication_quality,
                profile.unsubscribe_url,
                serde_json::to_string(&profile.economic_segments).unwrap_or_default(),
                profile.thread_initiation_ratio,
                profile.user_reply_rate,
            ],
        )?;
        Ok(())
    }

    /// Load a single profile, decoding JSON columns once.
    pub fn get_profile(&self, domain: &str) -> Result<Option<DbProfile>, DbError> {
        let mut stmt = self.conn.prepare(PROFILE_SELECT)?;
        let mut rows = stmt.query_map(params![domain], profile_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Load every stored profile.
    pub fn list_profiles(&self) -> Result<Vec<DbProfile>, DbError> {
        let sql = PROFILE_SELECT.replace("WHERE sender_domain = ?1", "");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], profile_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

const PROFILE_SELECT: &str = "SELECT
        sender_domain, company_name, primary_email, reply_to_email,
        industry, company_size,
        marketing_sophistication_avg, marketing_sophistication_trend,
        esp_used, product_type, product_description, pain_points,
        target_audience, known_contacts, total_messages,
        first_contact, last_contact, avg_frequency_days,
        offer_type_distribution, cta_texts_all, social_links,
        physical_address, utm_campaign_names, has_personalization,
        has_partner_program, partner_program_urls, renewal_dates,
        monetary_signals, authentication_quality, unsubscribe_url,
        economic_segments, thread_initiation_ratio, user_reply_rate
     FROM sender_profiles WHERE sender_domain = ?1";

fn profile_from_row(row: &rusqlite::Row<'_>) -> Result<DbProfile, rusqlite::Error> {
    Ok(DbProfile {
        sender_domain: row.get(0)?,
        company_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        primary_email: row.get(2)?,
        reply_to_email: row.get(3)?,
        industry: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        company_size: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        marketing_sophistication_avg: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
        marketing_sophistication_trend: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        esp_used: row.get(8)?,
        product_type: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        product_description: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        pain_points: parse_json_or_default(row.get::<_, Option<String>>(11)?.as_deref()),
        target_audience: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
        known_contacts: parse_json_or_default(row.get::<_, Option<String>>(13)?.as_deref()),
        total_messages: row.get::<_, Option<i64>>(14)?.unwrap_or(0),
        first_contact: row.get(15)?,
        last_contact: row.get(16)?,
        avg_frequency_days: row.get(17)?,
        offer_type_distribution: parse_json_or_default(row.get::<_, Option<String>>(18)?.as_deref()),
        cta_texts_all: parse_json_or_default(row.get::<_, Option<String>>(19)?.as_deref()),
        social_links: parse_json_or_default(row.get::<_, Option<String>>(20)?.as_deref()),
        physical_address: row.get(21)?,
        utm_campaign_names: parse_json_or_default(row.get::<_, Option<String>>(22)?.as_deref()),
        has_personalization: row.get::<_, Option<bool>>(23)?.unwrap_or(false),
        has_partner_program: row.get::<_, Option<bool>>(24)?.unwrap_or(false),
        partner_program_urls: parse_json_or_default(row.get::<_, Option<String>>(25)?.as_deref()),
        renewal_dates: parse_json_or_default(row.get::<_, Option<String>>(26)?.as_deref()),
        monetary_signals: parse_json_or_default(row.get::<_, Option<String>>(27)?.as_deref()),
        authentication_quality: row.get::<_, Option<String>>(28)?.unwrap_or_default(),
        unsubscribe_url: row.get(29)?,
        economic_segments: parse_json_or_default(row.get::<_, Option<String>>(30)?.as_deref()),
        thread_initiation_ratio: row.get(31)?,
        user_reply_rate: row.get(32)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;
    use crate::types::MonetarySignal;

    #[test]
    fn profile_round_trips_through_json_columns() {
        let db = test_db();
        let profile = DbProfile {
            sender_domain: "acme.com".into(),
            company_name: "Acme".into(),
            industry: "saas".into(),
            company_size: "small".into(),
            marketing_sophistication_avg: 4.2,
            marketing_sophistication_trend: "improving".into(),
            pain_points: vec!["churn".into()],
            total_messages: 7,
            economic_segments: vec!["prospect_map".into()],
            monetary_signals: vec![MonetarySignal {
                amount: "$5,000".into(),
                context: "proposed budget".into(),
            }],
            thread_initiation_ratio: Some(0.25),
            user_reply_rate: Some(0.75),
            ..Default::default()
        };
        db.upsert_profile(&profile).unwrap();

        let loaded = db.get_profile("acme.com").unwrap().unwrap();
        assert_eq!(loaded.company_name, "Acme");
        assert_eq!(loaded.pain_points, vec!["churn".to_string()]);
        assert_eq!(loaded.monetary_signals.len(), 1);
        assert_eq!(loaded.monetary_signals[0].amount, "$5,000");
        assert_eq!(loaded.thread_initiation_ratio, Some(0.25));
        assert!(loaded.has_segment("prospect_map"));
        assert!(!loaded.has_segment("spend_map"));

        // upsert replaces, not duplicates
        db.upsert_profile(&profile).unwrap();
        assert_eq!(db.list_profiles().unwrap().len(), 1);
    }

    #[test]
    fn missing_profile_is_none() {
        let db = test_db();
        assert!(db.get_profile("nowhere.com").unwrap().is_none());
    }
}
