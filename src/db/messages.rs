//! Read-side queries over the ingestion tables.
//!
//! Everything in this file is a pure read; the engine never mutates the
//! message-level tables. JSON columns are decoded here, once, via
//! `parse_json_or_default`.

use std::collections::HashSet;

use rusqlite::params;

use super::{
    DbClassification, DbContent, DbEntity, DbError, DbMessage, DbMetadata, DbThread, SieveDb,
};
use crate::util::parse_json_or_default;

impl SieveDb {
    /// All distinct, non-empty sender domains seen in parsed metadata.
    pub fn distinct_sender_domains(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT sender_domain FROM parsed_metadata WHERE sender_domain != ''",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// All messages whose sender domain matches, in insertion order.
    /// Callers needing chronology sort by parsed date themselves.
    pub fn messages_for_domain(&self, domain: &str) -> Result<Vec<DbMessage>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT m.message_id, m.thread_id, m.date, m.from_address, m.from_name,
                    m.reply_to, m.body_text, m.is_sent
             FROM messages m
             JOIN parsed_metadata pm ON m.message_id = pm.message_id
             WHERE pm.sender_domain = ?1",
        )?;
        let rows = stmt.query_map(params![domain], |row| {
            Ok(DbMessage {
                message_id: row.get(0)?,
                thread_id: row.get(1)?,
                date: row.get(2)?,
                from_address: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                from_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                reply_to: row.get(5)?,
                body_text: row.get(6)?,
                is_sent: row.get::<_, Option<bool>>(7)?.unwrap_or(false),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// All messages in a thread.
    pub fn messages_for_thread(&self, thread_id: &str) -> Result<Vec<DbMessage>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT m.message_id, m.thread_id, m.date, m.from_address, m.from_name,
                    m.reply_to, m.body_text, m.is_sent
             FROM messages m WHERE m.thread_id = ?1",
        )?;
        let rows = stmt.query_map(params![thread_id], |row| {
            Ok(DbMessage {
                message_id: row.get(0)?,
                thread_id: row.get(1)?,
                date: row.get(2)?,
                from_address: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                from_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                reply_to: row.get(5)?,
                body_text: row.get(6)?,
                is_sent: row.get::<_, Option<bool>>(7)?.unwrap_or(false),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Message ids for a thread, used as gem evidence.
    pub fn message_ids_for_thread(&self, thread_id: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT message_id FROM messages WHERE thread_id = ?1")?;
        let rows = stmt.query_map(params![thread_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// (message_id, text) pairs for a thread where text is the cleaned body
    /// when present, else the raw body. Messages with no text are skipped.
    pub fn thread_message_texts(&self, thread_id: &str) -> Result<Vec<(String, String)>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT m.message_id, pc.body_clean, m.body_text, m.date
             FROM messages m
             LEFT JOIN parsed_content pc ON m.message_id = pc.message_id
             WHERE m.thread_id = ?1",
        )?;
        let rows = stmt.query_map(params![thread_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        let mut dated: Vec<(Option<chrono::DateTime<chrono::Utc>>, String, String)> = Vec::new();
        for row in rows {
            let (id, clean, raw, date) = row?;
            let text = match (clean, raw) {
                (Some(c), _) if !c.is_empty() => c,
                (_, Some(r)) if !r.is_empty() => r,
                _ => continue,
            };
            let parsed = date.as_deref().and_then(crate::util::parse_mail_date);
            dated.push((parsed, id, text));
        }
        dated.sort_by_key(|(d, _, _)| *d);
        for (_, id, text) in dated {
            out.push((id, text));
        }
        Ok(out)
    }

    /// Threads containing at least one message from the domain, deduplicated.
    pub fn threads_for_domain(&self, domain: &str) -> Result<Vec<DbThread>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT t.thread_id, t.subject, t.days_dormant, t.awaiting_response_from,
                    t.last_sender, t.user_participated, t.message_count
             FROM threads t
             JOIN messages m ON t.thread_id = m.thread_id
             JOIN parsed_metadata pm ON m.message_id = pm.message_id
             WHERE pm.sender_domain = ?1
             GROUP BY t.thread_id",
        )?;
        let rows = stmt.query_map(params![domain], |row| {
            Ok(DbThread {
                thread_id: row.get(0)?,
                subject: row.get(1)?,
                days_dormant: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                awaiting_response_from: row.get(3)?,
                last_sender: row.get(4)?,
                user_participated: row.get::<_, Option<bool>>(5)?.unwrap_or(false),
                message_count: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// First parsed_metadata row for the domain (auth results are stable per
    /// sender, one sample is enough).
    pub fn metadata_for_domain(&self, domain: &str) -> Result<Option<DbMetadata>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT esp_identified, spf_result, dmarc_result, dkim_domain, list_unsubscribe_url
             FROM parsed_metadata WHERE sender_domain = ?1 LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![domain], |row| {
            Ok(DbMetadata {
                esp_identified: row.get(0)?,
                spf_result: row.get(1)?,
                dmarc_result: row.get(2)?,
                dkim_domain: row.get(3)?,
                list_unsubscribe_url: row.get(4)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Parsed content rows for the domain, JSON columns decoded.
    ///
    /// `inbound_only` restricts to messages the user received; `limit`
    /// bounds the sample for pattern scanning.
    pub fn content_for_domain(
        &self,
        domain: &str,
        inbound_only: bool,
        limit: Option<usize>,
    ) -> Result<Vec<DbContent>, DbError> {
        let mut sql = String::from(
            "SELECT pc.body_clean, pc.offer_types, pc.cta_texts, pc.has_personalization,
                    pc.social_links, pc.utm_campaigns, pc.link_intents,
                    pc.has_physical_address, pc.physical_address_text,
                    pc.template_complexity_score
             FROM parsed_content pc
             JOIN parsed_metadata pm ON pc.message_id = pm.message_id
             JOIN messages m ON pc.message_id = m.message_id
             WHERE pm.sender_domain = ?1",
        );
        if inbound_only {
            sql.push_str(" AND m.is_sent = 0");
        }
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![domain], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<bool>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<bool>>(7)?,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, Option<i64>>(9)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (
                body_clean,
                offer_types,
                cta_texts,
                has_personalization,
                social_links,
                utm_campaigns,
                link_intents,
                has_physical_address,
                physical_address_text,
                template_complexity_score,
            ) = row?;
            out.push(DbContent {
                body_clean: body_clean.unwrap_or_default(),
                offer_types: parse_json_or_default(offer_types.as_deref()),
                cta_texts: parse_json_or_default(cta_texts.as_deref()),
                has_personalization: has_personalization.unwrap_or(false),
                social_links: parse_json_or_default(social_links.as_deref()),
                utm_campaigns: parse_json_or_default(utm_campaigns.as_deref()),
                link_intents: parse_json_or_default(link_intents.as_deref()),
                has_physical_address: has_physical_address.unwrap_or(false),
                physical_address_text,
                template_complexity_score: template_complexity_score.unwrap_or(0),
            });
        }
        Ok(out)
    }

    /// AI classification rows for the domain, in message insertion order.
    pub fn classifications_for_domain(
        &self,
        domain: &str,
    ) -> Result<Vec<DbClassification>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT ac.industry, ac.company_size_estimate, ac.marketing_sophistication,
                    ac.sender_intent, ac.product_type, ac.product_description,
                    ac.pain_points, ac.target_audience,
                    ac.partner_program_detected, ac.renewal_signal_detected
             FROM ai_classification ac
             JOIN parsed_metadata pm ON ac.message_id = pm.message_id
             WHERE pm.sender_domain = ?1",
        )?;
        let rows = stmt.query_map(params![domain], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<bool>>(8)?,
                row.get::<_, Option<bool>>(9)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (
                industry,
                size,
                soph,
                intent,
                product_type,
                product_description,
                pain_points,
                target_audience,
                partner,
                renewal,
            ) = row?;
            out.push(DbClassification {
                industry: industry.unwrap_or_default(),
                company_size_estimate: size.unwrap_or_default(),
                marketing_sophistication: soph.unwrap_or(0),
                sender_intent: intent.unwrap_or_default(),
                product_type: product_type.unwrap_or_default(),
                product_description: product_description.unwrap_or_default(),
                pain_points: parse_json_or_default(pain_points.as_deref()),
                target_audience: target_audience.unwrap_or_default(),
                partner_program_detected: partner.unwrap_or(false),
                renewal_signal_detected: renewal.unwrap_or(false),
            });
        }
        Ok(out)
    }

    /// Sender intents classified for messages in a thread.
    pub fn thread_intents(&self, thread_id: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT ac.sender_intent FROM ai_classification ac
             JOIN messages m ON ac.message_id = m.message_id
             WHERE m.thread_id = ?1 AND ac.sender_intent != ''",
        )?;
        let rows = stmt.query_map(params![thread_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Entities extracted from the domain's messages.
    pub fn entities_for_domain(&self, domain: &str) -> Result<Vec<DbEntity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT ee.entity_type, ee.entity_value, ee.entity_normalized, ee.context
             FROM extracted_entities ee
             JOIN parsed_metadata pm ON ee.message_id = pm.message_id
             WHERE pm.sender_domain = ?1",
        )?;
        let rows = stmt.query_map(params![domain], |row| {
            Ok(DbEntity {
                entity_type: row.get(0)?,
                entity_value: row.get(1)?,
                entity_normalized: row.get(2)?,
                context: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Entities extracted from messages within a thread.
    pub fn entities_for_thread(&self, thread_id: &str) -> Result<Vec<DbEntity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT ee.entity_type, ee.entity_value, ee.entity_normalized, ee.context
             FROM extracted_entities ee
             WHERE ee.message_id IN (SELECT message_id FROM messages WHERE thread_id = ?1)",
        )?;
        let rows = stmt.query_map(params![thread_id], |row| {
            Ok(DbEntity {
                entity_type: row.get(0)?,
                entity_value: row.get(1)?,
                entity_normalized: row.get(2)?,
                context: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Average inter-message gap for the domain, if temporal analysis ran.
    pub fn avg_frequency_days(&self, domain: &str) -> Result<Option<f64>, DbError> {
        let result = self.conn.query_row(
            "SELECT avg_frequency_days FROM sender_temporal WHERE sender_domain = ?1",
            params![domain],
            |row| row.get::<_, Option<f64>>(0),
        );
        match result {
            Ok(v) => Ok(v),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Domains where more than half the messages are flagged bulk.
    pub fn bulk_sender_domains(&self) -> Result<HashSet<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT sender_domain, SUM(is_bulk) * 1.0 / COUNT(*) AS bulk_ratio
             FROM parsed_metadata
             WHERE sender_domain != ''
             GROUP BY sender_domain
             HAVING bulk_ratio > 0.5",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<HashSet<_>, _>>()?)
    }

    /// Domains explicitly excluded from gem detection.
    pub fn excluded_domains(&self) -> Result<HashSet<String>, DbError> {
        let mut stmt = self.conn.prepare("SELECT domain FROM domain_exclusions")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<HashSet<_>, _>>()?)
    }

    /// Whether the domain has any thread dormant at least `min_days` and
    /// awaiting the user's reply. Drives the dormant_threads segment.
    pub fn has_dormant_awaiting_thread(
        &self,
        domain: &str,
        min_days: i64,
    ) -> Result<bool, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT 1 FROM threads t
             JOIN messages m ON t.thread_id = m.thread_id
             JOIN parsed_metadata pm ON m.message_id = pm.message_id
             WHERE pm.sender_domain = ?1
               AND t.days_dormant >= ?2
               AND t.awaiting_response_from = 'user'
             LIMIT 1",
        )?;
        Ok(stmt.exists(params![domain, min_days])?)
    }
}
