//! Persistence for gems and sender segments.
//!
//! Both tables are derived data: detection and segmentation delete and
//! rebuild their rows on every run, so re-running the pipeline is always
//! safe. Drafts reference gems by id and must be cleared first.

use rusqlite::params;

use super::{DbError, DbGem, DbSegment, SieveDb};
use crate::types::GemCandidate;
use crate::util::parse_json_or_default;

impl SieveDb {
    /// Clear all gems and the engagement drafts that reference them.
    /// Must run inside the detection transaction.
    pub fn clear_gems(&self) -> Result<(), DbError> {
        self.conn.execute(
            "DELETE FROM engagement_drafts
             WHERE gem_id IN (SELECT id FROM gems)",
            [],
        )?;
        self.conn.execute("DELETE FROM gems", [])?;
        Ok(())
    }

    /// Insert one detected gem for a sender domain.
    pub fn insert_gem(&self, domain: &str, candidate: &GemCandidate) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO gems
                (gem_type, sender_domain, thread_id, score, explanation,
                 recommended_actions, source_message_ids)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                candidate.gem_type.as_str(),
                domain,
                candidate.thread_id,
                candidate.score,
                serde_json::to_string(&candidate.explanation).unwrap_or_default(),
                serde_json::to_string(&candidate.recommended_actions).unwrap_or_default(),
                serde_json::to_string(&candidate.source_message_ids).unwrap_or_default(),
            ],
        )?;
        Ok(())
    }

    /// All stored gems, decoded.
    pub fn list_gems(&self) -> Result<Vec<DbGem>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, gem_type, sender_domain, thread_id, score, explanation,
                    recommended_actions, source_message_ids, status
             FROM gems",
        )?;
        let rows = stmt.query_map([], gem_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Gems for one sender domain.
    pub fn gems_for_domain(&self, domain: &str) -> Result<Vec<DbGem>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, gem_type, sender_domain, thread_id, score, explanation,
                    recommended_actions, source_message_ids, status
             FROM gems WHERE sender_domain = ?1",
        )?;
        let rows = stmt.query_map(params![domain], gem_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Overwrite a gem's score after prioritization.
    pub fn update_gem_score(&self, gem_id: i64, score: i64) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE gems SET score = ?1 WHERE id = ?2",
            params![score, gem_id],
        )?;
        Ok(())
    }

    /// Replace every segment assignment for a domain with the given set.
    pub fn replace_segments(&self, domain: &str, segments: &[DbSegment]) -> Result<(), DbError> {
        self.conn.execute(
            "DELETE FROM sender_segments WHERE sender_domain = ?1",
            params![domain],
        )?;
        for seg in segments {
            self.conn.execute(
                "INSERT OR REPLACE INTO sender_segments
                    (sender_domain, segment, sub_segment, confidence)
                 VALUES (?1, ?2, ?3, ?4)",
                params![domain, seg.segment, seg.sub_segment, seg.confidence],
            )?;
        }
        Ok(())
    }

    /// Segment assignments for a domain.
    pub fn segments_for_domain(&self, domain: &str) -> Result<Vec<DbSegment>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT sender_domain, segment, sub_segment, confidence
             FROM sender_segments WHERE sender_domain = ?1",
        )?;
        let rows = stmt.query_map(params![domain], |row| {
            Ok(DbSegment {
                sender_domain: row.get(0)?,
                segment: row.get(1)?,
                sub_segment: row.get(2)?,
                confidence: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn gem_from_row(row: &rusqlite::Row<'_>) -> Result<DbGem, rusqlite::Error> {
    let explanation_raw: Option<String> = row.get(5)?;
    Ok(DbGem {
        id: row.get(0)?,
        gem_type: row.get(1)?,
        sender_domain: row.get(2)?,
        thread_id: row.get(3)?,
        score: row.get(4)?,
        explanation: explanation_raw
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok()),
        recommended_actions: parse_json_or_default(row.get::<_, Option<String>>(6)?.as_deref()),
        source_message_ids: parse_json_or_default(row.get::<_, Option<String>>(7)?.as_deref()),
        status: row.get::<_, Option<String>>(8)?.unwrap_or_else(|| "new".into()),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;
    use crate::types::{
        EstimatedValue, GemCandidate, GemExplanation, GemSignal, GemType, Urgency,
    };

    fn candidate(gem_type: GemType, score: i64) -> GemCandidate {
        GemCandidate {
            gem_type,
            thread_id: Some("t1".into()),
            score,
            explanation: GemExplanation {
                summary: "test gem".into(),
                signals: vec![GemSignal::new("warm_pricing", "pricing?")],
                confidence: 0.8,
                estimated_value: EstimatedValue::Medium,
                urgency: Urgency::Medium,
            },
            recommended_actions: vec!["reply".into()],
            source_message_ids: vec!["m1".into()],
        }
    }

    #[test]
    fn gems_round_trip_and_clear() {
        let db = test_db();
        db.insert_gem("acme.com", &candidate(GemType::UnansweredAsk, 50))
            .unwrap();
        db.insert_gem("acme.com", &candidate(GemType::IndustryIntel, 20))
            .unwrap();

        let gems = db.gems_for_domain("acme.com").unwrap();
        assert_eq!(gems.len(), 2);
        let exp = gems[0].explanation.as_ref().unwrap();
        assert_eq!(exp.signals.len(), 1);
        assert_eq!(gems[0].status, "new");

        db.update_gem_score(gems[0].id, 77).unwrap();
        let reloaded = db.gems_for_domain("acme.com").unwrap();
        assert!(reloaded.iter().any(|g| g.score == 77));

        db.clear_gems().unwrap();
        assert!(db.list_gems().unwrap().is_empty());
    }

    #[test]
    fn clear_gems_removes_referencing_drafts() {
        let db = test_db();
        db.insert_gem("acme.com", &candidate(GemType::PartnerProgram, 40))
            .unwrap();
        let gem_id = db.list_gems().unwrap()[0].id;
        db.conn_ref()
            .execute(
                "INSERT INTO engagement_drafts (gem_id, sender_domain, strategy)
                 VALUES (?1, 'acme.com', 'warm_reply')",
                params![gem_id],
            )
            .unwrap();

        db.clear_gems().unwrap();
        let drafts: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM engagement_drafts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(drafts, 0);
    }

    #[test]
    fn segments_are_replaced_wholesale() {
        let db = test_db();
        let segs = vec![
            DbSegment {
                sender_domain: "acme.com".into(),
                segment: "prospect_map".into(),
                sub_segment: "hot_lead".into(),
                confidence: 0.8,
            },
            DbSegment {
                sender_domain: "acme.com".into(),
                segment: "dormant_threads".into(),
                sub_segment: "unanswered".into(),
                confidence: 0.9,
            },
        ];
        db.replace_segments("acme.com", &segs).unwrap();
        assert_eq!(db.segments_for_domain("acme.com").unwrap().len(), 2);

        db.replace_segments("acme.com", &segs[..1]).unwrap();
        let remaining = db.segments_for_domain("acme.com").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].sub_segment, "hot_lead");
    }
}
