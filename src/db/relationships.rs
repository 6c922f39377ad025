//! Persistence for `sender_relationships` rows.

use chrono::Utc;
use rusqlite::params;

use super::{DbError, DbRelationship, SieveDb};
use crate::types::{RelationshipSource, RelationshipType};

impl SieveDb {
    /// Insert or replace a relationship row. `created_at` is stamped here.
    pub fn upsert_relationship(
        &self,
        domain: &str,
        relationship_type: RelationshipType,
        note: Option<&str>,
        suppress_gems: bool,
        source: RelationshipSource,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sender_relationships
                (sender_domain, relationship_type, relationship_note,
                 suppress_gems, created_at, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                domain,
                relationship_type.as_str(),
                note,
                suppress_gems,
                Utc::now().to_rfc3339(),
                source.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Load the relationship row for a domain, if any.
    pub fn get_relationship(&self, domain: &str) -> Result<Option<DbRelationship>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT sender_domain, relationship_type, relationship_note,
                    suppress_gems, created_at, source
             FROM sender_relationships WHERE sender_domain = ?1",
        )?;
        let mut rows = stmt.query_map(params![domain], relationship_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All stored relationship rows.
    pub fn list_relationships(&self) -> Result<Vec<DbRelationship>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT sender_domain, relationship_type, relationship_note,
                    suppress_gems, created_at, source
             FROM sender_relationships",
        )?;
        let rows = stmt.query_map([], relationship_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn relationship_from_row(row: &rusqlite::Row<'_>) -> Result<DbRelationship, rusqlite::Error> {
    Ok(DbRelationship {
        sender_domain: row.get(0)?,
        relationship_type: RelationshipType::parse(&row.get::<_, String>(1)?),
        relationship_note: row.get(2)?,
        suppress_gems: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
        created_at: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        source: RelationshipSource::parse(&row.get::<_, String>(5)?),
    })
}
