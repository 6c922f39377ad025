//! Shared type definitions for the database layer.
//!
//! JSON-valued columns are decoded exactly once, at the row boundary, into
//! the typed collections below. Detectors and the scorer never touch raw
//! JSON strings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    GemExplanation, KnownContact, MonetarySignal, RelationshipSource, RelationshipType,
};

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),
}

/// A thread row joined against a sender domain.
#[derive(Debug, Clone)]
pub struct DbThread {
    pub thread_id: String,
    pub subject: Option<String>,
    pub days_dormant: i64,
    pub awaiting_response_from: Option<String>,
    pub last_sender: Option<String>,
    pub user_participated: bool,
    pub message_count: i64,
}

/// A message row, as read for thread metrics and warm-signal scanning.
#[derive(Debug, Clone)]
pub struct DbMessage {
    pub message_id: String,
    pub thread_id: String,
    pub date: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub reply_to: Option<String>,
    pub body_text: Option<String>,
    pub is_sent: bool,
}

/// One `parsed_metadata` row (header forensics output, read-only here).
#[derive(Debug, Clone, Default)]
pub struct DbMetadata {
    pub esp_identified: Option<String>,
    pub spf_result: Option<String>,
    pub dmarc_result: Option<String>,
    pub dkim_domain: Option<String>,
    pub list_unsubscribe_url: Option<String>,
}

/// One `parsed_content` row with JSON columns decoded.
#[derive(Debug, Clone, Default)]
pub struct DbContent {
    pub body_clean: String,
    pub offer_types: Vec<String>,
    pub cta_texts: Vec<String>,
    pub has_personalization: bool,
    pub social_links: HashMap<String, String>,
    pub utm_campaigns: Vec<HashMap<String, String>>,
    pub link_intents: HashMap<String, Vec<String>>,
    pub has_physical_address: bool,
    pub physical_address_text: Option<String>,
    pub template_complexity_score: i64,
}

/// One extracted entity row.
#[derive(Debug, Clone)]
pub struct DbEntity {
    pub entity_type: String,
    pub entity_value: String,
    pub entity_normalized: Option<String>,
    pub context: Option<String>,
}

/// One AI classification row with the pain-points JSON decoded.
#[derive(Debug, Clone, Default)]
pub struct DbClassification {
    pub industry: String,
    pub company_size_estimate: String,
    pub marketing_sophistication: i64,
    pub sender_intent: String,
    pub product_type: String,
    pub product_description: String,
    pub pain_points: Vec<String>,
    pub target_audience: String,
    pub partner_program_detected: bool,
    pub renewal_signal_detected: bool,
}

/// A fully-typed `sender_profiles` row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbProfile {
    pub sender_domain: String,
    pub company_name: String,
    pub primary_email: Option<String>,
    pub reply_to_email: Option<String>,
    pub industry: String,
    pub company_size: String,
    pub marketing_sophistication_avg: f64,
    pub marketing_sophistication_trend: String,
    pub esp_used: Option<String>,
    pub product_type: String,
    pub product_description: String,
    pub pain_points: Vec<String>,
    pub target_audience: String,
    pub known_contacts: Vec<KnownContact>,
    pub total_messages: i64,
    pub first_contact: Option<String>,
    pub last_contact: Option<String>,
    pub avg_frequency_days: Option<f64>,
    pub offer_type_distribution: HashMap<String, i64>,
    pub cta_texts_all: Vec<String>,
    pub social_links: HashMap<String, String>,
    pub physical_address: Option<String>,
    pub utm_campaign_names: Vec<String>,
    pub has_personalization: bool,
    pub has_partner_program: bool,
    pub partner_program_urls: Vec<String>,
    pub renewal_dates: Vec<String>,
    pub monetary_signals: Vec<MonetarySignal>,
    pub authentication_quality: String,
    pub unsubscribe_url: Option<String>,
    pub economic_segments: Vec<String>,
    pub thread_initiation_ratio: Option<f64>,
    pub user_reply_rate: Option<f64>,
}

impl DbProfile {
    /// Whether the profile carries a given coarse economic segment tag.
    pub fn has_segment(&self, segment: &str) -> bool {
        self.economic_segments.iter().any(|s| s == segment)
    }
}

/// A `sender_relationships` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbRelationship {
    pub sender_domain: String,
    pub relationship_type: RelationshipType,
    pub relationship_note: Option<String>,
    pub suppress_gems: bool,
    pub created_at: String,
    pub source: RelationshipSource,
}

/// A stored gem row.
#[derive(Debug, Clone)]
pub struct DbGem {
    pub id: i64,
    pub gem_type: String,
    pub sender_domain: String,
    pub thread_id: Option<String>,
    pub score: i64,
    pub explanation: Option<GemExplanation>,
    pub recommended_actions: Vec<String>,
    pub source_message_ids: Vec<String>,
    pub status: String,
}

/// A `sender_segments` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbSegment {
    pub sender_domain: String,
    pub segment: String,
    pub sub_segment: String,
    pub confidence: f64,
}
