//! Engine configuration.
//!
//! Loaded from `~/.gemsift/config.json` when present, otherwise every field
//! falls back to the defaults below. All sections are optional in the file;
//! serde defaults fill the gaps, so a config containing only
//! `{"user_context": {...}}` is valid.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::RelationshipType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scoring: ScoringConfig,
    pub dormant_thread: DormantThreadConfig,
    pub user_context: UserContext,
    pub custom_segments: Vec<CustomSegmentRule>,
}

/// Who the user is, for relevance and audience-overlap checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserContext {
    /// Industries the user sells into. A profile whose industry appears here
    /// earns full relevance weight.
    pub target_industries: Vec<String>,
    /// Keywords describing the user's own audience, matched against sender
    /// target-audience text for co-marketing fit.
    pub audience_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    /// Score ceiling per relationship type. Types absent from the map are
    /// uncapped (effectively 100).
    pub relationship_caps: HashMap<String, i64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            weights: ScoringWeights::default(),
            relationship_caps: default_relationship_caps(),
        }
    }
}

impl ScoringConfig {
    pub fn cap_for(&self, relationship: RelationshipType) -> i64 {
        self.relationship_caps
            .get(relationship.as_str())
            .copied()
            .unwrap_or(100)
    }
}

fn default_relationship_caps() -> HashMap<String, i64> {
    [
        ("inbound_prospect", 100),
        ("warm_contact", 90),
        ("potential_partner", 80),
        ("unknown", 60),
        ("community", 50),
        ("my_vendor", 25),
        ("selling_to_me", 20),
        ("my_service_provider", 15),
        ("my_infrastructure", 5),
        ("institutional", 5),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Component weights for sender prioritization. The three tiers sum to 100
/// with the defaults, keeping scores comparable across configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub inbound_initiation: f64,
    pub inbound_engagement: f64,
    pub reachability: f64,
    pub relevance: f64,
    pub recency: f64,
    pub known_contacts: f64,
    pub monetary_signals: f64,
    pub gem_diversity_per_type: f64,
    pub gem_diversity_cap: f64,
    pub dormant_thread_bonus: f64,
    pub partner_bonus: f64,
    pub procurement_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            inbound_initiation: 15.0,
            inbound_engagement: 15.0,
            reachability: 10.0,
            relevance: 8.0,
            recency: 8.0,
            known_contacts: 7.0,
            monetary_signals: 7.0,
            gem_diversity_per_type: 5.0,
            gem_diversity_cap: 15.0,
            dormant_thread_bonus: 10.0,
            partner_bonus: 3.0,
            procurement_bonus: 7.0,
        }
    }
}

/// Window for the dormant-warm-thread detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DormantThreadConfig {
    pub min_dormant_days: i64,
    pub max_dormant_days: i64,
    /// When set, a thread must show warm signals from at least two distinct
    /// families. Automated senders trip single-family matches too easily.
    pub require_human_sender: bool,
}

impl Default for DormantThreadConfig {
    fn default() -> Self {
        DormantThreadConfig {
            min_dormant_days: 14,
            max_dormant_days: 365,
            require_human_sender: true,
        }
    }
}

/// A user-defined segment rule. All conditions must hold for the rule to
/// fire; the resulting segment is `custom:<name>` with `priority` as the
/// sub-segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomSegmentRule {
    pub name: String,
    pub priority: String,
    pub conditions: Vec<SegmentCondition>,
}

impl Default for CustomSegmentRule {
    fn default() -> Self {
        CustomSegmentRule {
            name: String::new(),
            priority: "normal".into(),
            conditions: Vec::new(),
        }
    }
}

/// One predicate over a profile field. Exactly one of the operator fields
/// should be set; a condition with none set never matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentCondition {
    pub field: String,
    pub equals: Option<serde_json::Value>,
    pub one_of: Option<Vec<serde_json::Value>>,
    pub lt: Option<f64>,
    pub gt: Option<f64>,
    pub segment_includes: Option<String>,
}

impl Config {
    /// Default config file location: `~/.gemsift/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".gemsift").join("config.json"))
    }

    /// Load config from `path`, or defaults when the file does not exist.
    /// A file that exists but fails to parse is an error, not a silent
    /// fallback.
    pub fn load_or_default(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| EngineError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }
}
