//! Core domain types shared across the engine.
//!
//! Closed enumerations are stored in SQLite as their snake_case string form;
//! `as_str` / `parse` pairs keep the mapping in one place. Unrecognized
//! stored values parse to the `Unknown` member where one exists rather than
//! failing the read (data-quality errors are recovered, not propagated).

use serde::{Deserialize, Serialize};

/// The closed set of opportunity ("gem") types.
///
/// `VendorUpsell` is retired: it stays in the enumeration so historical rows
/// still deserialize, but no detector emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GemType {
    WeakMarketingLead,
    IndustryIntel,
    DormantWarmThread,
    UnansweredAsk,
    PartnerProgram,
    RenewalLeverage,
    VendorUpsell,
    DistributionChannel,
    CoMarketing,
    ProcurementSignal,
}

impl GemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GemType::WeakMarketingLead => "weak_marketing_lead",
            GemType::IndustryIntel => "industry_intel",
            GemType::DormantWarmThread => "dormant_warm_thread",
            GemType::UnansweredAsk => "unanswered_ask",
            GemType::PartnerProgram => "partner_program",
            GemType::RenewalLeverage => "renewal_leverage",
            GemType::VendorUpsell => "vendor_upsell",
            GemType::DistributionChannel => "distribution_channel",
            GemType::CoMarketing => "co_marketing",
            GemType::ProcurementSignal => "procurement_signal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weak_marketing_lead" => Some(GemType::WeakMarketingLead),
            "industry_intel" => Some(GemType::IndustryIntel),
            "dormant_warm_thread" => Some(GemType::DormantWarmThread),
            "unanswered_ask" => Some(GemType::UnansweredAsk),
            "partner_program" => Some(GemType::PartnerProgram),
            "renewal_leverage" => Some(GemType::RenewalLeverage),
            "vendor_upsell" => Some(GemType::VendorUpsell),
            "distribution_channel" => Some(GemType::DistributionChannel),
            "co_marketing" => Some(GemType::CoMarketing),
            "procurement_signal" => Some(GemType::ProcurementSignal),
            _ => None,
        }
    }
}

/// The inferred commercial relationship between the user and a sender domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    MyVendor,
    MyServiceProvider,
    MyInfrastructure,
    SellingToMe,
    InboundProspect,
    WarmContact,
    PotentialPartner,
    Community,
    Institutional,
    Unknown,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::MyVendor => "my_vendor",
            RelationshipType::MyServiceProvider => "my_service_provider",
            RelationshipType::MyInfrastructure => "my_infrastructure",
            RelationshipType::SellingToMe => "selling_to_me",
            RelationshipType::InboundProspect => "inbound_prospect",
            RelationshipType::WarmContact => "warm_contact",
            RelationshipType::PotentialPartner => "potential_partner",
            RelationshipType::Community => "community",
            RelationshipType::Institutional => "institutional",
            RelationshipType::Unknown => "unknown",
        }
    }

    /// Parse a stored value; unrecognized strings fall back to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "my_vendor" => RelationshipType::MyVendor,
            "my_service_provider" => RelationshipType::MyServiceProvider,
            "my_infrastructure" => RelationshipType::MyInfrastructure,
            "selling_to_me" => RelationshipType::SellingToMe,
            "inbound_prospect" => RelationshipType::InboundProspect,
            "warm_contact" => RelationshipType::WarmContact,
            "potential_partner" => RelationshipType::PotentialPartner,
            "community" => RelationshipType::Community,
            "institutional" => RelationshipType::Institutional,
            _ => RelationshipType::Unknown,
        }
    }

    /// Relationship types whose gems are suppressed by default when
    /// auto-detected (pure infrastructure noise).
    pub fn suppresses_gems_by_default(&self) -> bool {
        matches!(
            self,
            RelationshipType::MyInfrastructure | RelationshipType::Institutional
        )
    }
}

/// Provenance of a relationship row. Manual entries are never overwritten
/// by automatic detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipSource {
    Manual,
    Auto,
    Import,
}

impl RelationshipSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipSource::Manual => "manual",
            RelationshipSource::Auto => "auto",
            RelationshipSource::Import => "import",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "auto" => RelationshipSource::Auto,
            "import" => RelationshipSource::Import,
            _ => RelationshipSource::Manual,
        }
    }
}

/// Company size class from the AI classifier's majority vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanySize {
    Small,
    Medium,
    Enterprise,
    Unknown,
}

impl CompanySize {
    pub fn parse(s: &str) -> Self {
        match s {
            "small" => CompanySize::Small,
            "medium" => CompanySize::Medium,
            "enterprise" => CompanySize::Enterprise,
            _ => CompanySize::Unknown,
        }
    }
}

/// Estimated commercial value carried on every gem explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimatedValue {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "medium-high")]
    MediumHigh,
    #[serde(rename = "high")]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// A single piece of evidence inside a gem explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GemSignal {
    pub signal: String,
    #[serde(default)]
    pub evidence: String,
}

impl GemSignal {
    pub fn new(signal: impl Into<String>, evidence: impl Into<String>) -> Self {
        GemSignal {
            signal: signal.into(),
            evidence: evidence.into(),
        }
    }
}

/// Structured explanation stored as JSON on each gem row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GemExplanation {
    pub summary: String,
    #[serde(default)]
    pub signals: Vec<GemSignal>,
    pub confidence: f64,
    pub estimated_value: EstimatedValue,
    pub urgency: Urgency,
}

/// Output of a single detector before eligibility filtering and scoring.
#[derive(Debug, Clone)]
pub struct GemCandidate {
    pub gem_type: GemType,
    pub thread_id: Option<String>,
    pub score: i64,
    pub explanation: GemExplanation,
    pub recommended_actions: Vec<String>,
    pub source_message_ids: Vec<String>,
}

/// A known contact extracted from person entities for a domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnownContact {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

/// Monetary evidence extracted from money entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonetarySignal {
    pub amount: String,
    #[serde(default)]
    pub context: String,
}

/// Per-domain engagement metrics derived from threads. `None` means the
/// domain has no threads, which downstream scoring treats as "undefined",
/// not zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadMetrics {
    pub initiation_ratio: Option<f64>,
    pub reply_rate: Option<f64>,
}
