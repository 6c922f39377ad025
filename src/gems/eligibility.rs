//! Relationship-to-gem eligibility.
//!
//! Each relationship type admits a fixed set of gem types; everything else
//! is discarded before persistence. An unclassified sender is treated as
//! `unknown`, which admits every active detector. `vendor_upsell` appears
//! in no list: the type is retired and nothing may emit it.

use crate::types::{GemType, RelationshipType};

use GemType::*;

/// All gem types an active detector can produce, in detector order.
pub const ACTIVE_GEM_TYPES: &[GemType] = &[
    DormantWarmThread,
    UnansweredAsk,
    WeakMarketingLead,
    PartnerProgram,
    RenewalLeverage,
    DistributionChannel,
    CoMarketing,
    IndustryIntel,
    ProcurementSignal,
];

/// The gem types a relationship admits.
pub fn eligible_gems(relationship: RelationshipType) -> &'static [GemType] {
    match relationship {
        RelationshipType::InboundProspect => &[
            DormantWarmThread,
            UnansweredAsk,
            WeakMarketingLead,
            CoMarketing,
            IndustryIntel,
            ProcurementSignal,
        ],
        RelationshipType::WarmContact => &[
            DormantWarmThread,
            UnansweredAsk,
            PartnerProgram,
            DistributionChannel,
            CoMarketing,
            IndustryIntel,
            ProcurementSignal,
        ],
        RelationshipType::PotentialPartner => &[
            PartnerProgram,
            DistributionChannel,
            CoMarketing,
            IndustryIntel,
        ],
        RelationshipType::Community => &[DistributionChannel, CoMarketing, IndustryIntel],
        RelationshipType::MyVendor => &[RenewalLeverage, PartnerProgram],
        RelationshipType::MyServiceProvider => &[RenewalLeverage],
        RelationshipType::MyInfrastructure => &[RenewalLeverage],
        RelationshipType::SellingToMe => &[IndustryIntel],
        RelationshipType::Institutional => &[],
        RelationshipType::Unknown => ACTIVE_GEM_TYPES,
    }
}

pub fn is_eligible(relationship: RelationshipType, gem_type: GemType) -> bool {
    eligible_gems(relationship).contains(&gem_type)
}
