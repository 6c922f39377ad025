//! End-to-end analysis pipeline.
//!
//! Stage order matters: profiles feed relationships, relationships gate
//! gems, segments read the finished profiles, and scoring reads everything.

use crate::config::Config;
use crate::db::SieveDb;
use crate::error::EngineError;
use crate::gems::detect_gems;
use crate::known_entities::KnownEntities;
use crate::profile::build_profiles;
use crate::relationships::detect_relationships;
use crate::scoring::score_gems;
use crate::segments::assign_segments;

/// Counters from one full pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub profiles_built: usize,
    pub relationships_classified: usize,
    pub gems_detected: usize,
    pub gems_scored: usize,
    pub segments_assigned: usize,
}

/// Run every stage over the current database contents. Safe to re-run;
/// derived tables are rebuilt each time.
pub fn run_pipeline(
    db: &SieveDb,
    config: &Config,
    known_entities: &KnownEntities,
) -> Result<PipelineReport, EngineError> {
    let profiles_built = build_profiles(db)?;
    let relationships_classified = detect_relationships(db, known_entities, true)?.len();
    let gems_detected = detect_gems(db, config)?;
    let segments_assigned = assign_segments(db, config)?;
    let gems_scored = score_gems(db, &config.scoring, &config.user_context)?;

    let report = PipelineReport {
        profiles_built,
        relationships_classified,
        gems_detected,
        gems_scored,
        segments_assigned,
    };
    log::info!(
        "pipeline complete: {} profiles, {} gems, {} segments",
        report.profiles_built,
        report.gems_detected,
        report.segments_assigned
    );
    Ok(report)
}
