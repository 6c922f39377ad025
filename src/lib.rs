//! gemsift: relationship classification, gem detection, and opportunity
//! scoring over a mailbox that upstream stages have already parsed into
//! SQLite.
//!
//! The engine reads message-level tables (threads, messages, parsed
//! metadata/content, entities, AI classifications) and produces sender
//! profiles, relationship rows, scored gems, and segment assignments. All
//! derived tables are rebuilt per run, so the pipeline is safe to repeat.

pub mod config;
pub mod db;
pub mod error;
pub mod gems;
pub mod known_entities;
pub mod migrations;
pub mod pipeline;
pub mod profile;
pub mod relationships;
pub mod scoring;
pub mod segments;
pub mod signals;
pub mod types;
pub mod util;

pub use config::Config;
pub use db::SieveDb;
pub use error::EngineError;
pub use pipeline::{run_pipeline, PipelineReport};
pub use types::{GemType, RelationshipSource, RelationshipType};
