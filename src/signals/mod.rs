//! Deterministic text-signal detection: compiled pattern tables and the
//! warm-signal thread scanner built on them.

pub mod patterns;
pub mod warm;

pub use warm::{scan_thread, WarmScan};
