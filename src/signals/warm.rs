//! Warm-signal scanning over a thread's messages and entities.

use std::collections::HashSet;

use crate::db::{DbError, SieveDb};
use crate::signals::patterns::warm_signal_families;
use crate::types::GemSignal;

const BOOST_PER_SIGNAL: i64 = 5;
const BOOST_CAP: i64 = 30;
const EVIDENCE_MAX: usize = 80;

/// Result of scanning one thread for warm signals.
#[derive(Debug, Default)]
pub struct WarmScan {
    pub signals: Vec<GemSignal>,
    /// Capped score contribution for the dormant-thread detector.
    pub boost: i64,
}

impl WarmScan {
    /// Distinct signal families seen, with the `warm_` prefix stripped.
    /// Entity-derived signals count toward their family.
    pub fn distinct_families(&self) -> usize {
        self.signals
            .iter()
            .map(|s| s.signal.strip_prefix("warm_").unwrap_or(&s.signal))
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Scan a thread's message texts against the warm-signal families, then
/// fold in corroborating entities (money amounts, decision-maker people).
/// Each family fires at most once per message; the total boost is capped.
pub fn scan_thread(db: &SieveDb, thread_id: &str) -> Result<WarmScan, DbError> {
    let mut scan = WarmScan::default();

    for (_, text) in db.thread_message_texts(thread_id)? {
        for (family, patterns) in warm_signal_families() {
            if let Some(m) = patterns.iter().find_map(|p| p.find(&text)) {
                scan.signals.push(GemSignal::new(
                    format!("warm_{family}"),
                    truncate_evidence(m.as_str()),
                ));
                scan.boost += BOOST_PER_SIGNAL;
            }
        }
    }

    for entity in db.entities_for_thread(thread_id)? {
        match entity.entity_type.as_str() {
            "money" => {
                scan.signals.push(GemSignal::new(
                    "warm_budget_indicator",
                    truncate_evidence(&entity.entity_value),
                ));
                scan.boost += BOOST_PER_SIGNAL;
            }
            "person" => {
                if entity
                    .context
                    .as_deref()
                    .is_some_and(|c| c.contains("decision_maker"))
                {
                    scan.signals.push(GemSignal::new(
                        "warm_decision_maker",
                        truncate_evidence(&entity.entity_value),
                    ));
                    scan.boost += BOOST_PER_SIGNAL;
                }
            }
            _ => {}
        }
    }

    scan.boost = scan.boost.min(BOOST_CAP);
    Ok(scan)
}

fn truncate_evidence(s: &str) -> String {
    s.chars().take(EVIDENCE_MAX).collect()
}
