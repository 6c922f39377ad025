//! Per-domain thread engagement metrics.
//!
//! A domain with no threads gets `None` for both ratios. Downstream
//! consumers must treat missing metrics as undefined rather than zero: a
//! sender we never threaded with is not the same as a sender who always
//! initiates.

use crate::db::{DbError, SieveDb};
use crate::types::ThreadMetrics;
use crate::util::parse_mail_date;

/// Compute initiation ratio and reply rate for a sender domain.
///
/// - initiation ratio: fraction of the domain's threads whose
///   chronologically first message was sent by the user
/// - reply rate: fraction of the domain's threads the user participated in
pub fn compute_thread_metrics(db: &SieveDb, domain: &str) -> Result<ThreadMetrics, DbError> {
    let threads = db.threads_for_domain(domain)?;
    if threads.is_empty() {
        return Ok(ThreadMetrics::default());
    }

    let mut user_initiated = 0usize;
    let mut user_replied = 0usize;

    for thread in &threads {
        let mut messages = db.messages_for_thread(&thread.thread_id)?;
        // Stable sort; undated messages keep insertion order at the front
        messages.sort_by_key(|m| m.date.as_deref().and_then(parse_mail_date));

        if messages.first().is_some_and(|m| m.is_sent) {
            user_initiated += 1;
        }
        if thread.user_participated {
            user_replied += 1;
        }
    }

    let total = threads.len() as f64;
    Ok(ThreadMetrics {
        initiation_ratio: Some(user_initiated as f64 / total),
        reply_rate: Some(user_replied as f64 / total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use rusqlite::params;

    fn add_thread(db: &SieveDb, id: &str, participated: bool) {
        db.conn_ref()
            .execute(
                "INSERT INTO threads (thread_id, user_participated, message_count)
                 VALUES (?1, ?2, 2)",
                params![id, participated],
            )
            .unwrap();
    }

    fn add_message(db: &SieveDb, id: &str, thread: &str, date: &str, is_sent: bool) {
        db.conn_ref()
            .execute(
                "INSERT INTO messages (message_id, thread_id, date, is_sent)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, thread, date, is_sent],
            )
            .unwrap();
        db.conn_ref()
            .execute(
                "INSERT INTO parsed_metadata (message_id, sender_domain)
                 VALUES (?1, 'acme.com')",
                params![id],
            )
            .unwrap();
    }

    #[test]
    fn no_threads_means_undefined_metrics() {
        let db = test_db();
        let m = compute_thread_metrics(&db, "acme.com").unwrap();
        assert!(m.initiation_ratio.is_none());
        assert!(m.reply_rate.is_none());
    }

    #[test]
    fn initiation_uses_chronological_first_message() {
        let db = test_db();
        add_thread(&db, "t1", true);
        // Inserted out of order; the 09:00 message decides initiation
        add_message(&db, "m2", "t1", "2024-01-01T12:00:00Z", false);
        add_message(&db, "m1", "t1", "2024-01-01T09:00:00Z", true);

        add_thread(&db, "t2", false);
        add_message(&db, "m3", "t2", "2024-02-01T09:00:00Z", false);
        add_message(&db, "m4", "t2", "2024-02-01T12:00:00Z", true);

        let m = compute_thread_metrics(&db, "acme.com").unwrap();
        assert_eq!(m.initiation_ratio, Some(0.5));
        assert_eq!(m.reply_rate, Some(0.5));
    }

    #[test]
    fn handles_rfc2822_dates() {
        let db = test_db();
        add_thread(&db, "t1", true);
        add_message(&db, "m1", "t1", "Mon, 01 Jan 2024 09:00:00 +0000", true);
        add_message(&db, "m2", "t1", "Mon, 01 Jan 2024 12:00:00 +0000", false);

        let m = compute_thread_metrics(&db, "acme.com").unwrap();
        assert_eq!(m.initiation_ratio, Some(1.0));
        assert_eq!(m.reply_rate, Some(1.0));
    }
}
