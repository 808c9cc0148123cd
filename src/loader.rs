//! Transactional upsert coordinator.
//!
//! Orchestrates, per record, the ordered sequence of entity
//! resolutions and row writes inside one transaction. The ordering is
//! the correctness mechanism: stub and link rows are created before
//! any row that references them, so every foreign key resolves at
//! commit time without deferral.

use crate::error::Result;
use crate::model::CanonicalPost;
use crate::normalize::normalize;
use crate::storage::{
    add_post_link, add_post_media, add_post_mention, add_post_tag, ensure_author_stub,
    insert_post, post_exists, resolve_link, upsert_author, Storage,
};
use rusqlite::Connection;
use serde_json::Value;
use std::io::BufRead;
use tracing::{debug, warn};

/// Outcome of loading one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The record was new; all of its rows are committed.
    Inserted,
    /// The record's post id already existed; nothing was written.
    SkippedAlreadyPresent,
}

/// Running totals for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub inserted: u64,
    pub skipped: u64,
    /// Records whose transaction was rolled back. Safe to retry.
    pub failed: u64,
    /// Lines that could not be decoded into a record. Not retried.
    pub malformed: u64,
}

impl LoadStats {
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.inserted + self.skipped + self.failed + self.malformed
    }
}

/// Load one raw record into storage.
///
/// All writes happen inside a single transaction; on any failure the
/// transaction rolls back and the destination is exactly as it was
/// before this record was attempted.
///
/// # Errors
///
/// [`LoadError::Decode`] when the record lacks identities;
/// [`LoadError::Resolution`] or [`LoadError::Constraint`] when a write
/// inside the transaction fails (the record may be retried).
pub fn load_record(storage: &mut Storage, record: &Value) -> Result<LoadOutcome> {
    let post = normalize(record)?;
    let tx = storage.connection_mut().transaction()?;
    // Drop rolls the transaction back on every early-return path.
    let outcome = apply_post(&tx, &post)?;
    tx.commit()?;
    Ok(outcome)
}

/// The ordered write sequence for one canonical post. Runs inside the
/// caller's transaction.
fn apply_post(conn: &Connection, post: &CanonicalPost) -> Result<LoadOutcome> {
    // Idempotency gate: an already-loaded record writes nothing.
    if post_exists(conn, post.id)? {
        debug!(post_id = post.id, "already present, skipping");
        return Ok(LoadOutcome::SkippedAlreadyPresent);
    }

    // Posting author: profile link first, then the full upsert.
    // Hydration always wins going forward for this identity.
    let author_link = post
        .author
        .url
        .as_deref()
        .map(|url| resolve_link(conn, url))
        .transpose()?;
    upsert_author(conn, &post.author, author_link)?;

    // A reply target may never have been observed in full; a stub row
    // must exist before the post row references it.
    if let Some(target) = post.reply_to_author_id {
        ensure_author_stub(conn, target, None, None)?;
    }

    insert_post(conn, post)?;

    for url in &post.links {
        let link_id = resolve_link(conn, url)?;
        add_post_link(conn, post.id, link_id)?;
    }

    for mention in &post.mentions {
        ensure_author_stub(
            conn,
            mention.author_id,
            mention.handle.as_deref(),
            mention.name.as_deref(),
        )?;
        add_post_mention(conn, post.id, mention.author_id)?;
    }

    for tag in &post.tags {
        add_post_tag(conn, post.id, tag)?;
    }

    for media in &post.media {
        let link_id = resolve_link(conn, &media.url)?;
        add_post_media(conn, post.id, link_id, media.kind.as_deref())?;
    }

    Ok(LoadOutcome::Inserted)
}

/// Load a stream of newline-delimited JSON records.
///
/// Malformed lines are counted and skipped; records whose transaction
/// fails are counted as failed and the batch continues. The progress
/// callback receives (records processed so far, post id) after each
/// record.
///
/// # Errors
///
/// Returns an error only when the input itself cannot be read.
pub fn load_lines<R: BufRead>(
    storage: &mut Storage,
    reader: R,
    mut on_progress: impl FnMut(u64, i64),
) -> Result<LoadStats> {
    let mut stats = LoadStats::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(e) => {
                stats.malformed += 1;
                warn!("Skipping undecodable line: {e}");
                continue;
            }
        };

        match load_record(storage, &record) {
            Ok(LoadOutcome::Inserted) => stats.inserted += 1,
            Ok(LoadOutcome::SkippedAlreadyPresent) => stats.skipped += 1,
            Err(e) if e.is_line_local() => {
                stats.malformed += 1;
                warn!("Skipping undecodable record: {e}");
            }
            Err(e) => {
                stats.failed += 1;
                warn!("Record failed and was rolled back: {e}");
            }
        }

        on_progress(stats.processed(), record["id"].as_i64().unwrap_or(-1));
    }

    Ok(stats)
}
