//! Integration tests for the full load pipeline.
//!
//! Exercises archive enumeration, normalization, and the transactional
//! upsert coordinator against a real database file.

use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use xload::archive::{discover_inputs, for_each_member};
use xload::loader::{load_lines, LoadStats};
use xload::storage::Storage;

fn record(id: i64, author_id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "created_at": "Wed Jan 08 12:00:00 +0000 2025",
        "text": format!("post number {id}"),
        "lang": "en",
        "user": {
            "id": author_id,
            "screen_name": format!("author{author_id}"),
            "name": format!("Author {author_id}"),
            "url": "https://example.com/shared-profile",
            "geo_enabled": true
        },
        "geo": {"coordinates": [30.25, -97.75]},
        "place": {"country_code": "US", "full_name": "Austin, TX"},
        "entities": {
            "urls": [{"expanded_url": "https://example.com/story"}],
            "user_mentions": [{"id": 42, "screen_name": "friend"}],
            "hashtags": [{"text": "rust"}],
            "symbols": [{"text": "GME"}]
        }
    })
}

fn write_archive(dir: &Path, name: &str, members: &[(&str, String)]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (member, content) in members {
        writer.start_file(*member, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn load_all(db_path: &Path, inputs: &[PathBuf]) -> LoadStats {
    let mut storage = Storage::open(db_path).unwrap();
    let mut totals = LoadStats::default();
    for input in discover_inputs(inputs).unwrap() {
        for_each_member(&input, |_, reader| {
            let stats = load_lines(&mut storage, reader, |_, _| {})?;
            totals.inserted += stats.inserted;
            totals.skipped += stats.skipped;
            totals.failed += stats.failed;
            totals.malformed += stats.malformed;
            Ok(())
        })
        .unwrap();
    }
    totals
}

fn count(db_path: &Path, sql: &str) -> i64 {
    let storage = Storage::open(db_path).unwrap();
    storage
        .connection()
        .query_row(sql, [], |r| r.get(0))
        .unwrap()
}

#[test]
fn archive_load_is_idempotent_end_to_end() {
    let dir = TempDir::new().unwrap();
    let lines = format!("{}\n{}\n", record(1, 10), record(2, 10));
    let archive = write_archive(dir.path(), "batch.zip", &[("part0.json", lines)]);
    let db_path = dir.path().join("posts.db");

    let first = load_all(&db_path, std::slice::from_ref(&archive));
    assert_eq!(first.inserted, 2);
    assert_eq!(first.skipped, 0);

    let second = load_all(&db_path, std::slice::from_ref(&archive));
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 2);

    assert_eq!(count(&db_path, "SELECT COUNT(*) FROM posts"), 2);
    // author 10 plus mentioned author 42
    assert_eq!(count(&db_path, "SELECT COUNT(*) FROM authors"), 2);
    // profile url + story url, deduplicated across both posts
    assert_eq!(count(&db_path, "SELECT COUNT(*) FROM links"), 2);
}

#[test]
fn normalized_fields_land_in_the_post_row() {
    let dir = TempDir::new().unwrap();
    let archive = write_archive(
        dir.path(),
        "batch.zip",
        &[("part0.json", format!("{}\n", record(5, 20)))],
    );
    let db_path = dir.path().join("posts.db");
    load_all(&db_path, &[archive]);

    let storage = Storage::open(&db_path).unwrap();
    let (geo, country, state, lang): (Option<String>, Option<String>, Option<String>, String) =
        storage
            .connection()
            .query_row(
                "SELECT geo, country_code, state_code, lang FROM posts WHERE id = 5",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
    assert_eq!(geo.as_deref(), Some("POINT(30.25 -97.75)"));
    assert_eq!(country.as_deref(), Some("us"));
    assert_eq!(state.as_deref(), Some("tx"));
    assert_eq!(lang, "en");

    let tags: i64 = storage
        .connection()
        .query_row("SELECT COUNT(*) FROM post_tags WHERE post_id = 5", [], |r| {
            r.get(0)
        })
        .unwrap();
    assert_eq!(tags, 2); // #rust and $GME
}

#[test]
fn malformed_lines_do_not_abort_the_batch() {
    let dir = TempDir::new().unwrap();
    let lines = format!("{}\ngarbage line\n{}\n", record(7, 30), record(8, 30));
    let archive = write_archive(dir.path(), "batch.zip", &[("part0.json", lines)]);
    let db_path = dir.path().join("posts.db");

    let stats = load_all(&db_path, &[archive]);
    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.failed, 0);
}

#[test]
fn mixed_inputs_share_one_link_table() {
    let dir = TempDir::new().unwrap();
    let archive = write_archive(
        dir.path(),
        "a.zip",
        &[("part0.json", format!("{}\n", record(100, 1)))],
    );
    let jsonl = dir.path().join("extra.jsonl");
    std::fs::write(&jsonl, format!("{}\n", record(101, 2))).unwrap();
    let db_path = dir.path().join("posts.db");

    let stats = load_all(&db_path, &[archive, jsonl]);
    assert_eq!(stats.inserted, 2);

    // both records referenced the same profile and story urls
    assert_eq!(count(&db_path, "SELECT COUNT(*) FROM links"), 2);
    assert_eq!(count(&db_path, "SELECT COUNT(*) FROM post_links"), 2);
}

#[test]
fn every_association_references_an_existing_row() {
    let dir = TempDir::new().unwrap();
    let jsonl = dir.path().join("records.jsonl");
    std::fs::write(&jsonl, format!("{}\n", record(200, 9))).unwrap();
    let db_path = dir.path().join("posts.db");
    load_all(&db_path, &[jsonl]);

    let storage = Storage::open(&db_path).unwrap();
    let dangling_mentions: i64 = storage
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM post_mentions pm
             LEFT JOIN authors a ON a.id = pm.author_id
             WHERE a.id IS NULL",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(dangling_mentions, 0);

    let dangling_links: i64 = storage
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM post_links pl
             LEFT JOIN links l ON l.id = pl.link_id
             WHERE l.id IS NULL",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(dangling_links, 0);
}
