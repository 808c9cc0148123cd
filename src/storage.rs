//! `SQLite` storage for normalized post data.
//!
//! Owns the relational schema and every row-level write primitive the
//! loader composes. All writes are insert-or-ignore or explicit
//! upserts, so concurrent loaders racing to create the same entity
//! never error: the loser's insert is discarded and it reads the
//! winner's row.
//!
//! The write primitives take a plain [`Connection`] rather than
//! `&Storage` so they work unchanged inside a transaction (rusqlite's
//! `Transaction` derefs to `Connection`).

use crate::error::{LoadError, Result};
use crate::geo::stored_geo;
use crate::model::{AuthorProfile, CanonicalPost};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

const SCHEMA_VERSION: i32 = 1;

/// `SQLite` storage manager.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;

        // Set pragmas for performance and FK enforcement
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Get a reference to the underlying database connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Mutable connection access, used by the loader to open
    /// transactions.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let current_version = self.get_schema_version();

        if current_version < SCHEMA_VERSION {
            info!(
                "Migrating database from version {} to {}",
                current_version, SCHEMA_VERSION
            );
            self.create_schema()?;
            self.set_schema_version(SCHEMA_VERSION)?;
        }

        Ok(())
    }

    fn get_schema_version(&self) -> i32 {
        let result: std::result::Result<i32, _> = self.conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| {
                let value: String = row.get(0)?;
                Ok(value.parse().unwrap_or(0))
            },
        );

        // Treat missing schema table as version 0.
        result.unwrap_or_default()
    }

    fn set_schema_version(&self, version: i32) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
            params![version.to_string()],
        )?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r"
            -- Metadata table
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Deduplicated external references
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE
            );

            -- Authors, hydrated or stub (stub rows carry id only,
            -- sometimes a handle/name)
            CREATE TABLE IF NOT EXISTS authors (
                id INTEGER PRIMARY KEY,
                created_at TEXT,
                updated_at TEXT,
                link_id INTEGER,
                friends_count INTEGER,
                listed_count INTEGER,
                favourites_count INTEGER,
                statuses_count INTEGER,
                protected INTEGER,
                verified INTEGER,
                handle TEXT,
                name TEXT,
                location TEXT,
                description TEXT,
                withheld_in_countries TEXT,
                FOREIGN KEY (link_id) REFERENCES links(id)
            );

            -- Posts, immutable once written
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                author_id INTEGER NOT NULL,
                created_at TEXT,
                reply_to_post_id INTEGER,
                reply_to_author_id INTEGER,
                quoted_post_id INTEGER,
                retweet_count INTEGER DEFAULT 0,
                favorite_count INTEGER DEFAULT 0,
                quote_count INTEGER DEFAULT 0,
                withheld_copyright INTEGER DEFAULT 0,
                withheld_in_countries TEXT,
                source TEXT,
                text TEXT,
                country_code TEXT,
                state_code TEXT,
                lang TEXT,
                place_name TEXT,
                geo TEXT,
                FOREIGN KEY (author_id) REFERENCES authors(id),
                FOREIGN KEY (reply_to_author_id) REFERENCES authors(id)
            );
            CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
            CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at);

            -- Post <-> link associations
            CREATE TABLE IF NOT EXISTS post_links (
                post_id INTEGER NOT NULL,
                link_id INTEGER NOT NULL,
                PRIMARY KEY (post_id, link_id),
                FOREIGN KEY (post_id) REFERENCES posts(id),
                FOREIGN KEY (link_id) REFERENCES links(id)
            );

            -- Post <-> mentioned-author associations
            CREATE TABLE IF NOT EXISTS post_mentions (
                post_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                PRIMARY KEY (post_id, author_id),
                FOREIGN KEY (post_id) REFERENCES posts(id),
                FOREIGN KEY (author_id) REFERENCES authors(id)
            );

            -- Post <-> tag associations
            CREATE TABLE IF NOT EXISTS post_tags (
                post_id INTEGER NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (post_id, tag),
                FOREIGN KEY (post_id) REFERENCES posts(id)
            );
            CREATE INDEX IF NOT EXISTS idx_post_tags_tag ON post_tags(tag);

            -- Post <-> media associations
            CREATE TABLE IF NOT EXISTS post_media (
                post_id INTEGER NOT NULL,
                link_id INTEGER NOT NULL,
                kind TEXT,
                PRIMARY KEY (post_id, link_id),
                FOREIGN KEY (post_id) REFERENCES posts(id),
                FOREIGN KEY (link_id) REFERENCES links(id)
            );
            ",
        )?;

        Ok(())
    }
}

fn rfc3339_opt(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|dt| dt.to_rfc3339())
}

/// Resolve a URL to its `links` row id, inserting the row if absent.
///
/// Insert-or-ignore first, then look up on conflict. The whole
/// sequence is retried once before surfacing
/// [`LoadError::Resolution`]; with insert-or-ignore semantics the
/// second pass can only miss if another connection deleted the row
/// between our two statements.
///
/// # Errors
///
/// Returns [`LoadError::Resolution`] if neither insert nor lookup
/// yields a row after the retry.
pub fn resolve_link(conn: &Connection, url: &str) -> Result<i64> {
    for _ in 0..2 {
        let inserted = conn.query_row(
            "INSERT INTO links (url) VALUES (?1) ON CONFLICT (url) DO NOTHING RETURNING id",
            params![url],
            |row| row.get(0),
        );
        match inserted {
            Ok(id) => return Ok(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => {}
            Err(e) => return Err(e.into()),
        }

        let found = conn.query_row(
            "SELECT id FROM links WHERE url = ?1",
            params![url],
            |row| row.get(0),
        );
        match found {
            Ok(id) => return Ok(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Err(LoadError::resolution(url))
}

/// Ensure a referenced author exists, in stub form if necessary.
///
/// Insert-or-ignore with only the supplied fields: never errors when
/// the row already exists (hydrated or stub) and never overwrites
/// existing data.
///
/// # Errors
///
/// Returns an error only on database failure.
pub fn ensure_author_stub(
    conn: &Connection,
    author_id: i64,
    handle: Option<&str>,
    name: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO authors (id, handle, name) VALUES (?1, ?2, ?3)
         ON CONFLICT (id) DO NOTHING",
        params![author_id, handle, name],
    )?;
    Ok(())
}

/// Insert or update an author row from a full profile observation.
///
/// Every column is rewritten to the latest observation, so a stub row
/// is upgraded to hydrated form and a prior hydrated row is refreshed.
/// Stub writes go through [`ensure_author_stub`] instead and never
/// reach this path, which keeps hydration monotonic.
///
/// # Errors
///
/// Returns an error on database failure.
pub fn upsert_author(conn: &Connection, author: &AuthorProfile, link_id: Option<i64>) -> Result<()> {
    conn.execute(
        "INSERT INTO authors
            (id, created_at, updated_at, link_id, friends_count,
             listed_count, favourites_count, statuses_count, protected,
             verified, handle, name, location, description, withheld_in_countries)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT (id) DO UPDATE SET
            created_at = excluded.created_at,
            updated_at = excluded.updated_at,
            link_id = excluded.link_id,
            friends_count = excluded.friends_count,
            listed_count = excluded.listed_count,
            favourites_count = excluded.favourites_count,
            statuses_count = excluded.statuses_count,
            protected = excluded.protected,
            verified = excluded.verified,
            handle = excluded.handle,
            name = excluded.name,
            location = excluded.location,
            description = excluded.description,
            withheld_in_countries = excluded.withheld_in_countries",
        params![
            author.id,
            rfc3339_opt(author.created_at),
            rfc3339_opt(author.updated_at),
            link_id,
            author.friends_count,
            author.listed_count,
            author.favourites_count,
            author.statuses_count,
            i64::from(author.protected),
            i64::from(author.verified),
            author.handle,
            author.name,
            author.location,
            author.description,
            author.withheld_in_countries,
        ],
    )?;
    Ok(())
}

/// Idempotency gate: has this post already been loaded?
///
/// # Errors
///
/// Returns an error on database failure.
pub fn post_exists(conn: &Connection, post_id: i64) -> Result<bool> {
    let found = conn.query_row(
        "SELECT 1 FROM posts WHERE id = ?1",
        params![post_id],
        |_| Ok(()),
    );
    match found {
        Ok(()) => Ok(true),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Insert the post row, keyed by identity.
///
/// Insert-or-ignore: defensive against another loader process
/// observing the same record between our idempotency gate and this
/// write.
///
/// # Errors
///
/// Returns an error on database failure.
pub fn insert_post(conn: &Connection, post: &CanonicalPost) -> Result<()> {
    conn.execute(
        "INSERT INTO posts
            (id, author_id, created_at, reply_to_post_id, reply_to_author_id,
             quoted_post_id, retweet_count, favorite_count, quote_count,
             withheld_copyright, withheld_in_countries, source, text,
             country_code, state_code, lang, place_name, geo)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
         ON CONFLICT (id) DO NOTHING",
        params![
            post.id,
            post.author.id,
            rfc3339_opt(post.created_at),
            post.reply_to_post_id,
            post.reply_to_author_id,
            post.quoted_post_id,
            post.retweet_count,
            post.favorite_count,
            post.quote_count,
            i64::from(post.withheld_copyright),
            post.withheld_in_countries,
            post.source,
            post.text,
            post.country_code,
            post.state_code,
            post.lang,
            post.place_name,
            stored_geo(post.geo.as_ref()),
        ],
    )?;
    Ok(())
}

/// Associate a post with a resolved link row.
///
/// # Errors
///
/// Returns an error on database failure.
pub fn add_post_link(conn: &Connection, post_id: i64, link_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO post_links (post_id, link_id) VALUES (?1, ?2)
         ON CONFLICT (post_id, link_id) DO NOTHING",
        params![post_id, link_id],
    )?;
    Ok(())
}

/// Associate a post with a mentioned author.
///
/// # Errors
///
/// Returns an error on database failure.
pub fn add_post_mention(conn: &Connection, post_id: i64, author_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO post_mentions (post_id, author_id) VALUES (?1, ?2)
         ON CONFLICT (post_id, author_id) DO NOTHING",
        params![post_id, author_id],
    )?;
    Ok(())
}

/// Associate a post with a tag.
///
/// # Errors
///
/// Returns an error on database failure.
pub fn add_post_tag(conn: &Connection, post_id: i64, tag: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO post_tags (post_id, tag) VALUES (?1, ?2)
         ON CONFLICT (post_id, tag) DO NOTHING",
        params![post_id, tag],
    )?;
    Ok(())
}

/// Associate a post with a media link and its kind classifier.
///
/// # Errors
///
/// Returns an error on database failure.
pub fn add_post_media(
    conn: &Connection,
    post_id: i64,
    link_id: i64,
    kind: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO post_media (post_id, link_id, kind) VALUES (?1, ?2, ?3)
         ON CONFLICT (post_id, link_id) DO NOTHING",
        params![post_id, link_id, kind],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuthorProfile;

    fn profile(id: i64, name: &str) -> AuthorProfile {
        AuthorProfile {
            id,
            created_at: None,
            updated_at: None,
            url: None,
            friends_count: 10,
            listed_count: 1,
            favourites_count: 2,
            statuses_count: 3,
            protected: false,
            verified: true,
            handle: Some(format!("handle_{id}")),
            name: Some(name.to_string()),
            location: Some("somewhere".to_string()),
            description: Some("a person".to_string()),
            withheld_in_countries: None,
        }
    }

    #[test]
    fn resolve_link_dedupes_by_url() {
        let storage = Storage::open_memory().unwrap();
        let conn = storage.connection();

        let first = resolve_link(conn, "https://example.com/a").unwrap();
        for _ in 0..5 {
            assert_eq!(resolve_link(conn, "https://example.com/a").unwrap(), first);
        }
        let other = resolve_link(conn, "https://example.com/b").unwrap();
        assert_ne!(first, other);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM links", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn stub_never_overwrites_existing_data() {
        let storage = Storage::open_memory().unwrap();
        let conn = storage.connection();

        upsert_author(conn, &profile(7, "Full Name"), None).unwrap();
        ensure_author_stub(conn, 7, None, None).unwrap();

        let name: Option<String> = conn
            .query_row("SELECT name FROM authors WHERE id = 7", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name.as_deref(), Some("Full Name"));
    }

    #[test]
    fn hydration_upgrades_a_stub() {
        let storage = Storage::open_memory().unwrap();
        let conn = storage.connection();

        ensure_author_stub(conn, 9, Some("early_handle"), None).unwrap();
        upsert_author(conn, &profile(9, "Hydrated"), None).unwrap();

        let (name, statuses): (Option<String>, Option<i64>) = conn
            .query_row(
                "SELECT name, statuses_count FROM authors WHERE id = 9",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(name.as_deref(), Some("Hydrated"));
        assert_eq!(statuses, Some(3));
    }

    #[test]
    fn stub_insert_is_idempotent() {
        let storage = Storage::open_memory().unwrap();
        let conn = storage.connection();

        ensure_author_stub(conn, 11, Some("h"), Some("n")).unwrap();
        ensure_author_stub(conn, 11, Some("other"), None).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM authors", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let handle: Option<String> = conn
            .query_row("SELECT handle FROM authors WHERE id = 11", [], |r| r.get(0))
            .unwrap();
        assert_eq!(handle.as_deref(), Some("h"));
    }
}
