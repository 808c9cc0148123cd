//! Data models for normalized post records.
//!
//! These structures are the canonical form a raw record is reduced to
//! before any row is written. Downstream code operates on these typed
//! fields, never on the raw JSON.

use crate::geo::Geometry;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Full author profile as observed on a posting record.
///
/// Every field except `id` is optional or defaulted: the same struct
/// also describes a prior stub row being upgraded to hydrated form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorProfile {
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Profile link, resolved to a `links` row before the author row
    /// is written.
    pub url: Option<String>,
    pub friends_count: i64,
    pub listed_count: i64,
    pub favourites_count: i64,
    pub statuses_count: i64,
    pub protected: bool,
    pub verified: bool,
    pub handle: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub withheld_in_countries: Option<String>,
}

/// An author referenced in a post body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MentionRef {
    pub author_id: i64,
    pub handle: Option<String>,
    pub name: Option<String>,
}

/// A media attachment: resource URL plus kind classifier (photo,
/// video, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: Option<String>,
}

/// Canonical form of one post record plus its side-collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalPost {
    pub id: i64,
    pub author: AuthorProfile,
    pub created_at: Option<DateTime<Utc>>,
    pub reply_to_post_id: Option<i64>,
    /// May reference an author that exists only as a stub.
    pub reply_to_author_id: Option<i64>,
    pub quoted_post_id: Option<i64>,
    pub retweet_count: i64,
    pub favorite_count: i64,
    pub quote_count: i64,
    pub withheld_copyright: bool,
    pub withheld_in_countries: Option<String>,
    pub source: Option<String>,
    pub text: Option<String>,
    pub country_code: Option<String>,
    pub state_code: Option<String>,
    /// Defaults to empty string when absent, unlike the other optional
    /// fields. Observed source behavior, kept as-is.
    pub lang: String,
    pub place_name: Option<String>,
    pub geo: Option<Geometry>,
    /// Expanded entity URLs.
    pub links: Vec<String>,
    pub mentions: Vec<MentionRef>,
    /// `#`-prefixed hashtags followed by `$`-prefixed symbols.
    pub tags: Vec<String>,
    pub media: Vec<MediaRef>,
}
