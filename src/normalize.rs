//! Record normalization.
//!
//! Reduces one raw streaming-format JSON record to a [`CanonicalPost`].
//! Field extraction follows fallback chains from the richer "extended"
//! variant of a field to its base location, taking the first present
//! value. Absent containers yield empty collections, absent counters
//! yield 0, absent flags yield false; nothing in here errors except a
//! record missing its own identity or its author's.

use crate::error::{LoadError, Result};
use crate::geo::normalize_geo;
use crate::model::{AuthorProfile, CanonicalPost, MediaRef, MentionRef};
use crate::sanitize::{sanitize, sanitize_opt};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Parse the streaming date format: "Wed Jan 08 12:00:00 +0000 2025".
/// Falls back to RFC 3339 for re-serialized inputs.
fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(date_str, "%a %b %d %H:%M:%S %z %Y")
        .or_else(|_| DateTime::parse_from_rfc3339(date_str))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn date_field(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_date)
}

/// Withholding country lists arrive as a JSON array of codes; stored
/// as one comma-joined text field.
fn withheld_countries(value: &Value) -> Option<String> {
    let countries: Vec<&str> = value.as_array()?.iter().filter_map(Value::as_str).collect();
    if countries.is_empty() {
        return None;
    }
    Some(sanitize(&countries.join(",")))
}

/// Select an entity list, preferring the extended variant of the
/// record. Absent on both paths yields an empty slice.
fn entity_list<'a>(record: &'a Value, container: &str, key: &str) -> &'a [Value] {
    let extended = &record["extended_tweet"][container][key];
    let chosen = if extended.is_array() {
        extended
    } else {
        &record[container][key]
    };
    chosen.as_array().map_or(&[], Vec::as_slice)
}

fn parse_links(record: &Value) -> Vec<String> {
    entity_list(record, "entities", "urls")
        .iter()
        .filter_map(|u| u["expanded_url"].as_str().map(String::from))
        .collect()
}

fn parse_mentions(record: &Value) -> Vec<MentionRef> {
    entity_list(record, "entities", "user_mentions")
        .iter()
        .filter_map(|m| {
            Some(MentionRef {
                author_id: m["id"].as_i64()?,
                handle: sanitize_opt(m["screen_name"].as_str()),
                name: sanitize_opt(m["name"].as_str()),
            })
        })
        .collect()
}

/// Hashtags prefixed with `#`, symbols with `$`, concatenated into one
/// tag list. Each entry is sanitized individually.
fn parse_tags(record: &Value) -> Vec<String> {
    let hashtags = entity_list(record, "entities", "hashtags")
        .iter()
        .filter_map(|h| h["text"].as_str().map(|t| sanitize(&format!("#{t}"))));
    let symbols = entity_list(record, "entities", "symbols")
        .iter()
        .filter_map(|s| s["text"].as_str().map(|t| sanitize(&format!("${t}"))));
    hashtags.chain(symbols).collect()
}

fn parse_media(record: &Value) -> Vec<MediaRef> {
    entity_list(record, "extended_entities", "media")
        .iter()
        .filter_map(|m| {
            Some(MediaRef {
                url: m["media_url"].as_str()?.to_string(),
                kind: m["type"].as_str().map(String::from),
            })
        })
        .collect()
}

fn parse_author(record: &Value) -> Result<AuthorProfile> {
    let user = &record["user"];
    let id = user["id"]
        .as_i64()
        .ok_or_else(|| LoadError::decode("record has no user.id"))?;

    Ok(AuthorProfile {
        id,
        created_at: date_field(&user["created_at"]),
        updated_at: date_field(&user["updated_at"]),
        url: user["url"].as_str().map(String::from),
        friends_count: user["friends_count"].as_i64().unwrap_or(0),
        listed_count: user["listed_count"].as_i64().unwrap_or(0),
        favourites_count: user["favourites_count"].as_i64().unwrap_or(0),
        statuses_count: user["statuses_count"].as_i64().unwrap_or(0),
        protected: user["protected"].as_bool().unwrap_or(false),
        verified: user["verified"].as_bool().unwrap_or(false),
        handle: sanitize_opt(user["screen_name"].as_str()),
        name: sanitize_opt(user["name"].as_str()),
        location: sanitize_opt(user["location"].as_str()),
        description: sanitize_opt(user["description"].as_str()),
        withheld_in_countries: withheld_countries(&record["withheld_in_countries"]),
    })
}

/// Derive a US state code from the place display name.
///
/// Source-specific heuristic: only when the country code is `us`, take
/// the final comma-separated component of `place.full_name`, trimmed
/// and lowercased, and discard anything longer than two characters
/// ("Austin, TX" -> "tx", "Somewhere, Texas" -> unset). Deliberately
/// not generalized to other locales.
fn derive_state_code(record: &Value, country_code: Option<&str>) -> Option<String> {
    if country_code != Some("us") {
        return None;
    }
    let full_name = record["place"]["full_name"].as_str()?;
    let state = full_name.rsplit(',').next()?.trim().to_lowercase();
    if state.chars().count() > 2 {
        return None;
    }
    Some(state)
}

/// Reduce one raw record to its canonical form.
///
/// # Errors
///
/// Returns [`LoadError::Decode`] when the record lacks its own id or
/// its author's id; everything else is defaulted, not erred on.
pub fn normalize(record: &Value) -> Result<CanonicalPost> {
    let id = record["id"]
        .as_i64()
        .ok_or_else(|| LoadError::decode("record has no id"))?;
    let author = parse_author(record)?;

    let text = record["extended_tweet"]["full_text"]
        .as_str()
        .or_else(|| record["text"].as_str());

    let country_code = record["place"]["country_code"]
        .as_str()
        .map(str::to_lowercase);
    let state_code = derive_state_code(record, country_code.as_deref());

    Ok(CanonicalPost {
        id,
        created_at: date_field(&record["created_at"]),
        reply_to_post_id: record["in_reply_to_status_id"].as_i64(),
        reply_to_author_id: record["in_reply_to_user_id"].as_i64(),
        quoted_post_id: record["quoted_status_id"].as_i64(),
        retweet_count: record["retweet_count"].as_i64().unwrap_or(0),
        favorite_count: record["favorite_count"].as_i64().unwrap_or(0),
        quote_count: record["quote_count"].as_i64().unwrap_or(0),
        withheld_copyright: record["withheld_copyright"].as_bool().unwrap_or(false),
        withheld_in_countries: withheld_countries(&record["withheld_in_countries"]),
        source: sanitize_opt(record["source"].as_str()),
        text: sanitize_opt(text),
        state_code,
        country_code,
        lang: sanitize(record["lang"].as_str().unwrap_or("")),
        place_name: record["place"]["full_name"].as_str().map(String::from),
        geo: normalize_geo(record),
        links: parse_links(record),
        mentions: parse_mentions(record),
        tags: parse_tags(record),
        media: parse_media(record),
        author,
    })
}
