//! Geometry normalization for post records.
//!
//! Source records carry location data in several shapes: an exact
//! coordinate pair, a place bounding box, or nothing at all. This
//! module collapses them into one canonical encoding, with an explicit
//! `Unknown` for authors who opted into location sharing but whose
//! record carries no geometry.
//!
//! Malformed geo substructures never escape this module: every
//! extraction is an `Option` chain that falls through to the next rule.

use serde_json::Value;
use std::fmt::Write as _;

/// Canonical geometry for a post.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Geometry {
    /// An exact coordinate pair.
    Point { lon: f64, lat: f64 },
    /// A bounding region: ordered list of closed rings.
    Polygon(Vec<Vec<[f64; 2]>>),
    /// The author shares location but this record carries no geometry.
    Unknown,
}

impl Geometry {
    /// Encode as well-known text. `Unknown` has no WKT form.
    #[must_use]
    pub fn to_wkt(&self) -> Option<String> {
        match self {
            Self::Point { lon, lat } => Some(format!("POINT({lon} {lat})")),
            Self::Polygon(rings) => {
                let mut wkt = String::from("POLYGON(");
                for (i, ring) in rings.iter().enumerate() {
                    if i > 0 {
                        wkt.push(',');
                    }
                    wkt.push('(');
                    for (j, [x, y]) in ring.iter().enumerate() {
                        if j > 0 {
                            wkt.push(',');
                        }
                        let _ = write!(wkt, "{x} {y}");
                    }
                    wkt.push(')');
                }
                wkt.push(')');
                Some(wkt)
            }
            Self::Unknown => None,
        }
    }
}

/// Extract canonical geometry from a raw record.
///
/// Priority order:
/// 1. `geo.coordinates` pair -> [`Geometry::Point`]
/// 2. `place.bounding_box.coordinates` -> [`Geometry::Polygon`] with
///    each ring closed (first vertex repeated as last)
/// 3. `user.geo_enabled` true with no geometry -> [`Geometry::Unknown`]
/// 4. otherwise `None` (the record simply has no geo)
#[must_use]
pub fn normalize_geo(record: &Value) -> Option<Geometry> {
    if let Some(point) = parse_point(record) {
        return Some(point);
    }
    if let Some(polygon) = parse_polygon(record) {
        return Some(polygon);
    }
    if record["user"]["geo_enabled"].as_bool() == Some(true) {
        return Some(Geometry::Unknown);
    }
    None
}

/// Map geometry onto its stored text representation.
///
/// Three-way distinction in the `geo` column: a record with no geo at
/// all stores an empty string, `Unknown` stores SQL NULL, and concrete
/// geometry stores its WKT.
#[must_use]
pub fn stored_geo(geo: Option<&Geometry>) -> Option<String> {
    match geo {
        None => Some(String::new()),
        Some(Geometry::Unknown) => None,
        Some(g) => g.to_wkt(),
    }
}

fn parse_point(record: &Value) -> Option<Geometry> {
    let coords = record["geo"]["coordinates"].as_array()?;
    let lon = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    Some(Geometry::Point { lon, lat })
}

fn parse_polygon(record: &Value) -> Option<Geometry> {
    let raw_rings = record["place"]["bounding_box"]["coordinates"].as_array()?;
    let mut rings = Vec::with_capacity(raw_rings.len());
    for raw_ring in raw_rings {
        let vertices = raw_ring.as_array()?;
        let mut ring = Vec::with_capacity(vertices.len() + 1);
        for vertex in vertices {
            ring.push(parse_vertex(vertex)?);
        }
        // Close the ring: first vertex repeated as last. An empty ring
        // has nothing to close and marks the structure malformed.
        let first = *ring.first()?;
        ring.push(first);
        rings.push(ring);
    }
    if rings.is_empty() {
        return None;
    }
    Some(Geometry::Polygon(rings))
}

fn parse_vertex(vertex: &Value) -> Option<[f64; 2]> {
    let pair = vertex.as_array()?;
    let x = pair.first()?.as_f64()?;
    let y = pair.get(1)?.as_f64()?;
    Some([x, y])
}
