//! Raw-record normalization into canonical [`Listing`]s.
//!
//! Per-source field mappings are data, not code: each source tag maps
//! to a [`FieldMap`] of candidate key paths, so supporting a new
//! scraper schema is a registration (or config) change rather than a
//! new control-flow branch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{Listing, compute_hash};

/// Field mapping table for one source schema.
///
/// Each field lists candidate keys in priority order; the first key
/// present in the raw record wins. Keys may be dotted paths into
/// nested objects (e.g. `hourly.range`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldMap {
    #[serde(default)]
    pub id: Vec<String>,
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub organization: Vec<String>,
    /// Used when no organization key is present (e.g. marketplace
    /// sources that never name the client).
    #[serde(default)]
    pub organization_default: Option<String>,
    #[serde(default)]
    pub url: Vec<String>,
    #[serde(default)]
    pub compensation: Vec<String>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub posted_at: Vec<String>,
}

fn paths(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

impl FieldMap {
    fn upwork() -> Self {
        Self {
            id: paths(&["id"]),
            title: paths(&["title", "job_title"]),
            organization: vec![],
            organization_default: Some("Upwork Client".to_string()),
            url: paths(&["url", "job_url"]),
            compensation: paths(&["hourly.range", "pay"]),
            description: paths(&["description"]),
            posted_at: paths(&["ts_publish", "date_posted"]),
        }
    }

    fn linkedin() -> Self {
        Self {
            id: paths(&["id"]),
            title: paths(&["title"]),
            organization: paths(&["company"]),
            organization_default: None,
            url: paths(&["url", "job_url"]),
            compensation: paths(&["salary"]),
            description: paths(&["description"]),
            posted_at: paths(&["date_posted"]),
        }
    }

    fn generic() -> Self {
        Self {
            id: paths(&["id"]),
            title: paths(&["title"]),
            organization: paths(&["company"]),
            organization_default: Some("Unknown".to_string()),
            url: paths(&["url"]),
            compensation: paths(&["pay"]),
            description: paths(&["description"]),
            posted_at: paths(&["posted_at"]),
        }
    }
}

/// Maps raw records plus their source tag into canonical listings.
///
/// Never fails: missing fields map to empty defaults, and records with
/// no native id get a content-hash identity (SHA-256 over the compact
/// JSON serialization of the raw payload). Hash identities are fragile
/// to upstream formatting changes: a byte-different re-scrape of the
/// same posting becomes a new listing. Accepted limitation.
#[derive(Debug, Clone)]
pub struct Normalizer {
    maps: HashMap<String, FieldMap>,
    fallback: FieldMap,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Normalizer with the built-in source mappings.
    pub fn new() -> Self {
        let mut maps = HashMap::new();
        maps.insert("upwork".to_string(), FieldMap::upwork());
        maps.insert("linkedin".to_string(), FieldMap::linkedin());
        Self {
            maps,
            fallback: FieldMap::generic(),
        }
    }

    /// Register (or override) the mapping for a source tag.
    pub fn register(&mut self, source: impl Into<String>, map: FieldMap) {
        self.maps.insert(source.into(), map);
    }

    pub fn normalize(&self, raw: &serde_json::Value, source: &str) -> Listing {
        self.normalize_at(raw, source, Utc::now())
    }

    /// Like [`normalize`](Self::normalize) with an explicit `found_at`,
    /// so tests can pin timestamps.
    pub fn normalize_at(
        &self,
        raw: &serde_json::Value,
        source: &str,
        found_at: DateTime<Utc>,
    ) -> Listing {
        let map = self.maps.get(source).unwrap_or(&self.fallback);

        let identity = match first_value(raw, &map.id) {
            Some(id) => format!("{source}:{id}"),
            None => format!("{source}:{}", compute_hash(&raw.to_string())),
        };

        let organization = first_value(raw, &map.organization)
            .or_else(|| map.organization_default.clone())
            .unwrap_or_default();

        Listing {
            identity,
            source: source.to_string(),
            title: first_value(raw, &map.title).unwrap_or_default(),
            organization,
            url: first_value(raw, &map.url).unwrap_or_default(),
            compensation: first_value(raw, &map.compensation).unwrap_or_default(),
            description: first_value(raw, &map.description).unwrap_or_default(),
            posted_at: first_value(raw, &map.posted_at),
            raw: raw.clone(),
            found_at: Some(found_at),
            sent_at: None,
            filtered_reason: None,
        }
    }
}

/// Resolve the first present, non-null candidate key to text.
fn first_value(raw: &serde_json::Value, keys: &[String]) -> Option<String> {
    keys.iter().find_map(|key| lookup_path(raw, key))
}

fn lookup_path(raw: &serde_json::Value, path: &str) -> Option<String> {
    let mut current = raw;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    stringify(current)
}

fn stringify(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
