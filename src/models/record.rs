// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Raw relay record (signed event) as received from an endpoint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Event kind used for workout records.
pub const WORKOUT_KIND: u32 = 1301;

/// A record exactly as published on a relay.
///
/// Records are content-addressed: two records with the same `id` are the
/// same logical event no matter which endpoint served them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    /// Author identity (hex public key)
    #[serde(rename = "pubkey")]
    pub author_id: String,
    /// Creation time (Unix seconds)
    pub created_at: i64,
    pub kind: u32,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
}

impl RawRecord {
    /// First tag whose key matches `key`.
    pub fn tag(&self, key: &str) -> Option<&[String]> {
        self.tags
            .iter()
            .find(|t| t.first().is_some_and(|k| k == key))
            .map(|t| t.as_slice())
    }

    /// First value of the first tag named `key`.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tag(key).and_then(|t| t.get(1)).map(String::as_str)
    }

    /// All first values of tags named `key`.
    pub fn tag_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.first().is_some_and(|k| k == key))
            .filter_map(|t| t.get(1))
            .map(String::as_str)
    }

    /// Compute the content-derived id:
    /// `hex(sha256([0, pubkey, created_at, kind, tags, content]))`.
    pub fn compute_id(&self) -> String {
        let canonical = serde_json::json!([
            0,
            self.author_id,
            self.created_at,
            self.kind,
            self.tags,
            self.content
        ]);
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        hex::encode(digest)
    }

    /// Whether `id` matches the content hash.
    pub fn has_valid_id(&self) -> bool {
        self.id.eq_ignore_ascii_case(&self.compute_id())
    }

    /// Whether the record carries a `client` or `source` tag containing one
    /// of `identifiers` (case-insensitive). An empty list matches everything.
    pub fn matches_client(&self, identifiers: &[String]) -> bool {
        if identifiers.is_empty() {
            return true;
        }

        self.tag_values("client")
            .chain(self.tag_values("source"))
            .any(|value| {
                let value = value.to_lowercase();
                identifiers
                    .iter()
                    .any(|id| value.contains(&id.to_lowercase()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tags: Vec<Vec<&str>>) -> RawRecord {
        RawRecord {
            id: "abc".to_string(),
            author_id: "P1".to_string(),
            created_at: 1_700_000_000,
            kind: WORKOUT_KIND,
            tags: tags
                .into_iter()
                .map(|t| t.into_iter().map(String::from).collect())
                .collect(),
            content: String::new(),
        }
    }

    #[test]
    fn test_tag_lookup() {
        let r = record(vec![vec!["distance", "5", "km"], vec!["exercise", "run"]]);
        assert_eq!(r.tag("distance").map(|t| t.len()), Some(3));
        assert_eq!(r.tag_value("exercise"), Some("run"));
        assert_eq!(r.tag_value("missing"), None);
    }

    #[test]
    fn test_tag_with_key_only_has_no_value() {
        let r = record(vec![vec!["distance"]]);
        assert!(r.tag("distance").is_some());
        assert_eq!(r.tag_value("distance"), None);
    }

    #[test]
    fn test_compute_id_roundtrip() {
        let mut r = record(vec![vec!["exercise", "run"]]);
        r.id = r.compute_id();
        assert_eq!(r.id.len(), 64);
        assert!(r.has_valid_id());

        r.content = "tampered".to_string();
        assert!(!r.has_valid_id());
    }

    #[test]
    fn test_matches_client() {
        let r = record(vec![vec!["client", "RUNSTR v1.2"]]);
        assert!(r.matches_client(&["runstr".to_string()]));
        assert!(!r.matches_client(&["other".to_string()]));
        assert!(r.matches_client(&[]));

        let r = record(vec![vec!["source", "runstr"]]);
        assert!(r.matches_client(&["RUNSTR".to_string()]));
    }

    #[test]
    fn test_deserialize_wire_shape() {
        let json = r#"{
            "id": "a",
            "pubkey": "P1",
            "created_at": 1700000000,
            "kind": 1301,
            "tags": [["distance", "5", "km"]],
            "content": "Morning run",
            "sig": "ignored"
        }"#;
        let r: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.author_id, "P1");
        assert_eq!(r.tag_value("distance"), Some("5"));
    }
}
