//! Content-addressed cache for channel search results.
//!
//! Keys are derived from (search type, canonicalized query params) so the
//! same logical query always lands on the same entry no matter how the
//! caller ordered its fields. Patent results never expire; web and retail
//! results expire after a fixed window and are additionally bounded by a
//! per-type row cap with oldest-first eviction. A cache problem is never
//! allowed to become a pipeline problem: failures degrade to a miss.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use priorscan_common::{Channel, NoveltyFinding};
use tracing::{debug, warn};

/// Expiry window for web and retail entries.
pub const WEB_RETAIL_TTL_DAYS: i64 = 7;

/// Max retained rows per search type before oldest-first eviction.
pub const MAX_ROWS_PER_TYPE: usize = 1000;

#[derive(Debug, Clone)]
pub struct CachedSearchResult {
    pub query_hash: String,
    pub search_type: Channel,
    pub query_params: serde_json::Value,
    pub results: Vec<NoveltyFinding>,
    pub result_count: usize,
    pub source_api: String,
    pub created_at: DateTime<Utc>,
    /// None means the entry never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct SearchCache {
    entries: RwLock<HashMap<String, CachedSearchResult>>,
    max_rows_per_type: usize,
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchCache {
    pub fn new() -> Self {
        Self::with_max_rows(MAX_ROWS_PER_TYPE)
    }

    pub fn with_max_rows(max_rows_per_type: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_rows_per_type,
        }
    }

    /// Derive the cache key: canonical JSON (object keys sorted at every
    /// depth) hashed with FNV-1a, prefixed with the search type.
    pub fn query_hash(search_type: Channel, query_params: &serde_json::Value) -> String {
        let mut canonical = String::new();
        write_canonical(query_params, &mut canonical);
        format!("{search_type}:{:016x}", fnv1a_64(&canonical))
    }

    pub fn get(
        &self,
        search_type: Channel,
        query_params: &serde_json::Value,
    ) -> Option<CachedSearchResult> {
        self.get_at(search_type, query_params, Utc::now())
    }

    pub fn put(
        &self,
        search_type: Channel,
        query_params: &serde_json::Value,
        results: Vec<NoveltyFinding>,
        source_api: &str,
    ) {
        self.put_at(search_type, query_params, results, source_api, Utc::now());
    }

    fn get_at(
        &self,
        search_type: Channel,
        query_params: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Option<CachedSearchResult> {
        let key = Self::query_hash(search_type, query_params);

        let expired = {
            let entries = match self.entries.read() {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(error = %err, "Search cache read failed, treating as miss");
                    return None;
                }
            };
            match entries.get(&key) {
                Some(entry) => match entry.expires_at {
                    Some(expires_at) if expires_at <= now => true,
                    _ => {
                        debug!(key, search_type = %search_type, "Search cache hit");
                        return Some(entry.clone());
                    }
                },
                None => return None,
            }
        };

        // Expired rows are removed on read rather than returned stale.
        if expired {
            if let Ok(mut entries) = self.entries.write() {
                entries.remove(&key);
            }
            debug!(key, search_type = %search_type, "Search cache entry expired");
        }
        None
    }

    fn put_at(
        &self,
        search_type: Channel,
        query_params: &serde_json::Value,
        results: Vec<NoveltyFinding>,
        source_api: &str,
        now: DateTime<Utc>,
    ) {
        let key = Self::query_hash(search_type, query_params);
        let expires_at = match search_type {
            // Patents are permanent public record; a result stays valid.
            Channel::Patent => None,
            Channel::Web | Channel::Retail => Some(now + Duration::days(WEB_RETAIL_TTL_DAYS)),
        };

        let entry = CachedSearchResult {
            query_hash: key.clone(),
            search_type,
            query_params: query_params.clone(),
            result_count: results.len(),
            results,
            source_api: source_api.to_string(),
            created_at: now,
            expires_at,
        };

        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "Search cache write failed, skipping");
                return;
            }
        };

        // Last writer on a given hash wins.
        entries.insert(key, entry);

        // Enforce the per-type row bound, oldest created_at first. Only rows
        // of the inserted type are candidates.
        let mut of_type: Vec<(String, DateTime<Utc>)> = entries
            .iter()
            .filter(|(_, e)| e.search_type == search_type)
            .map(|(k, e)| (k.clone(), e.created_at))
            .collect();
        if of_type.len() > self.max_rows_per_type {
            of_type.sort_by_key(|(_, created_at)| *created_at);
            let excess = of_type.len() - self.max_rows_per_type;
            for (key, _) in of_type.into_iter().take(excess) {
                entries.remove(&key);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

/// Serialize with object keys sorted at every nesting level, so field order
/// in the caller never affects the hash.
fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

fn fnv1a_64(input: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for byte in input.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finding(title: &str) -> NoveltyFinding {
        NoveltyFinding {
            title: title.to_string(),
            description: String::new(),
            url: None,
            similarity_score: None,
            source: "test".to_string(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn round_trip_returns_stored_results() {
        let cache = SearchCache::new();
        let params = json!({"q": "foldable solar charger", "num": 10});

        cache.put(Channel::Web, &params, vec![finding("a")], "serper");
        let hit = cache.get(Channel::Web, &params).expect("cache hit");

        assert_eq!(hit.result_count, 1);
        assert_eq!(hit.results[0].title, "a");
        assert_eq!(hit.source_api, "serper");
    }

    #[test]
    fn key_is_independent_of_field_order() {
        let a = json!({"a": 1, "b": 2, "nested": {"y": 2, "x": 1}});
        let b = json!({"b": 2, "nested": {"x": 1, "y": 2}, "a": 1});
        assert_eq!(
            SearchCache::query_hash(Channel::Web, &a),
            SearchCache::query_hash(Channel::Web, &b)
        );
    }

    #[test]
    fn key_differs_across_search_types() {
        let params = json!({"q": "x"});
        assert_ne!(
            SearchCache::query_hash(Channel::Web, &params),
            SearchCache::query_hash(Channel::Patent, &params)
        );
    }

    #[test]
    fn patent_entries_never_expire() {
        let cache = SearchCache::new();
        let params = json!({"q": "hinge"});
        let now = Utc::now();

        cache.put_at(Channel::Patent, &params, vec![finding("p")], "patentsview", now);
        let later = now + Duration::days(365 * 10);
        assert!(cache.get_at(Channel::Patent, &params, later).is_some());
    }

    #[test]
    fn web_entries_expire_after_window() {
        let cache = SearchCache::new();
        let params = json!({"q": "hinge"});
        let now = Utc::now();

        cache.put_at(Channel::Web, &params, vec![finding("w")], "serper", now);

        let before = now + Duration::days(WEB_RETAIL_TTL_DAYS) - Duration::hours(1);
        assert!(cache.get_at(Channel::Web, &params, before).is_some());

        let after = now + Duration::days(WEB_RETAIL_TTL_DAYS) + Duration::hours(1);
        assert!(cache.get_at(Channel::Web, &params, after).is_none());

        // The expired row was deleted, not just hidden.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let cache = SearchCache::new();
        let params = json!({"q": "mug"});

        cache.put(Channel::Retail, &params, vec![finding("old")], "serper");
        cache.put(Channel::Retail, &params, vec![finding("new"), finding("x")], "serper");

        let hit = cache.get(Channel::Retail, &params).expect("cache hit");
        assert_eq!(hit.result_count, 2);
        assert_eq!(hit.results[0].title, "new");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn eviction_removes_only_oldest_of_same_type() {
        let cache = SearchCache::with_max_rows(3);
        let now = Utc::now();

        cache.put_at(Channel::Patent, &json!({"q": "keep"}), vec![], "patentsview", now);
        for i in 0..3 {
            cache.put_at(
                Channel::Web,
                &json!({ "q": format!("q{i}") }),
                vec![],
                "serper",
                now + Duration::seconds(i),
            );
        }

        // Entry #4 of type web evicts exactly the oldest web row.
        cache.put_at(
            Channel::Web,
            &json!({"q": "q3"}),
            vec![],
            "serper",
            now + Duration::seconds(10),
        );

        assert!(cache.get_at(Channel::Web, &json!({"q": "q0"}), now).is_none());
        assert!(cache.get_at(Channel::Web, &json!({"q": "q1"}), now).is_some());
        assert!(cache.get_at(Channel::Web, &json!({"q": "q3"}), now).is_some());
        assert!(cache
            .get_at(Channel::Patent, &json!({"q": "keep"}), now)
            .is_some());
    }
}
