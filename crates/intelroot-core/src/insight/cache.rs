//! Hash-based cache validity
//!
//! Both insight classes share one primitive: content-hash equality,
//! optionally combined with a TTL. Category insights pass a 24h TTL;
//! period trends pass None and stay valid until their document set
//! changes.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

/// TTL applied to category insights
pub fn category_insight_ttl() -> Duration {
    Duration::hours(24)
}

/// Digest length kept for stored hashes (hex chars)
const HASH_LEN: usize = 16;

/// Short content fingerprint of a single document's artifact body
pub fn content_fingerprint(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..HASH_LEN].to_string()
}

/// Stable hash over the set of documents contributing to a derived
/// artifact. Sorted so contribution order never changes the result;
/// document ids are included so identical bodies stay distinguishable.
pub fn combined_hash<'a>(contributors: impl IntoIterator<Item = (i64, &'a str)>) -> String {
    let mut entries: Vec<String> = contributors
        .into_iter()
        .map(|(id, body)| format!("{id}:{}", content_fingerprint(body)))
        .collect();
    entries.sort();

    let mut hasher = Sha256::new();
    hasher.update(entries.join("|").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..HASH_LEN].to_string()
}

/// Is a stored entry still valid? Hash equality is always required;
/// when a TTL is given the entry must also be younger than it.
pub fn is_valid(
    stored_hash: &str,
    current_hash: &str,
    created_at: DateTime<Utc>,
    ttl: Option<Duration>,
) -> bool {
    if stored_hash != current_hash {
        return false;
    }
    match ttl {
        Some(ttl) => Utc::now() - created_at < ttl,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_hash_order_independent() {
        let a = combined_hash(vec![(1, "alpha"), (2, "beta")]);
        let b = combined_hash(vec![(2, "beta"), (1, "alpha")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_LEN);
    }

    #[test]
    fn test_combined_hash_changes_with_new_document() {
        let before = combined_hash(vec![(1, "alpha"), (2, "beta")]);
        let after = combined_hash(vec![(1, "alpha"), (2, "beta"), (3, "gamma")]);
        assert_ne!(before, after);
    }

    #[test]
    fn test_combined_hash_changes_with_content() {
        let before = combined_hash(vec![(1, "alpha")]);
        let after = combined_hash(vec![(1, "alpha revised")]);
        assert_ne!(before, after);
    }

    #[test]
    fn test_identical_bodies_distinct_ids() {
        let one = combined_hash(vec![(1, "same"), (2, "same")]);
        let other = combined_hash(vec![(1, "same")]);
        assert_ne!(one, other);
    }

    #[test]
    fn test_validity_requires_hash_match() {
        let now = Utc::now();
        assert!(is_valid("h1", "h1", now, Some(category_insight_ttl())));
        assert!(!is_valid("h1", "h2", now, Some(category_insight_ttl())));
        assert!(!is_valid("h1", "h2", now, None));
    }

    #[test]
    fn test_ttl_expiry() {
        let old = Utc::now() - Duration::hours(25);
        assert!(!is_valid("h1", "h1", old, Some(category_insight_ttl())));
        let fresh = Utc::now() - Duration::hours(23);
        assert!(is_valid("h1", "h1", fresh, Some(category_insight_ttl())));
    }

    #[test]
    fn test_no_ttl_never_expires_by_age() {
        let ancient = Utc::now() - Duration::days(3650);
        assert!(is_valid("h1", "h1", ancient, None));
    }
}
