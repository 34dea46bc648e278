//! TTL-based memo of access decisions.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::context::AccessDecision;

/// Default time-to-live for cached decisions.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CachedDecision {
    decision: AccessDecision,
    cached_at: Instant,
}

/// Process-wide memo of prior access decisions.
///
/// Entries expire a fixed interval after insertion; the TTL is absolute
/// and not refreshed on read. Grants and denials are cached identically.
/// Role or permission mutations for a user must be followed by
/// [`DecisionCache::invalidate_user`].
pub struct DecisionCache {
    entries: DashMap<String, CachedDecision>,
    ttl: Duration,
}

impl DecisionCache {
    /// Creates a cache with the default 5-minute TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Creates a cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns the cached decision for a key, if present and fresh.
    ///
    /// A hit past the TTL is treated as a miss and the entry is dropped.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<AccessDecision> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.cached_at.elapsed() < self.ttl {
                    debug!(key, "decision cache hit");
                    return Some(entry.decision.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            debug!(key, "decision cache entry expired");
            self.entries.remove(key);
        }

        None
    }

    /// Stores a decision under a key.
    pub fn insert(&self, key: impl Into<String>, decision: AccessDecision) {
        self.entries.insert(
            key.into(),
            CachedDecision {
                decision,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drops every entry belonging to a user.
    ///
    /// Matches on the `userId|` key prefix; must be called whenever a
    /// user's roles or permissions change.
    pub fn invalidate_user(&self, user_id: &str) {
        let prefix = format!("{user_id}|");
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        debug!(
            user_id,
            dropped = before.saturating_sub(self.entries.len()),
            "invalidated cached decisions"
        );
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Returns the number of live entries (including not-yet-collected
    /// expired ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new()
    }
}
