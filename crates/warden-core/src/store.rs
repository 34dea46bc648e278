//! Audit store interface and in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::event::AuditRecord;

/// Sort order for audit queries, by event timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    Descending,
}

/// Filter for audit store queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Filter by tenant slug.
    pub tenant_slug: Option<String>,
    /// Filter by user ID.
    pub user_id: Option<String>,
    /// Filter by action name.
    pub action: Option<String>,
    /// Filter by client IP.
    pub ip_address: Option<String>,
    /// Only records at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only records at or before this instant.
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// Creates an empty filter matching everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by tenant.
    #[must_use]
    pub fn for_tenant(mut self, tenant_slug: impl Into<String>) -> Self {
        self.tenant_slug = Some(tenant_slug.into());
        self
    }

    /// Filters by user.
    #[must_use]
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Filters by action.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Filters by client IP.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Restricts to records at or after `since`.
    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Restricts to records at or before `until`.
    #[must_use]
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Matches a record against this filter.
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(ref tenant) = self.tenant_slug {
            if &record.tenant_slug != tenant {
                return false;
            }
        }

        if let Some(ref user_id) = self.user_id {
            if &record.user_id != user_id {
                return false;
            }
        }

        if let Some(ref action) = self.action {
            if &record.action != action {
                return false;
            }
        }

        if let Some(ref ip) = self.ip_address {
            if record.ip_address.as_ref() != Some(ip) {
                return false;
            }
        }

        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }

        if let Some(until) = self.until {
            if record.timestamp > until {
                return false;
            }
        }

        true
    }
}

/// Append-only log of auth events and access decisions.
///
/// History is write-once; implementations must never mutate appended
/// records.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Appends a record.
    async fn append(&self, record: AuditRecord) -> StoreResult<()>;

    /// Counts records matching the filter.
    async fn count(&self, filter: &AuditFilter) -> StoreResult<u64>;

    /// Returns up to `limit` matching records in the given order.
    async fn find(
        &self,
        filter: &AuditFilter,
        limit: usize,
        sort: SortOrder,
    ) -> StoreResult<Vec<AuditRecord>>;
}

/// Bounded in-memory audit store for tests and single-process deployments.
pub struct MemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
    max_records: usize,
}

impl MemoryAuditStore {
    /// Creates a store retaining at most `max_records` entries.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            max_records,
        }
    }

    /// Returns a snapshot of all records.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    /// Drops all records.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> StoreResult<()> {
        let mut records = self.records.write();
        records.push(record);

        // Trim oldest entries when over the retention limit
        if records.len() > self.max_records {
            let excess = records.len() - self.max_records;
            records.drain(..excess);
        }

        Ok(())
    }

    async fn count(&self, filter: &AuditFilter) -> StoreResult<u64> {
        let records = self.records.read();
        Ok(records.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn find(
        &self,
        filter: &AuditFilter,
        limit: usize,
        sort: SortOrder,
    ) -> StoreResult<Vec<AuditRecord>> {
        let records = self.records.read();
        let mut matching: Vec<AuditRecord> = records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();

        match sort {
            SortOrder::Ascending => matching.sort_by_key(|r| r.timestamp),
            SortOrder::Descending => {
                matching.sort_by_key(|r| std::cmp::Reverse(r.timestamp));
            }
        }

        matching.truncate(limit);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{actions, AuthEvent};
    use chrono::Duration;

    fn record(user: &str, action: &str) -> AuditRecord {
        AuditRecord::from_event(AuthEvent::new("acme", user, action))
    }

    #[tokio::test]
    async fn test_append_and_count() {
        let store = MemoryAuditStore::new(100);
        store.append(record("u1", actions::LOGIN_FAILURE)).await.unwrap();
        store.append(record("u1", actions::LOGIN_FAILURE)).await.unwrap();
        store.append(record("u2", actions::LOGIN_SUCCESS)).await.unwrap();

        let filter = AuditFilter::new()
            .for_user("u1")
            .with_action(actions::LOGIN_FAILURE);
        assert_eq!(store.count(&filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_retention_trims_oldest() {
        let store = MemoryAuditStore::new(3);
        for i in 0..5 {
            store.append(record(&format!("u{i}"), actions::LOGOUT)).await.unwrap();
        }

        let records = store.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].user_id, "u2");
    }

    #[tokio::test]
    async fn test_find_sorted_and_limited() {
        let store = MemoryAuditStore::new(100);
        let base = Utc::now();
        for i in 0..4 {
            let event = AuthEvent::new("acme", "u1", actions::LOGIN_SUCCESS)
                .at(base + Duration::seconds(i));
            store.append(AuditRecord::from_event(event)).await.unwrap();
        }

        let found = store
            .find(&AuditFilter::new().for_user("u1"), 2, SortOrder::Descending)
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert!(found[0].timestamp > found[1].timestamp);
    }

    #[tokio::test]
    async fn test_time_window_filter() {
        let store = MemoryAuditStore::new(100);
        let old = AuthEvent::new("acme", "u1", actions::LOGIN_FAILURE)
            .at(Utc::now() - Duration::minutes(30));
        store.append(AuditRecord::from_event(old)).await.unwrap();
        store.append(record("u1", actions::LOGIN_FAILURE)).await.unwrap();

        let filter = AuditFilter::new()
            .for_user("u1")
            .since(Utc::now() - Duration::minutes(15));
        assert_eq!(store.count(&filter).await.unwrap(), 1);
    }
}
