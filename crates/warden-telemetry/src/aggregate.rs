//! Log aggregation for dashboard consumption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use warden_core::AuditRecord;

const TOP_LIMIT: usize = 10;

/// Rollup of audit activity for one tenant and time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogAggregation {
    /// Tenant the rollup covers.
    pub tenant_slug: String,
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
    /// Total events in the window.
    pub total_events: u64,
    /// Distinct user IDs seen.
    pub unique_users: u64,
    /// Distinct client IPs seen.
    pub unique_ips: u64,
    /// Event count per action name.
    pub action_counts: HashMap<String, u64>,
    /// Event count per risk level. Unscored events count as low.
    pub risk_breakdown: HashMap<String, u64>,
    /// Most frequent countries, highest first.
    pub top_countries: Vec<(String, u64)>,
    /// Most frequent user agents, highest first.
    pub top_user_agents: Vec<(String, u64)>,
}

impl LogAggregation {
    /// Builds a rollup from the records of one tenant window.
    #[must_use]
    pub fn from_records(
        tenant_slug: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        records: &[AuditRecord],
    ) -> Self {
        let mut users = HashSet::new();
        let mut ips = HashSet::new();
        let mut action_counts: HashMap<String, u64> = HashMap::new();
        let mut risk_breakdown: HashMap<String, u64> = HashMap::new();
        let mut countries: HashMap<String, u64> = HashMap::new();
        let mut user_agents: HashMap<String, u64> = HashMap::new();

        for record in records {
            users.insert(record.user_id.as_str());
            if let Some(ip) = &record.ip_address {
                ips.insert(ip.as_str());
            }

            *action_counts.entry(record.action.clone()).or_default() += 1;

            let level = record
                .security
                .as_ref()
                .map(|s| s.risk_level)
                .unwrap_or_default();
            *risk_breakdown.entry(level.to_string()).or_default() += 1;

            if let Some(geo) = &record.geo {
                *countries.entry(geo.country.clone()).or_default() += 1;
            }
            if let Some(ua) = &record.user_agent {
                *user_agents.entry(ua.clone()).or_default() += 1;
            }
        }

        Self {
            tenant_slug: tenant_slug.into(),
            start,
            end,
            total_events: records.len() as u64,
            unique_users: users.len() as u64,
            unique_ips: ips.len() as u64,
            action_counts,
            risk_breakdown,
            top_countries: top_entries(countries),
            top_user_agents: top_entries(user_agents),
        }
    }
}

fn top_entries(counts: HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(TOP_LIMIT);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{actions, AuthEvent, GeoLocation};

    fn record(user: &str, action: &str, ip: Option<&str>, country: Option<&str>) -> AuditRecord {
        let mut event = AuthEvent::new("acme", user, action);
        if let Some(ip) = ip {
            event = event.with_ip(ip);
        }
        let mut record = AuditRecord::from_event(event);
        record.geo = country.map(GeoLocation::country);
        record
    }

    #[test]
    fn test_rollup_counts() {
        let records = vec![
            record("u1", actions::LOGIN_SUCCESS, Some("1.1.1.1"), Some("Germany")),
            record("u1", actions::LOGIN_FAILURE, Some("1.1.1.1"), Some("Germany")),
            record("u2", actions::LOGIN_SUCCESS, Some("2.2.2.2"), Some("France")),
        ];

        let window_start = Utc::now() - chrono::Duration::hours(1);
        let rollup = LogAggregation::from_records("acme", window_start, Utc::now(), &records);

        assert_eq!(rollup.total_events, 3);
        assert_eq!(rollup.unique_users, 2);
        assert_eq!(rollup.unique_ips, 2);
        assert_eq!(rollup.action_counts["login_success"], 2);
        assert_eq!(rollup.action_counts["login_failure"], 1);
        assert_eq!(rollup.risk_breakdown["low"], 3);
        assert_eq!(rollup.top_countries[0], ("Germany".to_string(), 2));
    }

    #[test]
    fn test_empty_window() {
        let rollup = LogAggregation::from_records("acme", Utc::now(), Utc::now(), &[]);

        assert_eq!(rollup.total_events, 0);
        assert!(rollup.action_counts.is_empty());
        assert!(rollup.top_countries.is_empty());
    }
}
