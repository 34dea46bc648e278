//! Anomaly scoring over enriched auth events.

use chrono::{Duration, Timelike, Utc};
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use warden_core::{
    actions, AuditFilter, AuditRecord, AuditStore, RiskLevel, SecurityContext, SortOrder,
};

use crate::device::is_bot_user_agent;

const SUSPICIOUS_IP_POINTS: u32 = 30;
const UNUSUAL_LOCATION_POINTS: u32 = 20;
const FAILED_LOGIN_POINTS: u32 = 25;
const RATE_LIMIT_POINTS: u32 = 40;
const BOT_AGENT_POINTS: u32 = 15;
const OFF_HOURS_POINTS: u32 = 10;

const FAILED_LOGIN_THRESHOLD: u64 = 3;
const FAILED_LOGIN_WINDOW_MINUTES: i64 = 15;
const RATE_LIMIT_VIOLATION_THRESHOLD: u32 = 5;
const LOCATION_HISTORY_LIMIT: usize = 50;
const LOCATION_HISTORY_DAYS: i64 = 30;

const CRITICAL_SCORE: u32 = 50;
const HIGH_SCORE: u32 = 30;
const MEDIUM_SCORE: u32 = 15;

/// Process-wide set of IPs flagged as suspicious.
///
/// Written by the alert engine's `block_ip` action and by operators;
/// read by the scorer's suspicious-IP heuristic.
#[derive(Default)]
pub struct SuspiciousIpSet {
    ips: DashSet<String>,
}

impl SuspiciousIpSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an IP. Returns true if it was not already present.
    pub fn insert(&self, ip: impl Into<String>) -> bool {
        let ip = ip.into();
        let inserted = self.ips.insert(ip.clone());
        if inserted {
            info!(%ip, "IP added to suspicious set");
        }
        inserted
    }

    /// Checks membership.
    #[must_use]
    pub fn contains(&self, ip: &str) -> bool {
        self.ips.contains(ip)
    }

    /// Removes an IP.
    pub fn remove(&self, ip: &str) {
        self.ips.remove(ip);
    }

    /// Returns the number of flagged IPs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ips.len()
    }

    /// Returns true if no IPs are flagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }
}

/// Computes a security assessment for an enriched auth event.
///
/// Each heuristic is evaluated independently; points are summed and the
/// final risk level is the higher of the forced minima and the score
/// threshold mapping.
pub struct AnomalyScorer {
    audit_store: Arc<dyn AuditStore>,
    suspicious_ips: Arc<SuspiciousIpSet>,
    rate_violations: DashMap<String, u32>,
}

impl AnomalyScorer {
    /// Creates a scorer.
    pub fn new(audit_store: Arc<dyn AuditStore>, suspicious_ips: Arc<SuspiciousIpSet>) -> Self {
        Self {
            audit_store,
            suspicious_ips,
            rate_violations: DashMap::new(),
        }
    }

    /// Returns the shared suspicious-IP set.
    #[must_use]
    pub fn suspicious_ips(&self) -> Arc<SuspiciousIpSet> {
        Arc::clone(&self.suspicious_ips)
    }

    /// Records a rate-limit violation for an ip+tenant pair and returns
    /// the cumulative count.
    ///
    /// Counters are process-local; a multi-instance deployment needs a
    /// shared backing store to keep them consistent.
    pub fn record_rate_limit_violation(&self, ip: &str, tenant_slug: &str) -> u32 {
        let mut count = self
            .rate_violations
            .entry(violation_key(ip, tenant_slug))
            .or_insert(0);
        *count += 1;
        *count
    }

    /// Returns the cumulative violation count for an ip+tenant pair.
    #[must_use]
    pub fn rate_limit_violations(&self, ip: &str, tenant_slug: &str) -> u32 {
        self.rate_violations
            .get(&violation_key(ip, tenant_slug))
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// Scores an enriched event.
    ///
    /// Store failures during history lookups are logged and treated as
    /// "no signal"; scoring itself never fails.
    pub async fn score(&self, record: &AuditRecord) -> SecurityContext {
        let mut score = 0u32;
        let mut threats = Vec::new();
        let mut forced = RiskLevel::Low;

        if let Some(ip) = &record.ip_address {
            if self.suspicious_ips.contains(ip) {
                score += SUSPICIOUS_IP_POINTS;
                threats.push("Known suspicious IP".to_string());
                forced = forced.max(RiskLevel::High);
            }
        }

        if self.is_unusual_location(record).await {
            score += UNUSUAL_LOCATION_POINTS;
            threats.push("Unusual login location".to_string());
        }

        if self.recent_failed_logins(record).await >= FAILED_LOGIN_THRESHOLD {
            score += FAILED_LOGIN_POINTS;
            threats.push("Multiple failed login attempts".to_string());
            forced = forced.max(RiskLevel::High);
        }

        if let Some(ip) = &record.ip_address {
            if self.rate_limit_violations(ip, &record.tenant_slug) > RATE_LIMIT_VIOLATION_THRESHOLD
            {
                score += RATE_LIMIT_POINTS;
                threats.push("Excessive rate limit violations".to_string());
                forced = forced.max(RiskLevel::Critical);
            }
        }

        if let Some(ua) = &record.user_agent {
            if is_bot_user_agent(ua) {
                score += BOT_AGENT_POINTS;
                threats.push("Automated client user agent".to_string());
            }
        }

        // TODO: decide whether tenant-local business hours should drive
        // this window; the hour is currently the raw UTC event hour.
        let hour = record.timestamp.hour();
        if (2..6).contains(&hour) {
            score += OFF_HOURS_POINTS;
            threats.push("Off-hours activity".to_string());
        }

        let risk_level = forced.max(level_for_score(score));

        SecurityContext {
            risk_level,
            anomaly_score: score,
            threats,
            mitigations: mitigations_for(risk_level),
        }
    }

    async fn is_unusual_location(&self, record: &AuditRecord) -> bool {
        let Some(geo) = &record.geo else {
            return false;
        };

        let filter = AuditFilter::new()
            .for_user(record.user_id.clone())
            .with_action(actions::LOGIN_SUCCESS)
            .since(Utc::now() - Duration::days(LOCATION_HISTORY_DAYS));

        match self
            .audit_store
            .find(&filter, LOCATION_HISTORY_LIMIT, SortOrder::Descending)
            .await
        {
            Ok(history) => {
                let known: HashSet<&str> = history
                    .iter()
                    .filter_map(|r| r.geo.as_ref())
                    .map(|g| g.country.as_str())
                    .collect();
                // A user with no location history gets no signal
                !known.is_empty() && !known.contains(geo.country.as_str())
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "location history lookup failed");
                false
            }
        }
    }

    async fn recent_failed_logins(&self, record: &AuditRecord) -> u64 {
        let filter = AuditFilter::new()
            .for_user(record.user_id.clone())
            .with_action(actions::LOGIN_FAILURE)
            .since(Utc::now() - Duration::minutes(FAILED_LOGIN_WINDOW_MINUTES));

        let mut count = match self.audit_store.count(&filter).await {
            Ok(count) => count,
            Err(err) => {
                warn!(code = err.code(), error = %err, "failed login lookup failed");
                0
            }
        };

        // The event being scored has not been appended yet
        if record.action == actions::LOGIN_FAILURE {
            count += 1;
        }

        count
    }
}

fn violation_key(ip: &str, tenant_slug: &str) -> String {
    format!("{ip}|{tenant_slug}")
}

fn level_for_score(score: u32) -> RiskLevel {
    if score >= CRITICAL_SCORE {
        RiskLevel::Critical
    } else if score >= HIGH_SCORE {
        RiskLevel::High
    } else if score >= MEDIUM_SCORE {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn mitigations_for(level: RiskLevel) -> Vec<String> {
    let suggestions: &[&str] = match level {
        RiskLevel::Low => &[],
        RiskLevel::Medium => &["Monitor subsequent activity from this user"],
        RiskLevel::High => &[
            "Require step-up authentication",
            "Review recent activity for this account",
        ],
        RiskLevel::Critical => &[
            "Temporarily block the source IP",
            "Notify the security team",
            "Force credential rotation",
        ],
    };
    suggestions.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use warden_core::{AuthEvent, GeoLocation, MemoryAuditStore};

    fn scorer() -> AnomalyScorer {
        AnomalyScorer::new(
            Arc::new(MemoryAuditStore::default()),
            Arc::new(SuspiciousIpSet::new()),
        )
    }

    fn record(action: &str) -> AuditRecord {
        // Midday timestamp keeps the off-hours heuristic quiet
        let noon = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        AuditRecord::from_event(AuthEvent::new("acme", "u1", action).at(noon))
    }

    #[tokio::test]
    async fn test_clean_event_scores_low() {
        let ctx = scorer().score(&record(actions::LOGIN_SUCCESS)).await;

        assert_eq!(ctx.anomaly_score, 0);
        assert_eq!(ctx.risk_level, RiskLevel::Low);
        assert!(ctx.threats.is_empty());
        assert!(ctx.mitigations.is_empty());
    }

    #[tokio::test]
    async fn test_suspicious_ip_forces_high() {
        let scorer = scorer();
        scorer.suspicious_ips().insert("203.0.113.66");

        let mut record = record(actions::LOGIN_SUCCESS);
        record.ip_address = Some("203.0.113.66".to_string());

        let ctx = scorer.score(&record).await;

        assert_eq!(ctx.anomaly_score, SUSPICIOUS_IP_POINTS);
        assert_eq!(ctx.risk_level, RiskLevel::High);
        assert!(ctx.threats.contains(&"Known suspicious IP".to_string()));
    }

    #[tokio::test]
    async fn test_bot_agent_scores_medium() {
        let mut record = record(actions::LOGIN_SUCCESS);
        record.user_agent = Some("curl/8.4.0".to_string());

        let ctx = scorer().score(&record).await;

        assert_eq!(ctx.anomaly_score, BOT_AGENT_POINTS);
        assert_eq!(ctx.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_off_hours_heuristic() {
        let night = Utc.with_ymd_and_hms(2026, 3, 10, 3, 30, 0).unwrap();
        let record =
            AuditRecord::from_event(AuthEvent::new("acme", "u1", actions::LOGIN_SUCCESS).at(night));

        let ctx = scorer().score(&record).await;

        assert_eq!(ctx.anomaly_score, OFF_HOURS_POINTS);
        assert!(ctx.threats.contains(&"Off-hours activity".to_string()));
    }

    #[tokio::test]
    async fn test_failed_login_burst_forces_high() {
        let store = Arc::new(MemoryAuditStore::default());
        for _ in 0..2 {
            store
                .append(AuditRecord::from_event(AuthEvent::new(
                    "acme",
                    "u1",
                    actions::LOGIN_FAILURE,
                )))
                .await
                .unwrap();
        }
        let scorer = AnomalyScorer::new(
            Arc::clone(&store) as Arc<dyn AuditStore>,
            Arc::new(SuspiciousIpSet::new()),
        );

        // Two prior failures plus the one being scored crosses the threshold
        let ctx = scorer.score(&record(actions::LOGIN_FAILURE)).await;

        assert!(ctx
            .threats
            .contains(&"Multiple failed login attempts".to_string()));
        assert!(ctx.risk_level >= RiskLevel::High);
    }

    #[tokio::test]
    async fn test_unusual_location() {
        let store = Arc::new(MemoryAuditStore::default());
        let mut prior =
            AuditRecord::from_event(AuthEvent::new("acme", "u1", actions::LOGIN_SUCCESS));
        prior.geo = Some(GeoLocation::country("Germany"));
        store.append(prior).await.unwrap();

        let scorer = AnomalyScorer::new(
            Arc::clone(&store) as Arc<dyn AuditStore>,
            Arc::new(SuspiciousIpSet::new()),
        );

        let mut record = record(actions::LOGIN_SUCCESS);
        record.geo = Some(GeoLocation::country("Brazil"));

        let ctx = scorer.score(&record).await;
        assert!(ctx.threats.contains(&"Unusual login location".to_string()));
        assert_eq!(ctx.anomaly_score, UNUSUAL_LOCATION_POINTS);
    }

    #[tokio::test]
    async fn test_first_location_is_not_unusual() {
        let mut record = record(actions::LOGIN_SUCCESS);
        record.geo = Some(GeoLocation::country("Brazil"));

        let ctx = scorer().score(&record).await;
        assert!(!ctx.threats.contains(&"Unusual login location".to_string()));
    }

    #[tokio::test]
    async fn test_rate_limit_violations_force_critical() {
        let scorer = scorer();
        for _ in 0..6 {
            scorer.record_rate_limit_violation("203.0.113.7", "acme");
        }

        let mut record = record(actions::RATE_LIMIT_EXCEEDED);
        record.ip_address = Some("203.0.113.7".to_string());

        let ctx = scorer.score(&record).await;

        assert_eq!(ctx.anomaly_score, RATE_LIMIT_POINTS);
        assert_eq!(ctx.risk_level, RiskLevel::Critical);
        assert!(ctx
            .threats
            .contains(&"Excessive rate limit violations".to_string()));
    }

    #[tokio::test]
    async fn test_threshold_mapping_without_forced_levels() {
        // Bot agent + off-hours = 25 points, which maps to medium
        let night = Utc.with_ymd_and_hms(2026, 3, 10, 4, 0, 0).unwrap();
        let mut record =
            AuditRecord::from_event(AuthEvent::new("acme", "u1", actions::LOGIN_SUCCESS).at(night));
        record.user_agent = Some("python-requests/2.31".to_string());

        let ctx = scorer().score(&record).await;

        assert_eq!(ctx.anomaly_score, BOT_AGENT_POINTS + OFF_HOURS_POINTS);
        assert_eq!(ctx.risk_level, RiskLevel::Medium);
    }
}
