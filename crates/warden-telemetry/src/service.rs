//! Auth-event logging facade.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, warn};

use warden_core::{actions, AuditFilter, AuditRecord, AuditStore, AuthEvent, SortOrder};

use crate::aggregate::LogAggregation;
use crate::anomaly::{AnomalyScorer, SuspiciousIpSet};
use crate::enrich::EventEnricher;
use crate::error::TelemetryResult;
use crate::geo::GeoProvider;
use crate::rules::{AlertRule, Notifier, RuleEngine};

/// The security-telemetry pipeline: enrich, score, persist, alert.
///
/// Construct one instance at application start with the external
/// collaborators injected, then share it. Logging is decoupled from the
/// caller: [`AuthEventService::log_auth_event`] returns immediately and
/// swallows every failure.
pub struct AuthEventService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    enricher: EventEnricher,
    scorer: AnomalyScorer,
    engine: RuleEngine,
    audit_store: Arc<dyn AuditStore>,
    suspicious_ips: Arc<SuspiciousIpSet>,
    rules: RwLock<Vec<AlertRule>>,
}

impl AuthEventService {
    /// Creates the pipeline over the given collaborators.
    pub fn new(
        audit_store: Arc<dyn AuditStore>,
        geo: Arc<dyn GeoProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let suspicious_ips = Arc::new(SuspiciousIpSet::new());

        Self {
            inner: Arc::new(ServiceInner {
                enricher: EventEnricher::new(geo),
                scorer: AnomalyScorer::new(
                    Arc::clone(&audit_store),
                    Arc::clone(&suspicious_ips),
                ),
                engine: RuleEngine::new(
                    Arc::clone(&audit_store),
                    Arc::clone(&suspicious_ips),
                    notifier,
                ),
                audit_store,
                suspicious_ips,
                rules: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Returns the shared suspicious-IP set, for operator tooling.
    #[must_use]
    pub fn suspicious_ips(&self) -> Arc<SuspiciousIpSet> {
        Arc::clone(&self.inner.suspicious_ips)
    }

    /// Replaces the configured alert rules.
    pub fn set_rules(&self, rules: Vec<AlertRule>) {
        *self.inner.rules.write() = rules;
    }

    /// Adds an alert rule.
    pub fn add_rule(&self, rule: AlertRule) {
        self.inner.rules.write().push(rule);
    }

    /// Records an auth event. Fire-and-forget.
    ///
    /// The pipeline runs on a background task; failures are swallowed
    /// and written to the local log, never surfaced to the caller.
    pub fn log_auth_event(&self, event: AuthEvent) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(err) = inner.process(event).await {
                error!(code = err.code(), error = %err, "auth event pipeline failed");
            }
        });
    }

    /// Runs the pipeline inline and returns the persisted record.
    ///
    /// For embedders that want backpressure or the scored result; the
    /// fire-and-forget path goes through the same code.
    pub async fn process_event(&self, event: AuthEvent) -> TelemetryResult<AuditRecord> {
        self.inner.process(event).await
    }

    /// Builds the activity rollup for one tenant and time window.
    pub async fn get_log_aggregation(
        &self,
        tenant_slug: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TelemetryResult<LogAggregation> {
        let filter = AuditFilter::new()
            .for_tenant(tenant_slug)
            .since(start)
            .until(end);

        let records = self
            .inner
            .audit_store
            .find(&filter, usize::MAX, SortOrder::Ascending)
            .await?;

        Ok(LogAggregation::from_records(tenant_slug, start, end, &records))
    }
}

impl ServiceInner {
    async fn process(&self, event: AuthEvent) -> TelemetryResult<AuditRecord> {
        let mut record = self.enricher.enrich(event).await;

        // Violation bookkeeping happens before scoring so the event
        // being processed counts toward its own assessment.
        if record.action == actions::RATE_LIMIT_EXCEEDED {
            if let Some(ip) = record.ip_address.clone() {
                self.scorer
                    .record_rate_limit_violation(&ip, &record.tenant_slug);
            }
        }

        let security = self.scorer.score(&record).await;
        record.security = Some(security);

        self.append_with_retry(record.clone()).await?;

        let rules = self.rules.read().clone();
        self.engine.evaluate(&record, &rules).await;

        Ok(record)
    }

    async fn append_with_retry(&self, record: AuditRecord) -> TelemetryResult<()> {
        if let Err(first) = self.audit_store.append(record.clone()).await {
            warn!(code = first.code(), error = %first, "audit append failed, retrying once");
            self.audit_store.append(record).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::NullGeoProvider;
    use crate::rules::NoopNotifier;
    use warden_core::MemoryAuditStore;

    fn service() -> (AuthEventService, Arc<MemoryAuditStore>) {
        let store = Arc::new(MemoryAuditStore::default());
        let service = AuthEventService::new(
            Arc::clone(&store) as Arc<dyn AuditStore>,
            Arc::new(NullGeoProvider),
            Arc::new(NoopNotifier),
        );
        (service, store)
    }

    #[tokio::test]
    async fn test_processed_events_are_persisted_and_scored() {
        let (service, store) = service();

        let record = service
            .process_event(AuthEvent::new("acme", "u1", actions::LOGIN_SUCCESS))
            .await
            .unwrap();

        assert!(record.security.is_some());
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.records()[0].id, record.id);
    }

    #[tokio::test]
    async fn test_aggregation_covers_window() {
        let (service, _store) = service();
        let start = Utc::now() - chrono::Duration::hours(1);

        for _ in 0..3 {
            service
                .process_event(AuthEvent::new("acme", "u1", actions::LOGIN_SUCCESS))
                .await
                .unwrap();
        }
        service
            .process_event(AuthEvent::new("globex", "u9", actions::LOGIN_SUCCESS))
            .await
            .unwrap();

        let rollup = service
            .get_log_aggregation("acme", start, Utc::now())
            .await
            .unwrap();

        assert_eq!(rollup.total_events, 3);
        assert_eq!(rollup.unique_users, 1);
    }
}
