//! Alert rule evaluation and action dispatch.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use warden_core::{AuditFilter, AuditRecord, AuditStore, RiskLevel};

use crate::anomaly::SuspiciousIpSet;
use crate::error::TelemetryResult;

/// Condition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    /// Field equals the value.
    Eq,
    /// Field differs from the value.
    Ne,
    /// Field is numerically greater.
    Gt,
    /// Field is numerically greater or equal.
    Gte,
    /// Field is numerically smaller.
    Lt,
    /// Field is numerically smaller or equal.
    Lte,
    /// Substring match for strings, membership for arrays.
    Contains,
    /// Field matches the regex in the value.
    Regex,
    /// Field is one of the values in the provided array.
    In,
    /// Count of matching history for the same tenant/user/action within
    /// a rolling window reaches the numeric value.
    Frequency,
}

/// A single condition over the merged `{event, security_context}` JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Dot-path into the merged object, e.g. `security_context.risk_level`.
    pub field: String,
    /// Operator.
    pub op: ConditionOp,
    /// Comparison value; the threshold for `frequency`.
    pub value: Value,
    /// Rolling window for `frequency`, in minutes. Defaults to 60.
    pub window_minutes: Option<i64>,
}

impl RuleCondition {
    /// Creates a condition.
    pub fn new(field: impl Into<String>, op: ConditionOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
            window_minutes: None,
        }
    }

    /// Sets the frequency window.
    #[must_use]
    pub fn within_minutes(mut self, minutes: i64) -> Self {
        self.window_minutes = Some(minutes);
        self
    }
}

/// Actions executed when a rule fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertAction {
    /// Writes a structured alert to the local log. Always succeeds.
    Log,
    /// Adds the event's source IP to the shared suspicious-IP set.
    BlockIp,
    /// Sends an email through the notification collaborator.
    Email {
        /// Recipient address.
        to: String,
    },
    /// Posts the alert payload to a webhook.
    Webhook {
        /// Target URL.
        url: String,
    },
    /// Notifies the tenant administrators.
    NotifyAdmin,
}

/// An alert rule: AND-combined conditions plus a list of actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// Rule ID.
    pub id: String,
    /// Rule name, used in alert output.
    pub name: String,
    /// Severity reported when the rule fires.
    pub severity: RiskLevel,
    /// Conditions; all must hold.
    pub conditions: Vec<RuleCondition>,
    /// Actions executed on trigger, in order.
    pub actions: Vec<AlertAction>,
    /// Disabled rules are skipped entirely.
    pub enabled: bool,
    /// `None` applies the rule to every tenant; `Some` scopes it to one.
    pub tenant_slug: Option<String>,
}

impl AlertRule {
    /// Creates an enabled, global rule.
    pub fn new(id: impl Into<String>, name: impl Into<String>, severity: RiskLevel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            severity,
            conditions: Vec::new(),
            actions: Vec::new(),
            enabled: true,
            tenant_slug: None,
        }
    }

    /// Adds a condition.
    #[must_use]
    pub fn when(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds an action.
    #[must_use]
    pub fn then(mut self, action: AlertAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Scopes the rule to a tenant.
    #[must_use]
    pub fn for_tenant(mut self, tenant_slug: impl Into<String>) -> Self {
        self.tenant_slug = Some(tenant_slug.into());
        self
    }

    /// Disables the rule.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Notification collaborator. Stubbed in this core.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends an email alert.
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> TelemetryResult<()>;

    /// Posts an alert payload to a webhook.
    async fn send_webhook(&self, url: &str, payload: &Value) -> TelemetryResult<()>;

    /// Notifies tenant administrators.
    async fn notify_admin(&self, subject: &str, body: &str) -> TelemetryResult<()>;
}

/// Notifier stub that logs and succeeds.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_email(&self, to: &str, subject: &str, _body: &str) -> TelemetryResult<()> {
        debug!(to, subject, "email notification suppressed (noop notifier)");
        Ok(())
    }

    async fn send_webhook(&self, url: &str, _payload: &Value) -> TelemetryResult<()> {
        debug!(url, "webhook notification suppressed (noop notifier)");
        Ok(())
    }

    async fn notify_admin(&self, subject: &str, _body: &str) -> TelemetryResult<()> {
        debug!(subject, "admin notification suppressed (noop notifier)");
        Ok(())
    }
}

/// Evaluates alert rules against scored events and dispatches actions.
///
/// Never returns an error to the caller: a broken rule degrades to
/// "never fires" and a failing action does not stop later actions.
pub struct RuleEngine {
    audit_store: Arc<dyn AuditStore>,
    suspicious_ips: Arc<SuspiciousIpSet>,
    notifier: Arc<dyn Notifier>,
}

impl RuleEngine {
    /// Creates a rule engine.
    pub fn new(
        audit_store: Arc<dyn AuditStore>,
        suspicious_ips: Arc<SuspiciousIpSet>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            audit_store,
            suspicious_ips,
            notifier,
        }
    }

    /// Evaluates every applicable rule against a scored record.
    pub async fn evaluate(&self, record: &AuditRecord, rules: &[AlertRule]) {
        let merged = match merged_view(record) {
            Ok(merged) => merged,
            Err(err) => {
                error!(error = %err, "failed to build rule evaluation view");
                return;
            }
        };

        for rule in rules {
            if !rule.enabled {
                continue;
            }
            if let Some(tenant) = &rule.tenant_slug {
                if tenant != &record.tenant_slug {
                    continue;
                }
            }

            if self.conditions_hold(record, rule, &merged).await {
                info!(
                    rule = %rule.id,
                    severity = %rule.severity,
                    tenant = %record.tenant_slug,
                    "alert rule triggered"
                );
                self.dispatch(record, rule).await;
            }
        }
    }

    async fn conditions_hold(&self, record: &AuditRecord, rule: &AlertRule, merged: &Value) -> bool {
        for condition in &rule.conditions {
            if !self.condition_holds(record, condition, merged).await {
                return false;
            }
        }
        true
    }

    async fn condition_holds(
        &self,
        record: &AuditRecord,
        condition: &RuleCondition,
        merged: &Value,
    ) -> bool {
        if condition.op == ConditionOp::Frequency {
            return self.frequency_holds(record, condition).await;
        }

        let Some(actual) = lookup_path(merged, &condition.field) else {
            return false;
        };

        match condition.op {
            ConditionOp::Eq => actual == &condition.value,
            ConditionOp::Ne => actual != &condition.value,
            ConditionOp::Gt => compare_numeric(actual, &condition.value, |a, b| a > b),
            ConditionOp::Gte => compare_numeric(actual, &condition.value, |a, b| a >= b),
            ConditionOp::Lt => compare_numeric(actual, &condition.value, |a, b| a < b),
            ConditionOp::Lte => compare_numeric(actual, &condition.value, |a, b| a <= b),
            ConditionOp::Contains => match actual {
                Value::String(s) => condition
                    .value
                    .as_str()
                    .is_some_and(|needle| s.contains(needle)),
                Value::Array(items) => items.contains(&condition.value),
                _ => false,
            },
            ConditionOp::Regex => match (actual.as_str(), condition.value.as_str()) {
                (Some(s), Some(pattern)) => Regex::new(pattern)
                    .map(|re| re.is_match(s))
                    .unwrap_or(false),
                _ => false,
            },
            ConditionOp::In => condition
                .value
                .as_array()
                .is_some_and(|list| list.contains(actual)),
            ConditionOp::Frequency => false,
        }
    }

    async fn frequency_holds(&self, record: &AuditRecord, condition: &RuleCondition) -> bool {
        let Some(threshold) = condition.value.as_u64() else {
            return false;
        };
        let window = condition.window_minutes.unwrap_or(60);

        let filter = AuditFilter::new()
            .for_tenant(record.tenant_slug.clone())
            .for_user(record.user_id.clone())
            .with_action(record.action.clone())
            .since(Utc::now() - Duration::minutes(window));

        match self.audit_store.count(&filter).await {
            Ok(count) => count >= threshold,
            Err(err) => {
                warn!(code = err.code(), error = %err, "frequency condition lookup failed");
                false
            }
        }
    }

    async fn dispatch(&self, record: &AuditRecord, rule: &AlertRule) {
        for action in &rule.actions {
            // A failing action must not prevent the remaining ones
            if let Err(err) = self.execute(record, rule, action).await {
                error!(
                    rule = %rule.id,
                    code = err.code(),
                    error = %err,
                    "alert action failed"
                );
            }
        }
    }

    async fn execute(
        &self,
        record: &AuditRecord,
        rule: &AlertRule,
        action: &AlertAction,
    ) -> TelemetryResult<()> {
        match action {
            AlertAction::Log => {
                warn!(
                    rule = %rule.id,
                    rule_name = %rule.name,
                    severity = %rule.severity,
                    tenant = %record.tenant_slug,
                    user_id = %record.user_id,
                    action = %record.action,
                    ip = record.ip_address.as_deref().unwrap_or("-"),
                    "security alert"
                );
                Ok(())
            }
            AlertAction::BlockIp => {
                if let Some(ip) = &record.ip_address {
                    self.suspicious_ips.insert(ip.clone());
                }
                Ok(())
            }
            AlertAction::Email { to } => {
                self.notifier
                    .send_email(to, &alert_subject(rule), &alert_body(record, rule))
                    .await
            }
            AlertAction::Webhook { url } => {
                let payload = serde_json::json!({
                    "rule_id": rule.id,
                    "rule_name": rule.name,
                    "severity": rule.severity,
                    "tenant_slug": record.tenant_slug,
                    "user_id": record.user_id,
                    "action": record.action,
                    "record_id": record.id,
                });
                self.notifier.send_webhook(url, &payload).await
            }
            AlertAction::NotifyAdmin => {
                self.notifier
                    .notify_admin(&alert_subject(rule), &alert_body(record, rule))
                    .await
            }
        }
    }
}

fn alert_subject(rule: &AlertRule) -> String {
    format!("[{}] Security alert: {}", rule.severity, rule.name)
}

fn alert_body(record: &AuditRecord, rule: &AlertRule) -> String {
    format!(
        "Rule '{}' triggered for tenant {} (user {}, action {}).",
        rule.name, record.tenant_slug, record.user_id, record.action
    )
}

fn merged_view(record: &AuditRecord) -> Result<Value, serde_json::Error> {
    Ok(serde_json::json!({
        "event": serde_json::to_value(record)?,
        "security_context": serde_json::to_value(&record.security)?,
    }))
}

/// Compares two JSON values numerically via `cmp`, yielding `false`
/// when either operand is not a number.
fn compare_numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Walks a dot path into a JSON value. Missing segments and explicit
/// nulls resolve to `None`.
fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_core::{actions, AuthEvent, MemoryAuditStore, SecurityContext};

    fn engine() -> RuleEngine {
        RuleEngine::new(
            Arc::new(MemoryAuditStore::default()),
            Arc::new(SuspiciousIpSet::new()),
            Arc::new(NoopNotifier),
        )
    }

    fn scored_record() -> AuditRecord {
        let mut record = AuditRecord::from_event(
            AuthEvent::new("acme", "u1", actions::LOGIN_FAILURE).with_ip("203.0.113.4"),
        );
        record.security = Some(SecurityContext {
            risk_level: warden_core::RiskLevel::High,
            anomaly_score: 35,
            threats: vec!["Known suspicious IP".to_string()],
            mitigations: Vec::new(),
        });
        record
    }

    #[test]
    fn test_lookup_path() {
        let value = json!({"event": {"action": "login_failure", "geo": {"country": "DE"}}});

        assert_eq!(
            lookup_path(&value, "event.action"),
            Some(&json!("login_failure"))
        );
        assert_eq!(
            lookup_path(&value, "event.geo.country"),
            Some(&json!("DE"))
        );
        assert!(lookup_path(&value, "event.missing").is_none());
        assert!(lookup_path(&value, "missing.entirely").is_none());
    }

    #[tokio::test]
    async fn test_eq_and_ne() {
        let engine = engine();
        let record = scored_record();
        let merged = merged_view(&record).unwrap();

        let eq = RuleCondition::new("event.action", ConditionOp::Eq, json!("login_failure"));
        assert!(engine.condition_holds(&record, &eq, &merged).await);

        let eq_miss = RuleCondition::new("event.action", ConditionOp::Eq, json!("login_success"));
        assert!(!engine.condition_holds(&record, &eq_miss, &merged).await);

        let ne = RuleCondition::new("event.action", ConditionOp::Ne, json!("login_success"));
        assert!(engine.condition_holds(&record, &ne, &merged).await);
    }

    #[tokio::test]
    async fn test_numeric_operators() {
        let engine = engine();
        let record = scored_record();
        let merged = merged_view(&record).unwrap();

        let gte = RuleCondition::new(
            "security_context.anomaly_score",
            ConditionOp::Gte,
            json!(30),
        );
        assert!(engine.condition_holds(&record, &gte, &merged).await);

        let gt = RuleCondition::new("security_context.anomaly_score", ConditionOp::Gt, json!(35));
        assert!(!engine.condition_holds(&record, &gt, &merged).await);

        // Non-numeric operand degrades to false
        let bad = RuleCondition::new("event.action", ConditionOp::Gt, json!(1));
        assert!(!engine.condition_holds(&record, &bad, &merged).await);
    }

    #[tokio::test]
    async fn test_contains_and_in() {
        let engine = engine();
        let record = scored_record();
        let merged = merged_view(&record).unwrap();

        let substring = RuleCondition::new("event.action", ConditionOp::Contains, json!("failure"));
        assert!(engine.condition_holds(&record, &substring, &merged).await);

        let membership = RuleCondition::new(
            "security_context.threats",
            ConditionOp::Contains,
            json!("Known suspicious IP"),
        );
        assert!(engine.condition_holds(&record, &membership, &merged).await);

        let within = RuleCondition::new(
            "security_context.risk_level",
            ConditionOp::In,
            json!(["high", "critical"]),
        );
        assert!(engine.condition_holds(&record, &within, &merged).await);
    }

    #[tokio::test]
    async fn test_regex_operator() {
        let engine = engine();
        let record = scored_record();
        let merged = merged_view(&record).unwrap();

        let matching = RuleCondition::new("event.ip_address", ConditionOp::Regex, json!(r"^203\."));
        assert!(engine.condition_holds(&record, &matching, &merged).await);

        // Malformed pattern degrades to false
        let broken = RuleCondition::new("event.ip_address", ConditionOp::Regex, json!("["));
        assert!(!engine.condition_holds(&record, &broken, &merged).await);
    }

    #[tokio::test]
    async fn test_unresolvable_path_is_false() {
        let engine = engine();
        let record = scored_record();
        let merged = merged_view(&record).unwrap();

        let missing = RuleCondition::new("event.no.such.path", ConditionOp::Eq, json!("x"));
        assert!(!engine.condition_holds(&record, &missing, &merged).await);
    }

    #[tokio::test]
    async fn test_tenant_scoping() {
        let engine = engine();
        let record = scored_record();

        let other_tenant = AlertRule::new("r1", "Other tenant", warden_core::RiskLevel::High)
            .for_tenant("globex")
            .when(RuleCondition::new(
                "event.action",
                ConditionOp::Eq,
                json!("login_failure"),
            ))
            .then(AlertAction::BlockIp);

        engine.evaluate(&record, &[other_tenant]).await;
        assert!(engine.suspicious_ips.is_empty());

        let same_tenant = AlertRule::new("r2", "Same tenant", warden_core::RiskLevel::High)
            .for_tenant("acme")
            .when(RuleCondition::new(
                "event.action",
                ConditionOp::Eq,
                json!("login_failure"),
            ))
            .then(AlertAction::BlockIp);

        engine.evaluate(&record, &[same_tenant]).await;
        assert!(engine.suspicious_ips.contains("203.0.113.4"));
    }

    #[tokio::test]
    async fn test_disabled_rule_never_fires() {
        let engine = engine();
        let record = scored_record();

        let rule = AlertRule::new("r1", "Disabled", warden_core::RiskLevel::High)
            .when(RuleCondition::new(
                "event.action",
                ConditionOp::Eq,
                json!("login_failure"),
            ))
            .then(AlertAction::BlockIp)
            .disabled();

        engine.evaluate(&record, &[rule]).await;
        assert!(engine.suspicious_ips.is_empty());
    }
}
