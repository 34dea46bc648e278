//! Auth event and audit record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

/// Well-known auth event action names.
pub mod actions {
    /// Successful login.
    pub const LOGIN_SUCCESS: &str = "login_success";
    /// Failed login attempt.
    pub const LOGIN_FAILURE: &str = "login_failure";
    /// Rate limit violation.
    pub const RATE_LIMIT_EXCEEDED: &str = "rate_limit_exceeded";
    /// Authorization decision.
    pub const PERMISSION_CHECK: &str = "permission_check";
    /// Session ended.
    pub const LOGOUT: &str = "logout";
    /// Token refreshed.
    pub const TOKEN_REFRESH: &str = "token_refresh";
}

/// A raw auth/security event as reported by the application.
///
/// Optional fields stay `None` when the caller cannot supply them; the
/// enrichment pipeline tolerates their absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    /// Tenant slug the event belongs to.
    pub tenant_slug: String,
    /// Acting user ID.
    pub user_id: String,
    /// User email, if known.
    pub email: Option<String>,
    /// Event action name (see [`actions`]).
    pub action: String,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Raw user agent string.
    pub user_agent: Option<String>,
    /// Free-form event metadata.
    pub metadata: serde_json::Value,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
}

impl AuthEvent {
    /// Creates a new event stamped with the current time.
    pub fn new(
        tenant_slug: impl Into<String>,
        user_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            tenant_slug: tenant_slug.into(),
            user_id: user_id.into(),
            email: None,
            action: action.into(),
            ip_address: None,
            user_agent: None,
            metadata: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the client IP.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Device type classification derived from the user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Desktop browser.
    Desktop,
    /// Phone.
    Mobile,
    /// Tablet.
    Tablet,
    /// Automated client.
    Bot,
    /// Could not be classified.
    #[default]
    Unknown,
}

/// Browser name and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserInfo {
    /// Browser family name.
    pub name: String,
    /// Version string, when present in the UA.
    pub version: Option<String>,
}

/// Operating system name and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    /// OS family name.
    pub name: String,
    /// Version string, when present in the UA.
    pub version: Option<String>,
}

/// Parsed device information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Browser details.
    pub browser: BrowserInfo,
    /// Operating system details.
    pub os: OsInfo,
    /// Device type.
    pub device_type: DeviceType,
    /// Stable hash of the raw user agent. Not cryptographically strong.
    pub fingerprint: String,
}

/// Geographic location resolved from an IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// ISO country name or code.
    pub country: String,
    /// Region or state.
    pub region: Option<String>,
    /// City.
    pub city: Option<String>,
    /// IANA timezone.
    pub timezone: Option<String>,
}

impl GeoLocation {
    /// Creates a location with only a country.
    pub fn country(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            region: None,
            city: None,
            timezone: None,
        }
    }
}

/// Security assessment attached to a scored event.
///
/// Derived data; never persisted independently of the record it annotates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SecurityContext {
    /// Coarse risk classification.
    pub risk_level: RiskLevel,
    /// Raw sum of heuristic points.
    pub anomaly_score: u32,
    /// Names of the heuristics that fired.
    pub threats: Vec<String>,
    /// Recommended mitigations for the assessed level.
    pub mitigations: Vec<String>,
}

/// The persisted, enriched form of an auth event.
///
/// Records are write-once: once appended to an audit store they are
/// immutable history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record ID.
    pub id: String,
    /// Tenant slug.
    pub tenant_slug: String,
    /// Acting user ID.
    pub user_id: String,
    /// User email, if known.
    pub email: Option<String>,
    /// Event action name.
    pub action: String,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Raw user agent string.
    pub user_agent: Option<String>,
    /// Free-form event metadata.
    pub metadata: serde_json::Value,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Parsed device information, when a user agent was present.
    pub device: Option<DeviceInfo>,
    /// Resolved geolocation, when a public IP was present.
    pub geo: Option<GeoLocation>,
    /// Security assessment, once scored.
    pub security: Option<SecurityContext>,
}

impl AuditRecord {
    /// Creates a record from a raw event, assigning a fresh ID.
    #[must_use]
    pub fn from_event(event: AuthEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_slug: event.tenant_slug,
            user_id: event.user_id,
            email: event.email,
            action: event.action,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            metadata: event.metadata,
            timestamp: event.timestamp,
            device: None,
            geo: None,
            security: None,
        }
    }

    /// Sets the security assessment.
    #[must_use]
    pub fn with_security(mut self, security: SecurityContext) -> Self {
        self.security = Some(security);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = AuthEvent::new("acme", "u1", actions::LOGIN_SUCCESS)
            .with_ip("203.0.113.7")
            .with_user_agent("Mozilla/5.0");

        assert_eq!(event.tenant_slug, "acme");
        assert_eq!(event.action, "login_success");
        assert_eq!(event.ip_address.as_deref(), Some("203.0.113.7"));
        assert!(event.email.is_none());
    }

    #[test]
    fn test_record_from_event() {
        let event = AuthEvent::new("acme", "u1", actions::LOGIN_FAILURE);
        let record = AuditRecord::from_event(event);

        assert!(!record.id.is_empty());
        assert_eq!(record.user_id, "u1");
        assert!(record.device.is_none());
        assert!(record.security.is_none());
    }
}
