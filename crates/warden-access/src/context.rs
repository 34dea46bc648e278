//! Access context and decision types.

use serde::{Deserialize, Serialize};

/// The principal requesting access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    /// User ID.
    pub id: String,
    /// Tenant the user belongs to.
    pub tenant_id: String,
    /// Tenant slug, for audit records.
    pub tenant_slug: String,
    /// Role IDs assigned to the user.
    pub roles: Vec<String>,
    /// Whether the user is an external customer.
    pub is_external_customer: bool,
}

impl UserContext {
    /// Creates a new user context.
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        tenant_slug: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            tenant_slug: tenant_slug.into(),
            roles: Vec::new(),
            is_external_customer: false,
        }
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role_id: impl Into<String>) -> Self {
        self.roles.push(role_id.into());
        self
    }

    /// Marks the user as an external customer.
    #[must_use]
    pub fn external_customer(mut self) -> Self {
        self.is_external_customer = true;
        self
    }
}

/// The resource being accessed, if the request targets one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource type, e.g. `inspection`.
    pub resource_type: String,
    /// Resource ID, when the request targets a specific instance.
    pub id: Option<String>,
    /// Owning tenant, when known. Drives tenant isolation.
    pub tenant_id: Option<String>,
}

impl ResourceRef {
    /// Creates a type-level resource reference.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: None,
            tenant_id: None,
        }
    }

    /// Sets the resource ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the owning tenant.
    #[must_use]
    pub fn in_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Immutable input to a single access decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessContext {
    /// The requesting principal.
    pub user: UserContext,
    /// The targeted resource, if any.
    pub resource: Option<ResourceRef>,
    /// The requested action.
    pub action: String,
    /// The requested route, for external-customer gating.
    pub route: Option<String>,
    /// Client IP, carried through to the audit trail.
    pub ip_address: Option<String>,
    /// Client user agent, carried through to the audit trail.
    pub user_agent: Option<String>,
}

impl AccessContext {
    /// Creates a new context.
    pub fn new(user: UserContext, action: impl Into<String>) -> Self {
        Self {
            user,
            resource: None,
            action: action.into(),
            route: None,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Sets the target resource.
    #[must_use]
    pub fn on_resource(mut self, resource: ResourceRef) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Sets the requested route.
    #[must_use]
    pub fn via_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Sets the client IP.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Sets the client user agent.
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Returns the decision cache key for this context.
    ///
    /// Keyed as `userId|tenantId|action|resourceType|resourceId|route`
    /// with empty segments for absent parts, so per-user invalidation can
    /// drop every entry sharing the `userId|` prefix.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let (resource_type, resource_id) = match &self.resource {
            Some(r) => (r.resource_type.as_str(), r.id.as_deref().unwrap_or("")),
            None => ("", ""),
        };

        format!(
            "{}|{}|{}|{}|{}|{}",
            self.user.id,
            self.user.tenant_id,
            self.action,
            resource_type,
            resource_id,
            self.route.as_deref().unwrap_or("")
        )
    }
}

/// The outcome of a single access decision.
///
/// Never partially mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Whether access is granted.
    pub granted: bool,
    /// Reason for the decision.
    pub reason: String,
    /// Held permissions that satisfied the requirement.
    pub permissions: Vec<String>,
    /// Conditions attached by the condition evaluator, if any.
    pub conditions: Option<Vec<String>>,
    /// For route-gated denials, the routes the principal may use.
    pub restrictions: Option<Vec<String>>,
}

impl AccessDecision {
    /// Creates a grant decision.
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            granted: true,
            reason: reason.into(),
            permissions: Vec::new(),
            conditions: None,
            restrictions: None,
        }
    }

    /// Creates a deny decision.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            reason: reason.into(),
            permissions: Vec::new(),
            conditions: None,
            restrictions: None,
        }
    }

    /// Sets the satisfying permissions.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Sets the attached conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Vec<String>) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Sets the route restrictions.
    #[must_use]
    pub fn with_restrictions(mut self, restrictions: Vec<String>) -> Self {
        self.restrictions = Some(restrictions);
        self
    }
}
