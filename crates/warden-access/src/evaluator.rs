//! Permission evaluation.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

use warden_core::{actions, AuditRecord, AuditStore, AuthEvent, RoleStore};

use crate::cache::DecisionCache;
use crate::condition::{AllowAll, ConditionEvaluator};
use crate::context::{AccessContext, AccessDecision};
use crate::error::AccessResult;
use crate::matcher::permission_matches;
use crate::registry::PermissionRegistry;

/// The access-control decision engine.
///
/// Evaluates [`AccessContext`]s against the principal's roles, with
/// tenant isolation, external-customer route gating, wildcard matching,
/// and a TTL decision cache. Collaborators are injected; construct one
/// instance at application start and share it.
pub struct PermissionEvaluator {
    role_store: Arc<dyn RoleStore>,
    audit_store: Arc<dyn AuditStore>,
    registry: PermissionRegistry,
    cache: DecisionCache,
    conditions: Arc<dyn ConditionEvaluator>,
}

impl PermissionEvaluator {
    /// Creates an evaluator with the default registry, cache, and
    /// allow-all condition evaluator.
    pub fn new(role_store: Arc<dyn RoleStore>, audit_store: Arc<dyn AuditStore>) -> Self {
        Self {
            role_store,
            audit_store,
            registry: PermissionRegistry::new(),
            cache: DecisionCache::new(),
            conditions: Arc::new(AllowAll),
        }
    }

    /// Replaces the decision cache.
    #[must_use]
    pub fn with_cache(mut self, cache: DecisionCache) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the condition evaluator.
    #[must_use]
    pub fn with_condition_evaluator(mut self, conditions: Arc<dyn ConditionEvaluator>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Returns the permission registry.
    #[must_use]
    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// Computes the access decision for a context.
    ///
    /// Never fails: any internal error is logged and mapped to a closed
    /// decision with reason `"Permission evaluation failed"`. Every
    /// decision is appended to the audit store on a background task; the
    /// write never blocks or fails the decision itself.
    pub async fn check_permission(&self, ctx: &AccessContext) -> AccessDecision {
        let key = ctx.cache_key();
        if let Some(decision) = self.cache.get(&key) {
            return decision;
        }

        let decision = match self.evaluate(ctx).await {
            Ok(decision) => {
                // Internal-failure denials are deliberately not memoized,
                // so only evaluated decisions reach the cache.
                self.cache.insert(key, decision.clone());
                decision
            }
            Err(err) => {
                error!(
                    user_id = %ctx.user.id,
                    action = %ctx.action,
                    code = err.code(),
                    error = %err,
                    "permission evaluation failed"
                );
                AccessDecision::deny("Permission evaluation failed")
            }
        };

        self.record_decision(ctx, &decision);
        decision
    }

    /// Drops all cached decisions for a user.
    ///
    /// Must be called whenever a user's roles or permissions change.
    pub fn invalidate_user(&self, user_id: &str) {
        self.cache.invalidate_user(user_id);
    }

    /// Drops every cached decision.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn evaluate(&self, ctx: &AccessContext) -> AccessResult<AccessDecision> {
        // Tenant isolation precedes all permission logic and cannot be
        // bypassed by any permission, wildcard included.
        if let Some(resource) = &ctx.resource {
            if let Some(resource_tenant) = &resource.tenant_id {
                if *resource_tenant != ctx.user.tenant_id {
                    warn!(
                        user_id = %ctx.user.id,
                        user_tenant = %ctx.user.tenant_id,
                        resource_tenant = %resource_tenant,
                        "cross-tenant access denied"
                    );
                    return Ok(AccessDecision::deny(
                        "Access denied: resource belongs to a different tenant",
                    ));
                }
            }
        }

        // External customers are confined to the route allow-list.
        if ctx.user.is_external_customer {
            let route = ctx.route.as_deref().unwrap_or("");
            if !self.registry.route_allowed(route) {
                warn!(user_id = %ctx.user.id, route, "external customer route denied");
                return Ok(AccessDecision::deny(
                    "Access denied: route not available to external customers",
                )
                .with_restrictions(self.registry.external_customer_routes()));
            }
        }

        let roles = self.role_store.get_roles(&ctx.user.roles).await?;
        let permissions = self.aggregate_permissions(
            roles.iter().flat_map(|role| role.permissions.iter().cloned()),
        );

        if permissions.contains("*") {
            return Ok(
                AccessDecision::allow("Wildcard permission").with_permissions(vec!["*".to_string()])
            );
        }

        let required = match &ctx.resource {
            Some(resource) => format!("{}.{}", resource.resource_type, ctx.action),
            None => ctx.action.clone(),
        };

        let mut satisfied: Vec<String> = permissions
            .iter()
            .filter(|held| permission_matches(held.as_str(), &required))
            .cloned()
            .collect();
        satisfied.sort();

        if satisfied.is_empty() {
            debug!(user_id = %ctx.user.id, %required, "no matching permission");
            return Ok(AccessDecision::deny(format!(
                "Missing permission: {required}"
            )));
        }

        let outcome = self.conditions.evaluate(ctx, &required);
        if !outcome.granted {
            return Ok(AccessDecision::deny(outcome.reason.unwrap_or_else(|| {
                format!("Conditions not met for permission: {required}")
            })));
        }

        Ok(AccessDecision::allow("Permission granted").with_permissions(satisfied))
    }

    /// Unions permission strings across roles.
    ///
    /// Role-hierarchy inheritance hooks in here; it is currently a
    /// pass-through so inheritance can be added without changing the
    /// call contract.
    fn aggregate_permissions(
        &self,
        direct: impl Iterator<Item = String>,
    ) -> HashSet<String> {
        self.expand_inherited(direct.collect())
    }

    fn expand_inherited(&self, permissions: HashSet<String>) -> HashSet<String> {
        permissions
    }

    /// Appends the decision to the audit store without blocking the
    /// caller. Failures are logged and swallowed.
    fn record_decision(&self, ctx: &AccessContext, decision: &AccessDecision) {
        let mut event = AuthEvent::new(
            ctx.user.tenant_slug.clone(),
            ctx.user.id.clone(),
            actions::PERMISSION_CHECK,
        )
        .with_metadata(decision_metadata(ctx, decision));
        event.ip_address = ctx.ip_address.clone();
        event.user_agent = ctx.user_agent.clone();
        let record = AuditRecord::from_event(event);

        let audit = Arc::clone(&self.audit_store);
        tokio::spawn(async move {
            if let Err(err) = audit.append(record).await {
                error!(code = err.code(), error = %err, "failed to persist access decision");
            }
        });
    }
}

fn decision_metadata(ctx: &AccessContext, decision: &AccessDecision) -> serde_json::Value {
    serde_json::json!({
        "action": ctx.action,
        "resource_type": ctx.resource.as_ref().map(|r| r.resource_type.clone()),
        "resource_id": ctx.resource.as_ref().and_then(|r| r.id.clone()),
        "route": ctx.route,
        "granted": decision.granted,
        "reason": decision.reason,
        "permissions": decision.permissions,
        "is_external_customer": ctx.user.is_external_customer,
    })
}
