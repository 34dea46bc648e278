//! Role documents and the role store interface.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::StoreResult;

/// A role document.
///
/// Roles are owned by an external administration flow; this core only
/// reads them. Permission strings are dot-segmented (`resource.action`)
/// and may contain `*` segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Role ID.
    pub id: String,
    /// Role name.
    pub name: String,
    /// Permission strings granted by this role (unique set).
    pub permissions: HashSet<String>,
    /// Marks roles issued to external customers.
    pub is_external_customer: bool,
    /// Routes an external-customer role may reach.
    pub allowed_routes: Vec<String>,
}

impl Role {
    /// Creates a new role.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            permissions: HashSet::new(),
            is_external_customer: false,
            allowed_routes: Vec::new(),
        }
    }

    /// Adds a permission.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    /// Adds multiple permissions.
    #[must_use]
    pub fn with_permissions(
        mut self,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        for p in permissions {
            self.permissions.insert(p.into());
        }
        self
    }

    /// Marks the role as an external-customer role.
    #[must_use]
    pub fn external_customer(mut self) -> Self {
        self.is_external_customer = true;
        self
    }

    /// Adds an allowed route.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.allowed_routes.push(route.into());
        self
    }
}

/// Supplies role documents for a set of role identifiers.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Returns the roles for the given IDs. Unknown IDs are skipped.
    async fn get_roles(&self, role_ids: &[String]) -> StoreResult<Vec<Role>>;
}

/// In-memory role store for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryRoleStore {
    roles: RwLock<HashMap<String, Role>>,
}

impl MemoryRoleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a role.
    pub fn add_role(&self, role: Role) {
        self.roles.write().insert(role.id.clone(), role);
    }

    /// Removes a role by ID.
    pub fn remove_role(&self, role_id: &str) {
        self.roles.write().remove(role_id);
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn get_roles(&self, role_ids: &[String]) -> StoreResult<Vec<Role>> {
        let roles = self.roles.read();
        Ok(role_ids
            .iter()
            .filter_map(|id| roles.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_role_lookup_skips_unknown() {
        let store = MemoryRoleStore::new();
        store.add_role(Role::new("inspector", "Inspector").with_permission("inspection.read"));

        let roles = store
            .get_roles(&["inspector".to_string(), "missing".to_string()])
            .await
            .unwrap();

        assert_eq!(roles.len(), 1);
        assert!(roles[0].permissions.contains("inspection.read"));
    }

    #[test]
    fn test_permissions_are_a_set() {
        let role = Role::new("r", "R")
            .with_permission("inspection.read")
            .with_permission("inspection.read");

        assert_eq!(role.permissions.len(), 1);
    }
}
