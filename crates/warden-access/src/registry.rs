//! Static permission catalog and the external-customer route allow-list.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use warden_core::RiskLevel;

/// Routes external-customer principals may request.
///
/// Entries ending in `*` match by prefix; all others match exactly.
pub const EXTERNAL_CUSTOMER_ROUTES: &[&str] = &[
    "/dashboard",
    "/portal/*",
    "/inspections/shared/*",
    "/reports/shared/*",
    "/account",
    "/account/settings",
    "/support/*",
];

/// Permission category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    /// Read paths over tenant data.
    DataAccess,
    /// Write paths over tenant data.
    DataMutation,
    /// User, role, and tenant administration.
    Administration,
    /// Security-sensitive operations.
    Security,
}

impl fmt::Display for PermissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataAccess => write!(f, "data_access"),
            Self::DataMutation => write!(f, "data_mutation"),
            Self::Administration => write!(f, "administration"),
            Self::Security => write!(f, "security"),
        }
    }
}

/// Metadata describing a known permission string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionMeta {
    /// Human-readable description.
    pub description: String,
    /// Resource the permission governs.
    pub resource: String,
    /// Action the permission governs.
    pub action: String,
    /// Category.
    pub category: PermissionCategory,
    /// Risk attached to holding this permission.
    pub risk_level: RiskLevel,
}

/// Static catalog mapping permission strings to metadata.
///
/// The catalog is fixed at construction; role documents reference these
/// strings but the registry itself has no dependencies.
pub struct PermissionRegistry {
    catalog: HashMap<String, PermissionMeta>,
}

impl PermissionRegistry {
    /// Creates the registry with the built-in catalog.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            catalog: HashMap::new(),
        };
        registry.initialize_builtins();
        registry
    }

    fn initialize_builtins(&mut self) {
        use PermissionCategory::{Administration, DataAccess, DataMutation, Security};
        use RiskLevel::{Critical, High, Low, Medium};

        let builtins = [
            ("*", "Unrestricted access to all resources", "*", "*", Security, Critical),
            ("inspection.read", "View inspections", "inspection", "read", DataAccess, Low),
            ("inspection.write", "Create and update inspections", "inspection", "write", DataMutation, Medium),
            ("inspection.delete", "Delete inspections", "inspection", "delete", DataMutation, High),
            ("inspection.*", "Full inspection access", "inspection", "*", DataMutation, High),
            ("report.read", "View reports", "report", "read", DataAccess, Low),
            ("report.write", "Create and update reports", "report", "write", DataMutation, Medium),
            ("report.export", "Export reports", "report", "export", DataAccess, Medium),
            ("template.read", "View templates", "template", "read", DataAccess, Low),
            ("template.write", "Create and update templates", "template", "write", DataMutation, Medium),
            ("user.read", "View users", "user", "read", Administration, Medium),
            ("user.write", "Create and update users", "user", "write", Administration, High),
            ("role.read", "View roles", "role", "read", Administration, Medium),
            ("role.write", "Create and update roles", "role", "write", Administration, Critical),
            ("tenant.manage", "Manage tenant settings", "tenant", "manage", Administration, Critical),
            ("audit.read", "View the audit trail", "audit", "read", Security, High),
            ("settings.read", "View settings", "settings", "read", DataAccess, Low),
            ("settings.write", "Change settings", "settings", "write", Administration, High),
        ];

        for (key, description, resource, action, category, risk_level) in builtins {
            self.catalog.insert(
                key.to_string(),
                PermissionMeta {
                    description: description.to_string(),
                    resource: resource.to_string(),
                    action: action.to_string(),
                    category,
                    risk_level,
                },
            );
        }
    }

    /// Looks up metadata for a permission string.
    #[must_use]
    pub fn get(&self, permission: &str) -> Option<&PermissionMeta> {
        self.catalog.get(permission)
    }

    /// Returns true if the permission string is in the catalog.
    #[must_use]
    pub fn contains(&self, permission: &str) -> bool {
        self.catalog.contains_key(permission)
    }

    /// Returns the number of catalog entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Returns the external-customer route allow-list.
    #[must_use]
    pub fn external_customer_routes(&self) -> Vec<String> {
        EXTERNAL_CUSTOMER_ROUTES
            .iter()
            .map(|r| (*r).to_string())
            .collect()
    }

    /// Checks a route against the external-customer allow-list.
    ///
    /// Patterns ending in `*` match by prefix; all others match exactly.
    #[must_use]
    pub fn route_allowed(&self, route: &str) -> bool {
        EXTERNAL_CUSTOMER_ROUTES.iter().any(|pattern| {
            match pattern.strip_suffix('*') {
                Some(prefix) => route.starts_with(prefix),
                None => route == *pattern,
            }
        })
    }
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
