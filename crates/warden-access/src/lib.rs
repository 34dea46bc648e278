//! Tenant-isolated access control for Warden.
//!
//! This crate provides the authorization decision engine:
//! - Static permission registry with per-permission metadata
//! - Wildcard segment permission matching
//! - TTL-cached access decisions with per-user invalidation
//! - External-customer route gating
//! - Pluggable condition evaluation
//!
//! The public entry point is [`PermissionEvaluator::check_permission`],
//! which never fails: internal errors produce a closed (deny) decision.

pub mod cache;
pub mod condition;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod matcher;
pub mod registry;

pub use cache::DecisionCache;
pub use condition::{AllowAll, ConditionEvaluator, ConditionOutcome};
pub use context::{AccessContext, AccessDecision, ResourceRef, UserContext};
pub use error::{AccessError, AccessResult};
pub use evaluator::PermissionEvaluator;
pub use matcher::permission_matches;
pub use registry::{PermissionCategory, PermissionMeta, PermissionRegistry};
