//! Pluggable condition evaluation.

use crate::context::AccessContext;

/// Outcome of a condition check.
#[derive(Debug, Clone)]
pub struct ConditionOutcome {
    /// Whether the conditions hold.
    pub granted: bool,
    /// Reason, when denied.
    pub reason: Option<String>,
}

impl ConditionOutcome {
    /// Conditions hold.
    #[must_use]
    pub fn granted() -> Self {
        Self {
            granted: true,
            reason: None,
        }
    }

    /// Conditions do not hold.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            reason: Some(reason.into()),
        }
    }
}

/// Extension point invoked after a permission match is found.
///
/// Implementations can attach contextual constraints (time windows,
/// resource ownership, approval states) to otherwise-held permissions.
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluates conditions for a matched permission.
    fn evaluate(&self, ctx: &AccessContext, permission: &str) -> ConditionOutcome;
}

/// Default evaluator: no conditions are configured, everything passes.
pub struct AllowAll;

impl ConditionEvaluator for AllowAll {
    fn evaluate(&self, _ctx: &AccessContext, _permission: &str) -> ConditionOutcome {
        ConditionOutcome::granted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UserContext;

    #[test]
    fn test_allow_all() {
        let ctx = AccessContext::new(UserContext::new("u1", "t1", "acme"), "read");
        let outcome = AllowAll.evaluate(&ctx, "inspection.read");
        assert!(outcome.granted);
        assert!(outcome.reason.is_none());
    }
}
