//! Target resolution boundary.
//!
//! Resolution of logical targets (security groups, load balancers) to
//! concrete endpoints happens outside this engine; the runner only
//! consumes the [`Resolver`] trait. [`StaticResolver`] covers agents
//! configured with a fixed endpoint inventory, and doubles as the
//! resolver used throughout the engine's tests.

use async_trait::async_trait;
use std::collections::HashMap;
use vigil_core::{CheckError, Target};

/// Maps a logical target descriptor to concrete, dialable targets.
///
/// Implementations must be safe for concurrent calls from multiple
/// simultaneous runs.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Expand `target` into zero or more concrete targets.
    ///
    /// An empty list is a valid outcome (no matching endpoints), not
    /// an error. Concrete targets resolve to themselves.
    async fn resolve(&self, target: &Target) -> Result<Vec<Target>, CheckError>;
}

/// Resolver backed by a fixed map from target id to endpoints.
#[derive(Debug, Default)]
pub struct StaticResolver {
    entries: HashMap<String, Vec<Target>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the concrete targets a logical target id expands to.
    pub fn insert(&mut self, id: impl Into<String>, targets: Vec<Target>) {
        self.entries.insert(id.into(), targets);
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, target: &Target) -> Result<Vec<Target>, CheckError> {
        // Concrete targets with an address are terminal.
        if target.is_concrete() && target.address.is_some() {
            return Ok(vec![target.clone()]);
        }
        match self.entries.get(&target.id) {
            Some(targets) => Ok(targets.clone()),
            None => Err(CheckError::Resolution(format!(
                "no endpoints known for target {} ({})",
                target.id, target.kind
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::TargetKind;

    #[tokio::test]
    async fn test_concrete_target_resolves_to_itself() {
        let resolver = StaticResolver::new();
        let target = Target::concrete(TargetKind::Ip, "ip-1", "192.0.2.7");
        let resolved = resolver.resolve(&target).await.unwrap();
        assert_eq!(resolved, vec![target]);
    }

    #[tokio::test]
    async fn test_logical_target_expands() {
        let mut resolver = StaticResolver::new();
        resolver.insert(
            "sg-web",
            vec![
                Target::concrete(TargetKind::Instance, "i-1", "10.0.0.1"),
                Target::concrete(TargetKind::Instance, "i-2", "10.0.0.2"),
            ],
        );
        let logical = Target::logical(TargetKind::SecurityGroup, "sg-web");
        let resolved = resolver.resolve(&logical).await.unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_target_is_resolution_error() {
        let resolver = StaticResolver::new();
        let logical = Target::logical(TargetKind::SecurityGroup, "sg-missing");
        let err = resolver.resolve(&logical).await.unwrap_err();
        assert!(matches!(err, CheckError::Resolution(_)));
    }

    #[tokio::test]
    async fn test_registered_empty_expansion_is_not_an_error() {
        let mut resolver = StaticResolver::new();
        resolver.insert("sg-empty", Vec::new());
        let logical = Target::logical(TargetKind::SecurityGroup, "sg-empty");
        let resolved = resolver.resolve(&logical).await.unwrap();
        assert!(resolved.is_empty());
    }
}
