//! Target descriptors: the logical or concrete endpoints a check runs against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of endpoint a target describes.
///
/// Logical kinds (security groups, load balancers) expand to zero or
/// more concrete targets during resolution. Concrete kinds are
/// terminal: resolving them yields themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A security group; resolves to its member instances.
    #[serde(rename = "sg")]
    SecurityGroup,
    /// A load balancer; resolves to its backing instances.
    #[serde(rename = "elb")]
    LoadBalancer,
    /// A single compute instance with a dial address.
    Instance,
    /// A literal IP address.
    Ip,
    /// A DNS name.
    Dns,
}

impl TargetKind {
    /// True if targets of this kind carry a dialable address and
    /// resolve to themselves.
    pub fn is_concrete(&self) -> bool {
        matches!(self, TargetKind::Instance | TargetKind::Ip | TargetKind::Dns)
    }

    /// Stable string form used in records and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::SecurityGroup => "sg",
            TargetKind::LoadBalancer => "elb",
            TargetKind::Instance => "instance",
            TargetKind::Ip => "ip",
            TargetKind::Dns => "dns",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical or concrete endpoint descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Dial address. Present on concrete targets once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Target {
    /// Concrete target with a dial address.
    pub fn concrete(
        kind: TargetKind,
        id: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            name: String::new(),
            address: Some(address.into()),
        }
    }

    /// Logical target awaiting resolution.
    pub fn logical(kind: TargetKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: String::new(),
            address: None,
        }
    }

    /// True if this target can be dialed without further resolution.
    pub fn is_concrete(&self) -> bool {
        self.kind.is_concrete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_kinds() {
        assert!(TargetKind::Instance.is_concrete());
        assert!(TargetKind::Ip.is_concrete());
        assert!(TargetKind::Dns.is_concrete());
        assert!(!TargetKind::SecurityGroup.is_concrete());
        assert!(!TargetKind::LoadBalancer.is_concrete());
    }

    #[test]
    fn test_target_kind_wire_names() {
        let json = serde_json::to_string(&TargetKind::SecurityGroup).unwrap();
        assert_eq!(json, "\"sg\"");
        let kind: TargetKind = serde_json::from_str("\"instance\"").unwrap();
        assert_eq!(kind, TargetKind::Instance);
    }

    #[test]
    fn test_target_roundtrip() {
        let target = Target::concrete(TargetKind::Ip, "ip-1", "192.0.2.10");
        let json = serde_json::to_string(&target).unwrap();
        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn test_logical_target_has_no_address() {
        let target = Target::logical(TargetKind::SecurityGroup, "sg-123");
        assert!(target.address.is_none());
        assert!(!target.is_concrete());
    }
}
