//! Peripheral discovery glue.
//!
//! Classifies discovered peripherals into left/right roles from their
//! advertised names and assembles them into a connectable pair. Role
//! assignment is immutable for a connection's lifetime; a second peripheral
//! advertising an already-claimed role is ignored.

use crate::domain::models::UnitRole;
use crate::infrastructure::bluetooth::transport::{DiscoveredUnit, UnitTransport};
use std::sync::Arc;
use tracing::{debug, info};

/// Classify an advertised peripheral name into a unit role.
///
/// The glasses advertise as `"<model>_L_<suffix>"` / `"<model>_R_<suffix>"`.
pub fn classify_unit_name(name: &str) -> Option<UnitRole> {
    if name.contains("_L_") {
        Some(UnitRole::Left)
    } else if name.contains("_R_") {
        Some(UnitRole::Right)
    } else {
        None
    }
}

/// Collects discovered peripherals until both roles are filled.
#[derive(Default)]
pub struct PairDiscovery {
    left: Option<Arc<dyn UnitTransport>>,
    right: Option<Arc<dyn UnitTransport>>,
}

impl PairDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a discovered peripheral. Returns the role it was accepted for,
    /// or `None` when the name matches no role or the role is taken.
    pub fn offer(&mut self, transport: Arc<dyn UnitTransport>) -> Option<UnitRole> {
        let name = transport.peripheral_name().to_string();
        let role = classify_unit_name(&name)?;

        let slot = match role {
            UnitRole::Left => &mut self.left,
            UnitRole::Right => &mut self.right,
        };
        if slot.is_some() {
            debug!(%role, %name, "role already claimed, ignoring peripheral");
            return None;
        }
        info!(%role, %name, "classified peripheral");
        *slot = Some(transport);
        Some(role)
    }

    pub fn is_complete(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }

    /// Take the assembled pair once both roles are present.
    pub fn take_pair(&mut self) -> Option<(DiscoveredUnit, DiscoveredUnit)> {
        if !self.is_complete() {
            return None;
        }
        let left = DiscoveredUnit {
            role: UnitRole::Left,
            transport: self.left.take().unwrap(),
        };
        let right = DiscoveredUnit {
            role: UnitRole::Right,
            transport: self.right.take().unwrap(),
        };
        Some((left, right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::testkit::FakeTransport;

    #[test]
    fn classifies_by_name_substring() {
        assert_eq!(classify_unit_name("Even G1_45_L_F2A3"), Some(UnitRole::Left));
        assert_eq!(classify_unit_name("Even G1_45_R_F2A3"), Some(UnitRole::Right));
        assert_eq!(classify_unit_name("SomeOtherDevice"), None);
    }

    #[test]
    fn pair_completes_when_both_roles_seen() {
        let mut discovery = PairDiscovery::new();
        assert!(!discovery.is_complete());

        let left = Arc::new(FakeTransport::new("G1_45_L_A"));
        let right = Arc::new(FakeTransport::new("G1_45_R_A"));
        assert_eq!(discovery.offer(left), Some(UnitRole::Left));
        assert!(!discovery.is_complete());
        assert_eq!(discovery.offer(right), Some(UnitRole::Right));
        assert!(discovery.is_complete());

        let (l, r) = discovery.take_pair().unwrap();
        assert_eq!(l.role, UnitRole::Left);
        assert_eq!(r.role, UnitRole::Right);
    }

    #[test]
    fn duplicate_role_is_ignored() {
        let mut discovery = PairDiscovery::new();
        discovery.offer(Arc::new(FakeTransport::new("G1_45_L_A")));
        assert_eq!(discovery.offer(Arc::new(FakeTransport::new("G1_45_L_B"))), None);
    }

    #[test]
    fn unrelated_peripheral_is_ignored() {
        let mut discovery = PairDiscovery::new();
        assert_eq!(discovery.offer(Arc::new(FakeTransport::new("JBL Speaker"))), None);
        assert!(!discovery.is_complete());
    }
}
