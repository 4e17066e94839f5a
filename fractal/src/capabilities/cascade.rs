//! Capability cascade: what a unit sees is what its parent sees, overlaid
//! with what the unit declares itself. Nearest declaration wins.

use super::CapabilitySet;
use crate::unit::UnitDescriptor;

/// Capability set of `unit` given the set of its parent. Pure and total.
pub fn cascade(parent: &CapabilitySet, unit: &UnitDescriptor) -> CapabilitySet {
    if unit.declared_capabilities.is_empty() {
        return parent.clone();
    }
    parent.with_declared(&unit.declared_capabilities)
}
