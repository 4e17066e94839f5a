//! Cycle detection for recursive unit discovery

use std::collections::HashMap;

use crate::unit::UnitLocation;

/// Tracks the units on the current discovery path to prevent infinite recursion
#[derive(Debug, Clone)]
pub struct CycleDetector {
    visited_units: HashMap<String, UnitLocation>,
    max_depth: usize,
    current_depth: usize,
}

impl CycleDetector {
    /// Create a new cycle detector with a maximum depth
    pub fn new(max_depth: usize) -> Self {
        Self {
            visited_units: HashMap::new(),
            max_depth,
            current_depth: 0,
        }
    }

    /// Location that first claimed this identity on the current path, if any
    /// (indicates a cycle)
    pub fn visited_by(&self, identity: &str) -> Option<&UnitLocation> {
        self.visited_units.get(identity)
    }

    /// Check if we've reached the maximum depth
    pub fn is_max_depth(&self) -> bool {
        self.current_depth >= self.max_depth
    }

    /// Check if we can continue deeper
    pub fn can_go_deeper(&self) -> bool {
        !self.is_max_depth()
    }

    /// Mark a unit as visited
    pub fn visit(&mut self, identity: &str, location: &UnitLocation) {
        self.visited_units
            .entry(identity.to_string())
            .or_insert_with(|| location.clone());
    }

    /// Create a new detector one level deeper
    pub fn go_deeper(&self) -> Self {
        Self {
            visited_units: self.visited_units.clone(),
            max_depth: self.max_depth,
            current_depth: self.current_depth + 1,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
