//! Flattened "show structure" report of a mount registry.

use std::fmt::Write as _;

use serde::Serialize;

use super::MountRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportCapability {
    pub name: String,
    pub declared_at: String,
    pub bound: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub location: String,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mount_path: Option<String>,
    pub tags: Vec<String>,
    pub routes: Vec<String>,
    pub capabilities: Vec<ReportCapability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFailure {
    pub location: String,
    pub kind: String,
    pub reason: String,
}

/// Every unit in mount order with its mounted routes and visible
/// capabilities, followed by the failure list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureReport {
    pub root: String,
    pub units: Vec<ReportEntry>,
    pub failures: Vec<ReportFailure>,
}

impl StructureReport {
    pub fn from_registry(registry: &MountRegistry) -> Self {
        let units = registry
            .walk()
            .map(|node| ReportEntry {
                location: node.location.to_string(),
                depth: node.location.depth(),
                description: node.description.clone(),
                mount_path: node.mounted.as_ref().map(|m| m.mount_path.clone()),
                tags: node
                    .mounted
                    .as_ref()
                    .map(|m| m.tags.clone())
                    .unwrap_or_default(),
                routes: node
                    .mounted
                    .iter()
                    .flat_map(|m| m.routes.iter().map(|r| r.to_string()))
                    .collect(),
                capabilities: node
                    .capabilities
                    .iter()
                    .map(|c| ReportCapability {
                        name: c.name().to_string(),
                        declared_at: c.declared_at().to_string(),
                        bound: c.has_instance(),
                    })
                    .collect(),
            })
            .collect();

        let failures = registry
            .failures()
            .iter()
            .map(|f| ReportFailure {
                location: f.location.to_string(),
                kind: f.reason.kind().to_string(),
                reason: f.reason.to_string(),
            })
            .collect();

        Self {
            root: registry.root().location.to_string(),
            units,
            failures,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for unit in &self.units {
            let mount = unit.mount_path.as_deref().unwrap_or("unmounted");
            let _ = writeln!(out, "{}  [{}]", unit.location, mount);
            if let Some(description) = &unit.description {
                let _ = writeln!(out, "    # {}", description);
            }
            for route in &unit.routes {
                let _ = writeln!(out, "    {}", route);
            }
            for capability in &unit.capabilities {
                let _ = writeln!(
                    out,
                    "    capability {} <- {}{}",
                    capability.name,
                    capability.declared_at,
                    if capability.bound { "" } else { " (unbound)" }
                );
            }
        }
        let _ = writeln!(out, "failures ({})", self.failures.len());
        for failure in &self.failures {
            let _ = writeln!(out, "    {}: {}", failure.location, failure.reason);
        }
        out
    }
}
