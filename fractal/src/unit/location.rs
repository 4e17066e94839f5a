//! Addressing units inside a fractal tree.

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

use super::FEATURES_DIR;

/// Path of a unit: the root's name followed by the names of the nested
/// features leading to it. Immutable once built; `child` returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitLocation {
    root: String,
    segments: Vec<String>,
}

impl UnitLocation {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            root: name.into(),
            segments: Vec::new(),
        }
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self {
            root: self.root.clone(),
            segments,
        }
    }

    /// Own name: the last feature segment, or the root name.
    pub fn name(&self) -> &str {
        self.segments.last().unwrap_or(&self.root)
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Directory of this unit given the directory of its root unit:
    /// `<base>/features/<a>/features/<b>`.
    pub fn dir_in(&self, base: &Path) -> PathBuf {
        let mut dir = base.to_path_buf();
        for segment in &self.segments {
            dir.push(FEATURES_DIR);
            dir.push(segment);
        }
        dir
    }
}

impl fmt::Display for UnitLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl Serialize for UnitLocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
