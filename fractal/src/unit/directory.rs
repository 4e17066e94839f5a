//! Resolver for the on-disk fractal layout.
//!
//! ```text
//! app/
//!   unit.toml            [router] prefix = "", tags = []
//!   shared/config/       declared capability "config"
//!   features/users/      child unit "users"
//!     unit.toml          [router] prefix = "/users"
//!     features/...
//! ```
//!
//! Which units and shared modules exist is read from disk. Their route
//! providers and capability values come from a [`UnitCatalog`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{
    ResolveError, RoutingSurfaceRef, UnitCatalog, UnitDescriptor, UnitLocation, UnitResolver,
    FEATURES_DIR, MANIFEST_FILE, SHARED_DIR,
};
use crate::capabilities::CapabilityRef;
use crate::surface::validate_prefix;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitManifest {
    description: Option<String>,
    router: Option<RouterSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouterSection {
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    tags: Vec<String>,
}

pub struct DirectoryResolver {
    base: PathBuf,
    catalog: UnitCatalog,
}

impl DirectoryResolver {
    /// `base` is the directory of the root unit.
    pub fn new(base: impl Into<PathBuf>, catalog: UnitCatalog) -> Self {
        Self {
            base: base.into(),
            catalog,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Location of the root unit, named after its directory.
    pub fn root_location(&self) -> UnitLocation {
        Self::root_location_of(&self.base)
    }

    /// Root location a resolver over `base` would use, for building its catalog.
    pub fn root_location_of(base: &Path) -> UnitLocation {
        let name = base
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app");
        UnitLocation::root(name)
    }

    fn read_manifest(path: &Path) -> Result<Option<UnitManifest>, String> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("cannot read {}: {}", MANIFEST_FILE, e)),
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| format!("cannot parse {}: {}", MANIFEST_FILE, e))
    }
}

impl UnitResolver for DirectoryResolver {
    fn resolve(&self, location: &UnitLocation) -> Result<UnitDescriptor, ResolveError> {
        let dir = location.dir_in(&self.base);
        if !dir.is_dir() {
            return Err(ResolveError::MissingUnit {
                location: location.clone(),
            });
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let features_dir = dir.join(FEATURES_DIR);
        let shared_dir = dir.join(SHARED_DIR);
        if !manifest_path.exists()
            && !features_dir.is_dir()
            && !shared_dir.is_dir()
            && !self.catalog.contains(location)
        {
            return Err(ResolveError::MissingUnit {
                location: location.clone(),
            });
        }

        let identity = canonical(&dir);
        let mut descriptor = UnitDescriptor::new(location.clone(), identity.display().to_string());
        let mut defects: Vec<String> = Vec::new();

        match list_subunits(&features_dir) {
            Ok(names) => {
                descriptor.child_locations = names.into_iter().map(|n| location.child(n)).collect();
            }
            Err(e) => defects.push(format!("cannot list {}/: {}", FEATURES_DIR, e)),
        }

        match list_subunits(&shared_dir) {
            Ok(names) => {
                descriptor.declared_capabilities = names
                    .into_iter()
                    .map(|name| {
                        let origin = canonical(&shared_dir.join(&name));
                        let capability = CapabilityRef::new(name.as_str(), location.clone())
                            .with_origin(origin);
                        match self.catalog.instance(location, &name) {
                            Some(value) => capability.with_erased_instance(value),
                            None => capability,
                        }
                    })
                    .collect();
            }
            Err(e) => defects.push(format!("cannot list {}/: {}", SHARED_DIR, e)),
        }

        let manifest = match Self::read_manifest(&manifest_path) {
            Ok(manifest) => manifest.unwrap_or_default(),
            Err(reason) => {
                defects.push(reason);
                UnitManifest::default()
            }
        };
        descriptor.description = manifest.description;

        match manifest.router {
            Some(router) => {
                if let Err(reason) = validate_prefix(&router.prefix) {
                    defects.push(format!("invalid router prefix: {}", reason));
                } else if let Some(provider) = self.catalog.provider(location) {
                    descriptor.surface = Some(RoutingSurfaceRef {
                        prefix: router.prefix,
                        tags: router.tags,
                        provider,
                    });
                } else {
                    defects.push("declares a router but no route provider is registered".to_string());
                }
            }
            None if self.catalog.contains(location) => {
                tracing::warn!(
                    unit = %location,
                    "route provider registered for a unit without a [router] section; ignoring it"
                );
            }
            None => {}
        }

        if defects.is_empty() {
            Ok(descriptor)
        } else {
            descriptor.surface = None;
            Err(ResolveError::MalformedUnit {
                location: location.clone(),
                reason: defects.join("; "),
                partial: Box::new(descriptor),
            })
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Sorted names of the unit directories directly under `dir`. A missing
/// `dir` has no entries. Files, dot/underscore names and non UTF-8 names are
/// not units.
fn list_subunits(dir: &Path) -> io::Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!(path = %path.display(), "skipping unit directory with a non UTF-8 name");
            continue;
        };
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{from_fn, RouteSurface, SurfaceError, UnitContext};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn status_provider() -> impl crate::surface::RouteProvider {
        from_fn(|_ctx: &UnitContext<'_>| -> Result<RouteSurface, SurfaceError> {
            Ok(RouteSurface::new().get("/status", || async { "ok" }))
        })
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_resolves_children_and_shared_in_name_order() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app");
        write(&base.join("unit.toml"), "description = \"root\"\n");
        for name in ["gamma", "alpha", "beta"] {
            fs::create_dir_all(base.join("features").join(name).join("shared")).unwrap();
        }
        fs::create_dir_all(base.join("features").join(".hidden")).unwrap();
        write(&base.join("features").join("notes.txt"), "not a unit");
        fs::create_dir_all(base.join("shared/database")).unwrap();
        fs::create_dir_all(base.join("shared/config")).unwrap();

        let mut catalog = UnitCatalog::new();
        catalog.provide(UnitLocation::root("app"), "config", Arc::new(7u16));
        let resolver = DirectoryResolver::new(&base, catalog);
        let root = resolver.root_location();
        assert_eq!(root, UnitLocation::root("app"));

        let descriptor = resolver.resolve(&root).unwrap();
        assert!(!descriptor.has_routing_surface());
        assert_eq!(descriptor.description.as_deref(), Some("root"));
        let children: Vec<String> = descriptor
            .child_locations
            .iter()
            .map(|l| l.to_string())
            .collect();
        assert_eq!(children, vec!["app/alpha", "app/beta", "app/gamma"]);
        let shared: Vec<&str> = descriptor
            .declared_capabilities
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(shared, vec!["config", "database"]);
        assert!(descriptor.declared_capabilities[0].has_instance());
        assert!(!descriptor.declared_capabilities[1].has_instance());
    }

    #[test]
    fn test_router_with_registered_provider() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app");
        write(
            &base.join("features/users/unit.toml"),
            "[router]\nprefix = \"/users\"\ntags = [\"users\"]\n",
        );
        let users = UnitLocation::root("app").child("users");
        let mut catalog = UnitCatalog::new();
        catalog.register(users.clone(), status_provider());

        let resolver = DirectoryResolver::new(&base, catalog);
        let descriptor = resolver.resolve(&users).unwrap();
        let surface = descriptor.surface.expect("routing surface");
        assert_eq!(surface.prefix, "/users");
        assert_eq!(surface.tags, vec!["users".to_string()]);
    }

    #[test]
    fn test_router_without_provider_is_malformed() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app");
        write(&base.join("features/x/unit.toml"), "[router]\nprefix = \"/x\"\n");
        fs::create_dir_all(base.join("features/x/features/inner")).unwrap();
        fs::create_dir_all(base.join("features/x/features/inner/shared")).unwrap();

        let resolver = DirectoryResolver::new(&base, UnitCatalog::new());
        let x = UnitLocation::root("app").child("x");
        match resolver.resolve(&x) {
            Err(ResolveError::MalformedUnit { reason, partial, .. }) => {
                assert!(reason.contains("no route provider"));
                assert!(!partial.has_routing_surface());
                assert_eq!(partial.child_locations, vec![x.child("inner")]);
            }
            other => panic!("expected malformed unit, got {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_manifest_and_bad_prefix_are_malformed() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app");
        write(&base.join("features/broken/unit.toml"), "[router\nprefix=");
        write(&base.join("features/slash/unit.toml"), "[router]\nprefix = \"/slash/\"\n");
        let mut catalog = UnitCatalog::new();
        catalog.register(UnitLocation::root("app").child("slash"), status_provider());
        let resolver = DirectoryResolver::new(&base, catalog);

        for name in ["broken", "slash"] {
            let location = UnitLocation::root("app").child(name);
            assert!(matches!(
                resolver.resolve(&location),
                Err(ResolveError::MalformedUnit { .. })
            ));
        }
    }

    #[test]
    fn test_missing_and_empty_units() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app");
        fs::create_dir_all(base.join("features/empty")).unwrap();
        let resolver = DirectoryResolver::new(&base, UnitCatalog::new());

        let empty = UnitLocation::root("app").child("empty");
        let absent = UnitLocation::root("app").child("absent");
        assert!(matches!(
            resolver.resolve(&empty),
            Err(ResolveError::MissingUnit { .. })
        ));
        assert!(matches!(
            resolver.resolve(&absent),
            Err(ResolveError::MissingUnit { .. })
        ));
    }

    #[test]
    fn test_provider_without_router_section_is_ignored() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app");
        write(&base.join("features/quiet/unit.toml"), "description = \"no routes\"\n");
        let quiet = UnitLocation::root("app").child("quiet");
        let mut catalog = UnitCatalog::new();
        catalog.register(quiet.clone(), status_provider());

        let resolver = DirectoryResolver::new(&base, catalog);
        let descriptor = resolver.resolve(&quiet).unwrap();
        assert!(!descriptor.has_routing_surface());
    }
}
