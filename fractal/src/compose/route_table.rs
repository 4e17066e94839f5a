//! The root routing surface units are mounted onto.
//!
//! Routes are kept by full path so conflicts are caught here and reported as
//! unit failures, instead of surfacing as a panic inside axum's router.

use axum::http::Method;
use axum::routing::MethodRouter;
use axum::Router;
use indexmap::IndexMap;

use crate::registry::MountedRoute;
use crate::surface::RouteSpec;
use crate::unit::UnitLocation;

/// Route of a unit that cannot coexist with one already mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConflict {
    pub route: String,
    pub existing: String,
}

struct PathEntry {
    methods: Vec<Method>,
    owner: UnitLocation,
    handler: MethodRouter,
}

#[derive(Default)]
pub struct RouteTable {
    paths: IndexMap<String, PathEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `routes` of `owner` beneath `base`. Either every route is
    /// mounted or none is.
    pub(crate) fn mount(
        &mut self,
        owner: &UnitLocation,
        base: &str,
        routes: Vec<RouteSpec>,
    ) -> Result<Vec<MountedRoute>, RouteConflict> {
        let full: Vec<(Method, String)> = routes
            .iter()
            .map(|r| (r.method.clone(), full_path(base, &r.path)))
            .collect();

        for (index, (method, path)) in full.iter().enumerate() {
            // `""` and `"/"` both land on the mount path itself.
            if full[..index].contains(&(method.clone(), path.clone())) {
                return Err(RouteConflict {
                    route: format!("{} {}", method, path),
                    existing: format!("{} {} of {}", method, path, owner),
                });
            }
            if let Some(entry) = self.paths.get(path) {
                if entry.methods.contains(method) {
                    return Err(RouteConflict {
                        route: format!("{} {}", method, path),
                        existing: format!("{} {} of {}", method, path, entry.owner),
                    });
                }
                continue;
            }
            if let Some((existing, entry)) = self
                .paths
                .iter()
                .find(|(existing, _)| shapes_collide(path, existing))
            {
                return Err(RouteConflict {
                    route: format!("{} {}", method, path),
                    existing: format!("{} of {}", existing, entry.owner),
                });
            }
            if let Some((_, earlier)) = full[..index]
                .iter()
                .find(|(_, earlier)| shapes_collide(path, earlier))
            {
                return Err(RouteConflict {
                    route: format!("{} {}", method, path),
                    existing: format!("{} of {}", earlier, owner),
                });
            }
        }

        let mut mounted = Vec::with_capacity(routes.len());
        for (spec, (method, path)) in routes.into_iter().zip(full) {
            mounted.push(MountedRoute {
                method: method.to_string(),
                path: path.clone(),
            });
            match self.paths.get_mut(&path) {
                Some(entry) => {
                    let previous = std::mem::replace(&mut entry.handler, MethodRouter::new());
                    entry.handler = previous.merge(spec.handler);
                    entry.methods.push(method);
                }
                None => {
                    self.paths.insert(
                        path,
                        PathEntry {
                            methods: vec![method],
                            owner: owner.clone(),
                            handler: spec.handler,
                        },
                    );
                }
            }
        }
        Ok(mounted)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn into_router(self) -> Router {
        self.paths
            .into_iter()
            .fold(Router::new(), |router, (path, entry)| router.route(&path, entry.handler))
    }
}

/// Mount path of a unit: its parent's mount path followed by its own prefix.
pub fn join_mount(base: &str, prefix: &str) -> String {
    format!("{}{}", base, prefix)
}

/// Mount paths are kept raw while composing; the root mount shows as `/`.
pub fn display_mount(base: &str) -> String {
    if base.is_empty() {
        "/".to_string()
    } else {
        base.to_string()
    }
}

fn full_path(base: &str, path: &str) -> String {
    display_mount(&join_mount(base, path))
}

fn is_dynamic(segment: &str) -> bool {
    segment.starts_with(':') || segment.starts_with('*')
}

/// Distinct paths the router cannot tell apart: a position where both hold
/// differently named parameters, or where a wildcard meets anything else.
fn shapes_collide(a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    for (left, right) in a.split('/').zip(b.split('/')) {
        if left == right {
            continue;
        }
        if left.starts_with('*') || right.starts_with('*') {
            return true;
        }
        return is_dynamic(left) && is_dynamic(right);
    }
    false
}
