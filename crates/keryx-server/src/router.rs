//! Request routing.
//!
//! Maps an incoming method + path pair to the operation id of a registered
//! handler. The demo API has no path parameters, so matching is exact; the
//! table still distinguishes "no such path" from "path exists, wrong
//! method" so the server can answer 404 vs 405 correctly.

use http::Method;

/// One registered route.
#[derive(Debug, Clone)]
struct Route {
    method: Method,
    path: String,
    operation_id: String,
}

/// Result of a route lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteLookup<'a> {
    /// A handler is registered for this method + path.
    Operation(&'a str),

    /// The path exists but not for this method.
    MethodNotAllowed,

    /// No route matches the path.
    NotFound,
}

/// Table of registered routes.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use keryx_server::{RouteLookup, RouteTable};
///
/// let mut routes = RouteTable::new();
/// routes.add(Method::GET, "/api/hello", "hello");
///
/// assert_eq!(
///     routes.lookup(&Method::GET, "/api/hello"),
///     RouteLookup::Operation("hello")
/// );
/// assert_eq!(
///     routes.lookup(&Method::POST, "/api/hello"),
///     RouteLookup::MethodNotAllowed
/// );
/// assert_eq!(routes.lookup(&Method::GET, "/nope"), RouteLookup::NotFound);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route. Later registrations for the same method + path
    /// shadow earlier ones.
    pub fn add(
        &mut self,
        method: Method,
        path: impl Into<String>,
        operation_id: impl Into<String>,
    ) {
        self.routes.insert(
            0,
            Route {
                method,
                path: path.into(),
                operation_id: operation_id.into(),
            },
        );
    }

    /// Looks up the operation for a method + path pair.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup<'_> {
        let mut path_seen = false;
        for route in &self.routes {
            if route.path != path {
                continue;
            }
            if route.method == *method {
                return RouteLookup::Operation(&route.operation_id);
            }
            path_seen = true;
        }

        if path_seen {
            RouteLookup::MethodNotAllowed
        } else {
            RouteLookup::NotFound
        }
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_table() -> RouteTable {
        let mut routes = RouteTable::new();
        routes.add(Method::GET, "/api/hello", "hello");
        routes.add(Method::POST, "/api/user", "createUser");
        routes.add(Method::POST, "/shutdown", "requestShutdown");
        routes
    }

    #[test]
    fn matches_registered_routes() {
        let routes = demo_table();

        assert_eq!(
            routes.lookup(&Method::GET, "/api/hello"),
            RouteLookup::Operation("hello")
        );
        assert_eq!(
            routes.lookup(&Method::POST, "/api/user"),
            RouteLookup::Operation("createUser")
        );
        assert_eq!(
            routes.lookup(&Method::POST, "/shutdown"),
            RouteLookup::Operation("requestShutdown")
        );
    }

    #[test]
    fn wrong_method_is_distinguished_from_unknown_path() {
        let routes = demo_table();

        assert_eq!(
            routes.lookup(&Method::DELETE, "/api/user"),
            RouteLookup::MethodNotAllowed
        );
        assert_eq!(
            routes.lookup(&Method::GET, "/api/missing"),
            RouteLookup::NotFound
        );
    }

    #[test]
    fn later_registration_shadows_earlier() {
        let mut routes = demo_table();
        routes.add(Method::GET, "/api/hello", "helloV2");

        assert_eq!(
            routes.lookup(&Method::GET, "/api/hello"),
            RouteLookup::Operation("helloV2")
        );
    }

    #[test]
    fn empty_table() {
        let routes = RouteTable::new();
        assert!(routes.is_empty());
        assert_eq!(routes.lookup(&Method::GET, "/"), RouteLookup::NotFound);
    }
}
