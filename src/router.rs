//! Radix-tree route table.
//!
//! One tree per HTTP method. O(path-length) lookup. The table is filled while
//! the [`App`](crate::App) is being set up and is read-only once it serves.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::error::ServerError;
use crate::handler::BoxedHandler;
use crate::method::Method;

/// Outcome of a route lookup.
pub(crate) enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    /// The path exists, but not for this method.
    MethodNotAllowed,
    NotFound,
}

#[derive(Default)]
pub(crate) struct Routes {
    trees: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Routes {
    /// Registers `handler` at `path`, which may use `:name` or `{name}`
    /// segments for parameters and `*name` or `{*name}` for a trailing
    /// catch-all.
    pub(crate) fn insert(
        &mut self,
        method: Method,
        path: &str,
        handler: BoxedHandler,
    ) -> Result<(), ServerError> {
        let pattern = to_matchit(path);
        self.trees
            .entry(method)
            .or_default()
            .insert(pattern, handler)
            .map_err(|source| ServerError::Route { path: format!("{method} {path}"), source })
    }

    pub(crate) fn lookup(&self, method: Method, path: &str) -> Lookup {
        if let Some(matched) = self.trees.get(&method).and_then(|t| t.at(path).ok()) {
            let handler = Arc::clone(matched.value);
            let params = matched.params.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Lookup::Found(handler, params);
        }

        if self.trees.iter().any(|(m, t)| *m != method && t.at(path).is_ok()) {
            Lookup::MethodNotAllowed
        } else {
            Lookup::NotFound
        }
    }
}

/// Rewrites `/beers/:id` style segments into matchit's `/beers/{id}`.
fn to_matchit(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if let Some(name) = seg.strip_prefix(':') {
                format!("{{{name}}}")
            } else if let Some(name) = seg.strip_prefix('*') {
                format!("{{*{name}}}")
            } else {
                seg.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins a version and a route path: `("v1", "/beers")` → `/v1/beers`.
pub(crate) fn versioned(version: &str, path: &str) -> String {
    let version = version.trim_matches('/');
    let path = path.trim_start_matches('/');
    match (version.is_empty(), path.is_empty()) {
        (true, _) => format!("/{path}"),
        (false, true) => format!("/{version}"),
        (false, false) => format!("/{version}/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;
    use crate::{Context, Error, Request, Response};

    async fn ok(_ctx: Context, _req: Request) -> Result<Response, Error> {
        Ok(Response::text("ok"))
    }

    #[test]
    fn colon_params_are_translated() {
        assert_eq!(to_matchit("/v1/beers/:id/reviews"), "/v1/beers/{id}/reviews");
        assert_eq!(to_matchit("/v1/files/*rest"), "/v1/files/{*rest}");
        assert_eq!(to_matchit("/v1/beers/{id}"), "/v1/beers/{id}");
    }

    #[test]
    fn versioned_paths() {
        assert_eq!(versioned("v1", "/beers"), "/v1/beers");
        assert_eq!(versioned("/v1/", "beers/:id"), "/v1/beers/:id");
        assert_eq!(versioned("", "/readyz"), "/readyz");
        assert_eq!(versioned("v1", "/"), "/v1");
    }

    #[test]
    fn lookup_extracts_params() {
        let mut routes = Routes::default();
        routes.insert(Method::Get, "/v1/beers/:id", from_fn(ok)).unwrap();

        match routes.lookup(Method::Get, "/v1/beers/42") {
            Lookup::Found(_, params) => assert_eq!(params["id"], "42"),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn wrong_method_and_unknown_path() {
        let mut routes = Routes::default();
        routes.insert(Method::Post, "/v1/beers", from_fn(ok)).unwrap();

        assert!(matches!(routes.lookup(Method::Get, "/v1/beers"), Lookup::MethodNotAllowed));
        assert!(matches!(routes.lookup(Method::Get, "/v1/wines"), Lookup::NotFound));
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let mut routes = Routes::default();
        routes.insert(Method::Get, "/v1/beers/:id", from_fn(ok)).unwrap();

        let err = routes.insert(Method::Get, "/v1/beers/{id}", from_fn(ok)).unwrap_err();
        assert!(err.to_string().starts_with("invalid route `GET /v1/beers/{id}`"));

        // Same path under another method is fine.
        routes.insert(Method::Post, "/v1/beers/:id", from_fn(ok)).unwrap();
    }
}
