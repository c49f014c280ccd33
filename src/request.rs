//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Uri};

use crate::method::Method;

/// An incoming HTTP request with its body fully read and its route matched.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        params: HashMap<String, String>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self { method, uri, headers, body, params, remote_addr }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Case-insensitive header lookup. `None` if absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/beers/:id`, `req.param("id")` on `/beers/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the first value of query parameter `key`, percent-decoded.
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.uri.query()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Like [`query_param`](Self::query_param), falling back to `default`
    /// when the parameter is absent or empty.
    pub fn query(&self, key: &str, default: &str) -> String {
        match self.query_param(key) {
            Some(v) if !v.is_empty() => v,
            _ => default.to_owned(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_request(method: Method, uri: &str, body: &'static [u8]) -> Request {
    Request::new(
        method,
        uri.parse().unwrap(),
        HeaderMap::new(),
        Bytes::from_static(body),
        HashMap::new(),
        None,
    )
}
