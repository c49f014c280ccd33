//! `page` / `size` query parameters.
//!
//! Both are optional and default to `page=1`, `size=10`. Anything that is not
//! a non-negative integer is rejected with 400 naming the parameter. `page`
//! counts from 1, so `page=0` is rejected too. `size=0` is accepted and asks
//! for an empty page.

use serde::Serialize;

use crate::error::Error;
use crate::request::Request;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_SIZE: u32 = 10;

/// A requested window over a listing.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { number: DEFAULT_PAGE, size: DEFAULT_SIZE }
    }
}

impl Page {
    pub fn from_request(req: &Request) -> Result<Self, Error> {
        let number = parse(req, "page", DEFAULT_PAGE)?;
        if number == 0 {
            return Err(Error::bad_request("page must be at least 1, page[0]"));
        }
        let size = parse(req, "size", DEFAULT_SIZE)?;
        Ok(Self { number, size })
    }

    /// Items to skip before this page starts.
    pub fn offset(&self) -> usize {
        (self.number as usize).saturating_sub(1).saturating_mul(self.size as usize)
    }
}

fn parse(req: &Request, name: &str, default: u32) -> Result<u32, Error> {
    match req.query_param(name) {
        Some(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|_| Error::bad_request(format!("invalid {name} format, {name}[{raw}]"))),
        _ => Ok(default),
    }
}
