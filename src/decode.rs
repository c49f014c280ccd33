//! JSON request bodies and their validation.
//!
//! [`decode`] parses the body and then runs [`Validate`] on the result.
//! Validation reports *every* failing field, not just the first, so a client
//! can fix its payload in one round trip.
//!
//! Fields a payload must carry are declared with `#[serde(default)]` so that
//! a missing field reaches validation (and is reported by name) instead of
//! failing the parse on the first one serde happens to notice:
//!
//! ```rust
//! use serde::Deserialize;
//! use taproom::{Checker, FieldErrors, Validate};
//!
//! #[derive(Default, Deserialize)]
//! #[serde(default)]
//! struct NewReview {
//!     user_id: String,
//!     score: f32,
//!     comment: String,
//! }
//!
//! impl Validate for NewReview {
//!     fn validate(&self) -> FieldErrors {
//!         Checker::new()
//!             .required("user_id", &self.user_id)
//!             .uuid("user_id", &self.user_id)
//!             .required_number("score", self.score)
//!             .required("comment", &self.comment)
//!             .finish()
//!     }
//! }
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, FieldErrors};
use crate::request::Request;

/// Structural checks on a decoded payload.
pub trait Validate {
    /// Every failing field; empty when the value is valid.
    fn validate(&self) -> FieldErrors;
}

/// Parses the request body as JSON into `T` and validates it.
///
/// - malformed JSON or a type mismatch → [`Error::Request`] with 400
/// - `null` members are treated as absent
/// - failing fields → [`Error::Validation`] listing all of them
pub fn decode<T>(req: &Request) -> Result<T, Error>
where
    T: DeserializeOwned + Validate,
{
    let mut raw: Value = serde_json::from_slice(req.body()).map_err(undecodable)?;
    strip_nulls(&mut raw);
    let value: T = serde_json::from_value(raw).map_err(undecodable)?;
    value.validate().into_result()?;
    Ok(value)
}

fn undecodable(e: serde_json::Error) -> Error {
    Error::bad_request(format!("unable to decode payload: {e}"))
}

/// Drops `null` members from every object, so an explicit `null` reads the
/// same as an absent field and falls back to its `#[serde(default)]`.
fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

/// Accumulates field errors. A field that already failed is not checked
/// again, so chained rules report one message per field.
///
/// Field names are reported verbatim and should be the names the client
/// sends, i.e. after any `#[serde(rename)]`.
#[derive(Debug, Default)]
pub struct Checker {
    errors: FieldErrors,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    fn failed(&self, field: &str) -> bool {
        self.errors.iter().any(|fe| fe.field == field)
    }

    fn check(mut self, field: &str, ok: bool, message: impl FnOnce() -> String) -> Self {
        if !self.failed(field) && !ok {
            self.errors.push(field, message());
        }
        self
    }

    /// The string must not be empty or only whitespace.
    pub fn required(self, field: &str, value: &str) -> Self {
        self.check(field, !value.trim().is_empty(), || format!("{field} is a required field"))
    }

    /// The number must not be zero (its default when absent).
    pub fn required_number(self, field: &str, value: impl Into<f64>) -> Self {
        let value: f64 = value.into();
        self.check(field, value != 0.0, || format!("{field} is a required field"))
    }

    /// The string must be a UUID in its hyphenated form.
    pub fn uuid(self, field: &str, value: &str) -> Self {
        let ok = value.len() == 36 && Uuid::parse_str(value).is_ok();
        self.check(field, ok, || format!("{field} must be a valid UUID"))
    }

    /// The number must lie in `min..=max`.
    pub fn range(self, field: &str, value: impl Into<f64>, min: f64, max: f64) -> Self {
        let value: f64 = value.into();
        self.check(field, (min..=max).contains(&value), || {
            format!("{field} must be between {min} and {max}")
        })
    }

    /// A custom rule.
    pub fn rule(self, field: &str, ok: bool, message: &str) -> Self {
        self.check(field, ok, || message.to_owned())
    }

    pub fn finish(self) -> FieldErrors {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::method::Method;
    use crate::request::test_request;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct NewBeer {
        name: String,
        brewery: String,
        style: String,
        abv: f32,
        short_desc: String,
    }

    impl Validate for NewBeer {
        fn validate(&self) -> FieldErrors {
            Checker::new()
                .required("name", &self.name)
                .required("brewery", &self.brewery)
                .required("style", &self.style)
                .required_number("abv", self.abv)
                .required("short_desc", &self.short_desc)
                .finish()
        }
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct NewReview {
        user_id: String,
        score: f32,
    }

    impl Validate for NewReview {
        fn validate(&self) -> FieldErrors {
            Checker::new()
                .required("user_id", &self.user_id)
                .uuid("user_id", &self.user_id)
                .range("score", self.score, 1.0, 5.0)
                .finish()
        }
    }

    #[test]
    fn valid_payload_decodes() {
        let req = test_request(
            Method::Post,
            "/v1/beers",
            br#"{"name":"Gose","brewery":"Leipzig","style":"Sour","abv":4.5,"short_desc":"salty"}"#,
        );
        let beer: NewBeer = decode(&req).unwrap();
        assert_eq!(beer.name, "Gose");
        assert_eq!(beer.abv, 4.5);
    }

    #[test]
    fn empty_object_reports_every_required_field() {
        let req = test_request(Method::Post, "/v1/beers", b"{}");
        let Err(Error::Validation(fields)) = decode::<NewBeer>(&req) else {
            panic!("expected a validation error");
        };

        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, ["name", "brewery", "style", "abv", "short_desc"]);
        assert!(fields.iter().all(|f| f.error.ends_with("is a required field")));
    }

    #[test]
    fn one_message_per_field() {
        let req = test_request(Method::Post, "/v1/beers/1/reviews", br#"{"score":9}"#);
        let Err(Error::Validation(fields)) = decode::<NewReview>(&req) else {
            panic!("expected a validation error");
        };

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.iter().next().unwrap().error, "user_id is a required field");
    }

    #[test]
    fn uuid_shape() {
        let bad = Checker::new().uuid("user_id", "not-a-uuid").finish();
        assert_eq!(bad.len(), 1);

        let simple = Checker::new().uuid("user_id", "67e5504410b1426f9247bb680e5fe0c8").finish();
        assert_eq!(simple.len(), 1);

        let ok = Checker::new().uuid("user_id", "67e55044-10b1-426f-9247-bb680e5fe0c8").finish();
        assert!(ok.is_empty());
    }

    #[test]
    fn malformed_json_is_a_bad_request() {
        let req = test_request(Method::Post, "/v1/beers", b"{\"name\":");
        let err = decode::<NewBeer>(&req).unwrap_err();

        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("unable to decode payload"));
    }

    #[test]
    fn null_members_are_reported_as_missing_fields() {
        let req = test_request(Method::Post, "/v1/beers", br#"{"name":null,"brewery":null}"#);
        let Err(Error::Validation(fields)) = decode::<NewBeer>(&req) else {
            panic!("expected a validation error");
        };

        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, ["name", "brewery", "style", "abv", "short_desc"]);
    }

    #[test]
    fn null_members_fall_back_to_defaults() {
        let req = test_request(
            Method::Post,
            "/v1/beers",
            br#"{"name":"Gose","brewery":"Leipzig","style":"Sour","abv":4.5,"short_desc":"salty","extra":[{"a":null}]}"#,
        );
        assert_eq!(decode::<NewBeer>(&req).unwrap().name, "Gose");

        let mut value = serde_json::json!({ "a": null, "b": { "c": null, "d": 1 }, "e": [null, { "f": null }] });
        strip_nulls(&mut value);
        assert_eq!(value, serde_json::json!({ "b": { "d": 1 }, "e": [null, {}] }));
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct Renamed {
        short_desc: String,
    }

    impl Validate for Renamed {
        fn validate(&self) -> FieldErrors {
            Checker::new().required("shortDesc", &self.short_desc).finish()
        }
    }

    #[test]
    fn fields_are_named_as_sent() {
        let req = test_request(Method::Post, "/v1/beers", br#"{"short_desc":"ignored"}"#);
        let Err(Error::Validation(fields)) = decode::<Renamed>(&req) else {
            panic!("expected a validation error");
        };
        assert_eq!(fields.iter().next().unwrap().field, "shortDesc");

        let req = test_request(Method::Post, "/v1/beers", br#"{"shortDesc":"crisp"}"#);
        assert_eq!(decode::<Renamed>(&req).unwrap().short_desc, "crisp");
    }

    #[test]
    fn wrong_type_is_a_bad_request() {
        let req = test_request(Method::Post, "/v1/beers", br#"{"abv":"strong"}"#);
        assert!(matches!(decode::<NewBeer>(&req), Err(Error::Request { .. })));
    }
}
