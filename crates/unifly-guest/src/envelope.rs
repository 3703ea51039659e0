// Response envelope
//
// The controller wraps every answer as `{ "meta": { "rc", "msg" }, "data": [...] }`.
// HTTP 200 only means the request was delivered; `meta.rc` carries the
// logical result. Parsing is kept free of any session or network state so a
// captured body can be checked on its own.

use serde_json::{Map, Value};

use crate::error::Error;

/// A decoded response body with its logical result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    body: Map<String, Value>,
    ok: bool,
}

impl ResponseEnvelope {
    /// `true` iff `meta.rc == "ok"`.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// The raw result code, e.g. `"ok"` or `"error"`.
    pub fn rc(&self) -> &str {
        self.meta()
            .and_then(|meta| meta.get("rc"))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Controller message, usually an `api.err.*` key on failure.
    pub fn msg(&self) -> Option<&str> {
        self.meta()
            .and_then(|meta| meta.get("msg"))
            .and_then(Value::as_str)
    }

    /// The `data` array, if present.
    pub fn data(&self) -> Option<&[Value]> {
        self.body
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    /// The whole decoded object.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_body(self) -> Map<String, Value> {
        self.body
    }

    fn meta(&self) -> Option<&Map<String, Value>> {
        self.body.get("meta").and_then(Value::as_object)
    }
}

/// Decode a controller response body.
///
/// Fails with [`Error::Decode`] when `bytes` is not a JSON object and with
/// [`Error::Schema`] when `meta` is missing or not an object, or `meta.rc` is
/// missing or not a string. A well-formed envelope with a non-`"ok"` result
/// code is returned as `Ok` with [`is_ok`](ResponseEnvelope::is_ok) `false`.
pub fn parse_envelope(bytes: &[u8]) -> Result<ResponseEnvelope, Error> {
    let body: Map<String, Value> = serde_json::from_slice(bytes)?;

    let meta = match body.get("meta") {
        Some(Value::Object(meta)) => meta,
        Some(other) => {
            return Err(schema(format!(
                "'meta' is {}, expected an object",
                type_name(other)
            )));
        }
        None => return Err(schema("'meta' does not exist in returned JSON".into())),
    };

    let ok = match meta.get("rc") {
        Some(Value::String(rc)) => rc == "ok",
        Some(other) => {
            return Err(schema(format!(
                "'meta.rc' is {}, expected a string",
                type_name(other)
            )));
        }
        None => return Err(schema("'meta.rc' does not exist in returned JSON".into())),
    };

    Ok(ResponseEnvelope { body, ok })
}

fn schema(message: String) -> Error {
    Error::Schema { message }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
