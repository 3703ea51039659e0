use std::fmt;

use thiserror::Error;

/// Why a [`RequestContext`](crate::RequestContext) stopped an in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller canceled the context's token.
    Canceled,
    /// The context's deadline passed before the controller answered.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canceled => f.write_str("canceled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Top-level error type for the `unifly-guest` crate.
///
/// Transport failures (`Authentication`, `Command`, `Transport`) and
/// logical failures reported in the `meta.rc` field of a 200 response are
/// kept separate: the session operations never inspect `meta.rc`,
/// only [`parse_envelope`](crate::parse_envelope) does, and it reports a
/// non-`"ok"` result code as a flag rather than an error.
#[derive(Debug, Error)]
pub enum Error {
    // ── Construction ────────────────────────────────────────────────
    /// The controller base address could not be used.
    #[error("Invalid controller address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// TLS setup failed while building the HTTP client.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP status ─────────────────────────────────────────────────
    /// Login or logout answered with something other than HTTP 200.
    #[error("Authentication failed (HTTP {status}){}", body_suffix(.body.as_deref()))]
    Authentication { status: u16, body: Option<String> },

    /// A controller command answered with something other than HTTP 200.
    #[error("Command rejected (HTTP {status}){}", body_suffix(.body.as_deref()))]
    Command { status: u16, body: Option<String> },

    // ── Transport ───────────────────────────────────────────────────
    /// Connection refused, DNS failure, TLS handshake, read timeout, etc.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request context was canceled or its deadline expired.
    #[error("Request {0}")]
    Cancelled(CancelReason),

    // ── Envelope ────────────────────────────────────────────────────
    /// The response body is not a JSON object.
    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The body is JSON but `meta` or `meta.rc` is missing or mistyped.
    #[error("Unexpected response envelope: {message}")]
    Schema { message: String },
}

impl Error {
    /// Returns `true` if the call was stopped by its request context.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The HTTP status code behind a rejected login, logout or command.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Command { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn body_suffix(body: Option<&str>) -> String {
    body.map(|b| format!(": {}", &b[..floor_char_boundary(b, 200)]))
        .unwrap_or_default()
}

// Largest char boundary in `s` that is <= `max`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
