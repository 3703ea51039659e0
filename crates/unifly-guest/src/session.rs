// Controller session
//
// Cookie-based session against a classic UniFi controller: login, logout
// and the station manager's guest authorization command.
//
// The cookie store is explicit session state. `login` and `logout` write
// it and take `&mut self`; commands only read it and take `&self`, so the
// borrow checker rules out a command racing a session change on the same
// Session. Share a Session across tasks behind a lock.

use std::fmt;

use bytes::Bytes;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, SET_COOKIE};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, trace};
use url::Url;

use crate::command::{GuestAuthorization, GuestLimits};
use crate::context::RequestContext;
use crate::endpoints::{DEFAULT_SITE, Endpoints, parse_controller_url};
use crate::envelope::{ResponseEnvelope, parse_envelope};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Observable session lifecycle. Informational only: nothing is refused
/// based on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    NeverLoggedIn,
    LoggedIn,
    LoggedOut,
}

/// Status and body of a call the controller answered with HTTP 200.
///
/// HTTP 200 does not mean the controller accepted the request; check
/// [`envelope`](Self::envelope) for `meta.rc`.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    body: Bytes,
}

impl RawResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Decode the body with [`parse_envelope`].
    pub fn envelope(&self) -> Result<ResponseEnvelope, Error> {
        parse_envelope(&self.body)
    }
}

/// Authenticated session with one site of a UniFi controller.
pub struct Session {
    http: reqwest::Client,
    base_url: Url,
    cookie_url: Url,
    site: String,
    username: String,
    password: SecretString,
    endpoints: Endpoints,
    cookies: Jar,
    state: SessionState,
    verbose: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("site", &self.site)
            .field("username", &self.username)
            .field("state", &self.state)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session. No network I/O happens here.
    ///
    /// `controller` is the controller root, e.g. `https://10.0.1.100:8443`.
    /// An empty `site` selects the `"default"` site. Fails with
    /// [`Error::InvalidAddress`] if `controller` is not a usable http(s)
    /// base address.
    pub fn new(
        controller: &str,
        site: &str,
        username: impl Into<String>,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let base_url = parse_controller_url(controller)?;
        let site = if site.is_empty() { DEFAULT_SITE } else { site }.to_owned();
        let endpoints = Endpoints::resolve(&base_url, &site)?;
        let cookie_url = cookie_scope(&base_url);
        let http = transport.build_client()?;

        debug!(controller = %base_url, site, "session created");

        Ok(Self {
            http,
            base_url,
            cookie_url,
            site,
            username: username.into(),
            password,
            endpoints,
            cookies: Jar::default(),
            state: SessionState::NeverLoggedIn,
            verbose: false,
        })
    }

    /// Capture response bodies in error values and `trace` logs.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// The site identifier, after defaulting.
    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The `Cookie` header value the session would send to the controller
    /// (e.g. `"unifises=abc123"`), if it holds any cookies.
    pub fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.cookies(&self.cookie_url)?;
        cookies.to_str().ok().map(String::from)
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Authenticate with username/password.
    ///
    /// `POST /api/login` with `{"username": ..., "password": ...}`.
    ///
    /// Any status other than 200 fails with [`Error::Authentication`]. On
    /// success every `Set-Cookie` header is stored against the controller
    /// root (`/`) and attached to later calls. The returned body is not
    /// checked for `meta.rc`.
    pub async fn login(&mut self, ctx: &RequestContext) -> Result<RawResponse, Error> {
        let url = self.endpoints.login().clone();
        debug!("logging in at {url}");

        let body = json!({
            "username": self.username,
            "password": self.password.expose_secret(),
        });
        let request = self.http.post(url).header(ACCEPT, "*/*").json(&body);

        let (headers, response) = self.send(ctx, request, rejected_auth).await?;

        self.store_cookies(&headers);
        self.state = SessionState::LoggedIn;
        debug!("login successful");
        Ok(response)
    }

    /// End the session.
    ///
    /// `POST /api/logout` with no body and the stored cookies attached.
    /// Same status contract as [`login`](Self::login). Cookies returned by
    /// the controller replace the stored ones.
    pub async fn logout(&mut self, ctx: &RequestContext) -> Result<RawResponse, Error> {
        let url = self.endpoints.logout().clone();
        debug!("logging out at {url}");

        let request = self.with_cookies(self.http.post(url.clone()).header(ACCEPT, "*/*"), &url);

        let (headers, response) = self.send(ctx, request, rejected_auth).await?;

        self.store_cookies(&headers);
        self.state = SessionState::LoggedOut;
        debug!("logout complete");
        Ok(response)
    }

    // ── Station manager ──────────────────────────────────────────────

    /// Authorize a guest client for `minutes`.
    ///
    /// Shorthand for [`authorize_guest_with_limits`](Self::authorize_guest_with_limits)
    /// with no limits.
    pub async fn authorize_guest(
        &self,
        ctx: &RequestContext,
        mac: &str,
        minutes: u32,
    ) -> Result<RawResponse, Error> {
        self.authorize_guest_with_limits(ctx, mac, minutes, GuestLimits::default())
            .await
    }

    /// Authorize a guest client with optional bandwidth and quota caps.
    ///
    /// `POST /api/s/{site}/cmd/stamgr` with `{"cmd": "authorize-guest", ...}`.
    ///
    /// Fails with [`Error::Command`] on any status other than 200. A 200
    /// answer whose `meta.rc` is not `"ok"` (for example an expired or
    /// missing session) is returned as `Ok`; call
    /// [`RawResponse::envelope`] to see the logical result.
    pub async fn authorize_guest_with_limits(
        &self,
        ctx: &RequestContext,
        mac: &str,
        minutes: u32,
        limits: GuestLimits,
    ) -> Result<RawResponse, Error> {
        let url = self.endpoints.stamgr().clone();
        debug!(mac, minutes, "authorizing guest");

        let command = GuestAuthorization::new(mac, minutes, limits);
        trace!(?command, "stamgr payload");

        let request = self.with_cookies(
            self.http.post(url.clone()).header(ACCEPT, "*/*").json(&command),
            &url,
        );

        let (_, response) = self.send(ctx, request, rejected_command).await?;
        Ok(response)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send `request` under `ctx`, returning headers and body of a 200
    /// answer. Other statuses are turned into an error by `rejected`.
    async fn send(
        &self,
        ctx: &RequestContext,
        request: RequestBuilder,
        rejected: fn(u16, Option<String>) -> Error,
    ) -> Result<(HeaderMap, RawResponse), Error> {
        ctx.run(async {
            let resp = request.send().await?;
            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp.bytes().await?;

            if self.verbose {
                trace!(
                    status = status.as_u16(),
                    body = %String::from_utf8_lossy(&body),
                    "controller response"
                );
            }

            if status != StatusCode::OK {
                debug!(status = status.as_u16(), "controller rejected request");
                let detail = self
                    .verbose
                    .then(|| String::from_utf8_lossy(&body).into_owned());
                return Err(rejected(status.as_u16(), detail));
            }

            Ok((headers, RawResponse { status, body }))
        })
        .await
    }

    fn with_cookies(&self, request: RequestBuilder, url: &Url) -> RequestBuilder {
        match self.cookies.cookies(url) {
            Some(value) => request.header(COOKIE, value),
            None => request,
        }
    }

    fn store_cookies(&self, headers: &HeaderMap) {
        let count = headers.get_all(SET_COOKIE).iter().count();
        if count == 0 {
            return;
        }
        trace!(count, "storing session cookies");
        self.cookies
            .set_cookies(&mut headers.get_all(SET_COOKIE).iter(), &self.cookie_url);
    }
}

/// The controller root: endpoints ignore any path on the base address, so
/// cookies are scoped to `/` of the same origin.
fn cookie_scope(base: &Url) -> Url {
    let mut url = base.clone();
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    url
}

fn rejected_auth(status: u16, body: Option<String>) -> Error {
    Error::Authentication { status, body }
}

fn rejected_command(status: u16, body: Option<String>) -> Error {
    Error::Command { status, body }
}
