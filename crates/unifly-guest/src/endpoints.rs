// Endpoint table
//
// Resolves the controller base address and the three paths a Session talks
// to. Paths are built by joining segments, so a site identifier is always
// exactly one percent-encoded segment.

use url::Url;

use crate::error::Error;

/// Site used when the caller passes an empty site identifier.
pub const DEFAULT_SITE: &str = "default";

/// Validate and parse a controller base address such as
/// `https://192.168.1.10:8443`.
pub fn parse_controller_url(address: &str) -> Result<Url, Error> {
    let invalid = |reason: String| Error::InvalidAddress {
        address: address.to_owned(),
        reason,
    };

    let url = Url::parse(address).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "unsupported scheme '{}', expected http or https",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("cannot be used as a base URL".into()));
    }

    Ok(url)
}

/// Resolved URLs for one Session. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    login: Url,
    logout: Url,
    stamgr: Url,
}

impl Endpoints {
    /// Resolve all endpoints against `base`. Paths are absolute: any path on
    /// the base address is replaced, not appended to.
    pub fn resolve(base: &Url, site: &str) -> Result<Self, Error> {
        Ok(Self {
            login: join_segments(base, &["api", "login"])?,
            logout: join_segments(base, &["api", "logout"])?,
            stamgr: join_segments(base, &["api", "s", site, "cmd", "stamgr"])?,
        })
    }

    /// `POST /api/login`
    pub fn login(&self) -> &Url {
        &self.login
    }

    /// `POST /api/logout`
    pub fn logout(&self) -> &Url {
        &self.logout
    }

    /// `POST /api/s/{site}/cmd/stamgr`
    pub fn stamgr(&self) -> &Url {
        &self.stamgr
    }
}

fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| Error::InvalidAddress {
            address: base.to_string(),
            reason: "cannot be used as a base URL".into(),
        })?
        .clear()
        .extend(segments);
    Ok(url)
}
