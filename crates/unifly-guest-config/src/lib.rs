//! Profile configuration for unifly-guest.
//!
//! TOML profiles merged with `UNIFLY_GUEST_` environment variables,
//! password resolution (env + plaintext), and translation into a ready
//! [`unifly_guest::Session`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use unifly_guest::{DEFAULT_SITE, Session, TransportConfig};

/// Environment variable prefix for config overrides.
pub const ENV_PREFIX: &str = "UNIFLY_GUEST_";

/// Fallback environment variables for credentials.
pub const USERNAME_ENV: &str = "UNIFLY_GUEST_USERNAME";
pub const PASSWORD_ENV: &str = "UNIFLY_GUEST_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Session(unifly_guest::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<unifly_guest::Error> for ConfigError {
    fn from(err: unifly_guest::Error) -> Self {
        match err {
            unifly_guest::Error::InvalidAddress { address, reason } => Self::Validation {
                field: "controller".into(),
                reason: format!("{reason}: {address}"),
            },
            other => Self::Session(other),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named explicitly.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub verbose: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: default_timeout(),
            verbose: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// A named controller profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Controller base URL (e.g., "https://10.0.1.100:8443").
    pub controller: String,

    /// Site identifier (not the display name).
    #[serde(default = "default_site")]
    pub site: String,

    pub username: Option<String>,

    /// Password (plaintext -- prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept self-signed certificates. Overrides `defaults.insecure`.
    pub insecure: Option<bool>,

    /// Overrides `defaults.timeout`.
    pub timeout: Option<u64>,

    /// Overrides `defaults.verbose`.
    pub verbose: Option<bool>,
}

fn default_site() -> String {
    DEFAULT_SITE.into()
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

impl Profile {
    /// Transport settings for this profile.
    ///
    /// `insecure` wins over `ca_cert`; with neither set the system roots are
    /// used and certificate validation stays on.
    pub fn transport(&self, defaults: &Defaults) -> TransportConfig {
        let timeout = Duration::from_secs(self.timeout.unwrap_or(defaults.timeout));
        let transport = TransportConfig::default().with_timeout(timeout);

        if self.insecure.unwrap_or(defaults.insecure) {
            transport.accept_invalid_certs()
        } else if let Some(ref ca_path) = self.ca_cert {
            transport.with_ca_cert(ca_path.clone())
        } else {
            transport
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "unifly", "unifly-guest").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("unifly-guest");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path` + environment. A missing file is not an error.
///
/// Environment keys nest with a double underscore:
/// `UNIFLY_GUEST_PROFILES__LAB__SITE=x7k2m9pq`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the username: profile, then `UNIFLY_GUEST_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password: the profile's `password_env` variable, then
/// `UNIFLY_GUEST_PASSWORD`, then the plaintext field.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(val));
    }

    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Build a [`Session`] from a profile. No network I/O.
pub fn build_session(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<Session, ConfigError> {
    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;
    let transport = profile.transport(defaults);

    let session = Session::new(&profile.controller, &profile.site, username, password, &transport)?
        .with_verbose(profile.verbose.unwrap_or(defaults.verbose));

    debug!(profile = profile_name, site = session.site(), "session configured");
    Ok(session)
}
