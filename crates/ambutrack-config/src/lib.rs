//! Shared configuration for ambutrack.
//!
//! TOML profiles, bearer-token storage (env + keyring + plaintext), and
//! translation to `ambutrack_core::TrackerConfig`. The CLI layers its
//! global flags on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ambutrack_core::{TlsVerification, TokenSource, TrackerConfig};

/// Keyring service name for stored tokens.
pub const KEYRING_SERVICE: &str = "ambutrack";

/// Environment variable that overrides every stored token.
pub const TOKEN_ENV_VAR: &str = "AMBUTRACK_TOKEN";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named tracking-service profiles.
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

impl Config {
    /// Name of the profile to use when none is given explicitly.
    pub fn active_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds to wait before reconnecting after an abnormal close.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            reconnect_delay: default_reconnect_delay(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_reconnect_delay() -> u64 {
    5
}

/// A named tracking-service profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// API base URL (e.g., "http://localhost:8080").
    pub api_url: String,

    /// Socket endpoint override. Derived from `api_url` when absent.
    pub socket_url: Option<String>,

    /// Bearer token (plaintext; prefer the keyring).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override reconnect delay.
    pub reconnect_delay: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "ambutrack", "ambutrack").map_or_else(
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
    p.push("ambutrack");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file yields
/// the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("AMBUTRACK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token storage ───────────────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/token"),
    )?)
}

/// Persist a bearer token for `profile_name` in the system keyring.
pub fn store_token(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(token.expose_secret())?;
    debug!(profile = profile_name, "token stored in keyring");
    Ok(())
}

/// Remove the stored token for `profile_name`. Returns `false` if there
/// was none.
pub fn clear_token(profile_name: &str) -> Result<bool, ConfigError> {
    match keyring_entry(profile_name)?.delete_credential() {
        Ok(()) => Ok(true),
        Err(keyring::Error::NoEntry) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Resolve a token from the chain: `AMBUTRACK_TOKEN`, the profile's
/// `token_env`, the keyring, then the profile's plaintext token.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    KeyringTokenSource::for_profile(profile, profile_name).token()
}

/// Reads the token chain afresh on every call, so a token stored or
/// cleared while the tracker runs is seen at the next (re)connect.
#[derive(Clone)]
pub struct KeyringTokenSource {
    profile_name: String,
    token_env: Option<String>,
    plaintext: Option<SecretString>,
}

impl KeyringTokenSource {
    pub fn for_profile(profile: &Profile, profile_name: &str) -> Self {
        Self {
            profile_name: profile_name.into(),
            token_env: profile.token_env.clone(),
            plaintext: profile.token.clone().map(SecretString::from),
        }
    }

    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }
}

impl std::fmt::Debug for KeyringTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringTokenSource")
            .field("profile_name", &self.profile_name)
            .field("token_env", &self.token_env)
            .field("plaintext", &self.plaintext.as_ref().map(|_| "***"))
            .finish()
    }
}

impl TokenSource for KeyringTokenSource {
    fn token(&self) -> Option<SecretString> {
        if let Some(val) = non_blank(std::env::var(TOKEN_ENV_VAR).ok()) {
            return Some(val);
        }

        if let Some(ref env_name) = self.token_env {
            if let Some(val) = non_blank(std::env::var(env_name).ok()) {
                return Some(val);
            }
        }

        if let Ok(entry) = keyring_entry(&self.profile_name) {
            if let Some(secret) = non_blank(entry.get_password().ok()) {
                return Some(secret);
            }
        }

        self.plaintext
            .clone()
            .filter(|t| !t.expose_secret().trim().is_empty())
    }
}

/// A blank value falls through to the next link of the token chain.
fn non_blank(value: Option<String>) -> Option<SecretString> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `TrackerConfig` from a profile and the global defaults, with no
/// CLI flag overrides.
pub fn profile_to_tracker_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<TrackerConfig, ConfigError> {
    let api_url = parse_url("api_url", &profile.api_url)?;

    let mut config = TrackerConfig::new(api_url).map_err(|e| ConfigError::Validation {
        field: "api_url".into(),
        reason: e.to_string(),
    })?;

    if let Some(ref socket_url) = profile.socket_url {
        config = config.with_socket_url(parse_url("socket_url", socket_url)?);
    }

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    Ok(config.with_reconnect_delay(Duration::from_secs(
        profile.reconnect_delay.unwrap_or(defaults.reconnect_delay),
    )))
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}
