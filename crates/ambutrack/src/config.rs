//! CLI configuration: a thin wrapper around `ambutrack_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--api-url, --token, etc.).

use std::sync::Arc;

use ambutrack_core::{StaticToken, TlsVerification, TokenSource, TrackerConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use ambutrack_config::{
    Config, KeyringTokenSource, Profile, clear_token, config_path,
    load_config_or_default, save_config, store_token,
};

/// Everything a command needs to build a `Tracker`.
pub struct Resolved {
    pub profile_name: String,
    pub tracker: TrackerConfig,
    pub tokens: Arc<dyn TokenSource>,
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name().to_owned())
}

/// Comma-separated, sorted profile names for help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

/// Build the tracker configuration from the config file, profile, and
/// CLI overrides. Flags beat profile values.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    resolve_with(global, &cfg)
}

pub fn resolve_with(global: &GlobalOpts, cfg: &Config) -> Result<Resolved, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.api_url.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(cfg),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if let Some(ref url) = global.socket_url {
        profile.socket_url = Some(url.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let mut tracker =
        ambutrack_config::profile_to_tracker_config(&profile, &cfg.defaults).map_err(|e| {
            match e {
                ambutrack_config::ConfigError::Validation { field, reason } => {
                    CliError::Validation { field, reason }
                }
                other => other.into(),
            }
        })?;
    if global.insecure {
        tracker.tls = TlsVerification::DangerAcceptInvalid;
    }

    let tokens: Arc<dyn TokenSource> = match global.token {
        Some(ref token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(KeyringTokenSource::for_profile(&profile, &profile_name)),
    };

    Ok(Resolved {
        profile_name,
        tracker,
        tokens,
    })
}
