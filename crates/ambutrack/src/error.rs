//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use ambutrack_config::ConfigError;
use ambutrack_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the tracking service: {reason}")]
    #[diagnostic(
        code(ambutrack::connection_failed),
        help(
            "Check that the dispatch service is running and reachable.\n\
             Override the address with --api-url, or accept self-signed\n\
             certificates with --insecure (-k)."
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No authentication token found")]
    #[diagnostic(
        code(ambutrack::no_token),
        help(
            "Store a token with: ambutrack config set-token --profile {profile}\n\
             Or set the AMBUTRACK_TOKEN environment variable."
        )
    )]
    NoToken { profile: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(ambutrack::auth_failed),
        help("The token was rejected. Sign in again and run: ambutrack config set-token")
    )]
    AuthFailed { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Tracking service error ({status}): {message}")]
    #[diagnostic(code(ambutrack::api_error))]
    ApiError { status: String, message: String },

    #[error("Tracking failed: {message}")]
    #[diagnostic(
        code(ambutrack::tracking),
        help("Run with -v for channel diagnostics, or retry with: ambutrack online")
    )]
    Tracking { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ambutrack::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(ambutrack::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: ambutrack config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No tracking service configured")]
    #[diagnostic(
        code(ambutrack::no_config),
        help(
            "Create a profile with: ambutrack config init\n\
             Or pass --api-url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(ambutrack::config))]
    Config(#[from] ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(ambutrack::timeout),
        help("Increase timeout with --timeout or check the service's responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(ambutrack::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(ambutrack::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NoToken { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_auth_failure() && !matches!(err, CoreError::Unauthenticated) {
            return CliError::AuthFailed {
                message: err.state_message(),
            };
        }

        match err {
            CoreError::Unauthenticated => CliError::NoToken {
                profile: "default".into(),
            },

            CoreError::Transport { reason } => CliError::ConnectionFailed { reason },

            CoreError::Fetch { message, status } => CliError::ApiError {
                status: status.map_or_else(|| "-".into(), |s| s.to_string()),
                message: message.unwrap_or_else(|| ambutrack_core::error::FETCH_FAILED_MESSAGE.into()),
            },

            CoreError::Decode { message } => CliError::ApiError {
                status: "decode".into(),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                status: "internal".into(),
                message,
            },
        }
    }
}
