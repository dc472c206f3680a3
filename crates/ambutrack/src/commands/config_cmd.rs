//! Config subcommand handlers.

use dialoguer::{Input, Select};
use secrecy::SecretString;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display. Expects tokens to be masked already.
fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "reconnect_delay = {}", cfg.defaults.reconnect_delay);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "api_url = \"{}\"", p.api_url);
        if let Some(ref socket) = p.socket_url {
            let _ = writeln!(out, "socket_url = \"{socket}\"");
        }
        if let Some(ref token) = p.token {
            let _ = writeln!(out, "token = \"{token}\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(delay) = p.reconnect_delay {
            let _ = writeln!(out, "reconnect_delay = {delay}");
        }
    }

    out
}

fn mask_tokens(cfg: &mut Config) {
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
    }
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn empty_token() -> CliError {
    CliError::Validation {
        field: "token".into(),
        reason: "token cannot be empty".into(),
    }
}

/// Offer to store the token in the system keyring or return it for
/// plaintext config.
///
/// Returns `Some(token)` if the user chose plaintext, `None` if stored in
/// the keyring.
fn prompt_token_storage(token: String, profile_name: &str) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the token?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_token(profile_name, &SecretString::from(token))?;
        eprintln!("   ✓ Token stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(token))
    }
}

fn require_profile<'a>(cfg: &'a mut Config, name: &str) -> Result<&'a mut Profile, CliError> {
    let available = config::available_profiles(cfg);
    cfg.profiles
        .get_mut(name)
        .ok_or_else(|| CliError::ProfileNotFound {
            name: name.into(),
            available,
        })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let mut cfg = config::load_config_or_default();
            mask_tokens(&mut cfg);
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { token, plaintext } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let token = match token {
                Some(token) => token,
                None => rpassword::prompt_password("Bearer token: ").map_err(prompt_err)?,
            };
            if token.trim().is_empty() {
                return Err(empty_token());
            }

            if plaintext {
                require_profile(&mut cfg, &profile_name)?.token = Some(token);
                config::save_config(&cfg)?;
                eprintln!("✓ Token saved to config for profile '{profile_name}'");
            } else {
                config::store_token(&profile_name, &SecretString::from(token))?;
                eprintln!("✓ Token stored in system keyring for profile '{profile_name}'");
            }
            Ok(())
        }

        ConfigCommand::ClearToken => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let had_keyring = config::clear_token(&profile_name)?;
            let had_plaintext = cfg
                .profiles
                .get_mut(&profile_name)
                .and_then(|p| p.token.take())
                .is_some();
            if had_plaintext {
                config::save_config(&cfg)?;
            }

            if had_keyring || had_plaintext {
                eprintln!("✓ Token cleared for profile '{profile_name}'");
            } else {
                eprintln!("No stored token for profile '{profile_name}'");
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            require_profile(&mut cfg, &name)?;
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("✨ ambutrack: configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    // 1. Profile name
    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    // 2. API URL
    let api_url: String = Input::new()
        .with_prompt("Dispatch API URL")
        .default("http://localhost:8080".into())
        .validate_with(|input: &String| -> Result<(), String> {
            url::Url::parse(input)
                .map(|_| ())
                .map_err(|e| format!("invalid URL: {e}"))
        })
        .interact_text()
        .map_err(prompt_err)?;

    // 3. Token (optional)
    let token = rpassword::prompt_password("Bearer token (leave empty to skip): ")
        .map_err(prompt_err)?;
    let token = if token.trim().is_empty() {
        None
    } else {
        prompt_token_storage(token, &profile_name)?
    };

    // 4. Merge into the existing config
    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(
        profile_name.clone(),
        Profile {
            api_url,
            token,
            ..Profile::default()
        },
    );
    cfg.default_profile = Some(profile_name.clone());

    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: ambutrack online");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_never_prints_plaintext_tokens() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                api_url: "http://localhost:8080".into(),
                token: Some("eyJhbGciOi".into()),
                ..Profile::default()
            },
        );
        mask_tokens(&mut cfg);
        let text = format_config(&cfg);
        assert!(text.contains("token = \"****\""));
        assert!(!text.contains("eyJhbGciOi"));
        assert!(text.contains("[profiles.default]"));
    }
}
