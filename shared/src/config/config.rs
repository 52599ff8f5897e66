use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

use crate::types::server_config::{
    AppConfig, ConfigError, MAX_SESSION_AGE_DAYS, MAX_TOKEN_AGE_MINUTES, MIN_SECRET_LEN,
};

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path.display());

    parse_config(&contents)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(contents)?;

    info!("Configuration loaded successfully");

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.paths.web_dir.is_empty() {
        return Err(ConfigError::InvalidConfig("web_dir cannot be empty".into()));
    }

    if config.session.cookie_name.is_empty()
        || !config
            .session
            .cookie_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::InvalidConfig(
            "cookie_name must be non-empty and contain only [A-Za-z0-9_-]".into(),
        ));
    }

    if config.session.max_age_days == 0 || config.session.max_age_days > MAX_SESSION_AGE_DAYS {
        return Err(ConfigError::InvalidConfig(format!(
            "max_age_days must be between 1 and {}",
            MAX_SESSION_AGE_DAYS
        )));
    }

    if !config.session.login_path.starts_with('/') {
        return Err(ConfigError::InvalidConfig(
            "login_path must be an absolute path".into(),
        ));
    }

    if let Some(minutes) = config.auth.token_max_age_minutes {
        if minutes == 0 || minutes > MAX_TOKEN_AGE_MINUTES {
            return Err(ConfigError::InvalidConfig(format!(
                "token_max_age_minutes must be between 1 and {} when set",
                MAX_TOKEN_AGE_MINUTES
            )));
        }
    }

    // Both keys are required at startup; a missing or short key is rejected
    // here rather than at the first login.
    check_secret(
        "token secret",
        "SSO_SECRET",
        "auth.token_secret",
        config.auth.resolved_token_secret(),
    )?;
    check_secret(
        "session key",
        "SSO_SESSION_KEY",
        "session.session_key",
        config.session.resolved_session_key(),
    )?;

    Ok(())
}

fn check_secret(
    what: &str,
    env_var: &str,
    field: &str,
    value: Option<String>,
) -> Result<(), ConfigError> {
    match value {
        None => Err(ConfigError::InvalidConfig(format!(
            "{} must be set via the {} env var or the {} config field",
            what, env_var, field
        ))),
        Some(secret) if secret.len() < MIN_SECRET_LEN => Err(ConfigError::InvalidConfig(
            format!("{} must be at least {} characters long", what, MIN_SECRET_LEN),
        )),
        Some(_) => Ok(()),
    }
}
