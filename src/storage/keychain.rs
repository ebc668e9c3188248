use crate::error::{DashboardError, Result};
use crate::types::{
    KEYCHAIN_SERVICE, NOTION_API_KEY_ENV, NOTION_USERNAME, OPENAI_API_KEY_ENV, OPENAI_USERNAME,
};
use crate::util::option_non_empty;
use keyring::{Entry, Error as KeyringError};
use serde::{Deserialize, Serialize};

/// Secrets the dashboard needs. Each maps to one keychain entry and one
/// environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Secret {
    Notion,
    OpenAi,
}

impl Secret {
    pub fn provider(&self) -> &'static str {
        match self {
            Secret::Notion => "Notion",
            Secret::OpenAi => "OpenAI",
        }
    }

    fn username(&self) -> &'static str {
        match self {
            Secret::Notion => NOTION_USERNAME,
            Secret::OpenAi => OPENAI_USERNAME,
        }
    }

    fn env_var(&self) -> &'static str {
        match self {
            Secret::Notion => NOTION_API_KEY_ENV,
            Secret::OpenAi => OPENAI_API_KEY_ENV,
        }
    }

    fn missing(&self) -> DashboardError {
        DashboardError::MissingCredential {
            provider: self.provider().to_string(),
        }
    }
}

fn keyring_entry(secret: Secret) -> Result<Entry> {
    Entry::new(KEYCHAIN_SERVICE, secret.username())
        .map_err(|error| DashboardError::Keyring(error.to_string()))
}

pub fn set_secret(secret: Secret, value: String) -> Result<bool> {
    let Some(value) = option_non_empty(value) else {
        return Err(DashboardError::InvalidInput("API key cannot be empty".to_string()));
    };
    keyring_entry(secret)?
        .set_password(&value)
        .map_err(|error| DashboardError::Keyring(error.to_string()))?;
    log::info!("Stored {} API key in keychain", secret.provider());
    Ok(true)
}

pub fn has_secret(secret: Secret) -> Result<bool> {
    if std::env::var(secret.env_var())
        .ok()
        .and_then(option_non_empty)
        .is_some()
    {
        return Ok(true);
    }
    match keyring_entry(secret)?.get_password() {
        Ok(value) => Ok(!value.trim().is_empty()),
        Err(KeyringError::NoEntry) => Ok(false),
        Err(error) => Err(DashboardError::Keyring(error.to_string())),
    }
}

pub fn clear_secret(secret: Secret) -> Result<bool> {
    match keyring_entry(secret)?.delete_password() {
        Ok(_) | Err(KeyringError::NoEntry) => Ok(true),
        Err(error) => Err(DashboardError::Keyring(error.to_string())),
    }
}

/// Explicit value, then environment, then keychain.
pub fn resolve_secret(secret: Secret, explicit: Option<String>) -> Result<String> {
    resolve_with(secret, explicit, std::env::var(secret.env_var()).ok(), || {
        match keyring_entry(secret)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(error) => Err(DashboardError::Keyring(error.to_string())),
        }
    })
}

fn resolve_with(
    secret: Secret,
    explicit: Option<String>,
    from_env: Option<String>,
    from_keychain: impl FnOnce() -> Result<Option<String>>,
) -> Result<String> {
    if let Some(value) = explicit.and_then(option_non_empty) {
        return Ok(value);
    }
    if let Some(value) = from_env.and_then(option_non_empty) {
        return Ok(value);
    }
    from_keychain()?
        .and_then(option_non_empty)
        .ok_or_else(|| secret.missing())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_value_wins() {
        let resolved = resolve_with(
            Secret::Notion,
            Some(" secret_explicit ".to_string()),
            Some("secret_env".to_string()),
            || panic!("keychain must not be read"),
        )
        .expect("resolved");
        assert_eq!(resolved, "secret_explicit");
    }

    #[test]
    fn environment_before_keychain() {
        let resolved = resolve_with(Secret::OpenAi, Some("  ".to_string()), Some("sk-env".to_string()), || {
            panic!("keychain must not be read")
        })
        .expect("resolved");
        assert_eq!(resolved, "sk-env");
    }

    #[test]
    fn keychain_is_last_resort() {
        let resolved = resolve_with(Secret::OpenAi, None, None, || Ok(Some("sk-stored".to_string())))
            .expect("resolved");
        assert_eq!(resolved, "sk-stored");
    }

    #[test]
    fn nothing_configured_is_a_configuration_error() {
        let error = resolve_with(Secret::Notion, None, Some(String::new()), || Ok(None))
            .expect_err("missing");
        assert_eq!(error.to_string(), "Notion API key not configured");
        assert_eq!(error.status(), 500);
    }
}
