//! Local settings commands

use crate::api::normalize_base_url;
use crate::cli::SettingsCommand;
use crate::error::{MresearchError, Result};
use crate::storage::{keys, LocalStore, Preferences};

use colored::Colorize;
use std::path::Path;

/// Handle settings commands
///
/// Settings live only in the local store, so none of these touch the network.
pub fn handle_settings(storage: &LocalStore, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let prefs = storage.preferences()?;
            let token = storage.auth_token()?;

            println!("\nSettings ({})\n", storage.path().display());
            println!(
                "API URL:         {}",
                prefs.api_url.as_deref().unwrap_or("(from configuration)")
            );
            println!("Username:        {}", prefs.username);
            println!("Email:           {}", prefs.email);
            println!("Notifications:   {}", on_off(prefs.notifications));
            println!("Auto refresh:    {}", on_off(prefs.auto_refresh));
            println!("Auth token:      {}", mask_token(&token));
            println!("Downloads:       {}", storage.downloads_count()?);
            println!();
        }
        SettingsCommand::Set { key, value } => {
            set_value(storage, &key, &value)?;
            println!("{}", format!("Saved {}", key).green());
        }
        SettingsCommand::Import { file } => {
            let count = import_file(storage, &file)?;
            println!("{}", format!("Imported {} records", count).green());
        }
        SettingsCommand::ClearHistory => {
            storage.clear_history()?;
            println!("{}", "Research history cleared.".green());
        }
    }

    Ok(())
}

/// Update one setting by name
///
/// # Errors
///
/// Returns `MresearchError::Validation` for unknown keys and malformed values
pub fn set_value(storage: &LocalStore, key: &str, value: &str) -> Result<()> {
    if key == keys::AUTH_TOKEN {
        return storage.set_auth_token(value.trim());
    }

    let mut prefs: Preferences = storage.preferences()?;
    match key {
        keys::API_URL => {
            let trimmed = value.trim();
            prefs.api_url = if trimmed.is_empty() {
                None
            } else {
                let url = normalize_base_url(trimmed)?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(MresearchError::Validation(format!(
                        "api_url must use http or https, got: {}",
                        url.scheme()
                    ))
                    .into());
                }
                Some(trimmed.trim_end_matches('/').to_string())
            };
        }
        keys::USERNAME => prefs.username = value.to_string(),
        keys::EMAIL => prefs.email = value.to_string(),
        keys::NOTIFICATIONS => prefs.notifications = parse_flag(key, value)?,
        keys::AUTO_REFRESH => prefs.auto_refresh = parse_flag(key, value)?,
        other => {
            return Err(MresearchError::Validation(format!(
                "Unknown setting: {}. Must be one of: {}, {}",
                other,
                keys::PREFERENCES.join(", "),
                keys::AUTH_TOKEN
            ))
            .into())
        }
    }

    storage.save_preferences(&prefs)?;
    tracing::debug!("Saved setting {}", key);
    Ok(())
}

/// Import a JSON object exported from the dashboard's `localStorage`
pub fn import_file(storage: &LocalStore, path: &Path) -> Result<usize> {
    let contents = std::fs::read_to_string(path)?;
    let dump: serde_json::Value = serde_json::from_str(&contents)?;
    match dump {
        serde_json::Value::Object(map) => storage.import_legacy(&map),
        _ => Err(MresearchError::Validation(format!(
            "{} must contain a JSON object of key/value pairs",
            path.display()
        ))
        .into()),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(MresearchError::Validation(format!(
            "{} expects true or false, got: {}",
            key, other
        ))
        .into()),
    }
}

fn on_off(flag: bool) -> colored::ColoredString {
    if flag {
        "on".green()
    } else {
        "off".dimmed()
    }
}

fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 4 {
        visible
    } else {
        format!("{}****", visible)
    }
}
