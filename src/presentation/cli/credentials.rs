//! Backup credential selection
//!
//! Precedence: key file, then `--password`, then the password environment
//! variable, then an interactive prompt.

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Password};
use std::path::PathBuf;
use tracing::{info, warn};

/// Environment variable holding the backup password
pub const PASSWORD_ENV: &str = "IOS_TRIAGE_BACKUP_PASSWORD";

/// Where the unlocking material comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    KeyFile(PathBuf),
    Password(String),
    Prompt,
}

/// Credential sources present on the command line and in the environment
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    pub key_file: Option<PathBuf>,
    pub password: Option<String>,
    pub env_password: Option<String>,
}

impl CredentialSources {
    pub fn from_env(key_file: Option<PathBuf>, password: Option<String>) -> Self {
        Self {
            key_file,
            password,
            env_password: std::env::var(PASSWORD_ENV).ok(),
        }
    }
}

/// Notice emitted while choosing a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialNotice {
    /// A password was given as an argument and may be visible to other users
    PasswordOnCommandLine,
    /// The environment password is ignored in favour of a higher source
    EnvIgnored,
    /// `--password` is ignored in favour of the key file
    PasswordIgnored,
    /// The environment password is used
    EnvUsed,
}

/// Picks the highest-precedence credential. Pure; logging is up to the caller.
pub fn resolve(sources: CredentialSources) -> (Credential, Vec<CredentialNotice>) {
    let mut notices = Vec::new();

    if sources.password.is_some() {
        notices.push(CredentialNotice::PasswordOnCommandLine);
    }

    let credential = if let Some(key_file) = sources.key_file {
        if sources.password.is_some() {
            notices.push(CredentialNotice::PasswordIgnored);
        }
        if sources.env_password.is_some() {
            notices.push(CredentialNotice::EnvIgnored);
        }
        Credential::KeyFile(key_file)
    } else if let Some(password) = sources.password {
        if sources.env_password.is_some() {
            notices.push(CredentialNotice::EnvIgnored);
        }
        Credential::Password(password)
    } else if let Some(password) = sources.env_password {
        notices.push(CredentialNotice::EnvUsed);
        Credential::Password(password)
    } else {
        Credential::Prompt
    };

    (credential, notices)
}

/// Logs the notices produced by [`resolve`]
pub fn log_notices(notices: &[CredentialNotice]) {
    for notice in notices {
        match notice {
            CredentialNotice::PasswordOnCommandLine => warn!(
                "Your password may be visible in the process table because it was supplied on the command line!"
            ),
            CredentialNotice::EnvIgnored => {
                warn!("Ignoring {} environment variable", PASSWORD_ENV)
            }
            CredentialNotice::PasswordIgnored => {
                warn!("Ignoring --password argument, using --key-file instead")
            }
            CredentialNotice::EnvUsed => {
                info!("Using password from {} environment variable", PASSWORD_ENV)
            }
        }
    }
}

/// Asks for the backup password without echoing it
pub fn prompt_password() -> Result<String> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Enter backup password")
        .interact()
        .context("Failed to read backup password")
}
