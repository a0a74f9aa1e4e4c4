//! SQLCipher key for the catalog.
//!
//! Lookup order is the process environment, then a `.env` next to the catalog file, then an
//! interactive prompt. The `.env` file is read without touching the process environment.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

/// Where the catalog password came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordSource {
    Environment,
    DotEnv(PathBuf),
    Prompt,
}

fn trimmed(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// First non-empty `key` in `<dir>/.env`. Unparsable lines are logged and skipped.
fn from_dotenv(dir: &Path, key: &str) -> Option<(String, PasswordSource)> {
    let env_path = dir.join(".env");
    let iter = dotenvy::from_path_iter(&env_path).ok()?;
    for item in iter {
        match item {
            Ok((k, v)) if k == key => {
                if let Some(v) = trimmed(v) {
                    return Some((v, PasswordSource::DotEnv(env_path)));
                }
            }
            Ok(_) => {}
            Err(e) => debug!("{}: {}", env_path.display(), e),
        }
    }
    None
}

/// `key` from the process environment, else from `<dir>/.env`.
fn from_environment(dir: &Path, key: &str) -> Option<(String, PasswordSource)> {
    std::env::var(key)
        .ok()
        .and_then(trimmed)
        .map(|v| (v, PasswordSource::Environment))
        .or_else(|| from_dotenv(dir, key))
}

fn prompt(label: &str) -> Result<String> {
    let tag = format!("[{}]", env!("CARGO_PKG_NAME")).cyan().bold();
    let pass = rpassword::prompt_password(format!("{tag} {label}"))
        .context("read catalog password")?;
    Ok(pass.trim().to_string())
}

/// Password for the catalog at `db_path`. A catalog that does not exist yet gets a
/// confirmed, non-empty password: an empty SQLCipher key would leave it unencrypted.
pub fn get_passphrase(db_path: &Path, db_user: Option<&str>) -> Result<String> {
    let dir = db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let key = PackagePaths::get().key_env_var();
    if let Some((pass, source)) = from_environment(dir, key) {
        match source {
            PasswordSource::DotEnv(file) => info!("catalog password from {}", file.display()),
            _ => info!("catalog password from ${key}"),
        }
        return Ok(pass);
    }

    let who = db_user.map(|u| format!(" for {u}")).unwrap_or_default();
    if db_path.exists() {
        return prompt(&format!("Catalog password{who}: "));
    }
    let pass = prompt(&format!("New catalog password{who}: "))?;
    if pass.is_empty() {
        bail!("an encrypted catalog needs a non-empty password");
    }
    if prompt("Repeat password: ")? != pass {
        bail!("passwords do not match");
    }
    warn!(
        "{} has no recovery: lost password = lost catalog",
        db_path.display()
    );
    Ok(pass)
}
