//! Load `smbspider.toml` from a directory (CLI only). Lib callers build [`Opts`] directly.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SettingsToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    hosts_file: Option<String>,
    db_path: Option<String>,
    db_server: Option<String>,
    db_user: Option<String>,
    encrypt: Option<bool>,
    mount_root: Option<String>,
    scratch_dir: Option<String>,
    buffer_capacity: Option<usize>,
    workers: Option<usize>,
    verbose: Option<bool>,
}

/// Load the settings file from `dir` if present. Returns None if missing or unreadable.
pub(crate) fn load_settings_toml(dir: &Path) -> Option<SettingsToml> {
    let path = dir.join(PackagePaths::get().settings_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_settings(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub(crate) fn parse_settings(s: &str) -> Result<SettingsToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $field:ident) => {
        if let Some(v) = $sec.$field.clone() {
            $opts.$field = v;
        }
    };
    ($sec:expr, $opts:expr, $field:ident as path) => {
        if let Some(ref v) = $sec.$field {
            $opts.$field = PathBuf::from(v);
        }
    };
    ($sec:expr, $opts:expr, $field:ident as option) => {
        if let Some(ref v) = $sec.$field {
            $opts.$field = Some(v.clone());
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI flags.
pub(crate) fn apply_file_to_opts(file: &SettingsToml, opts: &mut Opts) {
    let sec = &file.settings;
    apply_file_opt!(sec, opts, hosts_file as path);
    apply_file_opt!(sec, opts, db_path as path);
    apply_file_opt!(sec, opts, db_server as option);
    apply_file_opt!(sec, opts, db_user as option);
    apply_file_opt!(sec, opts, encrypt);
    apply_file_opt!(sec, opts, mount_root as path);
    apply_file_opt!(sec, opts, scratch_dir as path);
    apply_file_opt!(sec, opts, buffer_capacity);
    apply_file_opt!(sec, opts, workers);
    apply_file_opt!(sec, opts, verbose);
}
