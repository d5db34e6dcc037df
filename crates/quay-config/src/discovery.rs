//! Finding and layering `quay.toml` files.
//!
//! Two layers are consulted, the second winning section by section:
//!
//! | layer     | file                                                   |
//! |-----------|--------------------------------------------------------|
//! | `User`    | `$QUAY_CONFIG_DIR/config.toml`, else `<config dir>/quay/config.toml` |
//! | `Project` | `quay.toml` in the working (or given) directory        |
//!
//! A file named on the command line replaces discovery entirely
//! ([`LoadedConfig::from_file`]). Command-line flags are applied by the
//! binary on top of whatever this module returns.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{ConfigError, QuayConfig, Result};

const PROJECT_FILE: &str = "quay.toml";
const USER_FILE: &str = "config.toml";
const USER_DIR_NAME: &str = "quay";
const USER_DIR_ENV: &str = "QUAY_CONFIG_DIR";

/// Where a config file sits in the precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Per-user settings.
    User,
    /// Settings next to the project being served.
    Project,
    /// A file given explicitly; nothing else is read.
    Explicit,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Explicit => "explicit",
        })
    }
}

/// One candidate file and whether it contributed.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub layer: ConfigLayer,
    pub path: PathBuf,
    pub loaded: bool,
}

/// The merged configuration plus a record of how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: QuayConfig,
    /// Candidates in precedence order, lowest first.
    pub sources: Vec<ConfigSource>,
    /// Files that existed but were skipped, with the reason.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Load a single named file, bypassing discovery. The file must exist
    /// and be valid.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self {
            config: load_config_file(path)?,
            sources: vec![ConfigSource {
                layer: ConfigLayer::Explicit,
                path: path.to_path_buf(),
                loaded: true,
            }],
            warnings: Vec::new(),
        })
    }

    /// Paths that contributed to the result.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|source| source.loaded)
            .map(|source| source.path.as_path())
            .collect()
    }
}

/// Discover and merge the user and project layers.
///
/// `project_dir` defaults to the working directory.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], reading the user layer from `user_dir` instead of
/// `QUAY_CONFIG_DIR` or the platform config directory.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    user_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig {
        config: QuayConfig::new(),
        sources: Vec::new(),
        warnings: Vec::new(),
    };

    for (layer, path) in candidates(project_dir, user_dir) {
        let ok = match read_layer(&path) {
            Ok(Some(config)) => {
                loaded.config.merge(config);
                true
            }
            Ok(None) => false,
            Err(e) => {
                loaded
                    .warnings
                    .push(format!("Failed to load {} config {}: {}", layer, path.display(), e));
                false
            }
        };
        loaded.sources.push(ConfigSource {
            layer,
            path,
            loaded: ok,
        });
    }

    loaded.config.validate()?;
    Ok(loaded)
}

/// Read, parse and validate one file.
pub fn load_config_file(path: &Path) -> Result<QuayConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;

    let config = QuayConfig::from_toml(&text)?;
    config.validate()?;
    Ok(config)
}

/// Write `config` as TOML, creating missing parent directories.
pub fn save_config(config: &QuayConfig, path: &Path) -> Result<()> {
    let text = config.to_toml()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| write_error(parent, source))?;
    }
    std::fs::write(path, text).map_err(|source| write_error(path, source))
}

/// The user layer's file, if a config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(USER_FILE))
}

/// `QUAY_CONFIG_DIR` when set and non-empty, else `<platform config dir>/quay`.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var_os(USER_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|dir| dir.join(USER_DIR_NAME)),
    }
}

fn candidates(project_dir: Option<&Path>, user_dir: Option<&Path>) -> Vec<(ConfigLayer, PathBuf)> {
    let user = match user_dir {
        Some(dir) => Some(dir.join(USER_FILE)),
        None => user_config_path(),
    };
    let project = match project_dir {
        Some(dir) => dir.join(PROJECT_FILE),
        None => PathBuf::from(PROJECT_FILE),
    };

    user.map(|path| (ConfigLayer::User, path))
        .into_iter()
        .chain([(ConfigLayer::Project, project)])
        .collect()
}

/// `Ok(None)` when there is no file to read.
fn read_layer(path: &Path) -> Result<Option<QuayConfig>> {
    if !path.is_file() {
        return Ok(None);
    }
    load_config_file(path).map(Some)
}

fn write_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::WriteFile {
        path: path.display().to_string(),
        source,
    }
}
