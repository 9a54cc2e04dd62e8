//! Configuration management for navtree.
//!
//! Parses `navtree.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! Overrides can be applied during load via [`ConfigOverrides`].
//!
//! ## Environment Variable Expansion
//!
//! String values support `${VAR}` and `${VAR:-default}`.
//!
//! Expanded fields:
//! - `tree.source_dir`
//! - `tree.root_fragment`
//! - `tree.extension`
//!
//! ## Example
//!
//! ```toml
//! [tree]
//! source_dir = "${DOXYGEN_OUTPUT:-html}"
//! root_fragment = "navtreedata"
//! index_root = [0]
//!
//! [sync]
//! enabled = true
//! ```

mod expand;

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "navtree.toml";

const DEFAULT_SOURCE_DIR: &str = "html";
const DEFAULT_ROOT_FRAGMENT: &str = "navtreedata";
const DEFAULT_ROOT_VARIABLE: &str = "NAVTREE";
const DEFAULT_INDEX_VARIABLE: &str = "NAVTREEINDEX";
const DEFAULT_EXTENSION: &str = "js";
/// Generated chunk paths start below the single top-level node.
const DEFAULT_INDEX_ROOT: [usize; 1] = [0];

/// Settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    /// Override fragment directory.
    pub source_dir: Option<PathBuf>,
    /// Override the initial sync toggle.
    pub sync_enabled: Option<bool>,
}

/// Panel configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tree data configuration (paths are relative strings from TOML).
    tree: TreeConfigRaw,
    /// Synchronisation configuration.
    pub sync: SyncConfig,

    /// Resolved tree configuration (set after loading).
    #[serde(skip)]
    pub tree_resolved: TreeConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TreeConfigRaw {
    source_dir: Option<String>,
    root_fragment: Option<String>,
    root_variable: Option<String>,
    index_variable: Option<String>,
    index_root: Option<Vec<usize>>,
    extension: Option<String>,
}

/// Resolved tree data configuration with an absolute fragment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// Directory holding the generated fragment files.
    pub source_dir: PathBuf,
    /// Fragment holding the root forest and the index boundary list.
    pub root_fragment: String,
    /// Variable holding the root forest.
    pub root_variable: String,
    /// Variable prefix of the index boundary list and its chunks.
    pub index_variable: String,
    /// Node that index chunk paths are relative to (`[]` for the forest).
    pub index_root: Vec<usize>,
    /// Fragment file extension.
    pub extension: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            root_fragment: DEFAULT_ROOT_FRAGMENT.to_owned(),
            root_variable: DEFAULT_ROOT_VARIABLE.to_owned(),
            index_variable: DEFAULT_INDEX_VARIABLE.to_owned(),
            index_root: DEFAULT_INDEX_ROOT.to_vec(),
            extension: DEFAULT_EXTENSION.to_owned(),
        }
    }
}

/// Synchronisation configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether the panel follows the displayed page initially.
    pub enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Error loading `navtree.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Explicitly requested file does not exist.
    #[error("Config file {} does not exist", .0.display())]
    NotFound(PathBuf),
    /// Reading the file failed.
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid TOML or has unknown value types.
    #[error("Invalid navtree.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("Invalid setting: {0}")]
    Validation(String),
    /// A `${VAR}` reference could not be expanded.
    #[error("Cannot expand {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`tree.source_dir`").
        field: String,
        /// Error message (e.g., "${`DOXYGEN_OUTPUT`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        Err(ConfigError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

/// Require a JavaScript identifier (`NAVTREE`, `NAVTREEINDEX`).
fn require_identifier(value: &str, field: &str) -> Result<(), ConfigError> {
    require_non_empty(value, field)?;
    let mut chars = value.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err(ConfigError::Validation(format!(
            "{field} must be a valid identifier, got {value:?}"
        )));
    }
    Ok(())
}

/// Require a plain file name component.
fn require_file_component(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.starts_with('.') || value.contains(['/', '\\', '\0']) {
        return Err(ConfigError::Validation(format!(
            "{field} must be a plain name, got {value:?}"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration, then apply `overrides`.
    ///
    /// An explicit `config_path` must exist. Without one, the nearest
    /// `navtree.toml` in the current directory or its parents is used, and
    /// defaults relative to the current directory when there is none.
    pub fn load(
        config_path: Option<&Path>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Some(path) => Some(path.to_path_buf()),
            None => std::env::current_dir()
                .ok()
                .and_then(|cwd| Self::discover_from(&cwd)),
        };
        let mut config = match file {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default_with_cwd(),
        };

        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }

        Ok(config)
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(source_dir) = &overrides.source_dir {
            self.tree_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(enabled) = overrides.sync_enabled {
            self.sync.enabled = enabled;
        }
    }

    /// Nearest `navtree.toml` in `start` or one of its parents.
    fn discover_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILENAME))
            .find(|candidate| candidate.is_file())
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            tree: TreeConfigRaw::default(),
            sync: SyncConfig::default(),
            tree_resolved: TreeConfig {
                source_dir: base.join(DEFAULT_SOURCE_DIR),
                ..TreeConfig::default()
            },
            config_path: None,
        }
    }

    /// Parse, expand, resolve and validate one file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(&std::fs::read_to_string(path)?)?;
        config.expand_env_vars()?;
        config.resolve_paths(path.parent().unwrap_or(Path::new(".")));
        config.config_path = Some(path.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    /// Check the resolved tree settings.
    ///
    /// Fragment names must be plain file names and variable names must be
    /// JavaScript identifiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tree = &self.tree_resolved;
        require_non_empty(&tree.root_fragment, "tree.root_fragment")?;
        require_file_component(&tree.root_fragment, "tree.root_fragment")?;
        require_identifier(&tree.root_variable, "tree.root_variable")?;
        require_identifier(&tree.index_variable, "tree.index_variable")?;
        require_non_empty(&tree.extension, "tree.extension")?;
        require_file_component(&tree.extension, "tree.extension")?;
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        let tree = &mut self.tree;
        expand::expand_setting(&mut tree.source_dir, "tree.source_dir")?;
        expand::expand_setting(&mut tree.root_fragment, "tree.root_fragment")?;
        expand::expand_setting(&mut tree.extension, "tree.extension")

    }

    /// Resolve the raw tree section against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let raw = &self.tree;
        let or_default = |value: &Option<String>, default: &str| {
            value.clone().unwrap_or_else(|| default.to_owned())
        };

        self.tree_resolved = TreeConfig {
            source_dir: config_dir.join(raw.source_dir.as_deref().unwrap_or(DEFAULT_SOURCE_DIR)),
            root_fragment: or_default(&raw.root_fragment, DEFAULT_ROOT_FRAGMENT),
            root_variable: or_default(&raw.root_variable, DEFAULT_ROOT_VARIABLE),
            index_variable: or_default(&raw.index_variable, DEFAULT_INDEX_VARIABLE),
            index_root: raw
                .index_root
                .clone()
                .unwrap_or_else(|| DEFAULT_INDEX_ROOT.to_vec()),
            extension: raw
                .extension
                .as_deref()
                .map_or_else(|| DEFAULT_EXTENSION.to_owned(), |e| e.trim_start_matches('.').to_owned()),
        };
    }
}
