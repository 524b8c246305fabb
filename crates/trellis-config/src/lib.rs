use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bullets CommonMark accepts for bulleted lists.
pub const BULLETS: [char; 3] = ['-', '*', '+'];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read trellis config {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot parse trellis config {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid trellis config {config_path}: {message}")]
    ConfigInvalid { config_path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Bullet written for bulleted lists.
    pub bullet: char,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self { bullet: '-' }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Undo steps kept per document.
    pub depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { depth: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub documents_path: PathBuf,
    #[serde(default)]
    pub markdown: MarkdownConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Config {
    pub fn new(documents_path: impl Into<PathBuf>) -> Self {
        Self {
            documents_path: documents_path.into(),
            markdown: MarkdownConfig::default(),
            history: HistoryConfig::default(),
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.is_file() {
            return Ok(None);
        }

        let content =
            std::fs::read_to_string(config_path).map_err(|source| ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;
        config.validate().map_err(|message| ConfigError::ConfigInvalid {
            config_path: config_path.to_path_buf(),
            message,
        })?;

        // Expand shell variables and tilde in the documents path
        if let Some(expanded) = Self::expand_path(&config.documents_path) {
            config.documents_path = expanded;
        }

        Ok(Some(config))
    }

    /// Loads `~/.config/trellis/config.toml`, if there is one.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        Self::load_from_path(Self::config_path())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(config_path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to_path(Self::config_path())
    }

    pub fn config_path() -> PathBuf {
        PathBuf::from(shellexpand::tilde("~/.config/trellis/config.toml").into_owned())
    }

    fn validate(&self) -> Result<(), String> {
        if !BULLETS.contains(&self.markdown.bullet) {
            return Err(format!(
                "markdown.bullet must be one of {BULLETS:?}, found {:?}",
                self.markdown.bullet
            ));
        }
        if self.history.depth == 0 {
            return Err("history.depth must be at least 1".to_string());
        }
        Ok(())
    }

    /// Expands `~` and `$VAR`; `None` when a variable is unset.
    fn expand_path(path: &Path) -> Option<PathBuf> {
        shellexpand::full(&path.to_string_lossy())
            .ok()
            .map(|expanded| PathBuf::from(expanded.into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path_is_expanded() {
        let path = Config::config_path();
        assert!(path.is_absolute());
        assert!(path.ends_with(".config/trellis/config.toml"));
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: Config = toml::from_str(r#"documents_path = "/docs""#).unwrap();
        assert_eq!(config, Config::new("/docs"));
        assert_eq!(config.markdown.bullet, '-');
        assert_eq!(config.history.depth, 100);
    }

    #[test]
    fn test_sections_are_read() {
        let content = r#"
documents_path = "/docs"

[markdown]
bullet = "*"

[history]
depth = 20
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.markdown.bullet, '*');
        assert_eq!(config.history.depth, 20);
    }

    #[test]
    fn test_tilde_expands_to_home() {
        let expanded = Config::expand_path(Path::new("~/notes/trellis")).unwrap();
        assert!(expanded.is_absolute());
        assert!(expanded.ends_with("notes/trellis"));
    }

    #[test]
    fn test_env_var_expands() {
        unsafe {
            env::set_var("TRELLIS_TEST_VAR", "/srv/docs");
        }

        let expanded = Config::expand_path(Path::new("$TRELLIS_TEST_VAR/team")).unwrap();
        assert_eq!(expanded, PathBuf::from("/srv/docs/team"));
        assert_eq!(Config::expand_path(Path::new("$TRELLIS_UNSET_VAR/team")), None);

        unsafe {
            env::remove_var("TRELLIS_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_path_keeps_plain_paths() {
        for path in ["/absolute/path", "relative/path"] {
            assert_eq!(Config::expand_path(&PathBuf::from(path)).unwrap(), PathBuf::from(path));
        }
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load_from_path(dir.path().join("absent.toml")).unwrap(), None);
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = TempDir::new().unwrap();
        let config_file = dir.path().join("nested/config.toml");
        let mut config = Config::new("/tmp/test-docs");
        config.markdown.bullet = '+';
        config.history.depth = 5;

        config.save_to_path(&config_file).unwrap();
        let loaded = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_expands_documents_path() {
        unsafe {
            env::set_var("TRELLIS_DOCS_ROOT", "/custom/docs");
        }
        let dir = TempDir::new().unwrap();
        let config_file = dir.path().join("trellis.toml");
        std::fs::write(&config_file, "documents_path = \"$TRELLIS_DOCS_ROOT/mine\"\n").unwrap();

        let loaded = Config::load_from_path(&config_file).unwrap().unwrap();
        assert_eq!(loaded.documents_path, PathBuf::from("/custom/docs/mine"));

        unsafe {
            env::remove_var("TRELLIS_DOCS_ROOT");
        }
    }

    #[test]
    fn test_invalid_bullet_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config_file = dir.path().join("trellis.toml");
        let content = "documents_path = \"/docs\"\n[markdown]\nbullet = \"x\"\n";
        std::fs::write(&config_file, content).unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let config_file = dir.path().join("trellis.toml");
        std::fs::write(&config_file, "documents_path = [").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();
        assert!(err.to_string().contains("trellis.toml"));
    }
}
