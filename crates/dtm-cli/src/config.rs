//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `--config` on the command line
//! 2. `$DTM_CONFIG` environment variable
//! 3. `~/.config/dtm/config.toml`
//! 4. Built-in defaults (everything is optional)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use dtm_core::{lessons, Catalog, Roster};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub local_log: LocalLogConfig,
    pub roster: RosterConfig,
    pub session: SessionConfig,
}

/// Shared interaction log settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path. Default: platform-specific data dir.
    pub path: Option<String>,
    /// How long to wait for another session's write lock.
    pub busy_timeout_ms: u64,
    /// When false the shared log is treated as unreachable.
    pub enabled: bool,
}

/// Local tab-separated fallback log.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LocalLogConfig {
    pub enabled: bool,
    /// Default: `interactions.tsv` next to the database.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub participants: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Built-in catalog name or path to a TOML catalog file.
    pub catalog: String,
    pub log_incorrect_answers: bool,
}

// --- Defaults ---

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 2000,
            enabled: true,
        }
    }
}

impl Default for LocalLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        let roster = Roster::default();
        Self {
            participants: vec![roster.first, roster.second],
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            catalog: lessons::GOLDEN_RATIO.into(),
            log_incorrect_answers: false,
        }
    }
}

impl RosterConfig {
    pub fn roster(&self) -> Result<Roster> {
        Roster::from_names(&self.participants).context("invalid [roster] participants")
    }
}

impl SessionConfig {
    /// Resolves `catalog` to a built-in lesson, or loads it from a file.
    pub fn load_catalog(&self) -> Result<Catalog> {
        if lessons::builtin_names().iter().any(|name| *name == self.catalog) {
            return Ok(lessons::builtin(&self.catalog)?);
        }
        let path = Path::new(&self.catalog);
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        Catalog::from_toml_str(&content)
            .with_context(|| format!("loading catalog {}", path.display()))
    }
}

/// Load config from disk. Returns defaults if no config file exists.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match config_path(explicit) {
        Some(p) if p.exists() => load_from(&p),
        _ => Ok(Config::default()),
    }
}

pub fn load_from(path: &Path) -> Result<Config> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Resolve the config file path.
fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }

    // Environment variable
    if let Ok(p) = std::env::var("DTM_CONFIG") {
        return Some(PathBuf::from(p));
    }

    // ~/.config/dtm/config.toml
    dirs_home().map(|home| home.join(".config").join("dtm").join("config.toml"))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Show the active config path (for `dtm config`).
pub fn show_config_path(explicit: Option<&Path>) -> String {
    match config_path(explicit) {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.store.enabled);
        assert_eq!(config.store.busy_timeout_ms, 2000);
        assert!(config.local_log.enabled);
        assert_eq!(config.roster.participants, vec!["Soren", "Ayushi"]);
        assert_eq!(config.session.catalog, "golden-ratio");
        assert!(!config.session.log_incorrect_answers);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[session]
catalog = "logic-puzzles"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.session.catalog, "logic-puzzles");
        // Other fields should be defaults
        assert!(config.store.enabled);
        assert_eq!(config.roster.roster().unwrap(), Roster::default());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[store]
path = "/tmp/dtm.db"
busy_timeout_ms = 500
enabled = false

[local_log]
enabled = false
path = "/tmp/dtm.tsv"

[roster]
participants = ["Ada", "Grace"]

[session]
catalog = "golden-ratio"
log_incorrect_answers = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.path.as_deref(), Some("/tmp/dtm.db"));
        assert_eq!(config.store.busy_timeout_ms, 500);
        assert!(!config.store.enabled);
        assert_eq!(config.local_log.path.as_deref(), Some("/tmp/dtm.tsv"));
        assert!(config.session.log_incorrect_answers);
        let roster = config.roster.roster().unwrap();
        assert_eq!(roster.names(), ["Ada", "Grace"]);
    }

    #[test]
    fn test_bad_roster() {
        let config: Config = toml::from_str("[roster]\nparticipants = [\"Solo\"]\n").unwrap();
        assert!(config.roster.roster().is_err());
    }

    #[test]
    fn test_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dtm.toml");
        std::fs::write(&path, "[local_log]\nenabled = false\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(!config.local_log.enabled);
        assert!(show_config_path(Some(&path)).ends_with("(loaded)"));

        let missing = dir.path().join("missing.toml");
        assert!(load_config(Some(&missing)).unwrap().local_log.enabled);
    }

    #[test]
    fn test_load_builtin_and_file_catalogs() {
        let session = SessionConfig::default();
        assert_eq!(session.load_catalog().unwrap().name, "golden-ratio");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesson.toml");
        std::fs::write(
            &path,
            r#"
name = "custom"
title = "Custom"

[[modules]]
section = "Only"

[[modules.subproblems]]
key = "Q"
prompt = "2 + 2?"
hint = "Count."
rule = { kind = "integer", expected = 4 }
"#,
        )
        .unwrap();
        let session = SessionConfig {
            catalog: path.display().to_string(),
            log_incorrect_answers: false,
        };
        assert_eq!(session.load_catalog().unwrap().name, "custom");

        let session = SessionConfig {
            catalog: dir.path().join("nope.toml").display().to_string(),
            log_incorrect_answers: false,
        };
        assert!(session.load_catalog().is_err());
    }
}
