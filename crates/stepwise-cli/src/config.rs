//! Configuration file management for stepwise.
//!
//! Provides a TOML-based config file at `~/.config/stepwise/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use stepwise_core::generator::GeminiConfig;
use stepwise_core::plan::SchemaVariant;
use stepwise_db::config::DbConfig;

pub const ENV_GEMINI_API_KEY: &str = "STEPWISE_GEMINI_API_KEY";
pub const ENV_GEMINI_API_KEY_FALLBACK: &str = "GOOGLE_AI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "STEPWISE_GEMINI_MODEL";
pub const ENV_PLAN_SCHEMA: &str = "STEPWISE_PLAN_SCHEMA";
pub const ENV_ENVIRONMENT: &str = "STEPWISE_ENV";

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

/// On-disk config. Every section and key is optional.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub generator: GeneratorSection,
    pub plan: PlanSection,
    pub server: ServerSection,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Absent means plans are not persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSection {
    /// Absent means every plan is synthesized locally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaVariant>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expose_error_details: Option<bool>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the stepwise config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/stepwise` or `~/.config/stepwise`,
/// never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("stepwise");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("stepwise")
}

/// Return the path to the stepwise config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Load the config file if one exists. A missing file is not an error; a
/// malformed one is.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    load_config_from(&path).map(Some)
}

/// Serialize and write `config` to `path`, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values supplied on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub database_url: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub expose_error_details: bool,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepwiseConfig {
    /// `None` when no database is configured anywhere.
    pub db_config: Option<DbConfig>,
    /// `None` when no API key is configured anywhere.
    pub gemini: Option<GeminiConfig>,
    pub schema: SchemaVariant,
    pub server: ServerConfig,
}

impl StepwiseConfig {
    /// Resolve from the process environment and the config file on disk.
    pub fn resolve(overrides: &CliOverrides) -> Result<Self> {
        let file = load_config()?.unwrap_or_default();
        Self::resolve_from(overrides, &file, |name| std::env::var(name).ok())
    }

    /// Resolve against an explicit config file and env lookup.
    ///
    /// Empty env values count as unset.
    pub fn resolve_from<F>(overrides: &CliOverrides, file: &ConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let db_config = overrides
            .database_url
            .clone()
            .or_else(|| env(DbConfig::ENV_VAR))
            .or_else(|| file.database.url.clone())
            .map(DbConfig::new);

        let gemini = env(ENV_GEMINI_API_KEY)
            .or_else(|| env(ENV_GEMINI_API_KEY_FALLBACK))
            .or_else(|| file.generator.api_key.clone())
            .filter(|key| !key.trim().is_empty())
            .map(|api_key| {
                let defaults = GeminiConfig::new(api_key);
                GeminiConfig {
                    model: env(ENV_GEMINI_MODEL)
                        .or_else(|| file.generator.model.clone())
                        .unwrap_or(defaults.model.clone()),
                    endpoint: file
                        .generator
                        .endpoint
                        .clone()
                        .unwrap_or(defaults.endpoint.clone()),
                    timeout_secs: file.generator.timeout_secs.unwrap_or(defaults.timeout_secs),
                    ..defaults
                }
            });

        let schema = match env(ENV_PLAN_SCHEMA) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("{ENV_PLAN_SCHEMA} is not a valid plan schema"))?,
            None => file.plan.schema.unwrap_or_default(),
        };

        let expose_error_details = match env(ENV_ENVIRONMENT) {
            Some(mode) => mode.eq_ignore_ascii_case("development"),
            None => file.server.expose_error_details.unwrap_or(false),
        };

        let server = ServerConfig {
            bind: overrides
                .bind
                .clone()
                .or_else(|| file.server.bind.clone())
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: overrides
                .port
                .or(file.server.port)
                .unwrap_or(DEFAULT_PORT),
            expose_error_details,
        };

        Ok(Self {
            db_config,
            gemini,
            schema,
            server,
        })
    }

    /// The configured database, or the default URL for commands that
    /// cannot run without one.
    pub fn db_config_or_default(&self) -> DbConfig {
        self.db_config
            .clone()
            .unwrap_or_else(|| DbConfig::new(DbConfig::DEFAULT_URL))
    }
}

/// Show the first and last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        env_of(&[])
    }

    fn full_file() -> ConfigFile {
        ConfigFile {
            database: DatabaseSection {
                url: Some("postgresql://file:5432/filedb".to_string()),
            },
            generator: GeneratorSection {
                api_key: Some("file-key".to_string()),
                model: Some("gemini-file".to_string()),
                endpoint: Some("http://file-endpoint".to_string()),
                timeout_secs: Some(5),
            },
            plan: PlanSection {
                schema: Some(SchemaVariant::Emoji),
            },
            server: ServerSection {
                bind: Some("0.0.0.0".to_string()),
                port: Some(8080),
                expose_error_details: Some(true),
            },
        }
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config =
            StepwiseConfig::resolve_from(&CliOverrides::default(), &ConfigFile::default(), no_env())
                .unwrap();
        assert_eq!(config.db_config, None);
        assert_eq!(config.gemini, None);
        assert_eq!(config.schema, SchemaVariant::Priority);
        assert_eq!(
            config.server,
            ServerConfig {
                bind: DEFAULT_BIND.to_string(),
                port: DEFAULT_PORT,
                expose_error_details: false,
            }
        );
        assert_eq!(config.db_config_or_default().database_url, DbConfig::DEFAULT_URL);
    }

    #[test]
    fn config_file_values_are_used() {
        let config =
            StepwiseConfig::resolve_from(&CliOverrides::default(), &full_file(), no_env()).unwrap();
        assert_eq!(
            config.db_config.unwrap().database_url,
            "postgresql://file:5432/filedb"
        );
        let gemini = config.gemini.unwrap();
        assert_eq!(gemini.api_key, "file-key");
        assert_eq!(gemini.model, "gemini-file");
        assert_eq!(gemini.endpoint, "http://file-endpoint");
        assert_eq!(gemini.timeout_secs, 5);
        assert_eq!(config.schema, SchemaVariant::Emoji);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.expose_error_details);
    }

    #[test]
    fn env_overrides_config_file() {
        let env = env_of(&[
            ("STEPWISE_DATABASE_URL", "postgresql://env:5432/envdb"),
            (ENV_GEMINI_API_KEY, "env-key"),
            (ENV_GEMINI_MODEL, "gemini-env"),
            (ENV_PLAN_SCHEMA, "PRIORITY"),
            (ENV_ENVIRONMENT, "production"),
        ]);
        let config =
            StepwiseConfig::resolve_from(&CliOverrides::default(), &full_file(), env).unwrap();
        assert_eq!(
            config.db_config.unwrap().database_url,
            "postgresql://env:5432/envdb"
        );
        let gemini = config.gemini.unwrap();
        assert_eq!(gemini.api_key, "env-key");
        assert_eq!(gemini.model, "gemini-env");
        assert_eq!(config.schema, SchemaVariant::Priority);
        assert!(!config.server.expose_error_details);
    }

    #[test]
    fn cli_flags_override_everything() {
        let overrides = CliOverrides {
            database_url: Some("postgresql://cli:5432/clidb".to_string()),
            bind: Some("::1".to_string()),
            port: Some(9000),
        };
        let env = env_of(&[("STEPWISE_DATABASE_URL", "postgresql://env:5432/envdb")]);
        let config = StepwiseConfig::resolve_from(&overrides, &full_file(), env).unwrap();
        assert_eq!(
            config.db_config.unwrap().database_url,
            "postgresql://cli:5432/clidb"
        );
        assert_eq!(config.server.bind, "::1");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn google_api_key_is_a_fallback() {
        let env = env_of(&[(ENV_GEMINI_API_KEY_FALLBACK, "google-key")]);
        let config =
            StepwiseConfig::resolve_from(&CliOverrides::default(), &ConfigFile::default(), env)
                .unwrap();
        let gemini = config.gemini.unwrap();
        assert_eq!(gemini.api_key, "google-key");
        assert_eq!(gemini.model, GeminiConfig::DEFAULT_MODEL);

        let env = env_of(&[
            (ENV_GEMINI_API_KEY_FALLBACK, "google-key"),
            (ENV_GEMINI_API_KEY, "stepwise-key"),
        ]);
        let config =
            StepwiseConfig::resolve_from(&CliOverrides::default(), &ConfigFile::default(), env)
                .unwrap();
        assert_eq!(config.gemini.unwrap().api_key, "stepwise-key");
    }

    #[test]
    fn blank_api_key_means_not_configured() {
        let env = env_of(&[(ENV_GEMINI_API_KEY, "  ")]);
        let mut file = ConfigFile::default();
        file.generator.api_key = Some(String::new());
        let config = StepwiseConfig::resolve_from(&CliOverrides::default(), &file, env).unwrap();
        assert_eq!(config.gemini, None);
    }

    #[test]
    fn development_env_exposes_error_details() {
        let env = env_of(&[(ENV_ENVIRONMENT, "Development")]);
        let config =
            StepwiseConfig::resolve_from(&CliOverrides::default(), &ConfigFile::default(), env)
                .unwrap();
        assert!(config.server.expose_error_details);
    }

    #[test]
    fn invalid_schema_env_is_an_error() {
        let env = env_of(&[(ENV_PLAN_SCHEMA, "kanban")]);
        let err =
            StepwiseConfig::resolve_from(&CliOverrides::default(), &ConfigFile::default(), env)
                .unwrap_err();
        assert!(
            format!("{err:#}").contains(ENV_PLAN_SCHEMA),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn partial_file_parses() {
        let file: ConfigFile = toml::from_str("[plan]\nschema = \"emoji\"\n").unwrap();
        assert_eq!(file.plan.schema, Some(SchemaVariant::Emoji));
        assert_eq!(file.database, DatabaseSection::default());
        assert_eq!(file.server, ServerSection::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let original = full_file();
        save_config_to(&original, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn saved_file_omits_unset_keys() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let mut config = ConfigFile::default();
        config.plan.schema = Some(SchemaVariant::Priority);
        save_config_to(&config, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("schema = \"priority\""));
        assert!(!contents.contains("api_key"));
        assert!(!contents.contains("url"));
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        save_config_to(&ConfigFile::default(), &path).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();
        assert!(load_config_from(&path).is_err());
    }

    #[test]
    fn config_path_honors_xdg_config_home() {
        let _lock = lock_env();

        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let path = config_path();
        let missing = load_config();

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        assert_eq!(path, tmp.path().join("stepwise").join("config.toml"));
        assert!(matches!(missing, Ok(None)));
    }

    #[test]
    fn mask_secret_keeps_ends() {
        assert_eq!(mask_secret("abcdefghijkl"), "abcd...ijkl");
        assert_eq!(mask_secret("short"), "*****");
    }
}
