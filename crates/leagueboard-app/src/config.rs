// Configuration loading and parsing (leagueboard.toml, credentials.toml).

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use leagueboard_core::{ManagerAlias, ManagerAliases, ScheduleConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

const CONFIG_FILE: &str = "leagueboard.toml";
const CREDENTIALS_FILE: &str = "credentials.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub league: LeagueConfig,
    pub upstream: UpstreamConfig,
    pub schedule: ScheduleConfig,
    /// Authorization headers sent with every manager lookup.
    pub upstream_headers: HeaderMap,
}

impl Config {
    pub fn aliases(&self) -> ManagerAliases {
        ManagerAliases::new(self.league.aliases.clone())
    }
}

// ---------------------------------------------------------------------------
// leagueboard.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire leagueboard.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    server: ServerSection,
    league: LeagueConfig,
    upstream: UpstreamConfig,
    #[serde(default)]
    schedule: ScheduleSection,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerSection {
    bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    /// Matchday served when a request omits `md`.
    #[serde(default = "default_matchday")]
    pub default_matchday: u32,
    /// Manager guids tracked by the league.
    pub managers: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<ManagerAlias>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Public catalog URL; `{matchday}` is substituted.
    pub catalog_url: String,
    /// Manager lookup URL; `{guid}`, `{matchday}` and `{phase}` are substituted.
    pub manager_url: String,
    #[serde(default = "default_phase")]
    pub phase_id: u32,
    #[serde(default = "default_catalog_timeout")]
    pub catalog_timeout_secs: u64,
    #[serde(default = "default_snapshot_timeout")]
    pub snapshot_timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ScheduleSection {
    #[serde(default = "default_trigger_times")]
    trigger_times: Vec<String>,
    #[serde(default = "default_poll_secs")]
    poll_interval_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    cooldown_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        ScheduleSection {
            trigger_times: default_trigger_times(),
            poll_interval_secs: default_poll_secs(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_matchday() -> u32 {
    10
}

fn default_phase() -> u32 {
    1
}

fn default_catalog_timeout() -> u64 {
    15
}

fn default_snapshot_timeout() -> u64 {
    10
}

fn default_trigger_times() -> Vec<String> {
    vec!["21:45".into(), "23:15".into(), "09:00".into()]
}

fn default_poll_secs() -> u64 {
    30
}

fn default_cooldown_secs() -> u64 {
    90
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
struct CredentialsFile {
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/leagueboard.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- leagueboard.toml (required) ---
    let config_path = config_dir.join(CONFIG_FILE);
    let text = read_file(&config_path)?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join(CREDENTIALS_FILE);
    let credentials: CredentialsFile = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsFile::default()
    };

    let bind_addr = file
        .server
        .bind
        .parse::<SocketAddr>()
        .map_err(|e| invalid("server.bind", format!("{e}: {}", file.server.bind)))?;

    let schedule = ScheduleConfig {
        trigger_times: parse_trigger_times(&file.schedule.trigger_times)?,
        poll_interval: Duration::from_secs(file.schedule.poll_interval_secs),
        cooldown: Duration::from_secs(file.schedule.cooldown_secs),
        default_matchday: file.league.default_matchday,
    };

    let config = Config {
        bind_addr,
        upstream_headers: build_headers(&credentials.headers)?,
        league: file.league,
        upstream: file.upstream,
        schedule,
    };

    validate(&config)?;

    Ok(config)
}

/// Seeds `config/` from `defaults/` on first run. Only the files this module
/// reads are seeded (`leagueboard.toml`, and `credentials.toml` when a
/// deployment ships one); a file already in `config/` is never overwritten.
/// Returns the paths written.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(seed_error(format!(
            "no defaults/ or config/ directory under {}",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| seed_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut seeded = Vec::new();
    for name in [CONFIG_FILE, CREDENTIALS_FILE] {
        let source = defaults_dir.join(name);
        let target = config_dir.join(name);
        if !source.is_file() || target.exists() {
            continue;
        }
        std::fs::copy(&source, &target)
            .map_err(|e| seed_error(format!("cannot seed {}: {e}", target.display())))?;
        info!(file = %target.display(), "seeded config from defaults");
        seeded.push(target);
    }

    Ok(seeded)
}

fn seed_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn parse_trigger_times(raw: &[String]) -> Result<Vec<NaiveTime>, ConfigError> {
    raw.iter()
        .map(|s| {
            NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| {
                invalid(
                    "schedule.trigger_times",
                    format!("expected HH:MM, got {s:?}"),
                )
            })
        })
        .collect()
}

fn build_headers(raw: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    for (name, value) in raw {
        let field = format!("headers.{name}");
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| invalid(&field, "not a valid header name"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| invalid(&field, "not a valid header value"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.managers.is_empty() {
        return Err(invalid("league.managers", "at least one manager is required"));
    }
    if config.league.managers.iter().any(|m| m.trim().is_empty()) {
        return Err(invalid("league.managers", "manager ids must not be blank"));
    }

    if !config.upstream.catalog_url.contains("{matchday}") {
        return Err(invalid(
            "upstream.catalog_url",
            "must contain a {matchday} placeholder",
        ));
    }
    for placeholder in ["{guid}", "{matchday}"] {
        if !config.upstream.manager_url.contains(placeholder) {
            return Err(invalid(
                "upstream.manager_url",
                format!("must contain a {placeholder} placeholder"),
            ));
        }
    }

    let durations: &[(&str, u64)] = &[
        ("upstream.catalog_timeout_secs", config.upstream.catalog_timeout_secs),
        ("upstream.snapshot_timeout_secs", config.upstream.snapshot_timeout_secs),
        ("schedule.poll_interval_secs", config.schedule.poll_interval.as_secs()),
        ("schedule.cooldown_secs", config.schedule.cooldown.as_secs()),
    ];
    for (name, val) in durations {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }

    // A cooldown of a minute or less could fire twice in one trigger minute.
    if config.schedule.cooldown.as_secs() <= 60 {
        return Err(invalid(
            "schedule.cooldown_secs",
            format!("must exceed 60, got {}", config.schedule.cooldown.as_secs()),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Returns the leagueboard-app crate root (works whether `cargo test`
    /// runs from the crate root or the workspace root).
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("crates/leagueboard-app/defaults").exists() {
            cwd.join("crates/leagueboard-app")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Fresh temp dir with `config/` containing the default leagueboard.toml,
    /// optionally rewritten by `edit`.
    fn temp_config(name: &str, edit: impl Fn(String) -> String) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();

        let text = fs::read_to_string(project_root().join("defaults").join(CONFIG_FILE)).unwrap();
        fs::write(config_dir.join(CONFIG_FILE), edit(text)).unwrap();
        tmp
    }

    fn expect_validation_field(base: &Path, expected: &str) {
        match load_config_from(base).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_defaults() {
        let tmp = temp_config("leagueboard_config_defaults", |t| t);
        let config = load_config_from(&tmp).expect("defaults should load");

        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.league.default_matchday, 10);
        assert_eq!(config.league.managers.len(), 5);
        assert_eq!(config.league.aliases.len(), 5);
        assert_eq!(config.upstream.phase_id, 1);
        assert_eq!(config.upstream.catalog_timeout(), Duration::from_secs(15));
        assert_eq!(config.upstream.snapshot_timeout(), Duration::from_secs(10));
        assert_eq!(config.schedule.trigger_times.len(), 3);
        assert_eq!(
            config.schedule.trigger_times[0],
            NaiveTime::from_hms_opt(21, 45, 0).unwrap()
        );
        assert_eq!(config.schedule.poll_interval, Duration::from_secs(30));
        assert_eq!(config.schedule.cooldown, Duration::from_secs(90));
        assert_eq!(config.schedule.default_matchday, 10);
        assert!(config.upstream_headers.is_empty());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn aliases_keep_file_order() {
        let tmp = temp_config("leagueboard_config_aliases", |t| t);
        let config = load_config_from(&tmp).unwrap();
        let aliases = config.aliases();
        assert_eq!(aliases.remap("Memedine Zidane"), "Radu");
        assert_eq!(aliases.remap("nobody"), "nobody");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_headers_are_loaded() {
        let tmp = temp_config("leagueboard_config_creds", |t| t);
        fs::write(
            tmp.join("config").join(CREDENTIALS_FILE),
            "[headers]\n\"x-session-token\" = \"abc123\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(
            config.upstream_headers.get("x-session-token").unwrap(),
            "abc123"
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_bad_header_name() {
        let tmp = temp_config("leagueboard_config_bad_header", |t| t);
        fs::write(
            tmp.join("config").join(CREDENTIALS_FILE),
            "[headers]\n\"bad header\" = \"x\"\n",
        )
        .unwrap();

        expect_validation_field(&tmp, "headers.bad header");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn schedule_section_is_optional() {
        let tmp = temp_config("leagueboard_config_no_schedule", |t| {
            let cut = t.find("[schedule]").unwrap();
            t[..cut].to_string()
        });
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.schedule.trigger_times.len(), 3);
        assert_eq!(config.schedule.cooldown, Duration::from_secs(90));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_bad_trigger_time() {
        let tmp = temp_config("leagueboard_config_bad_time", |t| {
            t.replace("\"23:15\"", "\"quarter past\"")
        });
        expect_validation_field(&tmp, "schedule.trigger_times");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_short_cooldown() {
        let tmp = temp_config("leagueboard_config_short_cooldown", |t| {
            t.replace("cooldown_secs = 90", "cooldown_secs = 45")
        });
        expect_validation_field(&tmp, "schedule.cooldown_secs");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_timeout() {
        let tmp = temp_config("leagueboard_config_zero_timeout", |t| {
            t.replace("catalog_timeout_secs = 15", "catalog_timeout_secs = 0")
        });
        expect_validation_field(&tmp, "upstream.catalog_timeout_secs");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_manager_list() {
        let tmp = temp_config("leagueboard_config_no_managers", |t| {
            let start = t.find("managers = [").unwrap();
            let end = start + t[start..].find(']').unwrap() + 1;
            format!("{}managers = []{}", &t[..start], &t[end..])
        });
        expect_validation_field(&tmp, "league.managers");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_bad_bind_address() {
        let tmp = temp_config("leagueboard_config_bad_bind", |t| {
            t.replace("bind = \"127.0.0.1:8000\"", "bind = \"localhost\"")
        });
        expect_validation_field(&tmp, "server.bind");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_config_file_reported() {
        let tmp = std::env::temp_dir().join("leagueboard_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        assert!(matches!(
            load_config_from(&tmp).unwrap_err(),
            ConfigError::FileNotFound { .. }
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_defaults_once() {
        let tmp = std::env::temp_dir().join("leagueboard_config_copy");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();

        let root = project_root();
        fs::copy(
            root.join("defaults").join(CONFIG_FILE),
            tmp.join("defaults").join(CONFIG_FILE),
        )
        .unwrap();
        fs::copy(
            root.join("defaults/credentials.toml.example"),
            tmp.join("defaults/credentials.toml.example"),
        )
        .unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config").join(CONFIG_FILE)]);
        assert!(!tmp.join("config/credentials.toml.example").exists());

        // Second run leaves the existing file alone.
        assert!(ensure_config_files(&tmp).unwrap().is_empty());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_keeps_edited_config() {
        let tmp = std::env::temp_dir().join("leagueboard_config_keep_edits");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("defaults").join(CONFIG_FILE), "# shipped").unwrap();
        fs::write(tmp.join("defaults").join(CREDENTIALS_FILE), "[headers]").unwrap();
        fs::write(tmp.join("config").join(CONFIG_FILE), "# edited").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config").join(CREDENTIALS_FILE)]);
        assert_eq!(
            fs::read_to_string(tmp.join("config").join(CONFIG_FILE)).unwrap(),
            "# edited"
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_needs_a_directory() {
        let tmp = std::env::temp_dir().join("leagueboard_config_no_dirs");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        assert!(matches!(
            ensure_config_files(&tmp),
            Err(ConfigError::DefaultsCopyError { .. })
        ));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_manager_url_without_matchday() {
        let tmp = temp_config("leagueboard_config_manager_url", |t| {
            t.replace("matchdayId={matchday}", "matchdayId=1")
        });
        expect_validation_field(&tmp, "upstream.manager_url");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_example_is_valid() {
        let text =
            fs::read_to_string(project_root().join("defaults/credentials.toml.example")).unwrap();
        let parsed: CredentialsFile = toml::from_str(&text).unwrap();
        assert!(build_headers(&parsed.headers).is_ok());
    }
}
