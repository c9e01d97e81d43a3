use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_BEACONHUB_CONFIG: &str = "BEACONHUB_CONFIG";

const DEFAULT_HTTP_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DEVICE_PASS_INTERVAL_SECS: u64 = 60;
const DEFAULT_RECEIVER_PASS_INTERVAL_SECS: u64 = 60;
const DEFAULT_GEOCODE_PASS_INTERVAL_SECS: u64 = 3_600;
const DEFAULT_NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_NOMINATIM_USER_AGENT: &str = "beaconhub";
const DEFAULT_NOMINATIM_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BeaconhubConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub http: HttpConfigToml,
    #[serde(default)]
    pub reconcile: ReconcileConfigToml,
    #[serde(default)]
    pub geocode: GeocodeConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpConfigToml {
    #[serde(default = "default_http_bind_addr")]
    pub bind_addr: String,
}

impl Default for HttpConfigToml {
    fn default() -> Self {
        Self {
            bind_addr: default_http_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileConfigToml {
    #[serde(default = "default_device_pass_interval_secs")]
    pub device_pass_interval_secs: u64,
    #[serde(default = "default_receiver_pass_interval_secs")]
    pub receiver_pass_interval_secs: u64,
}

impl Default for ReconcileConfigToml {
    fn default() -> Self {
        Self {
            device_pass_interval_secs: default_device_pass_interval_secs(),
            receiver_pass_interval_secs: default_receiver_pass_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeocodeConfigToml {
    #[serde(default = "default_geocode_pass_interval_secs")]
    pub pass_interval_secs: u64,
    #[serde(default = "default_nominatim_base_url")]
    pub nominatim_base_url: String,
    #[serde(default = "default_nominatim_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_nominatim_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GeocodeConfigToml {
    fn default() -> Self {
        Self {
            pass_interval_secs: default_geocode_pass_interval_secs(),
            nominatim_base_url: default_nominatim_base_url(),
            user_agent: default_nominatim_user_agent(),
            request_timeout_secs: default_nominatim_timeout_secs(),
        }
    }
}

impl Default for BeaconhubConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            http: HttpConfigToml::default(),
            reconcile: ReconcileConfigToml::default(),
            geocode: GeocodeConfigToml::default(),
        }
    }
}

pub fn load_from_env() -> Result<BeaconhubConfig, ConfigError> {
    let path = config_path_from_env()?;
    load_from_path(path)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<BeaconhubConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home.join(".config").join("beaconhub").join("config.toml"))
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_BEACONHUB_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "BEACONHUB_CONFIG contained invalid UTF-8",
        )),
    }
}

fn default_beaconhub_data_dir() -> PathBuf {
    resolve_data_local_dir().join("beaconhub")
}

fn resolve_data_local_dir() -> PathBuf {
    if let Ok(path) = std::env::var("XDG_DATA_HOME") {
        let path = path.trim();
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Some(home) = resolve_home_dir() {
        return home.join(".local").join("share");
    }

    std::env::temp_dir()
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

fn default_database_path() -> String {
    default_beaconhub_data_dir()
        .join("beaconhub.db")
        .to_string_lossy()
        .to_string()
}

fn default_http_bind_addr() -> String {
    DEFAULT_HTTP_BIND_ADDR.to_owned()
}

fn default_device_pass_interval_secs() -> u64 {
    DEFAULT_DEVICE_PASS_INTERVAL_SECS
}

fn default_receiver_pass_interval_secs() -> u64 {
    DEFAULT_RECEIVER_PASS_INTERVAL_SECS
}

fn default_geocode_pass_interval_secs() -> u64 {
    DEFAULT_GEOCODE_PASS_INTERVAL_SECS
}

fn default_nominatim_base_url() -> String {
    DEFAULT_NOMINATIM_BASE_URL.to_owned()
}

fn default_nominatim_user_agent() -> String {
    DEFAULT_NOMINATIM_USER_AGENT.to_owned()
}

fn default_nominatim_timeout_secs() -> u64 {
    DEFAULT_NOMINATIM_TIMEOUT_SECS
}

fn persist_config(path: &Path, config: &BeaconhubConfig) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize BEACONHUB_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write BEACONHUB_CONFIG to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> Result<BeaconhubConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for BEACONHUB_CONFIG: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = BeaconhubConfig::default();
            persist_config(path, &default_config)?;

            toml::to_string_pretty(&default_config).map_err(|err| {
                ConfigError::configuration(format!(
                    "Failed to serialize default BEACONHUB_CONFIG: {err}"
                ))
            })?
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read BEACONHUB_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: BeaconhubConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse BEACONHUB_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    let changed = normalize_config(&mut config)?;
    if changed {
        persist_config(path, &config)?;
    }

    Ok(config)
}

fn normalize_config(config: &mut BeaconhubConfig) -> Result<bool, ConfigError> {
    let mut changed = false;

    changed |= normalize_non_empty_string(&mut config.database_path, default_database_path());
    changed |= normalize_non_empty_string(&mut config.http.bind_addr, default_http_bind_addr());

    config
        .http
        .bind_addr
        .parse::<std::net::SocketAddr>()
        .map_err(|err| {
            ConfigError::configuration(format!(
                "Invalid `http.bind_addr` value '{}' in BEACONHUB_CONFIG: {err}",
                config.http.bind_addr
            ))
        })?;

    if config.reconcile.device_pass_interval_secs == 0 {
        config.reconcile.device_pass_interval_secs = default_device_pass_interval_secs();
        changed = true;
    }
    if config.reconcile.receiver_pass_interval_secs == 0 {
        config.reconcile.receiver_pass_interval_secs = default_receiver_pass_interval_secs();
        changed = true;
    }
    if config.geocode.pass_interval_secs == 0 {
        config.geocode.pass_interval_secs = default_geocode_pass_interval_secs();
        changed = true;
    }

    changed |= normalize_non_empty_string(
        &mut config.geocode.nominatim_base_url,
        default_nominatim_base_url(),
    );
    changed |= normalize_non_empty_string(
        &mut config.geocode.user_agent,
        default_nominatim_user_agent(),
    );
    let normalized_timeout = if config.geocode.request_timeout_secs == 0 {
        default_nominatim_timeout_secs()
    } else {
        config.geocode.request_timeout_secs.clamp(1, 120)
    };
    if normalized_timeout != config.geocode.request_timeout_secs {
        config.geocode.request_timeout_secs = normalized_timeout;
        changed = true;
    }

    Ok(changed)
}

fn normalize_non_empty_string(value: &mut String, default: String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        if *value != default {
            *value = default;
            return true;
        }
        return false;
    }

    if trimmed != value {
        *value = trimmed.to_owned();
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::{Mutex, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn with_env_vars<F>(vars: &[(&str, Option<&str>)], test: F)
    where
        F: FnOnce(),
    {
        let _guard = env_lock().lock().expect("env lock");
        let backup = vars
            .iter()
            .map(|(name, _)| ((*name).to_owned(), std::env::var(name).ok()))
            .collect::<Vec<_>>();

        for (name, value) in vars {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }

        test();

        for (name, value) in backup {
            match value {
                Some(value) => std::env::set_var(&name, value),
                None => std::env::remove_var(&name),
            }
        }
    }

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "beaconhub-config-{prefix}-{nanos}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).expect("create temp dir");
        path
    }

    fn remove_temp_path(path: &Path) {
        let _ = std::fs::remove_dir_all(path);
    }

    fn write_config_file(path: &Path, raw: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture config parent");
        }
        std::fs::write(path, raw.as_bytes()).expect("write fixture config");
    }

    #[test]
    fn load_from_env_creates_default_config_when_missing() {
        let home = unique_temp_dir("home-defaults");
        let expected = home.join(".config").join("beaconhub").join("config.toml");

        with_env_vars(
            &[
                ("HOME", Some(home.to_str().expect("home path"))),
                ("USERPROFILE", None),
                (ENV_BEACONHUB_CONFIG, None),
                ("XDG_DATA_HOME", None),
            ],
            || {
                let config = load_from_env().expect("load defaults");
                assert_eq!(config.http.bind_addr, "127.0.0.1:8080");
                assert_eq!(config.reconcile.device_pass_interval_secs, 60);
                assert_eq!(config.geocode.pass_interval_secs, 3_600);
                assert!(expected.exists());
            },
        );

        remove_temp_path(&home);
    }

    #[test]
    fn load_from_env_honors_explicit_beaconhub_config_path() {
        let home = unique_temp_dir("home-explicit-path");
        let root = unique_temp_dir("explicit-path");
        let explicit = root.join("nested").join("custom.toml");
        let default = home.join(".config").join("beaconhub").join("config.toml");

        with_env_vars(
            &[
                ("HOME", Some(home.to_str().expect("home path"))),
                ("USERPROFILE", None),
                (
                    ENV_BEACONHUB_CONFIG,
                    Some(explicit.to_str().expect("config path")),
                ),
                ("XDG_DATA_HOME", None),
            ],
            || {
                let config = load_from_env().expect("load explicit path config");
                assert!(explicit.exists());
                assert!(!default.exists());
                assert_eq!(config.http.bind_addr, "127.0.0.1:8080");
            },
        );

        remove_temp_path(&home);
        remove_temp_path(&root);
    }

    #[test]
    fn load_from_env_treats_blank_beaconhub_config_as_unset() {
        let home = unique_temp_dir("home-blank-path");
        let expected = home.join(".config").join("beaconhub").join("config.toml");

        with_env_vars(
            &[
                ("HOME", Some(home.to_str().expect("home path"))),
                ("USERPROFILE", None),
                (ENV_BEACONHUB_CONFIG, Some("  ")),
                ("XDG_DATA_HOME", None),
            ],
            || {
                let config = load_from_env().expect("load config from default path");
                assert!(expected.exists());
                assert_eq!(config.http.bind_addr, "127.0.0.1:8080");
            },
        );

        remove_temp_path(&home);
    }

    #[test]
    fn load_from_path_returns_parse_error_for_invalid_toml() {
        let root = unique_temp_dir("invalid");
        let path = root.join("config.toml");
        write_config_file(&path, "database_path = [\n");

        let error = load_from_path(&path).expect_err("expected parse failure");
        assert!(error
            .to_string()
            .contains("Failed to parse BEACONHUB_CONFIG"));

        remove_temp_path(&root);
    }

    #[test]
    fn load_from_path_rejects_unparseable_bind_addr() {
        let root = unique_temp_dir("bad-bind-addr");
        let path = root.join("config.toml");
        write_config_file(
            &path,
            "database_path = '/tmp/beacons.db'\n\n[http]\nbind_addr = 'not-an-addr'\n",
        );

        let error = load_from_path(&path).expect_err("invalid bind addr should be rejected");
        assert!(error.to_string().contains("http.bind_addr"));

        remove_temp_path(&root);
    }

    #[test]
    fn load_from_path_normalizes_and_persists_supported_bounds() {
        let root = unique_temp_dir("normalization");
        let path = root.join("config.toml");
        write_config_file(
            &path,
            r#"
database_path = "  /tmp/beacons.db  "

[http]
bind_addr = " 0.0.0.0:9000 "

[reconcile]
device_pass_interval_secs = 0
receiver_pass_interval_secs = 0

[geocode]
pass_interval_secs = 0
nominatim_base_url = "   "
user_agent = ""
request_timeout_secs = 900
"#,
        );

        let config = load_from_path(&path).expect("load and normalize config");

        assert_eq!(config.database_path, "/tmp/beacons.db");
        assert_eq!(config.http.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.reconcile.device_pass_interval_secs, 60);
        assert_eq!(config.reconcile.receiver_pass_interval_secs, 60);
        assert_eq!(config.geocode.pass_interval_secs, 3_600);
        assert_eq!(
            config.geocode.nominatim_base_url,
            "https://nominatim.openstreetmap.org"
        );
        assert_eq!(config.geocode.user_agent, "beaconhub");
        assert_eq!(config.geocode.request_timeout_secs, 120);

        let persisted = std::fs::read_to_string(&path).expect("read persisted config");
        let parsed: BeaconhubConfig =
            toml::from_str(&persisted).expect("parse persisted normalized config");
        assert_eq!(parsed.http.bind_addr, "0.0.0.0:9000");
        assert_eq!(parsed.geocode.request_timeout_secs, 120);

        remove_temp_path(&root);
    }
}
