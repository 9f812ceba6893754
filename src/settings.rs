use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
}

fn default_max_connections() -> u32 {
    10
}
fn default_connect_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct Upstream {
    pub base_url: String,
    pub partner_id: String,
    pub partner_contact: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_request_timeout_seconds() -> u64 {
    12
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    100
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            base_url: "https://api.tab.co.nz".to_string(),
            partner_id: String::new(),
            partner_contact: String::new(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerPool {
    #[serde(default = "default_worker_pool_size")]
    pub size: usize,
}

fn default_worker_pool_size() -> usize {
    num_cpus::get()
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self {
            size: default_worker_pool_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Scheduler {
    #[serde(default = "default_reevaluation_interval_ms")]
    pub reevaluation_interval_ms: u64,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    #[serde(default = "default_critical_interval_ms")]
    pub critical_interval_ms: u64,
    #[serde(default = "default_warning_interval_ms")]
    pub warning_interval_ms: u64,
    #[serde(default = "default_routine_interval_ms")]
    pub routine_interval_ms: u64,
}

fn default_reevaluation_interval_ms() -> u64 {
    60_000
}
fn default_shutdown_grace_ms() -> u64 {
    10_000
}
fn default_critical_interval_ms() -> u64 {
    15_000
}
fn default_warning_interval_ms() -> u64 {
    30_000
}
fn default_routine_interval_ms() -> u64 {
    60_000
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            reevaluation_interval_ms: default_reevaluation_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            critical_interval_ms: default_critical_interval_ms(),
            warning_interval_ms: default_warning_interval_ms(),
            routine_interval_ms: default_routine_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OddsDetector {
    #[serde(default = "default_min_delta")]
    pub min_delta: String,
}

fn default_min_delta() -> String {
    "0.01".to_string()
}

impl Default for OddsDetector {
    fn default() -> Self {
        Self {
            min_delta: default_min_delta(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Http {
    #[serde(default = "default_http_bind")]
    pub bind: String,
    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,
}

fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_compression_threshold_bytes() -> usize {
    1024
}

impl Default for Http {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            compression_threshold_bytes: default_compression_threshold_bytes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Log {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_false")]
    pub json: bool,
}

fn default_false() -> bool {
    false
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_false(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub database: Database,
    #[serde(default)]
    pub upstream: Upstream,
    #[serde(default)]
    pub worker_pool: WorkerPool,
    #[serde(default)]
    pub scheduler: Scheduler,
    #[serde(default)]
    pub odds_detector: OddsDetector,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub log: Log,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = env::var("RACEDAY_CONFIG_PATH").unwrap_or_else(|_| "Config.toml".to_string());
        let s = Config::builder()
            .add_source(File::with_name(&config_path).required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        if let Ok(url) = env::var("RACEDAY_DATABASE_URL") {
            if !url.trim().is_empty() {
                settings.database.url = url;
            }
        }
        if let Ok(raw) = env::var("RACEDAY_DATABASE_MAX_CONNECTIONS") {
            if let Ok(parsed) = raw.trim().parse() {
                settings.database.max_connections = parsed;
            }
        }
        if let Ok(base_url) = env::var("RACEDAY_UPSTREAM_BASE_URL") {
            if !base_url.trim().is_empty() {
                settings.upstream.base_url = base_url;
            }
        }
        if let Ok(partner_id) = env::var("RACEDAY_UPSTREAM_PARTNER_ID") {
            settings.upstream.partner_id = partner_id;
        }
        if let Ok(partner_contact) = env::var("RACEDAY_UPSTREAM_PARTNER_CONTACT") {
            settings.upstream.partner_contact = partner_contact;
        }
        if let Ok(raw) = env::var("RACEDAY_WORKER_POOL_SIZE") {
            if let Ok(parsed) = raw.trim().parse() {
                settings.worker_pool.size = parsed;
            }
        }
        if let Ok(raw) = env::var("RACEDAY_SCHEDULER_REEVALUATION_INTERVAL_MS") {
            if let Ok(parsed) = raw.trim().parse() {
                settings.scheduler.reevaluation_interval_ms = parsed;
            }
        }
        if let Ok(raw) = env::var("RACEDAY_HTTP_BIND") {
            if !raw.trim().is_empty() {
                settings.http.bind = raw;
            }
        }
        if let Ok(raw) = env::var("RACEDAY_LOG_LEVEL") {
            if !raw.trim().is_empty() {
                settings.log.level = raw;
            }
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_pool_default_follows_logical_cpus() {
        let wp = WorkerPool::default();
        assert_eq!(wp.size, num_cpus::get());
    }

    #[test]
    fn scheduler_defaults_match_interval_table() {
        let s = Scheduler::default();
        assert_eq!(s.critical_interval_ms, 15_000);
        assert_eq!(s.warning_interval_ms, 30_000);
        assert_eq!(s.routine_interval_ms, 60_000);
    }

    #[test]
    fn http_defaults_use_one_kib_threshold() {
        let h = Http::default();
        assert_eq!(h.compression_threshold_bytes, 1024);
    }

    #[test]
    fn new_reads_config_path_override_from_env() {
        let path = std::env::temp_dir().join(format!("raceday_test_config_{}.toml", std::process::id()));
        std::fs::write(&path, "[database]\nurl = \"postgres://from-custom-path\"\n").unwrap();

        env::set_var("RACEDAY_CONFIG_PATH", path.to_str().unwrap());
        let result = Settings::new();
        env::remove_var("RACEDAY_CONFIG_PATH");
        std::fs::remove_file(&path).ok();

        let settings = result.expect("settings should load from the overridden path");
        assert_eq!(settings.database.url, "postgres://from-custom-path");
    }
}
