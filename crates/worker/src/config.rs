use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Avatar attached to Discord messages, if set.
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            avatar_url: None,
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// How often the full host set is re-probed.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// How often reminders are scheduled and dispatched.
    #[serde(default = "default_notify_interval_secs")]
    pub notify_interval_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Maximum simultaneous in-flight probes.
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

fn default_poll_interval_secs() -> u64 {
    crate::poller::DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_notify_interval_secs() -> u64 {
    crate::notifier::DEFAULT_NOTIFY_INTERVAL.as_secs()
}

fn default_probe_timeout_secs() -> u64 {
    crate::probe::PROBE_TIMEOUT.as_secs()
}

fn default_probe_concurrency() -> usize {
    crate::poller::DEFAULT_PROBE_BUDGET
}

fn default_send_timeout_secs() -> u64 {
    crate::webhook::DEFAULT_SEND_TIMEOUT.as_secs()
}

/// Load configuration from `config.yaml` (optional) plus environment
/// overrides; any var matching the key path with `__` separators (e.g.
/// `WEBHOOK__AVATAR_URL`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    validate(&app)?;
    Ok(app)
}

fn validate(app: &AppConfig) -> Result<(), ConfigError> {
    if app.database_url.is_empty() {
        return Err(ConfigError::Validation("database_url must be set".into()));
    }
    if app.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "poll_interval_secs must be > 0".into(),
        ));
    }
    if app.notify_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "notify_interval_secs must be > 0".into(),
        ));
    }
    if app.probe_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "probe_timeout_secs must be > 0".into(),
        ));
    }
    if app.probe_concurrency == 0 {
        return Err(ConfigError::Validation(
            "probe_concurrency must be > 0".into(),
        ));
    }
    if app.webhook.send_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "webhook.send_timeout_secs must be > 0".into(),
        ));
    }
    Ok(())
}
