use anyhow::{bail, Context};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "helpdesk.toml";
pub const CONFIG_PATH_ENV: &str = "HELPDESK_CONFIG";
pub const ENV_PREFIX: &str = "HELPDESK_";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Absent means tickets live in process memory.
    pub database_url: Option<String>,
    pub seed_path: Option<PathBuf>,
    pub sla: SlaConfig,
    pub lifecycle: LifecycleConfig,
    pub assignment: AssignmentConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaConfig {
    pub critical_hours: i64,
    pub high_hours: i64,
    pub medium_hours: i64,
    pub low_hours: i64,
    pub default_hours: i64,

    /// Six-field cron expression (seconds first).
    pub sweep_schedule: String,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            critical_hours: 2,
            high_hours: 4,
            medium_hours: 24,
            low_hours: 48,
            default_hours: 24,
            sweep_schedule: "0 */3 * * * *".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub reopen_window_business_days: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            reopen_window_business_days: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    pub strategy_timeout_secs: u64,
    pub llm: Option<LlmConfig>,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            strategy_timeout_secs: 20,
            llm: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
}

impl AppConfig {
    /// Defaults, then the TOML file, then `HELPDESK_*` variables.
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: AppConfig = figment.extract().context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        debug!("Loading configuration from {}", file.display());
        Self::from_figment(Self::figment(&file))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let sla = &self.sla;
        for (name, hours) in [
            ("critical_hours", sla.critical_hours),
            ("high_hours", sla.high_hours),
            ("medium_hours", sla.medium_hours),
            ("low_hours", sla.low_hours),
            ("default_hours", sla.default_hours),
        ] {
            if hours <= 0 {
                bail!("sla.{name} must be positive, got {hours}");
            }
        }

        cron::Schedule::from_str(&sla.sweep_schedule)
            .with_context(|| format!("Invalid sla.sweep_schedule '{}'", sla.sweep_schedule))?;

        if self.lifecycle.reopen_window_business_days < 0 {
            bail!("lifecycle.reopen_window_business_days cannot be negative");
        }
        if self.assignment.strategy_timeout_secs == 0 {
            bail!("assignment.strategy_timeout_secs must be at least 1");
        }
        Ok(())
    }
}
