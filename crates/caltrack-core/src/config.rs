use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::Schedule;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_FROM_EMAIL: &str = "calibration@company.com";
pub const SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";
pub const SESSION_COOKIE: &str = "caltrack_session";
pub const MIN_PASSWORD_LEN: usize = 8;

/// Top-level config (caltrack.toml + CALTRACK_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaltrackConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Outbound email settings.
///
/// With no `sendgrid_api_key` the gateway still starts; every send reports
/// failure and no reminder rows are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub sendgrid_api_key: Option<String>,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_sendgrid_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sendgrid_api_key: None,
            from_email: default_from_email(),
            api_base_url: default_sendgrid_base_url(),
            timeout_secs: default_mail_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Periodic trigger for the dispatcher. `None` leaves dispatch to the
    /// admin endpoint and the `send-reminders` CLI command.
    pub schedule: Option<Schedule>,
    /// Skip instruments that already have a sent reminder dated today.
    #[serde(default)]
    pub deduplicate_same_day: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,
    /// Mark the session cookie `Secure`. Off by default for plain-HTTP
    /// deployments behind a terminating proxy.
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default)]
    pub bootstrap_admin: BootstrapAdmin,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl(),
            cookie_secure: false,
            bootstrap_admin: BootstrapAdmin::default(),
        }
    }
}

/// Admin account created on first start when no admin exists yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
    pub department: Option<String>,
}

impl Default for BootstrapAdmin {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            email: "admin@company.com".to_string(),
            password: "change-me-now".to_string(),
            department: Some("IT".to_string()),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_from_email() -> String {
    DEFAULT_FROM_EMAIL.to_string()
}
fn default_sendgrid_base_url() -> String {
    SENDGRID_BASE_URL.to_string()
}
fn default_mail_timeout() -> u64 {
    10
}
fn default_session_ttl() -> i64 {
    12
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.caltrack/caltrack.db", home)
}

impl CaltrackConfig {
    /// Load config from a TOML file with env var overrides.
    ///
    /// Sources, later ones win:
    ///   1. the TOML file (explicit path or ~/.caltrack/caltrack.toml)
    ///   2. `SENDGRID_API_KEY` / `FROM_EMAIL` (legacy deployment variables)
    ///   3. `CALTRACK_*` with `__` between nesting levels,
    ///      e.g. `CALTRACK_MAIL__FROM_EMAIL`
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::CaltrackError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(
                Env::raw()
                    .only(&["SENDGRID_API_KEY", "FROM_EMAIL"])
                    .map(|key| format!("mail.{}", key.as_str().to_ascii_lowercase()).into()),
            )
            .merge(Env::prefixed("CALTRACK_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.caltrack/caltrack.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg: CaltrackConfig = Figment::new()
            .merge(Toml::file("/nonexistent/caltrack.toml"))
            .extract()
            .expect("defaults must extract");
        assert_eq!(cfg.gateway.port, DEFAULT_PORT);
        assert_eq!(cfg.mail.from_email, DEFAULT_FROM_EMAIL);
        assert!(cfg.mail.sendgrid_api_key.is_none());
        assert!(cfg.reminders.schedule.is_none());
        assert!(!cfg.reminders.deduplicate_same_day);
    }

    #[test]
    fn toml_schedule_is_parsed() {
        let toml = r#"
            [gateway]
            port = 9000

            [reminders]
            deduplicate_same_day = true
            schedule = { kind = "daily", hour = 7, minute = 30 }
        "#;
        let cfg: CaltrackConfig = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .expect("toml must extract");
        assert_eq!(cfg.gateway.port, 9000);
        assert!(cfg.reminders.deduplicate_same_day);
        assert!(matches!(
            cfg.reminders.schedule,
            Some(Schedule::Daily { hour: 7, minute: 30 })
        ));
    }
}
