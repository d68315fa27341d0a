//! Process configuration, read once from the environment at startup.
//!
//! Every component receives its slice of this immutable struct at
//! construction; nothing reads the environment after `from_env` returns.
//! Missing required variables are fatal startup errors.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use send_emails_module::{SmtpConfig, DEFAULT_SENDER_NAME};

use crate::crm::UserSearchFilter;
use crate::week::DEFAULT_TZ_OFFSET_MINUTES;

pub const DEFAULT_FOLDER_PREFIX: &str = "visit-plan-reports";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_USER_PAUSE_MS: u64 = 250;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("environment variable {0} has an invalid value")]
    InvalidVar(&'static str),
}

#[derive(Debug, Clone)]
pub struct CrmConfig {
    pub host: String,
    pub access_key: String,
    pub secret_key: String,
    pub visit_plan_type: String,
    pub user_filter: UserSearchFilter,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub tenancy: String,
    pub user: String,
    pub fingerprint: String,
    pub private_key_path: PathBuf,
    pub region: String,
    pub bucket: String,
    pub folder_prefix: String,
    /// Overrides the regional endpoint; used by tests.
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub crm: CrmConfig,
    pub smtp: SmtpConfig,
    pub storage: StorageConfig,
    pub db: Option<DbConfig>,
    pub dry_run: bool,
    pub tz_offset: FixedOffset,
    pub report_dir: PathBuf,
    pub user_pause: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let crm = CrmConfig {
            host: require_var("LEADSQUARED_HOST")?,
            access_key: require_var("LSQ_ACCESS_KEY")?,
            secret_key: require_var("LSQ_SECRET_KEY")?,
            visit_plan_type: require_var("VISIT_PLAN_TYPE_ID")?,
            user_filter: UserSearchFilter {
                region: optional_var("LSQ_USER_REGION")
                    .unwrap_or_else(|| "West Bengal".to_string()),
                excluded_roles: optional_var("LSQ_EXCLUDED_ROLES")
                    .unwrap_or_else(|| "Administrator,Marketing_User".to_string())
                    .split(',')
                    .map(|role| role.trim().to_string())
                    .filter(|role| !role.is_empty())
                    .collect(),
                excluded_team: optional_var("LSQ_EXCLUDED_TEAM")
                    .unwrap_or_else(|| "Captain Steel India Limited".to_string()),
            },
        };

        let smtp = SmtpConfig {
            host: require_var("SMTP_HOST")?,
            port: parse_optional("SMTP_PORT")?.unwrap_or(DEFAULT_SMTP_PORT),
            username: require_var("SMTP_USER")?,
            password: require_var("SMTP_PASSWORD")?,
            sender_name: optional_var("SMTP_SENDER_NAME")
                .unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
        };

        let storage = StorageConfig {
            tenancy: require_var("OCI_TENANCY_OCID")?,
            user: require_var("OCI_USER_OCID")?,
            fingerprint: require_var("OCI_KEY_FINGERPRINT")?,
            private_key_path: PathBuf::from(require_var("OCI_PRIVATE_KEY_PATH")?),
            region: require_var("OCI_REGION")?,
            bucket: require_var("OCI_BUCKET_NAME")?,
            folder_prefix: optional_var("OCI_FOLDER_PATH")
                .unwrap_or_else(|| DEFAULT_FOLDER_PREFIX.to_string()),
            endpoint: optional_var("OCI_ENDPOINT"),
        };

        let db = match optional_var("DB_HOST") {
            Some(host) => Some(DbConfig {
                host,
                port: parse_optional("DB_PORT")?.unwrap_or(5432),
                user: require_var("DB_USER")?,
                password: require_var("DB_PASSWORD")?,
                name: require_var("DB_NAME")?,
                query: require_var("DB_QUERY")?,
            }),
            None => None,
        };

        let dry_run = match require_var("DRY_RUN")?.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => return Err(ConfigError::InvalidVar("DRY_RUN")),
        };

        let offset_minutes: i32 =
            parse_optional("REPORT_TZ_OFFSET_MINUTES")?.unwrap_or(DEFAULT_TZ_OFFSET_MINUTES);
        let tz_offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or(ConfigError::InvalidVar("REPORT_TZ_OFFSET_MINUTES"))?;

        let report_dir = optional_var("REPORT_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        let user_pause = Duration::from_millis(
            parse_optional("USER_FETCH_PAUSE_MS")?.unwrap_or(DEFAULT_USER_PAUSE_MS),
        );

        Ok(Self {
            crm,
            smtp,
            storage,
            db,
            dry_run,
            tz_offset,
            report_dir,
            user_pause,
        })
    }
}

fn require_var(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingVar(key))
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match optional_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar(key)),
        None => Ok(None),
    }
}
