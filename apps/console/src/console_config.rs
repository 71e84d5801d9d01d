use std::env;
use std::time::Duration;

use gatekeep_application::AdminViewOptions;
use gatekeep_core::{AppError, UserIdentity};
use gatekeep_infrastructure::HttpDirectoryStoreConfig;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone)]
pub enum DirectoryBackendConfig {
    Memory,
    Http(HttpDirectoryStoreConfig),
}

#[derive(Debug, Clone)]
pub struct SeedAdminConfig {
    pub subject: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub directory_backend: DirectoryBackendConfig,
    pub dev_profile: UserIdentity,
    pub seed_admin: Option<SeedAdminConfig>,
    pub admin_view: AdminViewOptions,
}

impl ConsoleConfig {
    pub fn load() -> Result<Self, AppError> {
        let directory_backend = match env::var("DIRECTORY_BACKEND")
            .unwrap_or_else(|_| "memory".to_owned())
            .as_str()
        {
            "memory" => DirectoryBackendConfig::Memory,
            "http" => {
                let base_url = required_non_empty_env("DIRECTORY_BASE_URL")?;
                let base_url = Url::parse(&base_url).map_err(|error| {
                    AppError::Validation(format!("invalid DIRECTORY_BASE_URL: {error}"))
                })?;
                let timeout_secs = env::var("DIRECTORY_TIMEOUT_SECS")
                    .ok()
                    .map(|value| {
                        value.parse::<u64>().map_err(|error| {
                            AppError::Validation(format!("invalid DIRECTORY_TIMEOUT_SECS: {error}"))
                        })
                    })
                    .transpose()?
                    .unwrap_or(10);

                DirectoryBackendConfig::Http(HttpDirectoryStoreConfig {
                    base_url,
                    api_token: optional_non_empty_env("DIRECTORY_API_TOKEN"),
                    timeout: Duration::from_secs(timeout_secs.max(1)),
                })
            }
            other => {
                return Err(AppError::Validation(format!(
                    "DIRECTORY_BACKEND must be either 'memory' or 'http', got '{other}'"
                )));
            }
        };

        let dev_subject = required_non_empty_env("DEV_SUBJECT")?;
        let dev_display_name =
            optional_non_empty_env("DEV_DISPLAY_NAME").unwrap_or_else(|| dev_subject.clone());
        let dev_profile = UserIdentity::new(
            dev_subject,
            dev_display_name,
            optional_non_empty_env("DEV_EMAIL"),
            optional_non_empty_env("DEV_AVATAR_URL"),
        );

        let seed_admin =
            optional_non_empty_env("DEV_SEED_ADMIN_SUBJECT").map(|subject| SeedAdminConfig {
                subject,
                email: optional_non_empty_env("DEV_SEED_ADMIN_EMAIL"),
            });

        let optimistic_toggle = env::var("ADMIN_OPTIMISTIC_TOGGLE")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");

        Ok(Self {
            directory_backend,
            dev_profile,
            seed_admin,
            admin_view: AdminViewOptions { optimistic_toggle },
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn optional_non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
