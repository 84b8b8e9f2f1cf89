use core_config::{AppInfo, ConfigError, FromEnv, app_info, env_list, env_parse, server::ServerConfig};
use database::RetryConfig;
use database::postgres::PostgresConfig;
use domain_users::models::{DEFAULT_PER_PAGE, MAX_PER_PAGE};

pub use core_config::Environment;

/// Argon2 cost parameters (`PASSWORD_HASH_*`)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HasherConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        // argon2 crate defaults (OWASP minimum for Argon2id)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl FromEnv for HasherConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            memory_kib: env_parse("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env_parse("PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: env_parse("PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        })
    }
}

/// Page sizes of `GET /api/users`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaginationConfig {
    pub default_per_page: u64,
    pub max_per_page: u64,
}

impl FromEnv for PaginationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_per_page = env_parse("USERS_DEFAULT_PER_PAGE", DEFAULT_PER_PAGE)?;
        let max_per_page = env_parse("USERS_MAX_PER_PAGE", MAX_PER_PAGE)?;

        if max_per_page == 0 || default_per_page == 0 {
            return Err(ConfigError::InvalidValue {
                key: "USERS_DEFAULT_PER_PAGE".to_string(),
                details: "page sizes must be at least 1".to_string(),
            });
        }
        if default_per_page > max_per_page {
            return Err(ConfigError::InvalidValue {
                key: "USERS_DEFAULT_PER_PAGE".to_string(),
                details: format!(
                    "{} exceeds USERS_MAX_PER_PAGE ({})",
                    default_per_page, max_per_page
                ),
            });
        }

        Ok(Self {
            default_per_page,
            max_per_page,
        })
    }
}

/// Application-specific configuration
/// Composes shared config components from the `config` library
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    pub retry: RetryConfig,
    pub server: ServerConfig,
    pub environment: Environment,
    pub hasher: HasherConfig,
    pub pagination: PaginationConfig,
    pub run_migrations: bool,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // Required - will fail if not set
        let server = ServerConfig::from_env()?; // Uses defaults: HOST=0.0.0.0, PORT=8080

        Ok(Self {
            app: app_info!(),
            database,
            retry: RetryConfig::from_env()?,
            server,
            environment,
            hasher: HasherConfig::from_env()?,
            pagination: PaginationConfig::from_env()?,
            run_migrations: env_parse("RUN_MIGRATIONS", true)?,
            cors_origins: env_list("CORS_ALLOWED_ORIGIN"),
        })
    }
}
