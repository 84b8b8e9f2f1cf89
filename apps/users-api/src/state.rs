//! Shared application state.

use domain_users::{CredentialHasher, UserService};

use crate::config::Config;

/// Configuration plus the PostgreSQL pool; cloned into each router that needs it.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: database::postgres::DatabaseConnection,
}

impl AppState {
    /// Builds the user service with the configured Argon2 cost.
    pub fn user_service(&self) -> eyre::Result<UserService> {
        let hasher = CredentialHasher::with_params(
            self.config.hasher.memory_kib,
            self.config.hasher.iterations,
            self.config.hasher.parallelism,
        )
        .map_err(|e| eyre::eyre!("Invalid password hashing parameters: {}", e))?;

        Ok(UserService::new(self.db.clone(), hasher))
    }
}
