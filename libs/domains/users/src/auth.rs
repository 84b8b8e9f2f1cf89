//! Registration, login and bearer-credential resolution.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::{UserError, UserResult};
use crate::models::{NewUser, Role, User};
use crate::service::UserService;
use crate::tokens::{AccessTokenStore, PlainTextToken};

/// Name recorded on tokens issued by register and login
pub const TOKEN_NAME: &str = "auth_token";

/// Plaintext behind the decoy digest verified when there is no real one
const DECOY_PASSWORD: &str = "decoy-password-never-matches";

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user: User,
    /// Token the request presented; logout revokes exactly this one
    pub token_id: i64,
}

impl Principal {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }

    pub fn require_admin(&self) -> UserResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(UserError::Forbidden(
                "This action is unauthorized.".to_string(),
            ))
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    tokens: AccessTokenStore,
    /// Hashed on first use with the configured parameters
    decoy_digest: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(users: UserService) -> Self {
        Self {
            users,
            tokens: AccessTokenStore::new(),
            decoy_digest: Arc::new(OnceCell::new()),
        }
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    /// Self-registration. The role is always `user` and there is no actor.
    pub async fn register(
        &self,
        name: String,
        email: String,
        password: String,
    ) -> UserResult<(User, PlainTextToken)> {
        let user = self
            .users
            .create_user(
                NewUser {
                    name,
                    email,
                    password: Some(password),
                    role: Some(Role::User),
                },
                None,
            )
            .await?;

        let token = self.tokens.issue(self.users.db(), user.id, TOKEN_NAME).await?;
        info!(user_id = user.id, "User registered");
        Ok((user, token))
    }

    /// Fails with [`UserError::InvalidCredentials`] whether the email is unknown,
    /// the account has no password, or the password is wrong.
    pub async fn login(&self, email: &str, password: String) -> UserResult<(User, PlainTextToken)> {
        let Some(user) = self.users.find_user_by_email(email).await? else {
            self.verify_decoy(password).await?;
            warn!("Login failed: unknown email");
            return Err(UserError::InvalidCredentials);
        };
        let Some(digest) = user.password_hash.clone() else {
            self.verify_decoy(password).await?;
            warn!(user_id = user.id, "Login failed: account has no password");
            return Err(UserError::InvalidCredentials);
        };

        if !self.users.hasher().verify_blocking(password, digest).await? {
            warn!(user_id = user.id, "Login failed: wrong password");
            return Err(UserError::InvalidCredentials);
        }

        let token = self.tokens.issue(self.users.db(), user.id, TOKEN_NAME).await?;
        info!(user_id = user.id, token_id = token.token_id, "User logged in");
        Ok((user, token))
    }

    /// Spends one Argon2 verification so a failed login costs the same
    /// whether or not a real digest exists.
    async fn verify_decoy(&self, password: String) -> UserResult<()> {
        let decoy = self
            .decoy_digest
            .get_or_try_init(|| self.users.hasher().hash_blocking(DECOY_PASSWORD.to_string()))
            .await?
            .clone();
        self.users.hasher().verify_blocking(password, decoy).await?;
        Ok(())
    }

    /// Resolves a bearer credential and records its use.
    pub async fn authenticate(&self, credential: &str) -> UserResult<Principal> {
        let resolved = self
            .tokens
            .resolve(self.users.db(), credential)
            .await?
            .ok_or(UserError::Unauthenticated)?;

        let user = match self.users.get_user_by_id(resolved.user_id).await {
            Ok(user) => user,
            Err(UserError::NotFound(_)) => return Err(UserError::Unauthenticated),
            Err(e) => return Err(e),
        };

        self.tokens.touch(self.users.db(), resolved.token_id).await?;
        Ok(Principal {
            user,
            token_id: resolved.token_id,
        })
    }

    pub async fn current_user(&self, credential: &str) -> UserResult<User> {
        Ok(self.authenticate(credential).await?.user)
    }

    /// Revokes only the token the principal authenticated with.
    pub async fn logout(&self, principal: &Principal) -> UserResult<()> {
        let revoked = self
            .tokens
            .revoke(self.users.db(), principal.token_id)
            .await?;
        info!(user_id = principal.id(), token_id = principal.token_id, revoked, "User logged out");
        Ok(())
    }

    /// Revokes every token of `user_id`, returning how many were removed.
    pub async fn logout_everywhere(&self, user_id: i64) -> UserResult<u64> {
        let revoked = self
            .tokens
            .revoke_all_for_user(self.users.db(), user_id)
            .await?;
        info!(user_id, revoked, "Revoked all tokens");
        Ok(revoked)
    }
}
