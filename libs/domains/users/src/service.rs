//! User lifecycle: every mutation and its audit entry commit or roll back together.

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{info, warn};

use crate::audit::{AuditLogStore, AuditRecord};
use crate::error::{UserError, UserResult};
use crate::hasher::CredentialHasher;
use crate::models::{NewUser, User, UserChanges, UserPage};
use crate::repository::{NewUserRecord, UserPatch, UserRepository};

/// Business rules around user accounts.
///
/// `actor` is the id of the authenticated principal performing a mutation,
/// or `None` for unauthenticated flows such as self-registration.
#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
    users: UserRepository,
    audit: AuditLogStore,
    hasher: CredentialHasher,
}

impl UserService {
    pub fn new(db: DatabaseConnection, hasher: CredentialHasher) -> Self {
        Self {
            db,
            users: UserRepository::new(),
            audit: AuditLogStore::new(),
            hasher,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    pub fn audit(&self) -> &AuditLogStore {
        &self.audit
    }

    /// Creates an account. The role defaults to `user`; a supplied password is
    /// hashed before the transaction opens.
    pub async fn create_user(&self, input: NewUser, actor: Option<i64>) -> UserResult<User> {
        let name = normalize_name(&input.name)?;
        let email = normalize_email(&input.email)?;
        let password_hash = match input.password {
            Some(password) => Some(self.hasher.hash_blocking(password).await?),
            None => None,
        };

        let txn = self.db.begin().await?;
        let result: UserResult<User> = async {
            if self.users.email_taken(&txn, &email, None).await? {
                return Err(UserError::DuplicateEmail(email.clone()));
            }

            let user = self
                .users
                .create(
                    &txn,
                    NewUserRecord {
                        name,
                        email: email.clone(),
                        password_hash,
                        role: input.role.unwrap_or_default(),
                    },
                )
                .await?;
            self.audit
                .append(&txn, AuditRecord::created(&user, actor))
                .await?;
            Ok(user)
        }
        .await;

        let user = finish(txn, result).await?;
        info!(user_id = user.id, actor = ?actor, role = %user.role, "User created");
        Ok(user)
    }

    /// Applies the set fields of `changes` to `existing`.
    ///
    /// The row is re-read under a row lock so the logged `old_values` match
    /// what was actually overwritten.
    pub async fn update_user(
        &self,
        existing: &User,
        changes: UserChanges,
        actor: Option<i64>,
    ) -> UserResult<User> {
        let name = changes.name.as_deref().map(normalize_name).transpose()?;
        let email = changes.email.as_deref().map(normalize_email).transpose()?;
        let password_hash = match changes.password {
            Some(password) => Some(self.hasher.hash_blocking(password).await?),
            None => None,
        };

        let txn = self.db.begin().await?;
        let result: UserResult<User> = async {
            let current = self
                .users
                .find_by_id_for_update(&txn, existing.id)
                .await?
                .ok_or(UserError::NotFound(existing.id))?;

            if let Some(email) = email.as_deref()
                && email != current.email
                && self.users.email_taken(&txn, email, Some(current.id)).await?
            {
                return Err(UserError::DuplicateEmail(email.to_string()));
            }

            let before = current.profile_snapshot();
            let patch = UserPatch {
                name,
                email,
                password_hash,
                role: changes.role,
            };
            let updated = self.users.update(&txn, &current, patch).await?;
            self.audit
                .append(&txn, AuditRecord::updated(&updated, actor, before))
                .await?;
            Ok(updated)
        }
        .await;

        let user = finish(txn, result).await?;
        info!(user_id = user.id, actor = ?actor, "User updated");
        Ok(user)
    }

    /// Logs the deletion, then removes the row. `false` when the account was
    /// already gone; nothing is logged in that case.
    pub async fn delete_user(&self, user: &User, actor: Option<i64>) -> UserResult<bool> {
        let txn = self.db.begin().await?;
        let result: UserResult<bool> = async {
            let Some(current) = self.users.find_by_id_for_update(&txn, user.id).await? else {
                return Ok(false);
            };

            self.audit
                .append(&txn, AuditRecord::deleted(&current, actor))
                .await?;
            self.users.delete(&txn, current.id).await
        }
        .await;

        let deleted = finish(txn, result).await?;
        if deleted {
            info!(user_id = user.id, actor = ?actor, "User deleted");
        }
        Ok(deleted)
    }

    pub async fn get_user_by_id(&self, id: i64) -> UserResult<User> {
        self.users
            .find_by_id(&self.db, id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    /// Case-insensitive lookup; `None` when no account uses the address.
    pub async fn find_user_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let email = email.trim().to_lowercase();
        self.users.find_by_email(&self.db, &email).await
    }

    pub async fn get_paginated_users(
        &self,
        per_page: u64,
        page: u64,
        max_per_page: u64,
    ) -> UserResult<UserPage> {
        self.users
            .list_page(&self.db, per_page, page, max_per_page)
            .await
    }
}

/// Commits on success; on failure rolls back and hands the original error back.
async fn finish<T>(txn: DatabaseTransaction, result: UserResult<T>) -> UserResult<T> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

fn normalize_name(name: &str) -> UserResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(UserError::Validation("The name is required.".to_string()));
    }
    Ok(name.to_string())
}

fn normalize_email(email: &str) -> UserResult<String> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(UserError::Validation(
            "The email must be a valid email address.".to_string(),
        ));
    }
    Ok(email)
}
