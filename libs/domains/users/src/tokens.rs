//! Personal access tokens: individually revocable bearer credentials.
//!
//! A credential reads `<token id>|<secret>`. Only the SHA-256 of the secret is
//! stored, so the plaintext exists exactly once, in the issuing response.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Set,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::entity::access_token;
use crate::error::UserResult;

/// Random bytes per secret (hex encoded to 40 characters)
const SECRET_BYTES: usize = 20;

/// A freshly issued credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainTextToken {
    pub token_id: i64,
    pub plain_text: String,
}

/// Credential that matched a stored token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedToken {
    pub token_id: i64,
    pub user_id: i64,
}

fn generate_secret() -> String {
    let bytes: Vec<u8> = (0..SECRET_BYTES).map(|_| rand::random::<u8>()).collect();
    const_hex::encode(bytes)
}

fn hash_secret(secret: &str) -> String {
    const_hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Constant-time comparison of two hex digests
fn digests_match(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Splits `<id>|<secret>`. A bare secret yields no id; a malformed id yields `None`.
fn parse_credential(credential: &str) -> Option<(Option<i64>, &str)> {
    match credential.split_once('|') {
        Some((id, secret)) => Some((Some(id.parse().ok()?), secret)),
        None => Some((None, credential)),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessTokenStore;

impl AccessTokenStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn issue<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i64,
        name: &str,
    ) -> UserResult<PlainTextToken> {
        let secret = generate_secret();

        let model = access_token::ActiveModel {
            id: NotSet,
            user_id: Set(user_id),
            name: Set(name.to_string()),
            token_hash: Set(hash_secret(&secret)),
            last_used_at: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        tracing::debug!(user_id, token_id = model.id, "Issued access token");

        Ok(PlainTextToken {
            token_id: model.id,
            plain_text: format!("{}|{}", model.id, secret),
        })
    }

    /// Looks the credential up without side effects.
    pub async fn resolve<C: ConnectionTrait>(
        &self,
        conn: &C,
        credential: &str,
    ) -> UserResult<Option<ResolvedToken>> {
        let Some((id, secret)) = parse_credential(credential) else {
            return Ok(None);
        };
        if secret.is_empty() {
            return Ok(None);
        }

        let digest = hash_secret(secret);
        let model = match id {
            Some(id) => access_token::Entity::find_by_id(id)
                .one(conn)
                .await?
                .filter(|token| digests_match(&token.token_hash, &digest)),
            None => {
                access_token::Entity::find()
                    .filter(access_token::Column::TokenHash.eq(digest))
                    .one(conn)
                    .await?
            }
        };

        Ok(model.map(|token| ResolvedToken {
            token_id: token.id,
            user_id: token.user_id,
        }))
    }

    pub async fn touch<C: ConnectionTrait>(&self, conn: &C, token_id: i64) -> UserResult<()> {
        access_token::Entity::update_many()
            .col_expr(
                access_token::Column::LastUsedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(access_token::Column::Id.eq(token_id))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// `false` when the token was already gone.
    pub async fn revoke<C: ConnectionTrait>(&self, conn: &C, token_id: i64) -> UserResult<bool> {
        let result = access_token::Entity::delete_by_id(token_id).exec(conn).await?;
        Ok(result.rows_affected > 0)
    }

    /// Revokes every token of `user_id`, returning how many were removed.
    pub async fn revoke_all_for_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i64,
    ) -> UserResult<u64> {
        let result = access_token::Entity::delete_many()
            .filter(access_token::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}
