//! Persistence of user rows.
//!
//! Every method takes the connection to run on, so callers decide whether a
//! call joins an open transaction or runs on the pool.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};

use crate::entity::user;
use crate::error::{UserError, UserResult};
use crate::models::{Role, User, UserPage};

/// Row to insert; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
}

/// Column changes; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UserRepository;

impl UserRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_id<C: ConnectionTrait>(&self, conn: &C, id: i64) -> UserResult<Option<User>> {
        let model = user::Entity::find_by_id(id).one(conn).await?;
        Ok(model.map(User::from))
    }

    /// Reads the row with `FOR UPDATE`; only meaningful inside a transaction.
    pub async fn find_by_id_for_update<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i64,
    ) -> UserResult<Option<User>> {
        let model = user::Entity::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await?;
        Ok(model.map(User::from))
    }

    /// Exact match; callers normalize the address first.
    pub async fn find_by_email<C: ConnectionTrait>(
        &self,
        conn: &C,
        email: &str,
    ) -> UserResult<Option<User>> {
        let model = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(conn)
            .await?;
        Ok(model.map(User::from))
    }

    /// Whether another account (other than `except_id`) already uses `email`.
    pub async fn email_taken<C: ConnectionTrait>(
        &self,
        conn: &C,
        email: &str,
        except_id: Option<i64>,
    ) -> UserResult<bool> {
        let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
        if let Some(id) = except_id {
            query = query.filter(user::Column::Id.ne(id));
        }

        Ok(query.one(conn).await?.is_some())
    }

    /// Newest first. `per_page` is clamped to `1..=max_per_page`, `page` to at least 1.
    /// Pages past the last one come back empty without touching the rows.
    pub async fn list_page<C: ConnectionTrait>(
        &self,
        conn: &C,
        per_page: u64,
        page: u64,
        max_per_page: u64,
    ) -> UserResult<UserPage> {
        let per_page = per_page.clamp(1, max_per_page.max(1));
        let current_page = page.max(1);

        let paginator = user::Entity::find()
            .order_by_desc(user::Column::Id)
            .paginate(conn, per_page);

        let total = paginator.num_items().await?;
        // Past the last page the offset could overflow, and there is nothing to fetch anyway
        let last_page = total.div_ceil(per_page).max(1);
        let users = if current_page > last_page {
            Vec::new()
        } else {
            paginator
                .fetch_page(current_page - 1)
                .await?
                .into_iter()
                .map(User::from)
                .collect()
        };

        Ok(UserPage {
            users,
            total,
            per_page,
            current_page,
        })
    }

    pub async fn create<C: ConnectionTrait>(&self, conn: &C, record: NewUserRecord) -> UserResult<User> {
        let now = Utc::now();
        let email = record.email.clone();

        let model = user::ActiveModel {
            id: NotSet,
            name: Set(record.name),
            email: Set(record.email),
            password_hash: Set(record.password_hash),
            role: Set(record.role),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(|e| map_unique_violation(e, &email))?;

        Ok(model.into())
    }

    /// Writes the set fields of `patch` and bumps `updated_at`.
    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        current: &User,
        patch: UserPatch,
    ) -> UserResult<User> {
        let mut active: user::ActiveModel = user::Model::from(current.clone()).into();
        let email = patch.email.clone().unwrap_or_else(|| current.email.clone());

        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(email) = patch.email {
            active.email = Set(email);
        }
        if let Some(hash) = patch.password_hash {
            active.password_hash = Set(Some(hash));
        }
        if let Some(role) = patch.role {
            active.role = Set(role);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(conn).await.map_err(|e| match e {
            DbErr::RecordNotUpdated => UserError::NotFound(current.id),
            other => map_unique_violation(other, &email),
        })?;

        Ok(model.into())
    }

    /// `false` when no row had that id.
    pub async fn delete<C: ConnectionTrait>(&self, conn: &C, id: i64) -> UserResult<bool> {
        let result = user::Entity::delete_by_id(id).exec(conn).await?;
        Ok(result.rows_affected > 0)
    }
}

fn map_unique_violation(err: DbErr, email: &str) -> UserError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => UserError::DuplicateEmail(email.to_string()),
        _ => UserError::Persistence(err),
    }
}

impl From<User> for user::Model {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
