//! Append-only store for user audit entries.
//!
//! The store persists whatever it is handed. Deciding what a snapshot
//! contains, and pairing the append with the mutation inside one
//! transaction, belongs to [`UserService`](crate::service::UserService).

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::Value;

use crate::entity::audit_log;
use crate::error::UserResult;
use crate::models::{AuditAction, AuditLogEntry, User};

/// One entry to append
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub subject_user_id: Option<i64>,
    pub performed_by: Option<i64>,
    pub action: AuditAction,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
}

impl AuditRecord {
    pub fn created(user: &User, actor: Option<i64>) -> Self {
        Self {
            subject_user_id: Some(user.id),
            performed_by: actor,
            action: AuditAction::Create,
            old_values: None,
            new_values: Some(user.identity_snapshot()),
        }
    }

    /// `before` is the profile snapshot taken prior to the write.
    pub fn updated(user: &User, actor: Option<i64>, before: Value) -> Self {
        Self {
            subject_user_id: Some(user.id),
            performed_by: actor,
            action: AuditAction::Update,
            old_values: Some(before),
            new_values: Some(user.profile_snapshot()),
        }
    }

    pub fn deleted(user: &User, actor: Option<i64>) -> Self {
        Self {
            subject_user_id: Some(user.id),
            performed_by: actor,
            action: AuditAction::Delete,
            old_values: Some(user.identity_snapshot()),
            new_values: None,
        }
    }
}

/// Criteria for [`AuditLogStore::list`]; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub subject_user_id: Option<i64>,
    pub performed_by: Option<i64>,
    pub action: Option<AuditAction>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLogStore;

impl AuditLogStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn append<C: ConnectionTrait>(
        &self,
        conn: &C,
        record: AuditRecord,
    ) -> UserResult<AuditLogEntry> {
        let model = audit_log::ActiveModel {
            id: NotSet,
            user_id: Set(record.subject_user_id),
            performed_by: Set(record.performed_by),
            action: Set(record.action),
            old_values: Set(record.old_values),
            new_values: Set(record.new_values),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        tracing::debug!(
            audit_id = model.id,
            subject = ?model.user_id,
            actor = ?model.performed_by,
            action = %model.action,
            "Appended audit entry"
        );

        Ok(model.into())
    }

    /// Oldest first.
    pub async fn list<C: ConnectionTrait>(
        &self,
        conn: &C,
        filter: AuditFilter,
    ) -> UserResult<Vec<AuditLogEntry>> {
        let mut query = audit_log::Entity::find().order_by_asc(audit_log::Column::Id);

        if let Some(subject) = filter.subject_user_id {
            query = query.filter(audit_log::Column::UserId.eq(subject));
        }
        if let Some(actor) = filter.performed_by {
            query = query.filter(audit_log::Column::PerformedBy.eq(actor));
        }
        if let Some(action) = filter.action {
            query = query.filter(audit_log::Column::Action.eq(action));
        }

        let models = query.all(conn).await?;
        Ok(models.into_iter().map(AuditLogEntry::from).collect())
    }

    pub async fn entries_for_subject<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i64,
    ) -> UserResult<Vec<AuditLogEntry>> {
        self.list(
            conn,
            AuditFilter {
                subject_user_id: Some(user_id),
                ..Default::default()
            },
        )
        .await
    }
}
