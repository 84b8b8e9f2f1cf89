use crate::models::{AuditAction, AuditLogEntry};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: Option<i64>,
    pub performed_by: Option<i64>,
    pub action: AuditAction,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub old_values: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub new_values: Option<Json>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for AuditLogEntry {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            subject_user_id: model.user_id,
            performed_by: model.performed_by,
            action: model.action,
            old_values: model.old_values,
            new_values: model.new_values,
            created_at: model.created_at,
        }
    }
}
