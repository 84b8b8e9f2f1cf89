use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250101_000000_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Entries outlive their subject and actor: both references are nulled on user deletion.
        manager
            .create_table(
                Table::create()
                    .table(UserAuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserAuditLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer_null(UserAuditLogs::UserId))
                    .col(big_integer_null(UserAuditLogs::PerformedBy))
                    .col(string_len(UserAuditLogs::Action, 16))
                    .col(json_binary_null(UserAuditLogs::OldValues))
                    .col(json_binary_null(UserAuditLogs::NewValues))
                    .col(
                        timestamp_with_time_zone(UserAuditLogs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_audit_logs_user_id")
                            .from(UserAuditLogs::Table, UserAuditLogs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_audit_logs_performed_by")
                            .from(UserAuditLogs::Table, UserAuditLogs::PerformedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_audit_logs_user_id")
                    .table(UserAuditLogs::Table)
                    .col(UserAuditLogs::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_audit_logs_action")
                    .table(UserAuditLogs::Table)
                    .col(UserAuditLogs::Action)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserAuditLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserAuditLogs {
    Table,
    Id,
    UserId,
    PerformedBy,
    Action,
    OldValues,
    NewValues,
    CreatedAt,
}
