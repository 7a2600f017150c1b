//! Initial schema for the shared-expense ledger:
//!
//! - `users`: authentication and display names
//! - `ledger_groups`: groups sharing expenses
//! - `group_members`: soft-removable memberships
//! - `splits`: who owes whom for each expense
//! - `settlements`: settlement requests and their audit trail

use sea_orm::{ConnectionTrait, Statement};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// At most one pending settlement per ordered pair in a group.
const PENDING_PAIR_INDEX: &str = "uidx-settlements-pending-pair";

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
    DisplayName,
}

#[derive(Iden)]
enum LedgerGroups {
    Table,
    Id,
    Name,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum GroupMembers {
    Table,
    GroupId,
    UserId,
    JoinedAt,
    LeftAt,
}

#[derive(Iden)]
enum Splits {
    Table,
    Id,
    GroupId,
    ExpenseId,
    PayerId,
    OwedById,
    AmountMinor,
    IsPaid,
    PaidAt,
    SettlementId,
    CreatedAt,
}

#[derive(Iden)]
enum Settlements {
    Table,
    Id,
    GroupId,
    FromUserId,
    ToUserId,
    AmountMinor,
    Status,
    Note,
    RequestedBy,
    IdempotencyKey,
    Version,
    CreatedAt,
    SettledAt,
    ConfirmedAt,
    RejectedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .col(ColumnDef::new(Users::DisplayName).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LedgerGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerGroups::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LedgerGroups::Name).string().not_null())
                    .col(ColumnDef::new(LedgerGroups::CreatedBy).string().not_null())
                    .col(ColumnDef::new(LedgerGroups::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ledger_groups-created_by")
                            .from(LedgerGroups::Table, LedgerGroups::CreatedBy)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupMembers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(GroupMembers::GroupId).string().not_null())
                    .col(ColumnDef::new(GroupMembers::UserId).string().not_null())
                    .col(ColumnDef::new(GroupMembers::JoinedAt).timestamp().not_null())
                    .col(ColumnDef::new(GroupMembers::LeftAt).timestamp())
                    .primary_key(
                        Index::create()
                            .col(GroupMembers::GroupId)
                            .col(GroupMembers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_members-group_id")
                            .from(GroupMembers::Table, GroupMembers::GroupId)
                            .to(LedgerGroups::Table, LedgerGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_members-user_id")
                            .from(GroupMembers::Table, GroupMembers::UserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-group_members-user_id")
                    .table(GroupMembers::Table)
                    .col(GroupMembers::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Settlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Settlements::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Settlements::GroupId).string().not_null())
                    .col(ColumnDef::new(Settlements::FromUserId).string().not_null())
                    .col(ColumnDef::new(Settlements::ToUserId).string().not_null())
                    .col(
                        ColumnDef::new(Settlements::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::Status).string().not_null())
                    .col(ColumnDef::new(Settlements::Note).string())
                    .col(ColumnDef::new(Settlements::RequestedBy).string().not_null())
                    .col(ColumnDef::new(Settlements::IdempotencyKey).string())
                    .col(
                        ColumnDef::new(Settlements::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Settlements::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Settlements::SettledAt).timestamp())
                    .col(ColumnDef::new(Settlements::ConfirmedAt).timestamp())
                    .col(ColumnDef::new(Settlements::RejectedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-group_id")
                            .from(Settlements::Table, Settlements::GroupId)
                            .to(LedgerGroups::Table, LedgerGroups::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-settlements-group_id-status")
                    .table(Settlements::Table)
                    .col(Settlements::GroupId)
                    .col(Settlements::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-settlements-group_id-requested_by-idempotency_key")
                    .table(Settlements::Table)
                    .col(Settlements::GroupId)
                    .col(Settlements::RequestedBy)
                    .col(Settlements::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // The index builder has no WHERE clause, so the partial index is raw SQL.
        let db = manager.get_connection();
        let backend = db.get_database_backend();
        db.execute(Statement::from_string(
            backend,
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS \"{PENDING_PAIR_INDEX}\" \
                 ON settlements (group_id, from_user_id, to_user_id) \
                 WHERE status = 'pending';"
            ),
        ))
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(Splits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Splits::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Splits::GroupId).string().not_null())
                    .col(ColumnDef::new(Splits::ExpenseId).string().not_null())
                    .col(ColumnDef::new(Splits::PayerId).string().not_null())
                    .col(ColumnDef::new(Splits::OwedById).string().not_null())
                    .col(ColumnDef::new(Splits::AmountMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Splits::IsPaid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Splits::PaidAt).timestamp())
                    .col(ColumnDef::new(Splits::SettlementId).string())
                    .col(ColumnDef::new(Splits::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-splits-group_id")
                            .from(Splits::Table, Splits::GroupId)
                            .to(LedgerGroups::Table, LedgerGroups::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-splits-settlement_id")
                            .from(Splits::Table, Splits::SettlementId)
                            .to(Settlements::Table, Settlements::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-splits-pair-unpaid")
                    .table(Splits::Table)
                    .col(Splits::GroupId)
                    .col(Splits::PayerId)
                    .col(Splits::OwedById)
                    .col(Splits::IsPaid)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-splits-settlement_id")
                    .table(Splits::Table)
                    .col(Splits::SettlementId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Splits::Table).to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name(PENDING_PAIR_INDEX)
                    .table(Settlements::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Settlements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerGroups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
