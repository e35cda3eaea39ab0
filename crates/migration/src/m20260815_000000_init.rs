//! Initial schema migration - creates all tables from scratch.
//!
//! - `transactions`: day-ledger monetary events
//! - `payments`: collections recorded against a sale
//! - `cash_events`: one opening/closure reconciliation per day per kind
//! - `cash_event_accounts`: per-account lines of a cash event

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    Kind,
    Account,
    AmountMinor,
    Description,
    Adjustment,
    RelatedTransactionId,
    CreatedAt,
}

#[derive(Iden)]
enum Payments {
    Table,
    Id,
    TransactionId,
    AmountMinor,
    Method,
    PaidAt,
    Notes,
}

#[derive(Iden)]
enum CashEvents {
    Table,
    Id,
    Date,
    Kind,
    Status,
    CreatedAt,
}

#[derive(Iden)]
enum CashEventAccounts {
    Table,
    Id,
    EventId,
    Position,
    Account,
    ExpectedMinor,
    RealMinor,
    DifferenceMinor,
    AdjustmentTransactionId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::Account).string())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(
                        ColumnDef::new(Transactions::Adjustment)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::RelatedTransactionId).string())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Day queries scan by creation instant.
        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-created_at")
                    .table(Transactions::Table)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payments::TransactionId).string().not_null())
                    .col(
                        ColumnDef::new(Payments::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payments::Method).string().not_null())
                    .col(ColumnDef::new(Payments::PaidAt).timestamp().not_null())
                    .col(ColumnDef::new(Payments::Notes).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payments-transaction_id")
                            .from(Payments::Table, Payments::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payments-transaction_id")
                    .table(Payments::Table)
                    .col(Payments::TransactionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CashEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashEvents::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CashEvents::Date).date().not_null())
                    .col(ColumnDef::new(CashEvents::Kind).string().not_null())
                    .col(ColumnDef::new(CashEvents::Status).string().not_null())
                    .col(ColumnDef::new(CashEvents::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // One reconciliation per day per kind; history is never edited.
        manager
            .create_index(
                Index::create()
                    .name("idx-cash_events-date-kind-unique")
                    .table(CashEvents::Table)
                    .col(CashEvents::Date)
                    .col(CashEvents::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CashEventAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashEventAccounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CashEventAccounts::EventId).string().not_null())
                    .col(
                        ColumnDef::new(CashEventAccounts::Position)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CashEventAccounts::Account).string().not_null())
                    .col(
                        ColumnDef::new(CashEventAccounts::ExpectedMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashEventAccounts::RealMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashEventAccounts::DifferenceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CashEventAccounts::AdjustmentTransactionId).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-cash_event_accounts-event_id")
                            .from(CashEventAccounts::Table, CashEventAccounts::EventId)
                            .to(CashEvents::Table, CashEvents::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-cash_event_accounts-event_id")
                    .table(CashEventAccounts::Table)
                    .col(CashEventAccounts::EventId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CashEventAccounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CashEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}
