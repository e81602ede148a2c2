use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000001_create_users::User;
use super::m20240301_000006_create_rides::Ride;
use super::m20240301_000007_create_bookings::Booking;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WalletTransaction::Table)
                    .if_not_exists()
                    .col(uuid(WalletTransaction::Id).primary_key())
                    .col(uuid(WalletTransaction::UserId).not_null())
                    .col(string_len(WalletTransaction::TransactionType, 24).not_null())
                    .col(big_integer(WalletTransaction::Amount).not_null())
                    .col(big_integer(WalletTransaction::BalanceBefore).not_null())
                    .col(big_integer(WalletTransaction::BalanceAfter).not_null())
                    .col(string_len(WalletTransaction::Status, 16).not_null())
                    .col(string_len(WalletTransaction::PaymentMethod, 24).not_null())
                    .col(uuid_null(WalletTransaction::BookingId))
                    .col(uuid_null(WalletTransaction::RideId))
                    .col(uuid_null(WalletTransaction::RecipientId))
                    .col(string_len_null(WalletTransaction::Reference, 100))
                    .col(text_null(WalletTransaction::Description))
                    .col(big_integer(WalletTransaction::Sequence).not_null())
                    .col(
                        timestamp_with_time_zone(WalletTransaction::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wallet_transaction_user")
                            .from(WalletTransaction::Table, WalletTransaction::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wallet_transaction_booking")
                            .from(WalletTransaction::Table, WalletTransaction::BookingId)
                            .to(Booking::Table, Booking::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wallet_transaction_ride")
                            .from(WalletTransaction::Table, WalletTransaction::RideId)
                            .to(Ride::Table, Ride::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Per-user ordering of ledger rows
        manager
            .create_index(
                Index::create()
                    .name("idx_wallet_transaction_user_sequence")
                    .table(WalletTransaction::Table)
                    .col(WalletTransaction::UserId)
                    .col(WalletTransaction::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WalletTransaction::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum WalletTransaction {
    Table,
    Id,
    UserId,
    TransactionType,
    Amount,
    BalanceBefore,
    BalanceAfter,
    Status,
    PaymentMethod,
    BookingId,
    RideId,
    RecipientId,
    Reference,
    Description,
    Sequence,
    CreatedAt,
}
