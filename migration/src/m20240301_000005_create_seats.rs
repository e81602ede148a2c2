use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000003_create_vehicles::Vehicle;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Seat::Table)
                    .if_not_exists()
                    .col(uuid(Seat::Id).primary_key())
                    .col(uuid(Seat::VehicleId).not_null())
                    .col(integer(Seat::SeatNumber).not_null())
                    .col(string_len(Seat::Code, 14).not_null().unique_key())
                    .col(string_len(Seat::Status, 16).not_null())
                    .col(
                        timestamp_with_time_zone(Seat::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_seat_vehicle")
                            .from(Seat::Table, Seat::VehicleId)
                            .to(Vehicle::Table, Vehicle::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_seat_vehicle_number")
                    .table(Seat::Table)
                    .col(Seat::VehicleId)
                    .col(Seat::SeatNumber)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Seat::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Seat {
    Table,
    Id,
    VehicleId,
    SeatNumber,
    Code,
    Status,
    CreatedAt,
}
