use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000004_create_routes::Route;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Ride::Table)
                    .if_not_exists()
                    .col(uuid(Ride::Id).primary_key())
                    .col(uuid(Ride::RouteId).not_null())
                    .col(string_len(Ride::Direction, 16).not_null())
                    .col(timestamp_with_time_zone(Ride::DepartureTime).not_null())
                    .col(integer(Ride::AvailableSeats).not_null())
                    .col(string_len(Ride::Status, 16).not_null())
                    .col(timestamp_with_time_zone_null(Ride::CompletedAt))
                    .col(
                        timestamp_with_time_zone(Ride::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_route")
                            .from(Ride::Table, Ride::RouteId)
                            .to(Route::Table, Route::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ride_route_status")
                    .table(Ride::Table)
                    .col(Ride::RouteId)
                    .col(Ride::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Ride::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Ride {
    Table,
    Id,
    RouteId,
    Direction,
    DepartureTime,
    AvailableSeats,
    Status,
    CompletedAt,
    CreatedAt,
}
