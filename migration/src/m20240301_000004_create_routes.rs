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
                    .table(Route::Table)
                    .if_not_exists()
                    .col(uuid(Route::Id).primary_key())
                    .col(uuid(Route::VehicleId).not_null().unique_key())
                    .col(string_len(Route::Origin, 100).not_null())
                    .col(string_len(Route::Destination, 100).not_null())
                    .col(big_integer(Route::PricePerSeat).not_null())
                    .col(double_null(Route::DistanceKm))
                    .col(integer_null(Route::DurationMinutes))
                    .col(text_null(Route::Description))
                    .col(
                        timestamp_with_time_zone(Route::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(Route::DeletedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_route_vehicle")
                            .from(Route::Table, Route::VehicleId)
                            .to(Vehicle::Table, Vehicle::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Route::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Route {
    Table,
    Id,
    VehicleId,
    Origin,
    Destination,
    PricePerSeat,
    DistanceKm,
    DurationMinutes,
    Description,
    CreatedAt,
    DeletedAt,
}
