pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_users;
mod m20240301_000002_create_wallets;
mod m20240301_000003_create_vehicles;
mod m20240301_000004_create_routes;
mod m20240301_000005_create_seats;
mod m20240301_000006_create_rides;
mod m20240301_000007_create_bookings;
mod m20240301_000008_create_wallet_transactions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users::Migration),
            Box::new(m20240301_000002_create_wallets::Migration),
            Box::new(m20240301_000003_create_vehicles::Migration),
            Box::new(m20240301_000004_create_routes::Migration),
            Box::new(m20240301_000005_create_seats::Migration),
            Box::new(m20240301_000006_create_rides::Migration),
            Box::new(m20240301_000007_create_bookings::Migration),
            Box::new(m20240301_000008_create_wallet_transactions::Migration),
        ]
    }
}
