#![allow(dead_code)]

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use ride_booking_backend::config::Config;
use ride_booking_backend::entities::ride::{self, RideDirection};
use ride_booking_backend::entities::route;
use ride_booking_backend::entities::seat;
use ride_booking_backend::entities::user::{self, UserRole};
use ride_booking_backend::entities::vehicle;
use ride_booking_backend::entities::wallet_transaction::PaymentMethod;
use ride_booking_backend::services::{ledger, rides, vehicles};
use ride_booking_backend::AppState;

pub const MAX_CAPACITY: i32 = 60;

/// Fresh in-memory database with the real migrations applied. A single
/// connection keeps every query on the same in-memory database.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_key_minimum_32_characters_long".to_string(),
        jwt_expiration_hours: 1,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        admin_email: "admin@ridebooking.local".to_string(),
        admin_password: None,
        max_vehicle_capacity: MAX_CAPACITY,
    }
}

pub async fn setup_state() -> AppState {
    AppState {
        db: setup_db().await,
        config: test_config(),
    }
}

pub async fn create_user(db: &DatabaseConnection, role: UserRole, name: &str) -> user::Model {
    let id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(id),
        email: Set(format!("{}-{}@example.com", name.to_lowercase(), id.simple())),
        phone_number: Set(None),
        password_hash: Set("not-a-real-hash".to_string()),
        name: Set(name.to_string()),
        role: Set(role),
        created_at: Set(Utc::now().into()),
        deleted_at: Set(None),
    }
    .insert(db)
    .await
    .expect("Failed to create user")
}

pub async fn create_passenger(db: &DatabaseConnection, name: &str) -> user::Model {
    create_user(db, UserRole::Passenger, name).await
}

/// A driver with a registered vehicle and route.
pub struct DriverFixture {
    pub driver: user::Model,
    pub vehicle: vehicle::Model,
    pub route: route::Model,
    pub seats: Vec<seat::Model>,
}

impl DriverFixture {
    pub fn seat(&self, number: i32) -> &seat::Model {
        self.seats
            .iter()
            .find(|s| s.seat_number == number)
            .expect("seat number out of range")
    }
}

pub async fn create_driver_with_route(
    db: &DatabaseConnection,
    plate: &str,
    capacity: i32,
    price_per_seat: i64,
) -> DriverFixture {
    let driver = create_user(db, UserRole::Driver, "Driver").await;

    let details = vehicles::register_vehicle(
        db,
        MAX_CAPACITY,
        driver.id,
        vehicles::VehicleInput {
            plate_number: plate.to_string(),
            vehicle_type: "Minibus".to_string(),
            capacity,
            model: Some("Hiace".to_string()),
            color: None,
        },
    )
    .await
    .expect("Failed to register vehicle");

    let route = vehicles::register_route(
        db,
        driver.id,
        vehicles::RouteInput {
            origin: "Downtown".to_string(),
            destination: "Airport".to_string(),
            price_per_seat,
            distance_km: Some(18.5),
            duration_minutes: Some(35),
            description: None,
        },
    )
    .await
    .expect("Failed to register route");

    let seats = ride_booking_backend::services::seats::seats_for_vehicle(db, details.vehicle.id)
        .await
        .expect("Failed to load seats");

    DriverFixture {
        driver,
        vehicle: details.vehicle,
        route,
        seats,
    }
}

pub async fn start_ride(db: &DatabaseConnection, fixture: &DriverFixture) -> ride::Model {
    rides::start_ride(db, fixture.driver.id, RideDirection::Forward)
        .await
        .expect("Failed to start ride")
}

pub async fn fund(db: &DatabaseConnection, user_id: Uuid, amount: i64) {
    ledger::charge_wallet(db, user_id, amount, PaymentMethod::Card)
        .await
        .expect("Failed to fund wallet");
}

pub async fn balance(db: &DatabaseConnection, user_id: Uuid) -> i64 {
    ledger::get_wallet(db, user_id)
        .await
        .expect("Failed to load wallet")
        .balance
}

pub async fn assert_reconciles(db: &DatabaseConnection, user_id: Uuid) {
    let report = ledger::reconcile_wallet(db, user_id)
        .await
        .expect("Failed to reconcile");
    assert!(report.balanced, "wallet does not reconcile: {:?}", report);
}
