mod common;

use std::collections::HashSet;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use ride_booking_backend::entities::booking;
use ride_booking_backend::entities::seat::SeatStatus;
use ride_booking_backend::entities::user::UserRole;
use ride_booking_backend::error::AppError;
use ride_booking_backend::services::bookings::book_seat;
use ride_booking_backend::services::lookup::book_by_plate_number;
use ride_booking_backend::services::rides::complete_ride;
use ride_booking_backend::services::seats::{seats_for_vehicle, update_seat_status};
use ride_booking_backend::services::users::soft_delete_user;
use ride_booking_backend::services::vehicles::{
    get_my_vehicle, register_route, register_vehicle, update_route, RouteInput, RouteUpdate,
    VehicleInput,
};

use common::*;

fn vehicle_input(plate: &str, capacity: i32) -> VehicleInput {
    VehicleInput {
        plate_number: plate.to_string(),
        vehicle_type: "Minibus".to_string(),
        capacity,
        model: None,
        color: Some(" White ".to_string()),
    }
}

fn route_input(origin: &str, destination: &str, price: i64) -> RouteInput {
    RouteInput {
        origin: origin.to_string(),
        destination: destination.to_string(),
        price_per_seat: price,
        distance_km: None,
        duration_minutes: None,
        description: None,
    }
}

#[tokio::test]
async fn test_register_vehicle_provisions_numbered_seats() {
    let db = setup_db().await;
    let driver = create_user(&db, UserRole::Driver, "Owner").await;

    let details = register_vehicle(&db, MAX_CAPACITY, driver.id, vehicle_input("kba 123x", 14))
        .await
        .unwrap();

    assert_eq!(details.vehicle.plate_number, "KBA123X");
    assert_eq!(details.vehicle.color.as_deref(), Some("White"));
    assert_eq!(details.seats.len(), 14);

    let numbers: Vec<i32> = details.seats.iter().map(|s| s.seat_number).collect();
    assert_eq!(numbers, (1..=14).collect::<Vec<_>>());
    assert!(details.seats[0].is_driver_seat);
    assert!(details.seats.iter().all(|s| s.status == SeatStatus::Available));

    let codes: HashSet<&str> = details.seats.iter().map(|s| s.code.as_str()).collect();
    assert_eq!(codes.len(), 14);
    assert!(codes
        .iter()
        .all(|c| c.len() == 14 && c.bytes().all(|b| b.is_ascii_digit())));
}

#[tokio::test]
async fn test_vehicle_validation_and_ownership() {
    let db = setup_db().await;
    let driver = create_user(&db, UserRole::Driver, "Careful").await;
    let passenger = create_passenger(&db, "Not A Driver").await;

    for capacity in [0, MAX_CAPACITY + 1] {
        let err = register_vehicle(&db, MAX_CAPACITY, driver.id, vehicle_input("KBA 1", capacity))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    let err = register_vehicle(&db, MAX_CAPACITY, driver.id, vehicle_input("  ", 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = register_vehicle(&db, MAX_CAPACITY, passenger.id, vehicle_input("KBA 2", 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    register_vehicle(&db, MAX_CAPACITY, driver.id, vehicle_input("KBA 3", 5))
        .await
        .unwrap();
    let rival = create_user(&db, UserRole::Driver, "Rival").await;
    let err = register_vehicle(&db, MAX_CAPACITY, rival.id, vehicle_input("kba-3", 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_update_without_resize_keeps_seats() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KBB 100A", 5, 20).await;

    let details = register_vehicle(
        &db,
        MAX_CAPACITY,
        fixture.driver.id,
        VehicleInput {
            vehicle_type: "Van".to_string(),
            ..vehicle_input("KBB 100A", 5)
        },
    )
    .await
    .unwrap();

    assert_eq!(details.vehicle.id, fixture.vehicle.id);
    assert_eq!(details.vehicle.vehicle_type, "Van");
    let codes: Vec<&str> = details.seats.iter().map(|s| s.code.as_str()).collect();
    let original: Vec<&str> = fixture.seats.iter().map(|s| s.code.as_str()).collect();
    assert_eq!(codes, original);
}

#[tokio::test]
async fn test_resize_refused_while_ride_is_active() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KBB 101A", 5, 20).await;
    start_ride(&db, &fixture).await;

    let err = register_vehicle(
        &db,
        MAX_CAPACITY,
        fixture.driver.id,
        vehicle_input("KBB 101A", 8),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let seats = seats_for_vehicle(&db, fixture.vehicle.id).await.unwrap();
    assert_eq!(seats.len(), 5);
}

#[tokio::test]
async fn test_resize_after_ride_keeps_booking_history() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KBB 102A", 5, 20).await;
    let ride = start_ride(&db, &fixture).await;
    let passenger = create_passenger(&db, "Historic").await;
    fund(&db, passenger.id, 20).await;
    let receipt = book_seat(&db, ride.id, passenger.id, Some(fixture.seat(4).id), None)
        .await
        .unwrap();
    complete_ride(&db, ride.id, fixture.driver.id).await.unwrap();

    let details = register_vehicle(
        &db,
        MAX_CAPACITY,
        fixture.driver.id,
        vehicle_input("KBB 102A", 8),
    )
    .await
    .unwrap();
    assert_eq!(details.seats.len(), 8);
    assert!(details.seats.iter().all(|s| s.id != fixture.seat(4).id));

    let history = booking::Entity::find_by_id(receipt.booking_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.seat_id, None);
    assert_eq!(history.seat_number, Some(4));
}

#[tokio::test]
async fn test_seat_status_updates() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KBB 103A", 5, 20).await;
    let other = create_driver_with_route(&db, "KBC 103B", 5, 20).await;

    let err = update_seat_status(&db, fixture.seat(2).id, SeatStatus::OnMaintenance, other.driver.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = update_seat_status(&db, fixture.seat(1).id, SeatStatus::Occupied, fixture.driver.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSeat(_)));

    let same = update_seat_status(&db, fixture.seat(2).id, SeatStatus::Available, fixture.driver.id)
        .await
        .unwrap();
    assert_eq!(same.status, SeatStatus::Available);

    let repaired =
        update_seat_status(&db, fixture.seat(2).id, SeatStatus::OnMaintenance, fixture.driver.id)
            .await
            .unwrap();
    assert_eq!(repaired.status, SeatStatus::OnMaintenance);

    let err = update_seat_status(
        &db,
        uuid::Uuid::new_v4(),
        SeatStatus::Available,
        fixture.driver.id,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_booked_seat_keeps_occupied_status() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KBB 106A", 5, 20).await;
    let ride = start_ride(&db, &fixture).await;
    let passenger = create_passenger(&db, "Seated").await;
    fund(&db, passenger.id, 20).await;
    book_seat(&db, ride.id, passenger.id, Some(fixture.seat(2).id), None)
        .await
        .unwrap();

    for status in [SeatStatus::Available, SeatStatus::OnMaintenance] {
        let err = update_seat_status(&db, fixture.seat(2).id, status, fixture.driver.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    let seats = seats_for_vehicle(&db, fixture.vehicle.id).await.unwrap();
    assert_eq!(seats[1].status, SeatStatus::Occupied);

    // Free seats stay manageable during the ride
    let repaired =
        update_seat_status(&db, fixture.seat(3).id, SeatStatus::OnMaintenance, fixture.driver.id)
            .await
            .unwrap();
    assert_eq!(repaired.status, SeatStatus::OnMaintenance);
}

#[tokio::test]
async fn test_route_registration_rules() {
    let db = setup_db().await;
    let driver = create_user(&db, UserRole::Driver, "Planner").await;

    let err = register_route(&db, driver.id, route_input("A", "B", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PreconditionFailed(_)));

    register_vehicle(&db, MAX_CAPACITY, driver.id, vehicle_input("KBD 1", 5))
        .await
        .unwrap();

    let err = register_route(&db, driver.id, route_input("Town", " town ", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = register_route(&db, driver.id, route_input("Town", "Port", -1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let route = register_route(&db, driver.id, route_input("Town", "Port", 10))
        .await
        .unwrap();

    let err = register_route(&db, driver.id, route_input("Town", "Lake", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let updated = update_route(
        &db,
        driver.id,
        RouteUpdate {
            price_per_seat: Some(25),
            description: Some("Express".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.id, route.id);
    assert_eq!(updated.price_per_seat, 25);
    assert_eq!(updated.origin, "Town");
    assert_eq!(updated.description.as_deref(), Some("Express"));

    let err = update_route(&db, driver.id, RouteUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let details = get_my_vehicle(&db, driver.id).await.unwrap();
    assert_eq!(details.route.map(|r| r.price_per_seat), Some(25));
}

#[tokio::test]
async fn test_soft_deleted_driver_disappears_from_lookups() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KBE 104A", 5, 20).await;
    let passenger = create_passenger(&db, "Seeker").await;

    soft_delete_user(&db, fixture.driver.id).await.unwrap();

    let result = book_by_plate_number(&db, passenger.id, "KBE104A", 2, true)
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.code, Some("NOT_FOUND"));

    let err = get_my_vehicle(&db, fixture.driver.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // History rows survive
    let still_there = ride_booking_backend::entities::vehicle::Entity::find()
        .filter(ride_booking_backend::entities::vehicle::Column::Id.eq(fixture.vehicle.id))
        .one(&db)
        .await
        .unwrap();
    assert!(still_there.is_some_and(|v| v.deleted_at.is_some()));
}

#[tokio::test]
async fn test_driver_with_active_ride_cannot_be_deleted() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KBE 105A", 5, 20).await;
    start_ride(&db, &fixture).await;

    let err = soft_delete_user(&db, fixture.driver.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
