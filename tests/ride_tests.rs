mod common;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use ride_booking_backend::entities::booking::{self, BookingStatus};
use ride_booking_backend::entities::ride::{RideDirection, RideStatus};
use ride_booking_backend::entities::seat::{self, SeatStatus};
use ride_booking_backend::entities::user::UserRole;
use ride_booking_backend::entities::wallet_transaction::{self, TransactionType};
use ride_booking_backend::error::AppError;
use ride_booking_backend::services::bookings::{
    assign_seat, book_seat, cancel_booking, create_manual_booking,
};
use ride_booking_backend::services::rides::{
    complete_ride, get_active_ride, list_ride_bookings, ride_details, start_ride as begin_ride,
};
use ride_booking_backend::services::vehicles::{self, VehicleInput};

use common::*;

#[tokio::test]
async fn test_start_ride_requires_vehicle_and_route() {
    let db = setup_db().await;
    let driver = create_user(&db, UserRole::Driver, "Fresh").await;

    let err = begin_ride(&db, driver.id, RideDirection::Forward)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PreconditionFailed(_)));

    vehicles::register_vehicle(
        &db,
        MAX_CAPACITY,
        driver.id,
        VehicleInput {
            plate_number: "KDA 200A".to_string(),
            vehicle_type: "Sedan".to_string(),
            capacity: 4,
            model: None,
            color: None,
        },
    )
    .await
    .unwrap();

    let err = begin_ride(&db, driver.id, RideDirection::Forward)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PreconditionFailed(_)));
}

#[tokio::test]
async fn test_only_one_active_ride_per_route() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KDA 201A", 5, 20).await;

    let ride = start_ride(&db, &fixture).await;
    assert_eq!(ride.status, RideStatus::Active);
    assert_eq!(ride.available_seats, 5);

    let err = begin_ride(&db, fixture.driver.id, RideDirection::Return)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    complete_ride(&db, ride.id, fixture.driver.id).await.unwrap();
    let next = begin_ride(&db, fixture.driver.id, RideDirection::Return)
        .await
        .unwrap();
    assert_eq!(next.direction, RideDirection::Return);
}

#[tokio::test]
async fn test_complete_ride_credits_app_bookings_only() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KDA 202A", 7, 50).await;
    let ride = start_ride(&db, &fixture).await;

    for number in 2..=4 {
        let passenger = create_passenger(&db, &format!("App {}", number)).await;
        fund(&db, passenger.id, 50).await;
        book_seat(&db, ride.id, passenger.id, Some(fixture.seat(number).id), None)
            .await
            .unwrap();
    }
    let cash = create_manual_booking(&db, ride.id, fixture.seat(5).id, fixture.driver.id)
        .await
        .unwrap();
    assert_eq!(cash.seat_number, 5);
    assert_eq!(cash.total_price, 50);

    let settlement = complete_ride(&db, ride.id, fixture.driver.id)
        .await
        .unwrap();

    assert_eq!(settlement.earnings, 150);
    assert_eq!(settlement.completed_bookings, 4);
    assert_eq!(settlement.cash_bookings, 1);
    assert_eq!(settlement.ride.status, RideStatus::Completed);
    assert!(settlement.ride.completed_at.is_some());
    assert_eq!(balance(&db, fixture.driver.id).await, 150);

    let bookings = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(bookings.len(), 4);
    assert!(bookings.iter().all(|b| b.status == BookingStatus::Completed));

    let seats = seat::Entity::find()
        .filter(seat::Column::VehicleId.eq(fixture.vehicle.id))
        .all(&db)
        .await
        .unwrap();
    assert!(seats.iter().all(|s| s.status == SeatStatus::Available));

    let driver_rows = wallet_transaction::Entity::find()
        .filter(wallet_transaction::Column::UserId.eq(fixture.driver.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(driver_rows.len(), 1);
    assert_eq!(driver_rows[0].transaction_type, TransactionType::RideEarning);
    assert_eq!(driver_rows[0].amount, 150);
    assert_eq!(driver_rows[0].ride_id, Some(ride.id));
    assert_reconciles(&db, fixture.driver.id).await;
}

#[tokio::test]
async fn test_complete_ride_with_only_cash_posts_nothing() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KDA 203A", 5, 50).await;
    let ride = start_ride(&db, &fixture).await;
    create_manual_booking(&db, ride.id, fixture.seat(2).id, fixture.driver.id)
        .await
        .unwrap();

    let settlement = complete_ride(&db, ride.id, fixture.driver.id)
        .await
        .unwrap();

    assert_eq!(settlement.earnings, 0);
    assert!(settlement.earning_transaction.is_none());
    let rows = wallet_transaction::Entity::find()
        .filter(wallet_transaction::Column::UserId.eq(fixture.driver.id))
        .all(&db)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_complete_ride_guards() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KDA 204A", 5, 50).await;
    let other = create_driver_with_route(&db, "KDB 204B", 5, 50).await;
    let ride = start_ride(&db, &fixture).await;

    let err = complete_ride(&db, ride.id, other.driver.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    complete_ride(&db, ride.id, fixture.driver.id).await.unwrap();
    let err = complete_ride(&db, ride.id, fixture.driver.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = complete_ride(&db, Uuid::new_v4(), fixture.driver.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_booking_a_completed_ride_is_invalid() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KDA 205A", 5, 20).await;
    let ride = start_ride(&db, &fixture).await;
    complete_ride(&db, ride.id, fixture.driver.id).await.unwrap();

    let passenger = create_passenger(&db, "Too Late").await;
    fund(&db, passenger.id, 50).await;
    let err = book_seat(&db, ride.id, passenger.id, Some(fixture.seat(2).id), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_completed_booking_cannot_be_cancelled() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KDA 206A", 5, 20).await;
    let ride = start_ride(&db, &fixture).await;
    let passenger = create_passenger(&db, "Arrived").await;
    fund(&db, passenger.id, 50).await;
    let receipt = book_seat(&db, ride.id, passenger.id, Some(fixture.seat(2).id), None)
        .await
        .unwrap();
    complete_ride(&db, ride.id, fixture.driver.id).await.unwrap();

    let err = cancel_booking(&db, receipt.booking_id, passenger.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(balance(&db, passenger.id).await, 30);
}

#[tokio::test]
async fn test_cancelling_cash_booking_restores_seat_without_refund() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KDA 207A", 5, 20).await;
    let ride = start_ride(&db, &fixture).await;
    let cash = create_manual_booking(&db, ride.id, fixture.seat(2).id, fixture.driver.id)
        .await
        .unwrap();

    let receipt = cancel_booking(&db, cash.booking_id, fixture.driver.id)
        .await
        .unwrap();
    assert_eq!(receipt.refunded, 0);
    assert_eq!(balance(&db, fixture.driver.id).await, 0);

    let details = ride_details(&db, ride.id).await.unwrap();
    assert_eq!(details.available_seats, 5);
}

#[tokio::test]
async fn test_manual_booking_validations() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KDA 208A", 5, 20).await;
    let other = create_driver_with_route(&db, "KDB 208B", 5, 20).await;
    let ride = start_ride(&db, &fixture).await;

    let err = create_manual_booking(&db, ride.id, fixture.seat(2).id, other.driver.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = create_manual_booking(&db, ride.id, fixture.seat(1).id, fixture.driver.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSeat(_)));

    create_manual_booking(&db, ride.id, fixture.seat(2).id, fixture.driver.id)
        .await
        .unwrap();
    let err = create_manual_booking(&db, ride.id, fixture.seat(2).id, fixture.driver.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let cash_rows = wallet_transaction::Entity::find()
        .filter(wallet_transaction::Column::UserId.eq(fixture.driver.id))
        .all(&db)
        .await
        .unwrap();
    assert!(cash_rows.is_empty());
}

#[tokio::test]
async fn test_assign_seat_to_seatless_booking() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KDA 209A", 5, 20).await;
    let ride = start_ride(&db, &fixture).await;
    let passenger = create_passenger(&db, "Walk-in").await;
    fund(&db, passenger.id, 50).await;

    let receipt = book_seat(&db, ride.id, passenger.id, None, None)
        .await
        .unwrap();
    let seat = fixture.seat(3);

    let err = assign_seat(&db, receipt.booking_id, seat.id, passenger.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let booking = assign_seat(&db, receipt.booking_id, seat.id, fixture.driver.id)
        .await
        .unwrap();
    assert_eq!(booking.seat_id, Some(seat.id));
    assert_eq!(booking.seat_number, Some(3));

    // Counter and wallet were settled at booking time
    let details = ride_details(&db, ride.id).await.unwrap();
    assert_eq!(details.available_seats, 4);
    assert_eq!(balance(&db, passenger.id).await, 30);
    assert!(details
        .seats
        .iter()
        .any(|s| s.id == seat.id && s.booked && s.status == SeatStatus::Occupied));

    let err = assign_seat(&db, receipt.booking_id, fixture.seat(4).id, fixture.driver.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_ride_queries() {
    let db = setup_db().await;
    let fixture = create_driver_with_route(&db, "KDA 210A", 5, 20).await;

    assert!(get_active_ride(&db, fixture.driver.id).await.unwrap().is_none());

    let ride = begin_ride(&db, fixture.driver.id, RideDirection::Return)
        .await
        .unwrap();
    let passenger = create_passenger(&db, "Listed").await;
    fund(&db, passenger.id, 50).await;
    book_seat(&db, ride.id, passenger.id, Some(fixture.seat(2).id), None)
        .await
        .unwrap();
    create_manual_booking(&db, ride.id, fixture.seat(3).id, fixture.driver.id)
        .await
        .unwrap();

    let active = get_active_ride(&db, fixture.driver.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, ride.id);
    assert_eq!(active.from, "Airport");
    assert_eq!(active.to, "Downtown");
    assert_eq!(active.seats.len(), 5);
    assert!(active.seats[0].is_driver_seat);
    assert_eq!(active.seats.iter().filter(|s| s.booked).count(), 2);

    let listed = list_ride_bookings(&db, ride.id, fixture.driver.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed.iter().filter(|b| b.is_cash).count(), 1);
    assert!(listed.iter().any(|b| b.passenger_name == "Listed"));

    let err = list_ride_bookings(&db, ride.id, passenger.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}
