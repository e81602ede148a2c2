mod common;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use ride_booking_backend::entities::user::UserRole;
use ride_booking_backend::error::AppError;
use ride_booking_backend::handlers::{admin, auth, driver, wallet};
use ride_booking_backend::services::bookings::book_seat;
use ride_booking_backend::utils::jwt::{verify_token, Claims};

use common::*;

fn register_request(email: &str, role: UserRole) -> auth::RegisterRequest {
    auth::RegisterRequest {
        email: email.to_string(),
        password: "correct horse battery".to_string(),
        name: "Test User".to_string(),
        phone_number: Some("+254711000000".to_string()),
        role,
    }
}

#[tokio::test]
async fn test_register_then_login() {
    let state = setup_state().await;

    let (status, Json(registered)) = auth::register(
        State(state.clone()),
        Json(register_request("Rider@Example.com", UserRole::Passenger)),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(registered.user.email, "rider@example.com");
    assert_eq!(registered.user.role, UserRole::Passenger);

    let claims = verify_token(&registered.token, &state.config.jwt_secret).unwrap();
    assert_eq!(claims.sub, registered.user.id);

    let Json(logged_in) = auth::login(
        State(state.clone()),
        Json(auth::LoginRequest {
            email: "rider@example.com".to_string(),
            password: "correct horse battery".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(logged_in.user.id, registered.user.id);

    let err = auth::login(
        State(state),
        Json(auth::LoginRequest {
            email: "rider@example.com".to_string(),
            password: "wrong password".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_register_refuses_admin_and_duplicates() {
    let state = setup_state().await;

    let err = auth::register(
        State(state.clone()),
        Json(register_request("boss@example.com", UserRole::Admin)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    auth::register(
        State(state.clone()),
        Json(register_request("driver@example.com", UserRole::Driver)),
    )
    .await
    .unwrap();

    let err = auth::register(
        State(state.clone()),
        Json(register_request("DRIVER@example.com", UserRole::Driver)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Same phone number, different email
    let err = auth::register(
        State(state),
        Json(register_request("other@example.com", UserRole::Passenger)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_wallet_handlers_parse_decimal_amounts() {
    let state = setup_state().await;
    let (_, Json(registered)) = auth::register(
        State(state.clone()),
        Json(register_request("payer@example.com", UserRole::Passenger)),
    )
    .await
    .unwrap();
    let claims = verify_token(&registered.token, &state.config.jwt_secret).unwrap();

    let Json(record) = wallet::charge(
        State(state.clone()),
        Extension(claims.clone()),
        Json(
            serde_json::from_value(serde_json::json!({
                "amount": "12.50",
                "payment_method": "CARD"
            }))
            .unwrap(),
        ),
    )
    .await
    .unwrap();
    assert_eq!(record.amount, 1_250);

    let err = wallet::withdraw(
        State(state.clone()),
        Extension(claims.clone()),
        Json(serde_json::from_value(serde_json::json!({ "amount": "-5" })).unwrap()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let Json(current) = wallet::get_wallet(State(state), Extension(claims))
        .await
        .unwrap();
    assert_eq!(current.balance, 1_250);
    assert_eq!(current.formatted_balance, "12.50");
}

#[tokio::test]
async fn test_admin_lists_and_soft_deletes_users() {
    let state = setup_state().await;
    let passenger = create_passenger(&state.db, "Leaving").await;
    create_user(&state.db, UserRole::Driver, "Staying").await;

    let Json(drivers) = admin::list_users(
        State(state.clone()),
        Query(admin::UserFilter {
            role: Some(UserRole::Driver),
        }),
    )
    .await
    .unwrap();
    assert_eq!(drivers.len(), 1);

    admin::delete_user(State(state.clone()), Path(passenger.id))
        .await
        .unwrap();

    let Json(everyone) = admin::list_users(State(state.clone()), Query(admin::UserFilter { role: None }))
        .await
        .unwrap();
    assert!(everyone.iter().all(|u| u.id != passenger.id));

    let err = admin::delete_user(State(state), Path(passenger.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_driver_cancels_cash_booking_over_http_handlers() {
    let state = setup_state().await;
    let fixture = create_driver_with_route(&state.db, "KFA 401A", 5, 20).await;
    let ride = start_ride(&state.db, &fixture).await;
    let claims = Claims::for_user(&fixture.driver, chrono::Duration::hours(1));

    let (status, Json(cash)) = driver::create_manual_booking(
        State(state.clone()),
        Extension(claims.clone()),
        Path(ride.id),
        Json(driver::ManualBookingRequest {
            seat_id: fixture.seat(2).id,
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let Json(cancelled) = driver::cancel_manual_booking(
        State(state.clone()),
        Extension(claims.clone()),
        Path(cash.booking_id),
    )
    .await
    .unwrap();
    assert_eq!(cancelled.refunded, 0);
    assert_eq!(balance(&state.db, fixture.driver.id).await, 0);

    // App bookings stay with their passenger
    let passenger = create_passenger(&state.db, "Rider").await;
    fund(&state.db, passenger.id, 20).await;
    let app = book_seat(&state.db, ride.id, passenger.id, Some(fixture.seat(3).id), None)
        .await
        .unwrap();
    let err = driver::cancel_manual_booking(State(state), Extension(claims), Path(app.booking_id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}
