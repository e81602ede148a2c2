use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{admin, auth, driver, passenger, wallet};
use crate::middleware::auth::{auth_middleware, require_admin, require_driver, require_passenger};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::{create_role_governor, RateLimitedRole};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let driver_governor = create_role_governor(RateLimitedRole::Driver);
    let passenger_governor = create_role_governor(RateLimitedRole::Passenger);
    let public_governor = create_public_governor();

    // Public routes (IP rate limited)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(public_governor.clone());

    let public_routes = Router::new()
        .route("/rides/{id}", get(passenger::get_ride))
        .layer(public_governor);

    // Any authenticated user holds a wallet
    let wallet_routes = Router::new()
        .route("/", get(wallet::get_wallet))
        .route("/transactions", get(wallet::list_transactions))
        .route("/charge", post(wallet::charge))
        .route("/withdraw", post(wallet::withdraw))
        .route("/transfer", post(wallet::transfer))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", delete(admin::delete_user))
        .route("/users/{id}/reconcile", get(admin::reconcile_wallet))
        .route("/rides", get(admin::list_rides))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let driver_routes = Router::new()
        .route("/vehicle", get(driver::my_vehicle))
        .route("/vehicle", put(driver::register_vehicle))
        .route("/seats/{id}/status", put(driver::update_seat_status))
        .route("/route", post(driver::register_route))
        .route("/route", put(driver::update_route))
        .route("/rides", post(driver::start_ride))
        .route("/rides/active", get(driver::active_ride))
        .route("/rides/{id}/complete", post(driver::complete_ride))
        .route("/rides/{id}/bookings", get(driver::ride_bookings))
        .route("/rides/{id}/manual-bookings", post(driver::create_manual_booking))
        .route("/bookings/{id}", delete(driver::cancel_manual_booking))
        .route("/bookings/{id}/seat", put(driver::assign_seat))
        .layer(driver_governor)
        .layer(middleware::from_fn(require_driver))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let passenger_routes = Router::new()
        .route("/bookings", post(passenger::create_booking))
        .route("/bookings", get(passenger::my_bookings))
        .route("/bookings/{id}", delete(passenger::cancel_booking))
        .route("/lookup/pick", post(passenger::pick_seat))
        .route("/lookup/barcode", post(passenger::scan_barcode))
        .route("/lookup/seat-code", post(passenger::book_by_seat_code))
        .route("/lookup/plate", post(passenger::book_by_plate))
        .layer(passenger_governor)
        .layer(middleware::from_fn(require_passenger))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", public_routes)
        .nest("/api/wallet", wallet_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/driver", driver_routes)
        .nest("/api/passenger", passenger_routes)
        .with_state(state)
}
