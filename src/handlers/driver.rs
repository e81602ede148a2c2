use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::ride::{self, RideDirection};
use crate::entities::seat::{self, SeatStatus};
use crate::entities::{booking, route};
use crate::error::AppResult;
use crate::services::bookings::{self, CancellationReceipt, ManualBookingReceipt};
use crate::services::rides::{self, RideBookingInfo, RideDetails, RideSettlement};
use crate::services::seats;
use crate::services::vehicles::{self, RouteInput, RouteUpdate, VehicleDetails, VehicleInput};
use crate::utils::jwt::Claims;
use crate::utils::money::parse_amount;
use crate::AppState;

// ============ Vehicle ============

/// Register or update the caller's vehicle
pub async fn register_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<VehicleInput>,
) -> AppResult<Json<VehicleDetails>> {
    let details = vehicles::register_vehicle(
        &state.db,
        state.config.max_vehicle_capacity,
        claims.sub,
        payload,
    )
    .await?;
    Ok(Json(details))
}

pub async fn my_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<VehicleDetails>> {
    Ok(Json(vehicles::get_my_vehicle(&state.db, claims.sub).await?))
}

#[derive(Debug, Deserialize)]
pub struct SeatStatusRequest {
    pub status: SeatStatus,
}

pub async fn update_seat_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(seat_id): Path<Uuid>,
    Json(payload): Json<SeatStatusRequest>,
) -> AppResult<Json<seat::Model>> {
    let seat = seats::update_seat_status(&state.db, seat_id, payload.status, claims.sub).await?;
    Ok(Json(seat))
}

// ============ Route ============

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub origin: String,
    pub destination: String,
    pub price_per_seat: String,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRouteRequest {
    pub price_per_seat: Option<String>,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub description: Option<String>,
}

pub async fn register_route(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RouteRequest>,
) -> AppResult<(StatusCode, Json<route::Model>)> {
    let input = RouteInput {
        origin: payload.origin,
        destination: payload.destination,
        price_per_seat: parse_amount(&payload.price_per_seat)?,
        distance_km: payload.distance_km,
        duration_minutes: payload.duration_minutes,
        description: payload.description,
    };

    let route = vehicles::register_route(&state.db, claims.sub, input).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

pub async fn update_route(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateRouteRequest>,
) -> AppResult<Json<route::Model>> {
    let update = RouteUpdate {
        price_per_seat: payload
            .price_per_seat
            .as_deref()
            .map(parse_amount)
            .transpose()?,
        distance_km: payload.distance_km,
        duration_minutes: payload.duration_minutes,
        description: payload.description,
    };

    let route = vehicles::update_route(&state.db, claims.sub, update).await?;
    Ok(Json(route))
}

// ============ Rides ============

#[derive(Debug, Deserialize)]
pub struct StartRideRequest {
    pub direction: RideDirection,
}

pub async fn start_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartRideRequest>,
) -> AppResult<(StatusCode, Json<ride::Model>)> {
    let ride = rides::start_ride(&state.db, claims.sub, payload.direction).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

pub async fn complete_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<RideSettlement>> {
    Ok(Json(rides::complete_ride(&state.db, ride_id, claims.sub).await?))
}

/// The caller's running ride, or null
pub async fn active_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Option<RideDetails>>> {
    Ok(Json(rides::get_active_ride(&state.db, claims.sub).await?))
}

/// Passenger list of one of the caller's rides
pub async fn ride_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<Vec<RideBookingInfo>>> {
    Ok(Json(
        rides::list_ride_bookings(&state.db, ride_id, claims.sub).await?,
    ))
}

// ============ Cash passengers ============

#[derive(Debug, Deserialize)]
pub struct ManualBookingRequest {
    pub seat_id: Uuid,
}

pub async fn create_manual_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
    Json(payload): Json<ManualBookingRequest>,
) -> AppResult<(StatusCode, Json<ManualBookingReceipt>)> {
    let receipt =
        bookings::create_manual_booking(&state.db, ride_id, payload.seat_id, claims.sub).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Debug, Deserialize)]
pub struct AssignSeatRequest {
    pub seat_id: Uuid,
}

pub async fn assign_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<AssignSeatRequest>,
) -> AppResult<Json<booking::Model>> {
    let booking =
        bookings::assign_seat(&state.db, booking_id, payload.seat_id, claims.sub).await?;
    Ok(Json(booking))
}

/// Cancel a cash booking the driver recorded. No refund is posted.
pub async fn cancel_manual_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<CancellationReceipt>> {
    Ok(Json(
        bookings::cancel_booking(&state.db, booking_id, claims.sub).await?,
    ))
}
