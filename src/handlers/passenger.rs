use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::bookings::{self, BookingReceipt, CancellationReceipt, PassengerBooking};
use crate::services::lookup::{self, ScanResult};
use crate::services::rides::{self, RideDetails};
use crate::utils::jwt::Claims;
use crate::AppState;

fn default_auto_book() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct BookSeatRequest {
    pub ride_id: Uuid,
    pub seat_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DirectPickRequest {
    pub ride_id: Uuid,
    pub seat_id: Uuid,
    #[serde(default = "default_auto_book")]
    pub auto_book: bool,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub payload: String,
    #[serde(default = "default_auto_book")]
    pub auto_book: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeatCodeRequest {
    pub code: String,
    #[serde(default = "default_auto_book")]
    pub auto_book: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlateRequest {
    pub plate_number: String,
    pub seat_number: i32,
    #[serde(default = "default_auto_book")]
    pub auto_book: bool,
}

/// Public ride view with its seat map
pub async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<RideDetails>> {
    Ok(Json(rides::ride_details(&state.db, ride_id).await?))
}

/// Book a seat paid from the wallet
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<BookSeatRequest>,
) -> AppResult<(StatusCode, Json<BookingReceipt>)> {
    let receipt = bookings::book_seat(
        &state.db,
        payload.ride_id,
        claims.sub,
        payload.seat_id,
        payload.idempotency_key.as_deref(),
    )
    .await?;

    let status = if receipt.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(receipt)))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<PassengerBooking>>> {
    Ok(Json(bookings::list_my_bookings(&state.db, claims.sub).await?))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<CancellationReceipt>> {
    Ok(Json(
        bookings::cancel_booking(&state.db, booking_id, claims.sub).await?,
    ))
}

// ============ Lookups ============

pub async fn pick_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<DirectPickRequest>,
) -> AppResult<Json<ScanResult>> {
    let result = lookup::book_direct(
        &state.db,
        claims.sub,
        payload.ride_id,
        payload.seat_id,
        payload.auto_book,
    )
    .await?;
    Ok(Json(result))
}

pub async fn scan_barcode(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ScanRequest>,
) -> AppResult<Json<ScanResult>> {
    let result =
        lookup::scan_barcode(&state.db, claims.sub, &payload.payload, payload.auto_book).await?;
    Ok(Json(result))
}

pub async fn book_by_seat_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SeatCodeRequest>,
) -> AppResult<Json<ScanResult>> {
    let result =
        lookup::book_by_seat_code(&state.db, claims.sub, &payload.code, payload.auto_book).await?;
    Ok(Json(result))
}

pub async fn book_by_plate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PlateRequest>,
) -> AppResult<Json<ScanResult>> {
    let result = lookup::book_by_plate_number(
        &state.db,
        claims.sub,
        &payload.plate_number,
        payload.seat_number,
        payload.auto_book,
    )
    .await?;
    Ok(Json(result))
}
