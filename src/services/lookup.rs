//! Passenger entry points that resolve some identifying input (a seat pick,
//! a barcode, a seat code or a plate number) to an active ride and seat,
//! then optionally book it.
//!
//! Business-rule failures come back as a [`ScanResult`] with
//! `success == false` so the caller can render them inline. Only store
//! failures are returned as errors.

use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::ride::{self, RideDirection};
use crate::entities::route;
use crate::entities::seat::{self, SeatStatus};
use crate::entities::vehicle;
use crate::error::{AppError, AppResult};
use crate::services::bookings::{book_single_seat, holds_confirmed_booking};
use crate::services::ledger::get_wallet;
use crate::services::rides::{active_ride_for_route, load_ride_context, oriented};
use crate::services::vehicles::route_for_vehicle;
use crate::utils::plate::normalize_plate;
use crate::utils::seat_code::{is_valid_seat_code, SEAT_CODE_LEN};

/// The (route, active ride, seat) triple every entry point converges on.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub route: route::Model,
    pub ride: ride::Model,
    pub vehicle: vehicle::Model,
    pub seat: seat::Model,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanData {
    pub route_id: Uuid,
    pub ride_id: Uuid,
    pub seat_id: Uuid,
    pub seat_number: i32,
    pub from: String,
    pub to: String,
    pub direction: RideDirection,
    pub plate_number: String,
    pub price: i64,
    pub wallet_balance: i64,
    pub booking_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub success: bool,
    pub auto_booked: bool,
    /// Seat resolved but the wallet does not cover the fare.
    pub needs_payment: bool,
    pub code: Option<&'static str>,
    pub message: String,
    pub data: Option<ScanData>,
}

impl ScanResult {
    fn rejected(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            auto_booked: false,
            needs_payment: false,
            code: Some(code),
            message: message.into(),
            data: None,
        }
    }

    fn from_error(err: AppError) -> AppResult<Self> {
        if err.is_internal() {
            return Err(err);
        }
        Ok(Self::rejected(err.code(), err.to_string()))
    }
}

/// Reasons a resolved seat cannot be booked by this passenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyBooked,
    DriverSeatReserved,
    RideFull,
    SeatTaken,
}

impl Rejection {
    pub fn code(self) -> &'static str {
        match self {
            Rejection::AlreadyBooked => "ALREADY_BOOKED",
            Rejection::DriverSeatReserved => "DRIVER_SEAT_RESERVED",
            Rejection::RideFull => "RIDE_FULL",
            Rejection::SeatTaken => "SEAT_TAKEN",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Rejection::AlreadyBooked => "You already have a booking on this ride",
            Rejection::DriverSeatReserved => "Seat 1 is reserved for the driver",
            Rejection::RideFull => "This ride is full",
            Rejection::SeatTaken => "This seat is already taken",
        }
    }
}

/// Payload encoded in a seat barcode: either JSON
/// `{"routeId": "...", "seatId": "..."}` or the compact `routeId:seatId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BarcodePayload {
    #[serde(rename = "routeId", alias = "route_id")]
    pub route_id: Uuid,
    #[serde(rename = "seatId", alias = "seat_id")]
    pub seat_id: Uuid,
}

impl BarcodePayload {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::Validation("Barcode is empty".to_string()));
        }

        if raw.starts_with('{') {
            return serde_json::from_str(raw)
                .map_err(|_| AppError::Validation("Unreadable barcode".to_string()));
        }

        let (route, seat) = raw
            .split_once(':')
            .ok_or_else(|| AppError::Validation("Unreadable barcode".to_string()))?;
        let route_id = Uuid::parse_str(route.trim())
            .map_err(|_| AppError::Validation("Barcode has an invalid route".to_string()))?;
        let seat_id = Uuid::parse_str(seat.trim())
            .map_err(|_| AppError::Validation("Barcode has an invalid seat".to_string()))?;

        Ok(Self { route_id, seat_id })
    }
}

async fn live_vehicle<C: ConnectionTrait>(conn: &C, vehicle_id: Uuid) -> AppResult<vehicle::Model> {
    vehicle::Entity::find_by_id(vehicle_id)
        .filter(vehicle::Column::DeletedAt.is_null())
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))
}

async fn require_active_ride<C: ConnectionTrait>(
    conn: &C,
    route_id: Uuid,
) -> AppResult<ride::Model> {
    active_ride_for_route(conn, route_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active ride on this route".to_string()))
}

/// Passenger is already looking at the ride and picked a seat.
pub async fn resolve_direct(
    db: &DatabaseConnection,
    ride_id: Uuid,
    seat_id: Uuid,
) -> AppResult<Resolution> {
    let ctx = load_ride_context(db, ride_id, false).await?;
    if !ctx.is_active() {
        return Err(AppError::InvalidState("Ride is not active".to_string()));
    }

    let seat = seat::Entity::find_by_id(seat_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Seat not found".to_string()))?;
    if seat.vehicle_id != ctx.vehicle.id {
        return Err(AppError::InvalidSeat(
            "Seat does not belong to this ride's vehicle".to_string(),
        ));
    }

    Ok(Resolution {
        route: ctx.route,
        ride: ctx.ride,
        vehicle: ctx.vehicle,
        seat,
    })
}

pub async fn resolve_barcode(db: &DatabaseConnection, payload: &str) -> AppResult<Resolution> {
    let payload = BarcodePayload::parse(payload)?;

    let route = route::Entity::find_by_id(payload.route_id)
        .filter(route::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Route not found".to_string()))?;
    let vehicle = live_vehicle(db, route.vehicle_id).await?;
    let ride = require_active_ride(db, route.id).await?;

    let seat = seat::Entity::find_by_id(payload.seat_id)
        .filter(seat::Column::VehicleId.eq(vehicle.id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Seat not found on this vehicle".to_string()))?;

    Ok(Resolution {
        route,
        ride,
        vehicle,
        seat,
    })
}

/// Resolve a printed seat code. The code shape is checked before any query.
pub async fn resolve_seat_code(db: &DatabaseConnection, code: &str) -> AppResult<Resolution> {
    let code = code.trim();
    if !is_valid_seat_code(code) {
        return Err(AppError::Validation(format!(
            "Seat code must be exactly {} digits",
            SEAT_CODE_LEN
        )));
    }

    let seat = seat::Entity::find()
        .filter(seat::Column::Code.eq(code))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("No seat with this code".to_string()))?;
    let vehicle = live_vehicle(db, seat.vehicle_id).await?;
    let route = route_for_vehicle(db, vehicle.id)
        .await?
        .ok_or_else(|| AppError::NotFound("This vehicle has no route".to_string()))?;
    let ride = require_active_ride(db, route.id).await?;

    Ok(Resolution {
        route,
        ride,
        vehicle,
        seat,
    })
}

pub async fn resolve_plate(
    db: &DatabaseConnection,
    plate_number: &str,
    seat_number: i32,
) -> AppResult<Resolution> {
    let plate = normalize_plate(plate_number);
    if plate.is_empty() {
        return Err(AppError::Validation("Plate number is required".to_string()));
    }
    if seat_number < 1 {
        return Err(AppError::Validation(
            "Seat number must be positive".to_string(),
        ));
    }

    let vehicle = vehicle::Entity::find()
        .filter(vehicle::Column::PlateNumber.eq(plate.clone()))
        .filter(vehicle::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No vehicle with plate {}", plate)))?;
    let route = route_for_vehicle(db, vehicle.id)
        .await?
        .ok_or_else(|| AppError::NotFound("This vehicle has no route".to_string()))?;
    let ride = require_active_ride(db, route.id).await?;

    let seat = seat::Entity::find()
        .filter(seat::Column::VehicleId.eq(vehicle.id))
        .filter(seat::Column::SeatNumber.eq(seat_number))
        .one(db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Seat {} does not exist on this vehicle", seat_number))
        })?;

    Ok(Resolution {
        route,
        ride,
        vehicle,
        seat,
    })
}

/// Checks shared by every entry point before booking.
pub async fn check_resolution<C: ConnectionTrait>(
    conn: &C,
    passenger_id: Uuid,
    resolution: &Resolution,
) -> AppResult<Option<Rejection>> {
    let ride_id = resolution.ride.id;

    if holds_confirmed_booking(conn, ride_id, passenger_id).await? {
        return Ok(Some(Rejection::AlreadyBooked));
    }

    if resolution.seat.is_driver_seat() {
        return Ok(Some(Rejection::DriverSeatReserved));
    }

    if resolution.ride.available_seats <= 0 {
        return Ok(Some(Rejection::RideFull));
    }

    let seat_held = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .filter(booking::Column::SeatId.eq(resolution.seat.id))
        .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
        .one(conn)
        .await?;
    if seat_held.is_some() || resolution.seat.status != SeatStatus::Available {
        return Ok(Some(Rejection::SeatTaken));
    }

    Ok(None)
}

/// Run the shared checks, then book, report the seat, or ask for payment.
async fn settle(
    db: &DatabaseConnection,
    passenger_id: Uuid,
    resolution: Resolution,
    auto_book: bool,
) -> AppResult<ScanResult> {
    if let Some(rejection) = check_resolution(db, passenger_id, &resolution).await? {
        tracing::warn!(
            passenger_id = %passenger_id,
            ride_id = %resolution.ride.id,
            seat_number = resolution.seat.seat_number,
            reason = rejection.code(),
            "Seat lookup rejected"
        );
        return Ok(ScanResult::rejected(rejection.code(), rejection.message()));
    }

    let wallet = get_wallet(db, passenger_id).await?;
    let price = resolution.route.price_per_seat;
    let (from, to) = oriented(&resolution.route, resolution.ride.direction);

    let mut data = ScanData {
        route_id: resolution.route.id,
        ride_id: resolution.ride.id,
        seat_id: resolution.seat.id,
        seat_number: resolution.seat.seat_number,
        from,
        to,
        direction: resolution.ride.direction,
        plate_number: resolution.vehicle.plate_number.clone(),
        price,
        wallet_balance: wallet.balance,
        booking_id: None,
    };

    if !auto_book {
        return Ok(ScanResult {
            success: true,
            auto_booked: false,
            needs_payment: wallet.balance < price,
            code: None,
            message: format!(
                "Seat {} on {} -> {} is available",
                data.seat_number, data.from, data.to
            ),
            data: Some(data),
        });
    }

    if wallet.balance < price {
        return Ok(ScanResult {
            success: true,
            auto_booked: false,
            needs_payment: true,
            code: Some("NEEDS_PAYMENT"),
            message: "Top up your wallet to book this seat".to_string(),
            data: Some(data),
        });
    }

    match book_single_seat(db, resolution.ride.id, passenger_id, resolution.seat.id).await {
        Ok(receipt) => {
            data.booking_id = Some(receipt.booking_id);
            data.wallet_balance = receipt.wallet_balance;
            Ok(ScanResult {
                success: true,
                auto_booked: true,
                needs_payment: false,
                code: None,
                message: format!("Seat {} booked", data.seat_number),
                data: Some(data),
            })
        }
        Err(err) if err.is_internal() => Err(err),
        Err(err) => {
            // A concurrent booking won the race; report it like the pre-checks would
            if let Some(rejection) = check_resolution(db, passenger_id, &resolution).await? {
                return Ok(ScanResult::rejected(rejection.code(), rejection.message()));
            }
            ScanResult::from_error(err)
        }
    }
}

async fn run(
    db: &DatabaseConnection,
    passenger_id: Uuid,
    resolved: AppResult<Resolution>,
    auto_book: bool,
) -> AppResult<ScanResult> {
    match resolved {
        Ok(resolution) => settle(db, passenger_id, resolution, auto_book).await,
        Err(err) => ScanResult::from_error(err),
    }
}

pub async fn book_direct(
    db: &DatabaseConnection,
    passenger_id: Uuid,
    ride_id: Uuid,
    seat_id: Uuid,
    auto_book: bool,
) -> AppResult<ScanResult> {
    let resolved = resolve_direct(db, ride_id, seat_id).await;
    run(db, passenger_id, resolved, auto_book).await
}

pub async fn scan_barcode(
    db: &DatabaseConnection,
    passenger_id: Uuid,
    payload: &str,
    auto_book: bool,
) -> AppResult<ScanResult> {
    let resolved = resolve_barcode(db, payload).await;
    run(db, passenger_id, resolved, auto_book).await
}

pub async fn book_by_seat_code(
    db: &DatabaseConnection,
    passenger_id: Uuid,
    code: &str,
    auto_book: bool,
) -> AppResult<ScanResult> {
    let resolved = resolve_seat_code(db, code).await;
    run(db, passenger_id, resolved, auto_book).await
}

pub async fn book_by_plate_number(
    db: &DatabaseConnection,
    passenger_id: Uuid,
    plate_number: &str,
    seat_number: i32,
    auto_book: bool,
) -> AppResult<ScanResult> {
    let resolved = resolve_plate(db, plate_number, seat_number).await;
    run(db, passenger_id, resolved, auto_book).await
}
