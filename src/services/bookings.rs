//! Booking engine. Every operation that moves money, seat status and ride
//! counters together runs in one database transaction, with the ride row
//! locked first so bookings, cancellations and completion of the same ride
//! serialize.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::ride::{self, RideDirection, RideStatus};
use crate::entities::route;
use crate::entities::seat::{self, SeatStatus};
use crate::entities::vehicle;
use crate::entities::wallet_transaction::{PaymentMethod, TransactionType};
use crate::error::{AppError, AppResult};
use crate::services::ledger::{get_or_create_wallet, post_entry, LedgerEntry};
use crate::services::rides::{load_ride_context, RideContext};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking_id: Uuid,
    pub ride_id: Uuid,
    pub seat_id: Option<Uuid>,
    pub seat_number: Option<i32>,
    pub total_price: i64,
    pub wallet_balance: i64,
    /// The request repeated an earlier idempotency key; nothing was charged.
    pub replayed: bool,
}

/// Is `seat_id` held by a live booking on `ride_id`?
async fn seat_taken_on_ride<C: ConnectionTrait>(
    conn: &C,
    ride_id: Uuid,
    seat_id: Uuid,
) -> AppResult<bool> {
    let existing = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .filter(booking::Column::SeatId.eq(seat_id))
        .filter(
            booking::Column::Status.is_in([BookingStatus::Confirmed, BookingStatus::Completed]),
        )
        .one(conn)
        .await?;
    Ok(existing.is_some())
}

/// Validate that `seat_id` can be claimed on the ride, returning the locked seat.
async fn claimable_seat<C: ConnectionTrait>(
    conn: &C,
    ctx: &RideContext,
    seat_id: Uuid,
) -> AppResult<seat::Model> {
    if seat_taken_on_ride(conn, ctx.ride.id, seat_id).await? {
        return Err(AppError::Conflict(
            "Seat is already booked on this ride".to_string(),
        ));
    }

    let seat = seat::Entity::find_by_id(seat_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Seat not found".to_string()))?;

    if seat.vehicle_id != ctx.vehicle.id {
        return Err(AppError::InvalidSeat(
            "Seat does not belong to this ride's vehicle".to_string(),
        ));
    }
    if seat.is_driver_seat() {
        return Err(AppError::InvalidSeat(
            "Seat 1 is reserved for the driver".to_string(),
        ));
    }
    if seat.status != SeatStatus::Available {
        return Err(AppError::Conflict("Seat is not available".to_string()));
    }

    Ok(seat)
}

fn ensure_capacity(ctx: &RideContext) -> AppResult<()> {
    if ctx.ride.available_seats <= 0 {
        return Err(AppError::Conflict("Ride is full".to_string()));
    }
    Ok(())
}

async fn occupy_seat<C: ConnectionTrait>(conn: &C, seat: seat::Model) -> AppResult<seat::Model> {
    let mut active: seat::ActiveModel = seat.into();
    active.status = Set(SeatStatus::Occupied);
    Ok(active.update(conn).await?)
}

async fn release_seat<C: ConnectionTrait>(conn: &C, seat_id: Uuid) -> AppResult<()> {
    if let Some(seat) = seat::Entity::find_by_id(seat_id)
        .lock_exclusive()
        .one(conn)
        .await?
    {
        if seat.status != SeatStatus::Available {
            let mut active: seat::ActiveModel = seat.into();
            active.status = Set(SeatStatus::Available);
            active.update(conn).await?;
        }
    }
    Ok(())
}

async fn adjust_available_seats<C: ConnectionTrait>(
    conn: &C,
    ride: ride::Model,
    delta: i32,
) -> AppResult<ride::Model> {
    let next = ride.available_seats + delta;
    if next < 0 {
        return Err(AppError::Conflict("Ride is full".to_string()));
    }
    let mut active: ride::ActiveModel = ride.into();
    active.available_seats = Set(next);
    Ok(active.update(conn).await?)
}

async fn insert_booking<C: ConnectionTrait>(
    conn: &C,
    ride_id: Uuid,
    passenger_id: Uuid,
    seat: Option<&seat::Model>,
    total_price: i64,
    idempotency_key: Option<String>,
) -> AppResult<booking::Model> {
    let now = Utc::now();
    let booking = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        ride_id: Set(ride_id),
        passenger_id: Set(passenger_id),
        seat_id: Set(seat.map(|s| s.id)),
        seat_number: Set(seat.map(|s| s.seat_number)),
        total_price: Set(total_price),
        status: Set(BookingStatus::Confirmed),
        idempotency_key: Set(idempotency_key),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(conn)
    .await?;
    Ok(booking)
}

fn normalize_key(key: Option<&str>) -> AppResult<Option<String>> {
    match key.map(str::trim) {
        None | Some("") => Ok(None),
        Some(k) if k.len() > MAX_IDEMPOTENCY_KEY_LEN => Err(AppError::Validation(format!(
            "Idempotency key must be at most {} characters",
            MAX_IDEMPOTENCY_KEY_LEN
        ))),
        Some(k) => Ok(Some(k.to_string())),
    }
}

/// Does the passenger already hold a confirmed booking on the ride?
pub async fn holds_confirmed_booking<C: ConnectionTrait>(
    conn: &C,
    ride_id: Uuid,
    passenger_id: Uuid,
) -> AppResult<bool> {
    let existing = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .filter(booking::Column::PassengerId.eq(passenger_id))
        .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
        .one(conn)
        .await?;
    Ok(existing.is_some())
}

/// The booking an earlier request with the same key created, if any. A key
/// reused for a different ride or seat is a conflict.
async fn find_replay<C: ConnectionTrait>(
    conn: &C,
    passenger_id: Uuid,
    key: &str,
    ride_id: Uuid,
    seat_id: Option<Uuid>,
) -> AppResult<Option<booking::Model>> {
    let previous = booking::Entity::find()
        .filter(booking::Column::PassengerId.eq(passenger_id))
        .filter(booking::Column::IdempotencyKey.eq(key))
        .one(conn)
        .await?;

    match previous {
        Some(previous)
            if previous.ride_id != ride_id
                || (seat_id.is_some() && previous.seat_id != seat_id) =>
        {
            Err(AppError::Conflict(
                "Idempotency key was already used for a different booking".to_string(),
            ))
        }
        previous => Ok(previous),
    }
}

async fn replay_receipt<C: ConnectionTrait>(
    conn: &C,
    previous: booking::Model,
    key: &str,
) -> AppResult<BookingReceipt> {
    let wallet = get_or_create_wallet(conn, previous.passenger_id).await?;
    tracing::info!(booking_id = %previous.id, key = %key, "Replayed booking request");
    Ok(BookingReceipt {
        booking_id: previous.id,
        ride_id: previous.ride_id,
        seat_id: previous.seat_id,
        seat_number: previous.seat_number,
        total_price: previous.total_price,
        wallet_balance: wallet.balance,
        replayed: true,
    })
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Book a seat (or a seatless place) on an active ride, paying from the
/// passenger's wallet. All effects commit together or not at all.
///
/// A repeated `idempotency_key` from the same passenger returns the booking
/// created by the first request instead of charging again, including when
/// the two requests overlap.
pub async fn book_seat(
    db: &DatabaseConnection,
    ride_id: Uuid,
    passenger_id: Uuid,
    seat_id: Option<Uuid>,
    idempotency_key: Option<&str>,
) -> AppResult<BookingReceipt> {
    place_booking(db, ride_id, passenger_id, seat_id, idempotency_key, false).await
}

/// [`book_seat`] for a passenger allowed only one confirmed booking on the
/// ride. The check runs under the ride lock, so overlapping calls by the
/// same passenger book at most once.
pub async fn book_single_seat(
    db: &DatabaseConnection,
    ride_id: Uuid,
    passenger_id: Uuid,
    seat_id: Uuid,
) -> AppResult<BookingReceipt> {
    place_booking(db, ride_id, passenger_id, Some(seat_id), None, true).await
}

async fn place_booking(
    db: &DatabaseConnection,
    ride_id: Uuid,
    passenger_id: Uuid,
    seat_id: Option<Uuid>,
    idempotency_key: Option<&str>,
    one_per_ride: bool,
) -> AppResult<BookingReceipt> {
    let key = normalize_key(idempotency_key)?;

    if let Some(key) = key.as_deref() {
        if let Some(previous) = find_replay(db, passenger_id, key, ride_id, seat_id).await? {
            return replay_receipt(db, previous, key).await;
        }
    }

    let booked = book_in_transaction(db, ride_id, passenger_id, seat_id, key.clone(), one_per_ride)
        .await;

    match (booked, key.as_deref()) {
        // Another request with this key committed between our checks and insert
        (Err(AppError::Database(err)), Some(key)) if is_unique_violation(&err) => {
            match find_replay(db, passenger_id, key, ride_id, seat_id).await? {
                Some(previous) => replay_receipt(db, previous, key).await,
                None => Err(AppError::Database(err)),
            }
        }
        (booked, _) => booked,
    }
}

async fn book_in_transaction(
    db: &DatabaseConnection,
    ride_id: Uuid,
    passenger_id: Uuid,
    seat_id: Option<Uuid>,
    idempotency_key: Option<String>,
    one_per_ride: bool,
) -> AppResult<BookingReceipt> {
    let txn = db.begin().await?;

    let ctx = load_ride_context(&txn, ride_id, true).await?;

    if let Some(key) = idempotency_key.as_deref() {
        if let Some(previous) = find_replay(&txn, passenger_id, key, ride_id, seat_id).await? {
            let receipt = replay_receipt(&txn, previous, key).await?;
            txn.commit().await?;
            return Ok(receipt);
        }
    }

    if !ctx.is_active() {
        return Err(AppError::InvalidState("Ride is not active".to_string()));
    }
    if ctx.driver_id() == passenger_id {
        return Err(AppError::Forbidden(
            "Drivers cannot book seats on their own ride".to_string(),
        ));
    }
    if one_per_ride && holds_confirmed_booking(&txn, ride_id, passenger_id).await? {
        return Err(AppError::Conflict(
            "You already have a booking on this ride".to_string(),
        ));
    }

    let wallet = get_or_create_wallet(&txn, passenger_id).await?;
    let price = ctx.route.price_per_seat;
    if wallet.balance < price {
        return Err(AppError::InsufficientFunds {
            required: price,
            available: wallet.balance,
        });
    }

    let seat = match seat_id {
        Some(seat_id) => Some(claimable_seat(&txn, &ctx, seat_id).await?),
        None => None,
    };
    ensure_capacity(&ctx)?;

    let booking = insert_booking(
        &txn,
        ride_id,
        passenger_id,
        seat.as_ref(),
        price,
        idempotency_key,
    )
    .await?;

    let seat = match seat {
        Some(seat) => Some(occupy_seat(&txn, seat).await?),
        None => None,
    };

    let ride = adjust_available_seats(&txn, ctx.ride, -1).await?;

    let entry = LedgerEntry::new(TransactionType::BookingPayment, -price, PaymentMethod::Wallet)
        .booking(booking.id)
        .ride(ride_id)
        .description(format!(
            "Seat {} on {} -> {}",
            seat.as_ref()
                .map(|s| s.seat_number.to_string())
                .unwrap_or_else(|| "-".to_string()),
            ctx.route.origin,
            ctx.route.destination
        ));
    let (wallet, _) = post_entry(&txn, wallet, entry).await?;

    txn.commit().await?;

    tracing::info!(
        booking_id = %booking.id,
        ride_id = %ride_id,
        passenger_id = %passenger_id,
        seat_number = ?booking.seat_number,
        price,
        available_seats = ride.available_seats,
        "Seat booked"
    );

    Ok(BookingReceipt {
        booking_id: booking.id,
        ride_id,
        seat_id: booking.seat_id,
        seat_number: booking.seat_number,
        total_price: booking.total_price,
        wallet_balance: wallet.balance,
        replayed: false,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationReceipt {
    pub booking: booking::Model,
    pub refunded: i64,
}

/// Cancel a confirmed booking, free its seat and refund the fare. Cash
/// bookings are cancelled without a refund since no wallet was charged.
pub async fn cancel_booking(
    db: &DatabaseConnection,
    booking_id: Uuid,
    requester_id: Uuid,
) -> AppResult<CancellationReceipt> {
    let found = booking::Entity::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if found.passenger_id != requester_id {
        return Err(AppError::Forbidden(
            "You can only cancel your own bookings".to_string(),
        ));
    }

    let txn = db.begin().await?;

    let ctx = load_ride_context(&txn, found.ride_id, true).await?;
    let current = booking::Entity::find_by_id(booking_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if current.status != BookingStatus::Confirmed {
        return Err(AppError::InvalidState(format!(
            "Booking is already {:?}",
            current.status
        )));
    }

    let is_cash = current.passenger_id == ctx.driver_id();
    let price = current.total_price;
    let seat_id = current.seat_id;

    let mut active: booking::ActiveModel = current.into();
    active.status = Set(BookingStatus::Cancelled);
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&txn).await?;

    if let Some(seat_id) = seat_id {
        release_seat(&txn, seat_id).await?;
    }

    if ctx.is_active() {
        adjust_available_seats(&txn, ctx.ride, 1).await?;
    }

    let refunded = if is_cash {
        0
    } else {
        let wallet = get_or_create_wallet(&txn, requester_id).await?;
        let entry = LedgerEntry::new(TransactionType::BookingRefund, price, PaymentMethod::Wallet)
            .booking(booking_id)
            .ride(booking.ride_id)
            .description("Booking cancelled".to_string());
        post_entry(&txn, wallet, entry).await?;
        price
    };

    txn.commit().await?;

    tracing::info!(
        booking_id = %booking_id,
        requester_id = %requester_id,
        refunded,
        is_cash,
        "Booking cancelled"
    );

    Ok(CancellationReceipt { booking, refunded })
}

/// Bind a seat to a seatless booking. Counters and wallet are untouched:
/// they were settled when the booking was created.
pub async fn assign_seat(
    db: &DatabaseConnection,
    booking_id: Uuid,
    seat_id: Uuid,
    driver_id: Uuid,
) -> AppResult<booking::Model> {
    let found = booking::Entity::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let txn = db.begin().await?;

    let ctx = load_ride_context(&txn, found.ride_id, true).await?;
    if ctx.driver_id() != driver_id {
        return Err(AppError::Forbidden(
            "Only the ride's driver can assign seats".to_string(),
        ));
    }

    let current = booking::Entity::find_by_id(booking_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if current.status != BookingStatus::Confirmed {
        return Err(AppError::InvalidState(format!(
            "Booking is already {:?}",
            current.status
        )));
    }
    if current.seat_id.is_some() {
        return Err(AppError::Conflict(
            "Booking already has a seat".to_string(),
        ));
    }

    let seat = claimable_seat(&txn, &ctx, seat_id).await?;

    let mut active: booking::ActiveModel = current.into();
    active.seat_id = Set(Some(seat.id));
    active.seat_number = Set(Some(seat.seat_number));
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&txn).await?;

    let seat = occupy_seat(&txn, seat).await?;

    txn.commit().await?;

    tracing::info!(
        booking_id = %booking_id,
        seat_number = seat.seat_number,
        "Seat assigned"
    );

    Ok(booking)
}

#[derive(Debug, Clone, Serialize)]
pub struct ManualBookingReceipt {
    pub booking_id: Uuid,
    pub seat_number: i32,
    pub total_price: i64,
}

/// Record a cash-paying passenger. The booking's passenger is the driver;
/// no wallet is charged and no ledger row is written.
pub async fn create_manual_booking(
    db: &DatabaseConnection,
    ride_id: Uuid,
    seat_id: Uuid,
    driver_id: Uuid,
) -> AppResult<ManualBookingReceipt> {
    let txn = db.begin().await?;

    let ctx = load_ride_context(&txn, ride_id, true).await?;
    if ctx.driver_id() != driver_id {
        return Err(AppError::Forbidden(
            "Only the ride's driver can record cash bookings".to_string(),
        ));
    }
    if !ctx.is_active() {
        return Err(AppError::InvalidState("Ride is not active".to_string()));
    }

    let seat = claimable_seat(&txn, &ctx, seat_id).await?;
    ensure_capacity(&ctx)?;

    let price = ctx.route.price_per_seat;
    let booking = insert_booking(&txn, ride_id, driver_id, Some(&seat), price, None).await?;
    let seat = occupy_seat(&txn, seat).await?;
    let ride = adjust_available_seats(&txn, ctx.ride, -1).await?;

    txn.commit().await?;

    tracing::info!(
        booking_id = %booking.id,
        ride_id = %ride_id,
        seat_number = seat.seat_number,
        available_seats = ride.available_seats,
        "Cash booking recorded"
    );

    Ok(ManualBookingReceipt {
        booking_id: booking.id,
        seat_number: seat.seat_number,
        total_price: price,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PassengerBooking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub status: BookingStatus,
    pub seat_number: Option<i32>,
    pub total_price: i64,
    pub from: String,
    pub to: String,
    pub direction: Option<RideDirection>,
    pub ride_status: Option<RideStatus>,
    pub plate_number: String,
    pub departure_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The passenger's bookings, newest first.
pub async fn list_my_bookings(
    db: &DatabaseConnection,
    passenger_id: Uuid,
) -> AppResult<Vec<PassengerBooking>> {
    let bookings = booking::Entity::find()
        .filter(booking::Column::PassengerId.eq(passenger_id))
        .order_by_desc(booking::Column::CreatedAt)
        .all(db)
        .await?;

    let ride_ids: Vec<Uuid> = bookings.iter().map(|b| b.ride_id).collect();
    let rides: HashMap<Uuid, ride::Model> = ride::Entity::find()
        .filter(ride::Column::Id.is_in(ride_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    let route_ids: Vec<Uuid> = rides.values().map(|r| r.route_id).collect();
    let routes: HashMap<Uuid, route::Model> = route::Entity::find()
        .filter(route::Column::Id.is_in(route_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    let vehicle_ids: Vec<Uuid> = routes.values().map(|r| r.vehicle_id).collect();
    let plates: HashMap<Uuid, String> = vehicle::Entity::find()
        .filter(vehicle::Column::Id.is_in(vehicle_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.id, v.plate_number))
        .collect();

    Ok(bookings
        .into_iter()
        .map(|b| {
            let ride = rides.get(&b.ride_id);
            let route = ride.and_then(|r| routes.get(&r.route_id));
            let (from, to) = match (ride, route) {
                (Some(ride), Some(route)) if ride.direction == RideDirection::Return => {
                    (route.destination.clone(), route.origin.clone())
                }
                (_, Some(route)) => (route.origin.clone(), route.destination.clone()),
                _ => (String::new(), String::new()),
            };

            PassengerBooking {
                id: b.id,
                ride_id: b.ride_id,
                status: b.status,
                seat_number: b.seat_number,
                total_price: b.total_price,
                from,
                to,
                direction: ride.map(|r| r.direction),
                ride_status: ride.map(|r| r.status),
                plate_number: route
                    .and_then(|r| plates.get(&r.vehicle_id).cloned())
                    .unwrap_or_default(),
                departure_time: ride.map(|r| r.departure_time.with_timezone(&Utc)),
                created_at: b.created_at.with_timezone(&Utc),
            }
        })
        .collect())
}
