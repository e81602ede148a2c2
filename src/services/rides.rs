//! Ride lifecycle: ACTIVE -> COMPLETED.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::ride::{self, RideDirection, RideStatus};
use crate::entities::route;
use crate::entities::seat::{self, SeatStatus};
use crate::entities::user;
use crate::entities::vehicle;
use crate::entities::wallet_transaction::{self, PaymentMethod, TransactionType};
use crate::error::{AppError, AppResult};
use crate::services::ledger::{get_or_create_wallet, post_entry, LedgerEntry};
use crate::services::seats::{seat_map, SeatView};
use crate::services::vehicles::{route_for_vehicle, vehicle_for_owner};

/// A ride with the route and vehicle behind it.
#[derive(Debug, Clone)]
pub struct RideContext {
    pub ride: ride::Model,
    pub route: route::Model,
    pub vehicle: vehicle::Model,
}

impl RideContext {
    pub fn driver_id(&self) -> Uuid {
        self.vehicle.owner_id
    }

    pub fn is_active(&self) -> bool {
        self.ride.status == RideStatus::Active
    }
}

/// Load a ride with its route and vehicle. With `lock` the ride row is held
/// for update until the surrounding transaction ends.
pub async fn load_ride_context<C: ConnectionTrait>(
    conn: &C,
    ride_id: Uuid,
    lock: bool,
) -> AppResult<RideContext> {
    let query = ride::Entity::find_by_id(ride_id);
    let query = if lock { query.lock_exclusive() } else { query };
    let ride = query
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;

    let route = route::Entity::find_by_id(ride.route_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Route not found".to_string()))?;

    let vehicle = vehicle::Entity::find_by_id(route.vehicle_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

    Ok(RideContext {
        ride,
        route,
        vehicle,
    })
}

/// Most recent ACTIVE ride of a route.
pub async fn active_ride_for_route<C: ConnectionTrait>(
    conn: &C,
    route_id: Uuid,
) -> AppResult<Option<ride::Model>> {
    let ride = ride::Entity::find()
        .filter(ride::Column::RouteId.eq(route_id))
        .filter(ride::Column::Status.eq(RideStatus::Active))
        .order_by_desc(ride::Column::DepartureTime)
        .one(conn)
        .await?;
    Ok(ride)
}

/// Start a ride on the caller's route. At most one ride per route is ACTIVE.
pub async fn start_ride(
    db: &DatabaseConnection,
    owner_id: Uuid,
    direction: RideDirection,
) -> AppResult<ride::Model> {
    let txn = db.begin().await?;

    let vehicle = vehicle_for_owner(&txn, owner_id)
        .await?
        .ok_or_else(|| AppError::PreconditionFailed("Register a vehicle first".to_string()))?;

    // The route row lock serializes concurrent starts
    let route = route::Entity::find()
        .filter(route::Column::VehicleId.eq(vehicle.id))
        .filter(route::Column::DeletedAt.is_null())
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::PreconditionFailed("Register a route first".to_string()))?;

    if active_ride_for_route(&txn, route.id).await?.is_some() {
        return Err(AppError::Conflict(
            "An active ride already exists for this route".to_string(),
        ));
    }

    let now = Utc::now();
    let ride = ride::ActiveModel {
        id: Set(Uuid::new_v4()),
        route_id: Set(route.id),
        direction: Set(direction),
        departure_time: Set(now.into()),
        available_seats: Set(vehicle.capacity),
        status: Set(RideStatus::Active),
        completed_at: Set(None),
        created_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(
        ride_id = %ride.id,
        route_id = %route.id,
        direction = ?direction,
        available_seats = ride.available_seats,
        "Ride started"
    );

    Ok(ride)
}

#[derive(Debug, Clone, Serialize)]
pub struct RideSettlement {
    pub ride: ride::Model,
    pub completed_bookings: usize,
    pub cash_bookings: usize,
    /// App-paid fares credited to the driver.
    pub earnings: i64,
    pub earning_transaction: Option<wallet_transaction::Model>,
}

/// Complete a ride and settle the driver's earnings in one transaction.
/// Cash bookings (passenger is the driver) are completed but not credited.
pub async fn complete_ride(
    db: &DatabaseConnection,
    ride_id: Uuid,
    requester_id: Uuid,
) -> AppResult<RideSettlement> {
    let txn = db.begin().await?;

    let ctx = load_ride_context(&txn, ride_id, true).await?;
    if ctx.driver_id() != requester_id {
        return Err(AppError::Forbidden(
            "Only the ride's driver can complete it".to_string(),
        ));
    }
    if !ctx.is_active() {
        return Err(AppError::InvalidState("Ride is not active".to_string()));
    }

    let confirmed = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
        .lock_exclusive()
        .all(&txn)
        .await?;

    let (cash, app): (Vec<&booking::Model>, Vec<&booking::Model>) =
        confirmed.iter().partition(|b| b.passenger_id == requester_id);
    let earnings: i64 = app.iter().map(|b| b.total_price).sum();

    let now = Utc::now();
    let mut active: ride::ActiveModel = ctx.ride.into();
    active.status = Set(RideStatus::Completed);
    active.completed_at = Set(Some(now.into()));
    let ride = active.update(&txn).await?;

    booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(BookingStatus::Completed))
        .col_expr(booking::Column::UpdatedAt, Expr::value(now.fixed_offset()))
        .filter(booking::Column::RideId.eq(ride_id))
        .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
        .exec(&txn)
        .await?;

    let seat_ids: Vec<Uuid> = confirmed.iter().filter_map(|b| b.seat_id).collect();
    if !seat_ids.is_empty() {
        seat::Entity::update_many()
            .col_expr(seat::Column::Status, Expr::value(SeatStatus::Available))
            .filter(seat::Column::Id.is_in(seat_ids))
            .exec(&txn)
            .await?;
    }

    let earning_transaction = if earnings > 0 {
        let wallet = get_or_create_wallet(&txn, requester_id).await?;
        let entry = LedgerEntry::new(TransactionType::RideEarning, earnings, PaymentMethod::Wallet)
            .ride(ride_id)
            .description(format!(
                "Earnings for {} -> {}",
                ctx.route.origin, ctx.route.destination
            ));
        let (_, record) = post_entry(&txn, wallet, entry).await?;
        Some(record)
    } else {
        None
    };

    txn.commit().await?;

    tracing::info!(
        ride_id = %ride_id,
        driver_id = %requester_id,
        completed = confirmed.len(),
        cash = cash.len(),
        earnings,
        "Ride completed"
    );

    Ok(RideSettlement {
        ride,
        completed_bookings: confirmed.len(),
        cash_bookings: cash.len(),
        earnings,
        earning_transaction,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RideDetails {
    pub id: Uuid,
    pub route_id: Uuid,
    pub status: RideStatus,
    pub direction: RideDirection,
    /// Origin and destination as travelled in this direction.
    pub from: String,
    pub to: String,
    pub price_per_seat: i64,
    pub plate_number: String,
    pub vehicle_type: String,
    pub capacity: i32,
    pub available_seats: i32,
    pub departure_time: DateTime<Utc>,
    pub seats: Vec<SeatView>,
}

/// Origin and destination in travel order for `direction`.
pub fn oriented(route: &route::Model, direction: RideDirection) -> (String, String) {
    match direction {
        RideDirection::Forward => (route.origin.clone(), route.destination.clone()),
        RideDirection::Return => (route.destination.clone(), route.origin.clone()),
    }
}

async fn details_for<C: ConnectionTrait>(conn: &C, ctx: RideContext) -> AppResult<RideDetails> {
    let seats = seat_map(conn, ctx.vehicle.id, Some(ctx.ride.id)).await?;
    let (from, to) = oriented(&ctx.route, ctx.ride.direction);

    Ok(RideDetails {
        id: ctx.ride.id,
        route_id: ctx.route.id,
        status: ctx.ride.status,
        direction: ctx.ride.direction,
        from,
        to,
        price_per_seat: ctx.route.price_per_seat,
        plate_number: ctx.vehicle.plate_number,
        vehicle_type: ctx.vehicle.vehicle_type,
        capacity: ctx.vehicle.capacity,
        available_seats: ctx.ride.available_seats,
        departure_time: ctx.ride.departure_time.with_timezone(&Utc),
        seats,
    })
}

pub async fn ride_details(db: &DatabaseConnection, ride_id: Uuid) -> AppResult<RideDetails> {
    let ctx = load_ride_context(db, ride_id, false).await?;
    details_for(db, ctx).await
}

/// The driver's current ride, if one is running.
pub async fn get_active_ride(
    db: &DatabaseConnection,
    owner_id: Uuid,
) -> AppResult<Option<RideDetails>> {
    let Some(vehicle) = vehicle_for_owner(db, owner_id).await? else {
        return Ok(None);
    };
    let Some(route) = route_for_vehicle(db, vehicle.id).await? else {
        return Ok(None);
    };
    let Some(ride) = active_ride_for_route(db, route.id).await? else {
        return Ok(None);
    };

    let ctx = RideContext {
        ride,
        route,
        vehicle,
    };
    Ok(Some(details_for(db, ctx).await?))
}

#[derive(Debug, Clone, Serialize)]
pub struct RideBookingInfo {
    pub booking_id: Uuid,
    pub passenger_id: Uuid,
    pub passenger_name: String,
    pub seat_id: Option<Uuid>,
    pub seat_number: Option<i32>,
    pub total_price: i64,
    pub status: BookingStatus,
    /// Recorded by the driver for a cash-paying passenger.
    pub is_cash: bool,
    pub created_at: DateTime<Utc>,
}

/// Passenger list of a ride, for its driver.
pub async fn list_ride_bookings(
    db: &DatabaseConnection,
    ride_id: Uuid,
    driver_id: Uuid,
) -> AppResult<Vec<RideBookingInfo>> {
    let ctx = load_ride_context(db, ride_id, false).await?;
    if ctx.driver_id() != driver_id {
        return Err(AppError::Forbidden(
            "You are not the driver of this ride".to_string(),
        ));
    }

    let bookings = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .order_by_asc(booking::Column::CreatedAt)
        .all(db)
        .await?;

    let passenger_ids: Vec<Uuid> = bookings.iter().map(|b| b.passenger_id).collect();
    let names: HashMap<Uuid, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(passenger_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    Ok(bookings
        .into_iter()
        .map(|b| RideBookingInfo {
            booking_id: b.id,
            passenger_id: b.passenger_id,
            passenger_name: names.get(&b.passenger_id).cloned().unwrap_or_default(),
            seat_id: b.seat_id,
            seat_number: b.seat_number,
            total_price: b.total_price,
            status: b.status,
            is_cash: b.passenger_id == driver_id,
            created_at: b.created_at.with_timezone(&Utc),
        })
        .collect())
}
