use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::seat::{self, SeatStatus};
use crate::entities::{ride, vehicle};
use crate::error::{AppError, AppResult};
use crate::services::rides::active_ride_for_route;
use crate::services::vehicles::route_for_vehicle;
use crate::utils::seat_code::generate_seat_code;

/// Rounds of generate-and-check before giving up on unique codes.
const MAX_CODE_ROUNDS: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct SeatView {
    pub id: Uuid,
    pub seat_number: i32,
    pub code: String,
    pub status: SeatStatus,
    pub is_driver_seat: bool,
    /// Held by a confirmed booking on the ride being viewed.
    pub booked: bool,
}

/// Generate `count` seat codes unique within the batch and against every
/// seat already stored.
async fn generate_unique_codes<C: ConnectionTrait>(conn: &C, count: usize) -> AppResult<Vec<String>> {
    let mut codes: Vec<String> = Vec::with_capacity(count);
    let mut seen: HashSet<String> = HashSet::with_capacity(count);

    for _ in 0..MAX_CODE_ROUNDS {
        let missing = count - codes.len();
        if missing == 0 {
            break;
        }

        let candidates: Vec<String> = {
            let mut rng = rand::thread_rng();
            (0..missing)
                .map(|_| generate_seat_code(&mut rng))
                .filter(|c| !seen.contains(c))
                .collect()
        };

        let taken: HashSet<String> = seat::Entity::find()
            .filter(seat::Column::Code.is_in(candidates.clone()))
            .all(conn)
            .await?
            .into_iter()
            .map(|s| s.code)
            .collect();

        for code in candidates {
            if !taken.contains(&code) && seen.insert(code.clone()) {
                codes.push(code);
            }
        }
    }

    if codes.len() < count {
        return Err(AppError::Internal(
            "Could not generate unique seat codes".to_string(),
        ));
    }

    Ok(codes)
}

/// Replace the vehicle's seats with `capacity` fresh seats numbered from 1,
/// all AVAILABLE. Bookings still pointing at the old seats lose their seat
/// link but keep the seat number snapshot.
pub async fn provision_seats<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: Uuid,
    capacity: i32,
) -> AppResult<Vec<seat::Model>> {
    if capacity < 1 {
        return Err(AppError::Validation(
            "Capacity must be at least 1".to_string(),
        ));
    }

    let old_ids: Vec<Uuid> = seat::Entity::find()
        .filter(seat::Column::VehicleId.eq(vehicle_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();

    if !old_ids.is_empty() {
        booking::Entity::update_many()
            .col_expr(booking::Column::SeatId, Expr::value(Option::<Uuid>::None))
            .filter(booking::Column::SeatId.is_in(old_ids.clone()))
            .exec(conn)
            .await?;

        seat::Entity::delete_many()
            .filter(seat::Column::Id.is_in(old_ids))
            .exec(conn)
            .await?;
    }

    let codes = generate_unique_codes(conn, capacity as usize).await?;
    let now = Utc::now();

    let seats: Vec<seat::ActiveModel> = codes
        .into_iter()
        .zip(1..=capacity)
        .map(|(code, number)| seat::ActiveModel {
            id: Set(Uuid::new_v4()),
            vehicle_id: Set(vehicle_id),
            seat_number: Set(number),
            code: Set(code),
            status: Set(SeatStatus::Available),
            created_at: Set(now.into()),
        })
        .collect();

    seat::Entity::insert_many(seats)
        .exec_without_returning(conn)
        .await?;

    tracing::info!(vehicle_id = %vehicle_id, capacity, "Seats provisioned");

    seats_for_vehicle(conn, vehicle_id).await
}

pub async fn seats_for_vehicle<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: Uuid,
) -> AppResult<Vec<seat::Model>> {
    let seats = seat::Entity::find()
        .filter(seat::Column::VehicleId.eq(vehicle_id))
        .order_by_asc(seat::Column::SeatNumber)
        .all(conn)
        .await?;
    Ok(seats)
}

/// Seat map of a vehicle, flagging seats held on `ride_id` when given.
pub async fn seat_map<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: Uuid,
    ride_id: Option<Uuid>,
) -> AppResult<Vec<SeatView>> {
    let seats = seats_for_vehicle(conn, vehicle_id).await?;

    let booked: HashSet<Uuid> = match ride_id {
        Some(ride_id) => booking::Entity::find()
            .filter(booking::Column::RideId.eq(ride_id))
            .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
            .all(conn)
            .await?
            .into_iter()
            .filter_map(|b| b.seat_id)
            .collect(),
        None => HashSet::new(),
    };

    Ok(seats
        .into_iter()
        .map(|s| SeatView {
            id: s.id,
            seat_number: s.seat_number,
            is_driver_seat: s.is_driver_seat(),
            booked: booked.contains(&s.id),
            code: s.code,
            status: s.status,
        })
        .collect())
}

/// Change a seat's status by hand. Only the vehicle owner may do this, and
/// the driver seat can never be marked OCCUPIED. A seat held by a confirmed
/// booking on the active ride keeps its OCCUPIED status.
pub async fn update_seat_status(
    db: &DatabaseConnection,
    seat_id: Uuid,
    new_status: SeatStatus,
    requester_id: Uuid,
) -> AppResult<seat::Model> {
    let txn = db.begin().await?;

    let found = seat::Entity::find_by_id(seat_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Seat not found".to_string()))?;

    let vehicle = vehicle::Entity::find_by_id(found.vehicle_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

    if vehicle.owner_id != requester_id {
        return Err(AppError::Forbidden(
            "You can only manage seats of your own vehicle".to_string(),
        ));
    }

    if found.is_driver_seat() && new_status == SeatStatus::Occupied {
        return Err(AppError::InvalidSeat(
            "Seat 1 is reserved for the driver".to_string(),
        ));
    }

    // Ride row before seat row, the same order the booking engine locks in
    let active_ride = match route_for_vehicle(&txn, vehicle.id).await? {
        Some(route) => active_ride_for_route(&txn, route.id).await?,
        None => None,
    };
    if let Some(ride) = &active_ride {
        ride::Entity::find_by_id(ride.id)
            .lock_exclusive()
            .one(&txn)
            .await?;
    }

    let seat = seat::Entity::find_by_id(seat_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Seat not found".to_string()))?;

    if seat.status == new_status {
        txn.commit().await?;
        return Ok(seat);
    }

    if let Some(ride) = &active_ride {
        let held = booking::Entity::find()
            .filter(booking::Column::RideId.eq(ride.id))
            .filter(booking::Column::SeatId.eq(seat_id))
            .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
            .one(&txn)
            .await?;
        if held.is_some() {
            return Err(AppError::Conflict(
                "Seat is held by a booking on the active ride".to_string(),
            ));
        }
    }

    let mut active: seat::ActiveModel = seat.into();
    active.status = Set(new_status);
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        seat_id = %seat_id,
        seat_number = updated.seat_number,
        status = ?new_status,
        "Seat status updated"
    );

    Ok(updated)
}
