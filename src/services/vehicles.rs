//! Vehicle and route registration for drivers.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::ride::{self, RideStatus};
use crate::entities::route;
use crate::entities::seat;
use crate::entities::user::{self, UserRole};
use crate::entities::vehicle;
use crate::error::{AppError, AppResult};
use crate::services::seats::{provision_seats, seat_map, SeatView};
use crate::utils::plate::normalize_plate;

const MAX_PLATE_LEN: usize = 20;
const MAX_PLACE_LEN: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleInput {
    pub plate_number: String,
    pub vehicle_type: String,
    pub capacity: i32,
    pub model: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleDetails {
    pub vehicle: vehicle::Model,
    pub route: Option<route::Model>,
    pub seats: Vec<SeatView>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Active (not soft-deleted) vehicle owned by `owner_id`.
pub async fn vehicle_for_owner<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
) -> AppResult<Option<vehicle::Model>> {
    let vehicle = vehicle::Entity::find()
        .filter(vehicle::Column::OwnerId.eq(owner_id))
        .filter(vehicle::Column::DeletedAt.is_null())
        .one(conn)
        .await?;
    Ok(vehicle)
}

/// Active route of a vehicle.
pub async fn route_for_vehicle<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: Uuid,
) -> AppResult<Option<route::Model>> {
    let route = route::Entity::find()
        .filter(route::Column::VehicleId.eq(vehicle_id))
        .filter(route::Column::DeletedAt.is_null())
        .one(conn)
        .await?;
    Ok(route)
}

/// Create the driver's vehicle, or update it. A capacity change
/// re-provisions every seat, which is refused while the vehicle has an
/// active ride or confirmed bookings on its seats.
pub async fn register_vehicle(
    db: &DatabaseConnection,
    max_capacity: i32,
    owner_id: Uuid,
    input: VehicleInput,
) -> AppResult<VehicleDetails> {
    let plate = normalize_plate(&input.plate_number);
    if plate.is_empty() || plate.len() > MAX_PLATE_LEN {
        return Err(AppError::Validation(format!(
            "Plate number must be 1-{} characters",
            MAX_PLATE_LEN
        )));
    }
    let vehicle_type = input.vehicle_type.trim().to_string();
    if vehicle_type.is_empty() {
        return Err(AppError::Validation("Vehicle type is required".to_string()));
    }
    if input.capacity < 1 || input.capacity > max_capacity {
        return Err(AppError::Validation(format!(
            "Capacity must be between 1 and {}",
            max_capacity
        )));
    }

    let owner = user::Entity::find_by_id(owner_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    if owner.role != UserRole::Driver {
        return Err(AppError::Forbidden(
            "Only drivers can register vehicles".to_string(),
        ));
    }

    let txn = db.begin().await?;

    let plate_owner = vehicle::Entity::find()
        .filter(vehicle::Column::PlateNumber.eq(plate.clone()))
        .one(&txn)
        .await?;
    if plate_owner.is_some_and(|v| v.owner_id != owner_id) {
        return Err(AppError::Conflict(format!(
            "Plate number {} is already registered",
            plate
        )));
    }

    let existing = vehicle::Entity::find()
        .filter(vehicle::Column::OwnerId.eq(owner_id))
        .lock_exclusive()
        .one(&txn)
        .await?;

    let vehicle = match existing {
        None => {
            let vehicle = vehicle::ActiveModel {
                id: Set(Uuid::new_v4()),
                owner_id: Set(owner_id),
                plate_number: Set(plate),
                vehicle_type: Set(vehicle_type),
                capacity: Set(input.capacity),
                model: Set(trimmed(input.model)),
                color: Set(trimmed(input.color)),
                created_at: Set(Utc::now().into()),
                deleted_at: Set(None),
            }
            .insert(&txn)
            .await?;

            provision_seats(&txn, vehicle.id, vehicle.capacity).await?;
            tracing::info!(vehicle_id = %vehicle.id, owner_id = %owner_id, "Vehicle registered");
            vehicle
        }
        Some(current) => {
            let resized = current.capacity != input.capacity;
            if resized {
                ensure_resizable(&txn, &current).await?;
            }

            let vehicle_id = current.id;
            let mut active: vehicle::ActiveModel = current.into();
            active.plate_number = Set(plate);
            active.vehicle_type = Set(vehicle_type);
            active.capacity = Set(input.capacity);
            active.model = Set(trimmed(input.model));
            active.color = Set(trimmed(input.color));
            active.deleted_at = Set(None);
            let vehicle = active.update(&txn).await?;

            if resized {
                provision_seats(&txn, vehicle_id, vehicle.capacity).await?;
            }
            tracing::info!(vehicle_id = %vehicle_id, resized, "Vehicle updated");
            vehicle
        }
    };

    let route = route_for_vehicle(&txn, vehicle.id).await?;
    let seats = seat_map(&txn, vehicle.id, None).await?;
    txn.commit().await?;

    Ok(VehicleDetails {
        vehicle,
        route,
        seats,
    })
}

async fn ensure_resizable<C: ConnectionTrait>(conn: &C, vehicle: &vehicle::Model) -> AppResult<()> {
    if let Some(route) = route_for_vehicle(conn, vehicle.id).await? {
        let active_ride = ride::Entity::find()
            .filter(ride::Column::RouteId.eq(route.id))
            .filter(ride::Column::Status.eq(RideStatus::Active))
            .one(conn)
            .await?;
        if active_ride.is_some() {
            return Err(AppError::Conflict(
                "Complete the active ride before changing capacity".to_string(),
            ));
        }
    }

    let seat_ids: Vec<Uuid> = seat::Entity::find()
        .filter(seat::Column::VehicleId.eq(vehicle.id))
        .all(conn)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();

    if !seat_ids.is_empty() {
        let held = booking::Entity::find()
            .filter(booking::Column::SeatId.is_in(seat_ids))
            .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
            .one(conn)
            .await?;
        if held.is_some() {
            return Err(AppError::Conflict(
                "Seats with confirmed bookings cannot be re-provisioned".to_string(),
            ));
        }
    }

    Ok(())
}

pub async fn get_my_vehicle(db: &DatabaseConnection, owner_id: Uuid) -> AppResult<VehicleDetails> {
    let vehicle = vehicle_for_owner(db, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No vehicle registered".to_string()))?;

    let route = route_for_vehicle(db, vehicle.id).await?;
    let active_ride = match &route {
        Some(route) => ride::Entity::find()
            .filter(ride::Column::RouteId.eq(route.id))
            .filter(ride::Column::Status.eq(RideStatus::Active))
            .one(db)
            .await?
            .map(|r| r.id),
        None => None,
    };
    let seats = seat_map(db, vehicle.id, active_ride).await?;

    Ok(VehicleDetails {
        vehicle,
        route,
        seats,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteInput {
    pub origin: String,
    pub destination: String,
    pub price_per_seat: i64,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub description: Option<String>,
}

/// Fields of a route that may change after registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteUpdate {
    pub price_per_seat: Option<i64>,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub description: Option<String>,
}

fn validate_place(label: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > MAX_PLACE_LEN {
        return Err(AppError::Validation(format!(
            "{} must be 1-{} characters",
            label, MAX_PLACE_LEN
        )));
    }
    Ok(value.to_string())
}

fn validate_route_numbers(
    price_per_seat: Option<i64>,
    distance_km: Option<f64>,
    duration_minutes: Option<i32>,
) -> AppResult<()> {
    if price_per_seat.is_some_and(|p| p < 0) {
        return Err(AppError::Validation(
            "Price per seat cannot be negative".to_string(),
        ));
    }
    if distance_km.is_some_and(|d| !d.is_finite() || d < 0.0) {
        return Err(AppError::Validation("Distance must be non-negative".to_string()));
    }
    if duration_minutes.is_some_and(|d| d <= 0) {
        return Err(AppError::Validation("Duration must be positive".to_string()));
    }
    Ok(())
}

/// Register the single route of the caller's vehicle.
pub async fn register_route(
    db: &DatabaseConnection,
    owner_id: Uuid,
    input: RouteInput,
) -> AppResult<route::Model> {
    let origin = validate_place("Origin", &input.origin)?;
    let destination = validate_place("Destination", &input.destination)?;
    if origin.eq_ignore_ascii_case(&destination) {
        return Err(AppError::Validation(
            "Origin and destination must be different".to_string(),
        ));
    }
    validate_route_numbers(
        Some(input.price_per_seat),
        input.distance_km,
        input.duration_minutes,
    )?;

    let txn = db.begin().await?;

    let vehicle = vehicle_for_owner(&txn, owner_id)
        .await?
        .ok_or_else(|| AppError::PreconditionFailed("Register a vehicle first".to_string()))?;

    let existing = route::Entity::find()
        .filter(route::Column::VehicleId.eq(vehicle.id))
        .lock_exclusive()
        .one(&txn)
        .await?;

    let route = match existing {
        Some(current) if current.deleted_at.is_none() => {
            return Err(AppError::Conflict(
                "This vehicle already has a route".to_string(),
            ));
        }
        Some(retired) => {
            let mut active: route::ActiveModel = retired.into();
            active.origin = Set(origin);
            active.destination = Set(destination);
            active.price_per_seat = Set(input.price_per_seat);
            active.distance_km = Set(input.distance_km);
            active.duration_minutes = Set(input.duration_minutes);
            active.description = Set(trimmed(input.description));
            active.deleted_at = Set(None);
            active.update(&txn).await?
        }
        None => {
            route::ActiveModel {
                id: Set(Uuid::new_v4()),
                vehicle_id: Set(vehicle.id),
                origin: Set(origin),
                destination: Set(destination),
                price_per_seat: Set(input.price_per_seat),
                distance_km: Set(input.distance_km),
                duration_minutes: Set(input.duration_minutes),
                description: Set(trimmed(input.description)),
                created_at: Set(Utc::now().into()),
                deleted_at: Set(None),
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit().await?;

    tracing::info!(
        route_id = %route.id,
        vehicle_id = %vehicle.id,
        origin = %route.origin,
        destination = %route.destination,
        price = route.price_per_seat,
        "Route registered"
    );

    Ok(route)
}

/// Update price and descriptive fields. Origin and destination are fixed.
pub async fn update_route(
    db: &DatabaseConnection,
    owner_id: Uuid,
    update: RouteUpdate,
) -> AppResult<route::Model> {
    validate_route_numbers(update.price_per_seat, update.distance_km, update.duration_minutes)?;
    if update.price_per_seat.is_none()
        && update.distance_km.is_none()
        && update.duration_minutes.is_none()
        && update.description.is_none()
    {
        return Err(AppError::Validation("Nothing to update".to_string()));
    }

    let vehicle = vehicle_for_owner(db, owner_id)
        .await?
        .ok_or_else(|| AppError::PreconditionFailed("Register a vehicle first".to_string()))?;
    let route = route_for_vehicle(db, vehicle.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No route registered".to_string()))?;

    let mut active: route::ActiveModel = route.into();
    if let Some(price) = update.price_per_seat {
        active.price_per_seat = Set(price);
    }
    if let Some(distance) = update.distance_km {
        active.distance_km = Set(Some(distance));
    }
    if let Some(duration) = update.duration_minutes {
        active.duration_minutes = Set(Some(duration));
    }
    if update.description.is_some() {
        active.description = Set(trimmed(update.description));
    }

    let route = active.update(db).await?;
    tracing::info!(route_id = %route.id, price = route.price_per_seat, "Route updated");
    Ok(route)
}
