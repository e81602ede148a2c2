//! Account administration.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entities::ride::{self, RideStatus};
use crate::entities::route;
use crate::entities::user::{self, UserRole};
use crate::entities::vehicle;
use crate::error::{AppError, AppResult};
use crate::services::vehicles::{route_for_vehicle, vehicle_for_owner};

/// Live accounts, optionally filtered by role, oldest first.
pub async fn list_users(
    db: &DatabaseConnection,
    role: Option<UserRole>,
) -> AppResult<Vec<user::Model>> {
    let mut query = user::Entity::find().filter(user::Column::DeletedAt.is_null());
    if let Some(role) = role {
        query = query.filter(user::Column::Role.eq(role));
    }
    Ok(query.order_by_asc(user::Column::CreatedAt).all(db).await?)
}

/// Soft-delete an account. A driver's vehicle and route go with it so
/// lookups stop resolving to them; bookings and ledger rows are kept.
pub async fn soft_delete_user(db: &DatabaseConnection, user_id: Uuid) -> AppResult<user::Model> {
    let txn = db.begin().await?;

    let user = user::Entity::find_by_id(user_id)
        .filter(user::Column::DeletedAt.is_null())
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.role == UserRole::Admin {
        return Err(AppError::Forbidden(
            "Admin accounts cannot be deleted".to_string(),
        ));
    }

    let now = Utc::now();

    if let Some(vehicle) = vehicle_for_owner(&txn, user_id).await? {
        if let Some(route) = route_for_vehicle(&txn, vehicle.id).await? {
            let running = ride::Entity::find()
                .filter(ride::Column::RouteId.eq(route.id))
                .filter(ride::Column::Status.eq(RideStatus::Active))
                .one(&txn)
                .await?;
            if running.is_some() {
                return Err(AppError::Conflict(
                    "Driver has an active ride; complete it first".to_string(),
                ));
            }

            let mut active: route::ActiveModel = route.into();
            active.deleted_at = Set(Some(now.into()));
            active.update(&txn).await?;
        }

        let mut active: vehicle::ActiveModel = vehicle.into();
        active.deleted_at = Set(Some(now.into()));
        active.update(&txn).await?;
    }

    let mut active: user::ActiveModel = user.into();
    active.deleted_at = Set(Some(now.into()));
    let user = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(user_id = %user_id, role = ?user.role, "User soft-deleted");

    Ok(user)
}

/// Every ride, newest departure first.
pub async fn list_rides(
    db: &DatabaseConnection,
    status: Option<RideStatus>,
) -> AppResult<Vec<ride::Model>> {
    let mut query = ride::Entity::find();
    if let Some(status) = status {
        query = query.filter(ride::Column::Status.eq(status));
    }
    Ok(query
        .order_by_desc(ride::Column::DepartureTime)
        .all(db)
        .await?)
}
