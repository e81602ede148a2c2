use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::ride::{self, RideStatus};
use crate::entities::user::{self, UserRole};
use crate::error::AppResult;
use crate::services::ledger::{self, ReconciliationReport};
use crate::services::users;
use crate::AppState;

// ============ User Management ============

#[derive(Debug, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            phone_number: u.phone_number,
            role: u.role,
            created_at: u.created_at.with_timezone(&Utc),
        }
    }
}

/// List all users (admin)
pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let users = users::list_users(&state.db, filter.role).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Soft-delete a user account (admin)
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    users::soft_delete_user(&state.db, user_id).await?;
    Ok(Json(serde_json::json!({ "message": "User deleted" })))
}

// ============ Rides ============

#[derive(Debug, Deserialize)]
pub struct RideFilter {
    pub status: Option<RideStatus>,
}

pub async fn list_rides(
    State(state): State<AppState>,
    Query(filter): Query<RideFilter>,
) -> AppResult<Json<Vec<ride::Model>>> {
    Ok(Json(users::list_rides(&state.db, filter.status).await?))
}

// ============ Ledger ============

/// Check a user's wallet against its transaction ledger (admin)
pub async fn reconcile_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ReconciliationReport>> {
    Ok(Json(ledger::reconcile_wallet(&state.db, user_id).await?))
}
