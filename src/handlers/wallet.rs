use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::wallet_transaction::{self, PaymentMethod};
use crate::error::{AppError, AppResult};
use crate::services::ledger::{self, TransferDestination, TransferReceipt};
use crate::utils::jwt::Claims;
use crate::utils::money::{format_amount, parse_amount};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub user_id: Uuid,
    /// Minor units.
    pub balance: i64,
    pub formatted_balance: String,
}

/// Amounts arrive as decimal strings, e.g. "12.50".
#[derive(Debug, Deserialize)]
pub struct ChargeRequest {
    pub amount: String,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub amount: String,
    pub destination: TransferDestination,
    /// Email or phone for WALLET, account number for BANK.
    pub recipient: String,
}

/// Get the caller's wallet
pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<WalletResponse>> {
    let wallet = ledger::get_wallet(&state.db, claims.sub).await?;

    Ok(Json(WalletResponse {
        user_id: wallet.user_id,
        balance: wallet.balance,
        formatted_balance: format_amount(wallet.balance),
    }))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<wallet_transaction::Model>>> {
    let rows = ledger::list_transactions(&state.db, claims.sub).await?;
    Ok(Json(rows))
}

/// Top up the wallet
pub async fn charge(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChargeRequest>,
) -> AppResult<Json<wallet_transaction::Model>> {
    let amount = parse_amount(&payload.amount)?;
    let record =
        ledger::charge_wallet(&state.db, claims.sub, amount, payload.payment_method).await?;
    Ok(Json(record))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<WithdrawRequest>,
) -> AppResult<Json<wallet_transaction::Model>> {
    let amount = parse_amount(&payload.amount)?;
    let record = ledger::withdraw_money(&state.db, claims.sub, amount).await?;
    Ok(Json(record))
}

pub async fn transfer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<TransferRequest>,
) -> AppResult<Json<TransferReceipt>> {
    let amount = parse_amount(&payload.amount)?;
    if payload.recipient.trim().is_empty() {
        return Err(AppError::Validation("Recipient is required".to_string()));
    }

    let receipt = ledger::transfer_money(
        &state.db,
        claims.sub,
        amount,
        payload.destination,
        &payload.recipient,
    )
    .await?;
    Ok(Json(receipt))
}
