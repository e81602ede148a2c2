//! Wallet balances and the append-only transaction ledger.
//!
//! Every balance change goes through [`post_entry`], which updates the wallet
//! row and appends the matching `wallet_transaction` row in the caller's
//! database transaction. Callers must hold the wallet row lock, obtained from
//! [`get_or_create_wallet`].

use chrono::Utc;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user;
use crate::entities::wallet;
use crate::entities::wallet_transaction::{
    self, PaymentMethod, TransactionStatus, TransactionType,
};
use crate::error::{AppError, AppResult};
use crate::utils::money::format_amount;

/// A balance change waiting to be posted.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub transaction_type: TransactionType,
    /// Signed: negative for debits.
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub booking_id: Option<Uuid>,
    pub ride_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub reference: Option<String>,
    pub description: Option<String>,
}

impl LedgerEntry {
    pub fn new(transaction_type: TransactionType, amount: i64, payment_method: PaymentMethod) -> Self {
        Self {
            transaction_type,
            amount,
            payment_method,
            booking_id: None,
            ride_id: None,
            recipient_id: None,
            reference: None,
            description: None,
        }
    }

    pub fn booking(mut self, booking_id: Uuid) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    pub fn ride(mut self, ride_id: Uuid) -> Self {
        self.ride_id = Some(ride_id);
        self
    }

    pub fn recipient(mut self, recipient_id: Uuid) -> Self {
        self.recipient_id = Some(recipient_id);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Fetch the user's wallet with a row lock, creating it with a zero balance
/// on first use. Safe to call concurrently for the same user.
pub async fn get_or_create_wallet<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<wallet::Model> {
    let now = Utc::now();
    let fresh = wallet::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        balance: Set(0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    wallet::Entity::insert(fresh)
        .on_conflict(
            OnConflict::column(wallet::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    wallet::Entity::find()
        .filter(wallet::Column::UserId.eq(user_id))
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Wallet for user {} vanished", user_id)))
}

/// Apply `entry` to a locked wallet and append the ledger row.
/// Debits that would take the balance below zero fail with `InsufficientFunds`.
pub async fn post_entry<C: ConnectionTrait>(
    conn: &C,
    wallet: wallet::Model,
    entry: LedgerEntry,
) -> AppResult<(wallet::Model, wallet_transaction::Model)> {
    let balance_before = wallet.balance;
    let balance_after = balance_before
        .checked_add(entry.amount)
        .ok_or_else(|| AppError::Validation("Amount out of range".to_string()))?;

    if entry.amount < 0 && balance_after < 0 {
        return Err(AppError::InsufficientFunds {
            required: -entry.amount,
            available: balance_before,
        });
    }

    let user_id = wallet.user_id;
    let sequence = next_sequence(conn, user_id).await?;
    let now = Utc::now();

    let mut active: wallet::ActiveModel = wallet.into();
    active.balance = Set(balance_after);
    active.updated_at = Set(now.into());
    let wallet = active.update(conn).await?;

    let record = wallet_transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        transaction_type: Set(entry.transaction_type),
        amount: Set(entry.amount),
        balance_before: Set(balance_before),
        balance_after: Set(balance_after),
        status: Set(TransactionStatus::Completed),
        payment_method: Set(entry.payment_method),
        booking_id: Set(entry.booking_id),
        ride_id: Set(entry.ride_id),
        recipient_id: Set(entry.recipient_id),
        reference: Set(entry.reference),
        description: Set(entry.description),
        sequence: Set(sequence),
        created_at: Set(now.into()),
    }
    .insert(conn)
    .await?;

    tracing::debug!(
        user_id = %user_id,
        kind = ?record.transaction_type,
        amount = record.amount,
        balance_after,
        "Ledger entry posted"
    );

    Ok((wallet, record))
}

async fn next_sequence<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<i64> {
    let last = wallet_transaction::Entity::find()
        .filter(wallet_transaction::Column::UserId.eq(user_id))
        .order_by_desc(wallet_transaction::Column::Sequence)
        .one(conn)
        .await?;

    Ok(last.map(|t| t.sequence + 1).unwrap_or(1))
}

fn require_positive(amount: i64) -> AppResult<()> {
    if amount <= 0 {
        return Err(AppError::Validation(
            "Amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Current wallet, created on first access.
pub async fn get_wallet(db: &DatabaseConnection, user_id: Uuid) -> AppResult<wallet::Model> {
    let txn = db.begin().await?;
    let wallet = get_or_create_wallet(&txn, user_id).await?;
    txn.commit().await?;
    Ok(wallet)
}

/// Ledger rows for a user, newest first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> AppResult<Vec<wallet_transaction::Model>> {
    let rows = wallet_transaction::Entity::find()
        .filter(wallet_transaction::Column::UserId.eq(user_id))
        .order_by_desc(wallet_transaction::Column::Sequence)
        .all(db)
        .await?;
    Ok(rows)
}

/// Credit a wallet from an outside payment source. Test-mode: no gateway is called.
pub async fn charge_wallet(
    db: &DatabaseConnection,
    user_id: Uuid,
    amount: i64,
    payment_method: PaymentMethod,
) -> AppResult<wallet_transaction::Model> {
    require_positive(amount)?;

    let txn = db.begin().await?;
    let wallet = get_or_create_wallet(&txn, user_id).await?;
    let entry = LedgerEntry::new(TransactionType::Deposit, amount, payment_method)
        .reference(format!("DEP-{}", Uuid::new_v4().simple()))
        .description(format!("Wallet top-up of {}", format_amount(amount)));
    let (wallet, record) = post_entry(&txn, wallet, entry).await?;
    txn.commit().await?;

    tracing::info!(
        user_id = %user_id,
        amount,
        method = ?payment_method,
        balance = wallet.balance,
        "Wallet charged"
    );

    Ok(record)
}

pub async fn withdraw_money(
    db: &DatabaseConnection,
    user_id: Uuid,
    amount: i64,
) -> AppResult<wallet_transaction::Model> {
    require_positive(amount)?;

    let txn = db.begin().await?;
    let wallet = get_or_create_wallet(&txn, user_id).await?;
    if wallet.balance < amount {
        return Err(AppError::InsufficientFunds {
            required: amount,
            available: wallet.balance,
        });
    }

    let entry = LedgerEntry::new(TransactionType::Withdrawal, -amount, PaymentMethod::BankTransfer)
        .reference(format!("WDR-{}", Uuid::new_v4().simple()))
        .description(format!("Withdrawal of {}", format_amount(amount)));
    let (wallet, record) = post_entry(&txn, wallet, entry).await?;
    txn.commit().await?;

    tracing::info!(user_id = %user_id, amount, balance = wallet.balance, "Wallet withdrawal");

    Ok(record)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferDestination {
    /// Another user's wallet, identified by email or phone number.
    Wallet,
    /// An external bank account, identified by account number.
    Bank,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub reference: String,
    pub amount: i64,
    pub destination: TransferDestination,
    pub recipient_id: Option<Uuid>,
    pub sender_balance: i64,
}

pub async fn transfer_money(
    db: &DatabaseConnection,
    sender_id: Uuid,
    amount: i64,
    destination: TransferDestination,
    recipient_identifier: &str,
) -> AppResult<TransferReceipt> {
    require_positive(amount)?;

    let identifier = recipient_identifier.trim();
    if identifier.is_empty() {
        return Err(AppError::Validation("Recipient is required".to_string()));
    }

    let reference = format!("TRF-{}", Uuid::new_v4().simple());

    match destination {
        TransferDestination::Wallet => {
            let recipient = find_recipient(db, identifier).await?;
            if recipient.id == sender_id {
                return Err(AppError::Validation(
                    "Cannot transfer to your own wallet".to_string(),
                ));
            }

            let txn = db.begin().await?;

            // Lock both wallets in id order
            let (sender_wallet, recipient_wallet) = if sender_id < recipient.id {
                let s = get_or_create_wallet(&txn, sender_id).await?;
                let r = get_or_create_wallet(&txn, recipient.id).await?;
                (s, r)
            } else {
                let r = get_or_create_wallet(&txn, recipient.id).await?;
                let s = get_or_create_wallet(&txn, sender_id).await?;
                (s, r)
            };

            if sender_wallet.balance < amount {
                return Err(AppError::InsufficientFunds {
                    required: amount,
                    available: sender_wallet.balance,
                });
            }

            let out = LedgerEntry::new(TransactionType::TransferOut, -amount, PaymentMethod::Wallet)
                .recipient(recipient.id)
                .reference(reference.clone())
                .description(format!("Transfer to {}", recipient.name));
            let (sender_wallet, _) = post_entry(&txn, sender_wallet, out).await?;

            let incoming =
                LedgerEntry::new(TransactionType::TransferIn, amount, PaymentMethod::Wallet)
                    .recipient(sender_id)
                    .reference(reference.clone())
                    .description("Transfer received".to_string());
            post_entry(&txn, recipient_wallet, incoming).await?;

            txn.commit().await?;

            tracing::info!(
                sender_id = %sender_id,
                recipient_id = %recipient.id,
                amount,
                reference = %reference,
                "Wallet transfer completed"
            );

            Ok(TransferReceipt {
                reference,
                amount,
                destination,
                recipient_id: Some(recipient.id),
                sender_balance: sender_wallet.balance,
            })
        }
        TransferDestination::Bank => {
            let txn = db.begin().await?;
            let wallet = get_or_create_wallet(&txn, sender_id).await?;
            if wallet.balance < amount {
                return Err(AppError::InsufficientFunds {
                    required: amount,
                    available: wallet.balance,
                });
            }

            let out = LedgerEntry::new(
                TransactionType::TransferOut,
                -amount,
                PaymentMethod::BankTransfer,
            )
            .reference(reference.clone())
            .description(format!("Bank transfer to account {}", identifier));
            let (wallet, _) = post_entry(&txn, wallet, out).await?;
            txn.commit().await?;

            tracing::info!(
                sender_id = %sender_id,
                amount,
                reference = %reference,
                "Bank transfer recorded"
            );

            Ok(TransferReceipt {
                reference,
                amount,
                destination,
                recipient_id: None,
                sender_balance: wallet.balance,
            })
        }
    }
}

async fn find_recipient(db: &DatabaseConnection, identifier: &str) -> AppResult<user::Model> {
    let column = if identifier.contains('@') {
        user::Column::Email
    } else {
        user::Column::PhoneNumber
    };
    let needle = if identifier.contains('@') {
        identifier.to_lowercase()
    } else {
        identifier.to_string()
    };

    user::Entity::find()
        .filter(column.eq(needle))
        .filter(user::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipient not found".to_string()))
}

/// Result of checking a wallet against its ledger.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub user_id: Uuid,
    pub wallet_balance: i64,
    /// `balance_after` of the newest ledger row, or 0 without rows.
    pub ledger_balance: i64,
    pub entry_count: usize,
    /// Every row satisfies `after == before + amount` and starts where the
    /// previous row ended.
    pub chain_consistent: bool,
    pub balanced: bool,
}

pub async fn reconcile_wallet(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> AppResult<ReconciliationReport> {
    let wallet_balance = wallet::Entity::find()
        .filter(wallet::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .map(|w| w.balance)
        .unwrap_or(0);

    let rows = wallet_transaction::Entity::find()
        .filter(wallet_transaction::Column::UserId.eq(user_id))
        .order_by_asc(wallet_transaction::Column::Sequence)
        .all(db)
        .await?;

    let mut running = 0i64;
    let mut chain_consistent = true;
    for row in &rows {
        if row.balance_before != running || row.balance_before + row.amount != row.balance_after {
            chain_consistent = false;
        }
        running = row.balance_after;
    }

    let ledger_balance = rows.last().map(|r| r.balance_after).unwrap_or(0);
    let balanced = chain_consistent && ledger_balance == wallet_balance;

    if !balanced {
        tracing::warn!(
            user_id = %user_id,
            wallet_balance,
            ledger_balance,
            chain_consistent,
            "Wallet does not reconcile with ledger"
        );
    }

    Ok(ReconciliationReport {
        user_id,
        wallet_balance,
        ledger_balance,
        entry_count: rows.len(),
        chain_consistent,
        balanced,
    })
}
