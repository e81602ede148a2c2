mod common;

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use ride_booking_backend::entities::user;
use ride_booking_backend::entities::wallet;
use ride_booking_backend::entities::wallet_transaction::{self, PaymentMethod, TransactionType};
use ride_booking_backend::error::AppError;
use ride_booking_backend::services::ledger::{
    charge_wallet, get_wallet, list_transactions, reconcile_wallet, transfer_money,
    withdraw_money, TransferDestination,
};

use common::*;

#[tokio::test]
async fn test_wallet_is_created_lazily_with_zero_balance() {
    let db = setup_db().await;
    let passenger = create_passenger(&db, "Newcomer").await;

    let first = get_wallet(&db, passenger.id).await.unwrap();
    let second = get_wallet(&db, passenger.id).await.unwrap();

    assert_eq!(first.balance, 0);
    assert_eq!(first.id, second.id);

    let report = reconcile_wallet(&db, passenger.id).await.unwrap();
    assert_eq!(report.entry_count, 0);
    assert!(report.balanced);
}

#[tokio::test]
async fn test_charge_and_withdraw_keep_the_chain() {
    let db = setup_db().await;
    let passenger = create_passenger(&db, "Saver").await;

    let deposit = charge_wallet(&db, passenger.id, 2_500, PaymentMethod::MobileMoney)
        .await
        .unwrap();
    assert_eq!(deposit.transaction_type, TransactionType::Deposit);
    assert_eq!(deposit.payment_method, PaymentMethod::MobileMoney);
    assert_eq!(deposit.balance_before, 0);
    assert_eq!(deposit.balance_after, 2_500);
    assert_eq!(deposit.sequence, 1);

    let withdrawal = withdraw_money(&db, passenger.id, 1_000).await.unwrap();
    assert_eq!(withdrawal.amount, -1_000);
    assert_eq!(withdrawal.balance_before, 2_500);
    assert_eq!(withdrawal.balance_after, 1_500);
    assert_eq!(withdrawal.sequence, 2);

    let err = withdraw_money(&db, passenger.id, 5_000).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds { .. }));

    let err = charge_wallet(&db, passenger.id, 0, PaymentMethod::Card)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let rows = list_transactions(&db, passenger.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, withdrawal.id);
    assert_eq!(balance(&db, passenger.id).await, 1_500);
    assert_reconciles(&db, passenger.id).await;
}

#[tokio::test]
async fn test_transfer_between_wallets_by_email_and_phone() {
    let db = setup_db().await;
    let sender = create_passenger(&db, "Sender").await;
    let recipient = create_passenger(&db, "Recipient").await;

    let mut active: user::ActiveModel = recipient.clone().into();
    active.phone_number = Set(Some("+254700000001".to_string()));
    active.update(&db).await.unwrap();

    fund(&db, sender.id, 1_000).await;

    let receipt = transfer_money(
        &db,
        sender.id,
        300,
        TransferDestination::Wallet,
        &recipient.email.to_uppercase(),
    )
    .await
    .unwrap();
    assert_eq!(receipt.sender_balance, 700);
    assert_eq!(receipt.recipient_id, Some(recipient.id));

    transfer_money(&db, sender.id, 200, TransferDestination::Wallet, "+254700000001")
        .await
        .unwrap();

    assert_eq!(balance(&db, sender.id).await, 500);
    assert_eq!(balance(&db, recipient.id).await, 500);

    let incoming = wallet_transaction::Entity::find()
        .filter(wallet_transaction::Column::UserId.eq(recipient.id))
        .filter(wallet_transaction::Column::TransactionType.eq(TransactionType::TransferIn))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(incoming.len(), 2);
    assert!(incoming.iter().all(|t| t.recipient_id == Some(sender.id)));

    let outgoing = wallet_transaction::Entity::find()
        .filter(wallet_transaction::Column::UserId.eq(sender.id))
        .filter(wallet_transaction::Column::Reference.eq(receipt.reference.clone()))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outgoing.transaction_type, TransactionType::TransferOut);
    assert_eq!(outgoing.amount, -300);

    assert_reconciles(&db, sender.id).await;
    assert_reconciles(&db, recipient.id).await;
}

#[tokio::test]
async fn test_transfer_refusals() {
    let db = setup_db().await;
    let sender = create_passenger(&db, "Solo").await;
    fund(&db, sender.id, 100).await;

    let err = transfer_money(&db, sender.id, 50, TransferDestination::Wallet, &sender.email)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = transfer_money(
        &db,
        sender.id,
        50,
        TransferDestination::Wallet,
        "nobody@example.com",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let friend = create_passenger(&db, "Friend").await;
    let err = transfer_money(&db, sender.id, 500, TransferDestination::Wallet, &friend.email)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds { .. }));

    assert_eq!(balance(&db, sender.id).await, 100);
    assert_eq!(balance(&db, friend.id).await, 0);
}

#[tokio::test]
async fn test_bank_transfer_only_debits_sender() {
    let db = setup_db().await;
    let sender = create_passenger(&db, "Banker").await;
    fund(&db, sender.id, 1_000).await;

    let receipt = transfer_money(&db, sender.id, 400, TransferDestination::Bank, "0123456789")
        .await
        .unwrap();

    assert_eq!(receipt.recipient_id, None);
    assert_eq!(receipt.sender_balance, 600);

    let rows = list_transactions(&db, sender.id).await.unwrap();
    assert_eq!(rows[0].transaction_type, TransactionType::TransferOut);
    assert_eq!(rows[0].payment_method, PaymentMethod::BankTransfer);
    assert_reconciles(&db, sender.id).await;
}

#[tokio::test]
async fn test_reconcile_detects_tampered_balance() {
    let db = setup_db().await;
    let passenger = create_passenger(&db, "Tampered").await;
    fund(&db, passenger.id, 100).await;

    let stored = wallet::Entity::find()
        .filter(wallet::Column::UserId.eq(passenger.id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let mut active: wallet::ActiveModel = stored.into();
    active.balance = Set(999);
    active.update(&db).await.unwrap();

    let report = reconcile_wallet(&db, passenger.id).await.unwrap();
    assert!(report.chain_consistent);
    assert!(!report.balanced);
    assert_eq!(report.wallet_balance, 999);
    assert_eq!(report.ledger_balance, 100);
}
