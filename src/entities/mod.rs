pub mod booking;
pub mod ride;
pub mod route;
pub mod seat;
pub mod user;
pub mod vehicle;
pub mod wallet;
pub mod wallet_transaction;
