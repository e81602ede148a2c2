pub mod admin;
pub mod auth;
pub mod driver;
pub mod passenger;
pub mod wallet;
