pub mod jwt;
pub mod money;
pub mod plate;
pub mod seat_code;
