pub mod bookings;
pub mod ledger;
pub mod lookup;
pub mod rides;
pub mod seats;
pub mod users;
pub mod vehicles;
