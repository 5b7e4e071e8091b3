pub mod constants;
pub mod ticket;
pub mod time;
pub mod types;
