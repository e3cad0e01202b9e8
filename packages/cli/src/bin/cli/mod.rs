pub mod maintenance;
pub mod seats;
pub mod sessions;
pub mod utils;
