pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gpio;
pub mod indicator;
pub mod link;
pub mod monitor;
pub mod occupancy;
pub mod sensor;
pub mod state;
