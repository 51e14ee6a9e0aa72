pub mod batch_monitor;
pub mod config;
pub mod error;
pub mod session;
