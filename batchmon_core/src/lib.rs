pub mod monitor;
pub mod progress;
pub mod source;
pub mod types;
