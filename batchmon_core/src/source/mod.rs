pub mod batch_registry;
pub mod http_client;
pub mod progress_source;
