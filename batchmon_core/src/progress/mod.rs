pub mod estimator;
pub mod notifier;
pub mod observer;
pub mod snapshot;
