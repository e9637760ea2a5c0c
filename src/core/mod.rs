pub mod benchmark;
pub mod metrics;
pub mod notify;
pub mod processor;
pub mod stats;
pub mod store;
pub mod tasks;
