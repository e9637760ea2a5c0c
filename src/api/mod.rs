pub mod backoff;
pub mod client;
pub mod fetchers;
pub mod model;
pub mod proxy;
