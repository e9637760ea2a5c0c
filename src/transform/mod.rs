pub mod activity;
pub mod members;
