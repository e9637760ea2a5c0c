pub mod common;
pub mod job;
pub mod member;
