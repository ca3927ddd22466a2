pub mod config;
pub mod domain;
pub mod integration;
pub mod messaging;
pub mod metrics;
pub mod utils;
