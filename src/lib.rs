pub mod api;
pub mod client;
pub mod config;
pub mod controller;
pub mod domain;
pub mod store;
pub mod telemetry;
