// lib.rs
pub mod cloud;
pub mod commands;
pub mod config;
pub mod devices;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod session;
pub mod utils;
pub mod worker;
