//! Banner click counter library exports

pub mod aggregator;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod server;
pub mod services;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod tasks;
