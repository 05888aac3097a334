//! PostgreSQL storage for plans produced by stepwise.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
