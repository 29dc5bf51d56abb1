pub mod common;
pub mod config;
pub mod crew;
pub mod domain;
pub mod pipeline;
pub mod tools;

// Layered boundaries: use cases and ports, and the adapters behind them
pub mod app;
pub mod infra;

pub mod observability;
