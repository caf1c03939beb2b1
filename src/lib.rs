pub mod chain;
pub mod config;
pub mod errors;
pub mod execution;
pub mod history;
pub mod metrics;
pub mod models;
pub mod quote;
pub mod scheduler;
pub mod units;
