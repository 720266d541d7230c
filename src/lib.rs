pub mod apis;
pub mod app;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod rate_limiter;
pub mod retry;
pub mod types;
