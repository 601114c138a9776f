pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod payload;
pub mod pipeline;
pub mod service;
pub mod storage;
pub mod store;
