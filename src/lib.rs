//! Shortener - URL shortening service with debounced batch deletion
//!
//! # Architecture
//! - `utils`: short code generation and helpers
//! - `storage`: persistence contract and backends (memory, append-only file, SeaORM)
//! - `services`: shortening orchestrator and the deletion debouncer
//! - `api`: HTTP handlers and middleware
//! - `config`: configuration management
//! - `runtime`: application lifecycle and execution modes
//! - `system`: logging initialization

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
