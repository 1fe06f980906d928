//! # Controller
//!
//! Core controller modules for the AgeSecret controller.
//!
//! - `backoff`: Fibonacci and exponential backoff schedules
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;
