// src/lib.rs

//! Discount Watch Library
//!
//! Tracks a discounted product listing between runs and reports products
//! and sizes that became available since the previous run.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
