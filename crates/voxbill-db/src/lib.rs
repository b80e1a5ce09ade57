//! VoxBill Database Layer
//!
//! This crate provides PostgreSQL database access and repository implementations
//! for the VoxBill system. It includes:
//!
//! - Connection pool management with sqlx
//! - Repository implementations for all domain entities
//! - Atomic conditional updates for capacity counters and wallet balances
//! - Optimized queries with longest prefix matching for the cost catalog
//! - Transaction support for invoice generation and top-ups

pub mod pool;
pub mod repositories;

pub use pool::create_pool;
pub use repositories::*;

// Re-export commonly used types
pub use sqlx::{PgPool, Postgres, Transaction};
pub use voxbill_core::{AppError, AppResult};
