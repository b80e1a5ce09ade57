//! API layer for VoxBill
//!
//! HTTP handlers exposing the pricing, capacity, and billing contracts
//! to the call-handling layer, the payment-gateway adapter, and the
//! scheduler that triggers invoice generation.

pub mod dto;
pub mod handlers;

// Re-export DTOs (common types)
pub use dto::{ApiResponse, PaginationParams};

// Re-export handler configuration functions
pub use handlers::{
    configure_accounts, configure_calls, configure_capacity, configure_invoices, configure_plans,
    configure_rates, configure_stats, configure_wallets,
};
