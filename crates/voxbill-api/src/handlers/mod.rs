//! HTTP request handlers

pub mod account;
pub mod call;
pub mod capacity;
pub mod invoice;
pub mod plan;
pub mod rate;
pub mod stats;
pub mod wallet;

pub use account::configure as configure_accounts;
pub use call::configure as configure_calls;
pub use capacity::configure as configure_capacity;
pub use invoice::configure as configure_invoices;
pub use plan::configure as configure_plans;
pub use rate::configure as configure_rates;
pub use stats::configure as configure_stats;
pub use wallet::configure as configure_wallets;
