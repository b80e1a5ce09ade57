//! Domain models for VoxBill
//!
//! This module contains all the core domain models used throughout the application.

pub mod account;
pub mod call;
pub mod invoice;
pub mod plan;
pub mod rate;
pub mod stats;
pub mod tax;
pub mod wallet;

pub use account::{Account, AccountRole, BillingType};
pub use call::{CallRecord, CallStatus};
pub use invoice::{Invoice, InvoiceLine, InvoiceStatus};
pub use plan::{PlanType, PricingPlan};
pub use rate::{ConfiguredRate, CostEntry};
pub use stats::{ChannelInfo, CompanyStats, ResellerStats};
pub use tax::{TaxBreakdown, TaxType};
pub use wallet::{Payment, PaymentMethod, Wallet};
