//! Repository implementations for VoxBill entities

pub mod account_repo;
pub mod call_repo;
pub mod cost_repo;
pub mod invoice_repo;
pub mod plan_repo;
pub mod wallet_repo;

pub use account_repo::PgAccountRepository;
pub use call_repo::PgCallRepository;
pub use cost_repo::PgCostRepository;
pub use invoice_repo::PgInvoiceRepository;
pub use plan_repo::PgPlanRepository;
pub use wallet_repo::PgWalletRepository;
