//! Data Transfer Objects (DTOs) for API requests and responses

pub mod account;
pub mod billing;
pub mod call;
pub mod capacity;
pub mod common;
pub mod plan;
pub mod rate;
pub mod wallet;

pub use account::*;
pub use billing::*;
pub use call::*;
pub use capacity::*;
pub use common::*;
pub use plan::*;
pub use rate::*;
pub use wallet::*;
