//! `tally-core`: shared ledger primitives.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{AccountId, SYSTEM_ACCOUNT_ID, TransactionId};
pub use money::Amount;
