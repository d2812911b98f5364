//! Strongly-typed identifiers used across the ledger.
//!
//! Both identifiers are caller-supplied strings; the wrappers only exist so
//! an account id can never be passed where a transaction id is expected.

use core::borrow::Borrow;
use serde::{Deserialize, Serialize};

/// Identifier of an account (balance holder).
///
/// Accounts have no registration step: an id becomes "known" the first time
/// a transaction touches it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

/// Identifier of a transaction (the idempotency key).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

/// Reserved counterparty for deposits and withdrawals.
pub const SYSTEM_ACCOUNT_ID: &str = "system";

macro_rules! impl_string_newtype {
    ($t:ty) => {
        impl $t {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl Borrow<str> for $t {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_newtype!(AccountId);
impl_string_newtype!(TransactionId);

impl AccountId {
    /// The reserved system account.
    pub fn system() -> Self {
        Self(SYSTEM_ACCOUNT_ID.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_ACCOUNT_ID
    }
}
