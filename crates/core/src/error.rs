//! Domain error model.

use thiserror::Error;

use crate::id::AccountId;
use crate::money::Amount;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Rejection of a posting request.
///
/// Every variant is caller-correctable and is returned before any state is
/// touched: a rejected request never marks its id as seen, so a corrected
/// retry with the same id can still be applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Amount was zero or negative.
    #[error("amount must be > 0 (got {amount})")]
    InvalidAmount { amount: Amount },

    /// The debited account cannot cover the amount.
    #[error("insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        available: Amount,
        requested: Amount,
    },

    /// Debit and credit side name the same account.
    #[error("debit and credit account must differ (both are {account})")]
    SameAccount { account: AccountId },

    /// Applying the amount would take the balance outside the representable range.
    #[error("amount {amount} would overflow the balance of account {account} (currently {balance})")]
    AmountOutOfRange {
        account: AccountId,
        balance: Amount,
        amount: Amount,
    },
}

impl DomainError {
    pub fn invalid_amount(amount: Amount) -> Self {
        Self::InvalidAmount { amount }
    }

    pub fn insufficient_funds(account: AccountId, available: Amount, requested: Amount) -> Self {
        Self::InsufficientFunds {
            account,
            available,
            requested,
        }
    }

    pub fn same_account(account: AccountId) -> Self {
        Self::SameAccount { account }
    }

    pub fn amount_out_of_range(account: AccountId, balance: Amount, amount: Amount) -> Self {
        Self::AmountOutOfRange {
            account,
            balance,
            amount,
        }
    }

    /// Stable machine-readable code (used in API error bodies and logs).
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidAmount { .. } => "invalid_amount",
            DomainError::InsufficientFunds { .. } => "insufficient_funds",
            DomainError::SameAccount { .. } => "same_account",
            DomainError::AmountOutOfRange { .. } => "amount_out_of_range",
        }
    }

    /// `true` for malformed requests, `false` for business-rule rejections.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidAmount { .. }
                | DomainError::SameAccount { .. }
                | DomainError::AmountOutOfRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn messages_carry_the_offending_values() {
        let err = DomainError::insufficient_funds(AccountId::from("alice"), dec!(10), dec!(40));
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("10"));
        assert!(msg.contains("40"));
    }

    #[test]
    fn validation_and_business_rejections_are_distinguished() {
        assert!(DomainError::invalid_amount(dec!(-5)).is_validation());
        assert!(DomainError::same_account(AccountId::from("a")).is_validation());
        assert!(
            DomainError::amount_out_of_range(AccountId::from("a"), Amount::MAX, dec!(1))
                .is_validation()
        );
        assert!(
            !DomainError::insufficient_funds(AccountId::from("a"), dec!(0), dec!(1)).is_validation()
        );
    }
}
