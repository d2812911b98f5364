//! Ledger data model: entries, transactions, journal rows and posting requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{AccountId, Amount, TransactionId};

/// One side of a transaction.
///
/// At most one of `debit` / `credit` is nonzero. Zero sides are omitted when
/// serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub account_id: AccountId,
    #[serde(default, skip_serializing_if = "Amount::is_zero")]
    pub debit: Amount,
    #[serde(default, skip_serializing_if = "Amount::is_zero")]
    pub credit: Amount,
}

impl Entry {
    pub fn debit(account_id: AccountId, amount: Amount) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Amount::ZERO,
        }
    }

    pub fn credit(account_id: AccountId, amount: Amount) -> Self {
        Self {
            account_id,
            debit: Amount::ZERO,
            credit: amount,
        }
    }

    /// Effect of this entry on the account balance (credit-positive).
    pub fn signed_amount(&self) -> Amount {
        self.credit - self.debit
    }
}

/// Immutable record of an applied posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<Entry>,
}

impl Transaction {
    /// Build a balanced two-entry transaction moving `amount` from `debit` to `credit`.
    pub fn two_legged(
        id: TransactionId,
        timestamp: DateTime<Utc>,
        debit: AccountId,
        credit: AccountId,
        amount: Amount,
    ) -> Self {
        Self {
            id,
            timestamp,
            entries: vec![Entry::debit(debit, amount), Entry::credit(credit, amount)],
        }
    }

    /// `None` if the sum cannot be represented.
    pub fn total_debits(&self) -> Option<Amount> {
        self.entries
            .iter()
            .try_fold(Amount::ZERO, |acc, e| acc.checked_add(e.debit))
    }

    /// `None` if the sum cannot be represented.
    pub fn total_credits(&self) -> Option<Amount> {
        self.entries
            .iter()
            .try_fold(Amount::ZERO, |acc, e| acc.checked_add(e.credit))
    }

    /// Exactly two entries, one debit and one credit of the same magnitude.
    pub fn is_balanced(&self) -> bool {
        match self.entries.as_slice() {
            [a, b] => {
                let one_sided = |e: &Entry| e.debit.is_zero() != e.credit.is_zero();
                one_sided(a)
                    && one_sided(b)
                    && a.signed_amount().checked_add(b.signed_amount()) == Some(Amount::ZERO)
            }
            _ => false,
        }
    }
}

/// Per-account view of a transaction (derived, never stored).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRow {
    pub tx_id: TransactionId,
    pub account_id: AccountId,
    pub counterparty_id: AccountId,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Amount::is_zero")]
    pub debit: Amount,
    #[serde(default, skip_serializing_if = "Amount::is_zero")]
    pub credit: Amount,
}

/// Credit `account_id` from the system account.
///
/// `timestamp` is the client's clock and is informational only; the ledger
/// stamps transactions with its own clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl DepositRequest {
    pub fn new(id: impl Into<TransactionId>, account_id: impl Into<AccountId>, amount: Amount) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            amount,
            timestamp: None,
        }
    }
}

/// Debit `account_id` into the system account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WithdrawRequest {
    pub fn new(id: impl Into<TransactionId>, account_id: impl Into<AccountId>, amount: Amount) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            amount,
            timestamp: None,
        }
    }
}

/// Move `amount` from `debit_account_id` to `credit_account_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: TransactionId,
    pub debit_account_id: AccountId,
    pub credit_account_id: AccountId,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TransferRequest {
    pub fn new(
        id: impl Into<TransactionId>,
        debit_account_id: impl Into<AccountId>,
        credit_account_id: impl Into<AccountId>,
        amount: Amount,
    ) -> Self {
        Self {
            id: id.into(),
            debit_account_id: debit_account_id.into(),
            credit_account_id: credit_account_id.into(),
            amount,
            timestamp: None,
        }
    }
}

/// Successful result of a posting operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// The request was applied; carries the appended transaction.
    Applied(Transaction),
    /// The id was already applied earlier; nothing changed.
    Duplicate,
}

impl PostOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PostOutcome::Applied(_))
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            PostOutcome::Applied(tx) => Some(tx),
            PostOutcome::Duplicate => None,
        }
    }
}

/// Locking discipline for reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Serialize with writers; point-in-time consistent.
    #[default]
    Consistent,
    /// Never wait for a writer; may return a recently captured snapshot.
    Relaxed,
}

impl From<bool> for ReadMode {
    fn from(consistent: bool) -> Self {
        if consistent {
            ReadMode::Consistent
        } else {
            ReadMode::Relaxed
        }
    }
}
