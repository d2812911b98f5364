//! Views derived from the transaction log.
//!
//! Nothing here is stored: every call re-scans the log it is given.

use std::collections::BTreeMap;

use tally_core::{AccountId, Amount, DomainError, DomainResult};

use crate::model::{JournalRow, Transaction};

/// Journal rows for `account_id`, in log order.
///
/// Transactions that do not involve the account are skipped, as are
/// transactions that do not have exactly two entries.
pub fn journal_for(account_id: &AccountId, transactions: &[Transaction]) -> Vec<JournalRow> {
    transactions
        .iter()
        .filter_map(|tx| {
            let [first, second] = tx.entries.as_slice() else {
                return None;
            };

            let (own, counter) = if &first.account_id == account_id {
                (first, second)
            } else if &second.account_id == account_id {
                (second, first)
            } else {
                return None;
            };

            Some(JournalRow {
                tx_id: tx.id.clone(),
                account_id: account_id.clone(),
                counterparty_id: counter.account_id.clone(),
                timestamp: tx.timestamp,
                debit: own.debit,
                credit: own.credit,
            })
        })
        .collect()
}

/// Rebuild every account balance by summing entries (credit minus debit).
///
/// Fails with `AmountOutOfRange` on the first entry whose running balance
/// cannot be represented; a log produced by the ledger never does.
pub fn replay_balances(transactions: &[Transaction]) -> DomainResult<BTreeMap<AccountId, Amount>> {
    let mut balances = BTreeMap::new();
    for entry in transactions.iter().flat_map(|tx| tx.entries.iter()) {
        let balance = balances
            .entry(entry.account_id.clone())
            .or_insert(Amount::ZERO);
        let current = *balance;
        let delta = entry.signed_amount();
        *balance = current.checked_add(delta).ok_or_else(|| {
            DomainError::amount_out_of_range(entry.account_id.clone(), current, delta.abs())
        })?;
    }
    Ok(balances)
}
