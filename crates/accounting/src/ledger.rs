use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use chrono::Utc;
use tracing::{debug, warn};

use tally_core::{AccountId, Amount, DomainError, DomainResult, TransactionId, money};

use crate::journal::journal_for;
use crate::model::{
    DepositRequest, JournalRow, PostOutcome, ReadMode, Transaction, TransferRequest,
    WithdrawRequest,
};

/// Everything guarded by the ledger lock.
#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<AccountId, Amount>,
    transactions: Vec<Transaction>,
    seen: HashSet<TransactionId>,
}

impl LedgerState {
    fn balance(&self, account_id: &AccountId) -> Amount {
        self.balances.get(account_id).copied().unwrap_or(Amount::ZERO)
    }

    fn ensure_covers(&self, account_id: &AccountId, amount: Amount) -> DomainResult<()> {
        let available = self.balance(account_id);
        if available < amount {
            return Err(DomainError::insufficient_funds(account_id.clone(), available, amount));
        }
        Ok(())
    }

    /// New balance of every account `tx` touches, or the first one that
    /// would leave the representable range.
    fn next_balances(&self, tx: &Transaction) -> DomainResult<Vec<(AccountId, Amount)>> {
        tx.entries
            .iter()
            .map(|entry| {
                let current = self.balance(&entry.account_id);
                let delta = entry.signed_amount();
                current
                    .checked_add(delta)
                    .map(|next| (entry.account_id.clone(), next))
                    .ok_or_else(|| {
                        DomainError::amount_out_of_range(entry.account_id.clone(), current, delta.abs())
                    })
            })
            .collect()
    }

    /// Balances, log and seen-set change together, or not at all.
    fn commit(&mut self, tx: Transaction) -> DomainResult<PostOutcome> {
        let next = self.next_balances(&tx)?;
        for (account_id, balance) in next {
            self.balances.insert(account_id, balance);
        }
        self.seen.insert(tx.id.clone());
        self.transactions.push(tx.clone());
        Ok(PostOutcome::Applied(tx))
    }

    /// The log only grows, so its length orders snapshots.
    fn version(&self) -> usize {
        self.transactions.len()
    }

    fn balances_map(&self) -> BTreeMap<AccountId, Amount> {
        self.balances
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    fn transactions_log(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }
}

#[derive(Debug)]
struct Snapshot<T> {
    version: usize,
    data: Arc<T>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            data: Arc::clone(&self.data),
        }
    }
}

/// Most recent copies handed out by relaxed reads; served to relaxed readers
/// while a writer holds the lock. Consistent reads never populate it.
#[derive(Debug, Default)]
struct SnapshotCache {
    balances: Option<Snapshot<BTreeMap<AccountId, Amount>>>,
    transactions: Option<Snapshot<Vec<Transaction>>>,
}

fn remember<T>(slot: &mut Option<Snapshot<T>>, fresh: &Snapshot<T>) {
    if slot.as_ref().is_none_or(|held| held.version <= fresh.version) {
        *slot = Some(fresh.clone());
    }
}

fn balances_slot(cache: &mut SnapshotCache) -> &mut Option<Snapshot<BTreeMap<AccountId, Amount>>> {
    &mut cache.balances
}

fn transactions_slot(cache: &mut SnapshotCache) -> &mut Option<Snapshot<Vec<Transaction>>> {
    &mut cache.transactions
}

/// In-memory double-entry ledger.
///
/// Balances, the append-only transaction log and the idempotency set share a
/// single lock. Every posting validates and mutates under one exclusive
/// acquisition, so a rejected request leaves no trace and an applied one is
/// always visible in all three structures at once.
///
/// Share it between callers with `Arc<Ledger>`.
#[derive(Debug, Default)]
pub struct Ledger {
    state: RwLock<LedgerState>,
    snapshots: Mutex<SnapshotCache>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger pre-seeded with opening balances.
    ///
    /// Each balance is posted as a deposit keyed `opening:<account>`, so the
    /// log reconstructs the seeded balances like any other. A repeated
    /// account is a duplicate id and only its first amount is applied.
    pub fn with_opening_balances<I, A>(balances: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (A, Amount)>,
        A: Into<AccountId>,
    {
        let ledger = Self::new();
        for (account_id, amount) in balances {
            let account_id = account_id.into();
            let id = TransactionId::new(format!("opening:{account_id}"));
            ledger.deposit(&DepositRequest::new(id, account_id, amount))?;
        }
        Ok(ledger)
    }

    /// Credit the account from the system account.
    pub fn deposit(&self, req: &DepositRequest) -> DomainResult<PostOutcome> {
        let mut state = self.write_state();

        if state.seen.contains(&req.id) {
            debug!(tx_id = %req.id, "deposit already processed");
            return Ok(PostOutcome::Duplicate);
        }
        ensure_postable(req.amount)?;
        if req.account_id.is_system() {
            return Err(DomainError::same_account(req.account_id.clone()));
        }

        let tx = Transaction::two_legged(
            req.id.clone(),
            Utc::now(),
            AccountId::system(),
            req.account_id.clone(),
            req.amount,
        );
        let outcome = state.commit(tx)?;
        debug!(tx_id = %req.id, account = %req.account_id, amount = %req.amount, "deposit applied");
        Ok(outcome)
    }

    /// Debit the account into the system account.
    pub fn withdraw(&self, req: &WithdrawRequest) -> DomainResult<PostOutcome> {
        let mut state = self.write_state();

        if state.seen.contains(&req.id) {
            debug!(tx_id = %req.id, "withdrawal already processed");
            return Ok(PostOutcome::Duplicate);
        }
        ensure_postable(req.amount)?;
        if req.account_id.is_system() {
            return Err(DomainError::same_account(req.account_id.clone()));
        }
        state.ensure_covers(&req.account_id, req.amount)?;

        let tx = Transaction::two_legged(
            req.id.clone(),
            Utc::now(),
            req.account_id.clone(),
            AccountId::system(),
            req.amount,
        );
        let outcome = state.commit(tx)?;
        debug!(tx_id = %req.id, account = %req.account_id, amount = %req.amount, "withdrawal applied");
        Ok(outcome)
    }

    /// Move funds between two distinct accounts.
    pub fn transfer(&self, req: &TransferRequest) -> DomainResult<PostOutcome> {
        let mut state = self.write_state();

        if state.seen.contains(&req.id) {
            debug!(tx_id = %req.id, "transfer already processed");
            return Ok(PostOutcome::Duplicate);
        }
        ensure_postable(req.amount)?;
        if req.debit_account_id == req.credit_account_id {
            return Err(DomainError::same_account(req.debit_account_id.clone()));
        }
        state.ensure_covers(&req.debit_account_id, req.amount)?;

        let tx = Transaction::two_legged(
            req.id.clone(),
            Utc::now(),
            req.debit_account_id.clone(),
            req.credit_account_id.clone(),
            req.amount,
        );
        let outcome = state.commit(tx)?;
        debug!(
            tx_id = %req.id,
            from = %req.debit_account_id,
            to = %req.credit_account_id,
            amount = %req.amount,
            "transfer applied"
        );
        Ok(outcome)
    }

    /// Copy of every known account balance.
    pub fn balances(&self, mode: ReadMode) -> BTreeMap<AccountId, Amount> {
        match mode {
            ReadMode::Consistent => self.read_state().balances_map(),
            ReadMode::Relaxed => {
                (*self.relaxed_snapshot(balances_slot, LedgerState::balances_map)).clone()
            }
        }
    }

    /// Balance of one account (zero if never touched).
    pub fn balance(&self, account_id: &AccountId, mode: ReadMode) -> Amount {
        self.read(
            mode,
            |state| state.balance(account_id),
            |cache| {
                cache
                    .balances
                    .as_ref()
                    .map(|snap| snap.data.get(account_id).copied().unwrap_or(Amount::ZERO))
            },
        )
    }

    /// Copy of the transaction log in append order.
    pub fn transactions(&self, mode: ReadMode) -> Vec<Transaction> {
        match mode {
            ReadMode::Consistent => self.read_state().transactions_log(),
            ReadMode::Relaxed => {
                (*self.relaxed_snapshot(transactions_slot, LedgerState::transactions_log)).clone()
            }
        }
    }

    /// Journal rows for one account, derived from the log on every call.
    pub fn journal(&self, account_id: &AccountId, mode: ReadMode) -> Vec<JournalRow> {
        self.read(
            mode,
            |state| journal_for(account_id, &state.transactions),
            |cache| {
                cache
                    .transactions
                    .as_ref()
                    .map(|snap| journal_for(account_id, &snap.data))
            },
        )
    }

    /// Whether `id` has already been applied.
    pub fn contains(&self, id: &TransactionId) -> bool {
        self.read_state().seen.contains(id)
    }

    /// Number of applied transactions.
    pub fn len(&self) -> usize {
        self.read_state().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<R>(
        &self,
        mode: ReadMode,
        from_state: impl FnOnce(&LedgerState) -> R,
        from_cache: impl FnOnce(&SnapshotCache) -> Option<R>,
    ) -> R {
        match mode {
            ReadMode::Consistent => from_state(&*self.read_state()),
            ReadMode::Relaxed => match self.state.try_read() {
                Ok(guard) => from_state(&*guard),
                Err(TryLockError::Poisoned(poisoned)) => from_state(&*poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {
                    let cached = from_cache(&*self.snapshots());
                    match cached {
                        Some(value) => value,
                        // Nothing captured yet: wait once rather than return nothing.
                        None => from_state(&*self.read_state()),
                    }
                }
            },
        }
    }

    /// Relaxed read of a whole collection through the snapshot cache.
    ///
    /// Reuses the cached copy when the log has not grown since it was taken,
    /// and serves it unchanged while a writer holds the lock.
    fn relaxed_snapshot<T>(
        &self,
        slot: fn(&mut SnapshotCache) -> &mut Option<Snapshot<T>>,
        capture: fn(&LedgerState) -> T,
    ) -> Arc<T> {
        let state = match self.state.try_read() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                let cached = slot(&mut self.snapshots())
                    .as_ref()
                    .map(|snap| Arc::clone(&snap.data));
                match cached {
                    Some(data) => return data,
                    // Nothing captured yet: wait once rather than return nothing.
                    None => self.read_state(),
                }
            }
        };

        let version = state.version();
        let mut cache = self.snapshots();
        let held = slot(&mut cache);
        if let Some(snap) = held.as_ref().filter(|snap| snap.version == version) {
            return Arc::clone(&snap.data);
        }
        let fresh = Snapshot {
            version,
            data: Arc::new(capture(&*state)),
        };
        remember(held, &fresh);
        fresh.data
    }

    // Balance arithmetic is checked before anything is mutated, so a
    // poisoned guard still protects a consistent state.
    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!("ledger lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!("ledger lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn snapshots(&self) -> MutexGuard<'_, SnapshotCache> {
        self.snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ensure_postable(amount: Amount) -> DomainResult<()> {
    if !money::is_postable(amount) {
        return Err(DomainError::invalid_amount(amount));
    }
    Ok(())
}
