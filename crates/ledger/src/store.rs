//! Narrow interfaces to the document store.
//!
//! The core never talks to storage directly; it reads and writes through
//! these two traits. Writes are expected to be idempotent by id
//! (re-appending an already-stored row is a no-op) so a retried remote
//! update that partially applied converges instead of failing.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    BusinessDay, LedgerError,
    cash_event::{CashEvent, CashEventKind},
    transaction::{Payment, Transaction},
};

/// Append-only collection of monetary events; the core only reads a day at a
/// time and appends.
pub trait TransactionLog: Send + Sync {
    /// All transactions of one business day, in creation order.
    fn query_day(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Transaction>, LedgerError>> + Send;

    /// A single transaction by id.
    fn get(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Transaction>, LedgerError>> + Send;

    /// Appends a transaction (with its payments). Idempotent by id.
    fn append(
        &self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<Uuid, LedgerError>> + Send;

    /// Appends one payment to a stored sale's sub-ledger. Idempotent by id.
    fn append_payment(
        &self,
        transaction_id: Uuid,
        payment: &Payment,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;
}

/// One cash event per day per kind.
pub trait CashEventStore: Send + Sync {
    fn get(
        &self,
        date: NaiveDate,
        kind: CashEventKind,
    ) -> impl Future<Output = Result<Option<CashEvent>, LedgerError>> + Send;

    /// Stores an event. Re-putting the same event is a no-op; putting a
    /// *different* event for an already-reconciled `(date, kind)` fails with
    /// [`LedgerError::AlreadyReconciled`].
    fn put(
        &self,
        event: &CashEvent,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// All events, newest date first.
    fn list(&self) -> impl Future<Output = Result<Vec<CashEvent>, LedgerError>> + Send;
}

#[derive(Default)]
struct MemoryInner {
    transactions: Vec<Transaction>,
    events: HashMap<(NaiveDate, CashEventKind), CashEvent>,
    failing_puts: u32,
    failing_appends: u32,
}

/// In-memory implementation of both store traits.
///
/// Backs the core's tests and works as a scratch store for embedding
/// consumers; `fail_next_puts` injects transport failures to exercise the
/// queue's retry and rollback paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
    day: BusinessDay,
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new(day: BusinessDay) -> Self {
        Self {
            day,
            inner: Arc::new(Mutex::new(MemoryInner::default())),
        }
    }

    /// Makes the next `count` event puts fail with a transport error.
    pub fn fail_next_puts(&self, count: u32) {
        self.lock().failing_puts = count;
    }

    /// Makes the next `count` transaction or payment appends fail with a
    /// transport error.
    pub fn fail_next_appends(&self, count: u32) {
        self.lock().failing_appends = count;
    }

    pub fn transaction_count(&self) -> usize {
        self.lock().transactions.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TransactionLog for MemoryStore {
    async fn query_day(&self, date: NaiveDate) -> Result<Vec<Transaction>, LedgerError> {
        let (start, end) = self.day.day_bounds(date);
        Ok(self
            .lock()
            .transactions
            .iter()
            .filter(|tx| tx.created_at >= start && tx.created_at < end)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Transaction>, LedgerError> {
        Ok(self
            .lock()
            .transactions
            .iter()
            .find(|tx| tx.id == id)
            .cloned())
    }

    async fn append(&self, transaction: &Transaction) -> Result<Uuid, LedgerError> {
        let mut inner = self.lock();
        if inner.failing_appends > 0 {
            inner.failing_appends -= 1;
            return Err(LedgerError::Store("injected store failure".to_string()));
        }
        if !inner.transactions.iter().any(|tx| tx.id == transaction.id) {
            inner.transactions.push(transaction.clone());
        }
        Ok(transaction.id)
    }

    async fn append_payment(
        &self,
        transaction_id: Uuid,
        payment: &Payment,
    ) -> Result<(), LedgerError> {
        let mut inner = self.lock();
        if inner.failing_appends > 0 {
            inner.failing_appends -= 1;
            return Err(LedgerError::Store("injected store failure".to_string()));
        }
        let tx = inner
            .transactions
            .iter_mut()
            .find(|tx| tx.id == transaction_id)
            .ok_or_else(|| LedgerError::KeyNotFound(transaction_id.to_string()))?;
        if !tx.payments.iter().any(|p| p.id == payment.id) {
            tx.payments.push(payment.clone());
        }
        Ok(())
    }
}

impl CashEventStore for MemoryStore {
    async fn get(
        &self,
        date: NaiveDate,
        kind: CashEventKind,
    ) -> Result<Option<CashEvent>, LedgerError> {
        Ok(self.lock().events.get(&(date, kind)).cloned())
    }

    async fn put(&self, event: &CashEvent) -> Result<(), LedgerError> {
        let mut inner = self.lock();
        if inner.failing_puts > 0 {
            inner.failing_puts -= 1;
            return Err(LedgerError::Store("injected store failure".to_string()));
        }
        match inner.events.get(&(event.date, event.kind)) {
            Some(existing) if existing.id != event.id => Err(LedgerError::AlreadyReconciled(
                format!("{} {}", event.date, event.kind.as_str()),
            )),
            Some(_) => Ok(()),
            None => {
                inner.events.insert((event.date, event.kind), event.clone());
                Ok(())
            }
        }
    }

    async fn list(&self) -> Result<Vec<CashEvent>, LedgerError> {
        let mut events: Vec<CashEvent> = self.lock().events.values().cloned().collect();
        events.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(events)
    }
}
