//! Day-cycle orchestration: opening and closure reconciliations.
//!
//! The coordinator walks one session through
//! `idle -> collecting-expected -> awaiting-real-count -> reconciled`.
//! Finalization is optimistic: the event is visible locally at once and
//! persisted through the sync queue; if delivery is abandoned the rollback
//! clears the local view, and everything downstream recomputes from the log.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    AccountBalances, BusinessDay, LedgerError, Money,
    balance::expected_balances,
    cash_event::{
        AccountReconciliation, CashEvent, CashEventKind, CashEventStatus, adjustment_transaction,
        summary_transaction,
    },
    payments::can_accept_payment,
    store::{CashEventStore, TransactionLog},
    streak::{self, DEFAULT_ALLOWED_GAP, StreakRisk},
    sync::{OptimisticSyncQueue, SyncMetadata},
    transaction::{Account, Payment, PaymentMethod, Transaction},
};

/// An in-progress reconciliation: expected balances are fixed, counted
/// balances may arrive in any order, both are required before finalize.
#[derive(Clone, Debug)]
pub struct ReconciliationSession {
    date: NaiveDate,
    kind: CashEventKind,
    expected: AccountBalances,
    real_cash: Option<Money>,
    real_bank: Option<Money>,
}

impl ReconciliationSession {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn kind(&self) -> CashEventKind {
        self.kind
    }

    pub fn expected(&self) -> AccountBalances {
        self.expected
    }

    /// Records the physically counted balance for one account.
    pub fn set_real_balance(&mut self, account: Account, amount: Money) -> Result<(), LedgerError> {
        if amount.is_negative() {
            return Err(LedgerError::InvalidReconciliationInput(
                "a counted balance cannot be negative".to_string(),
            ));
        }
        match account {
            Account::Cash => self.real_cash = Some(amount),
            Account::Bank => self.real_bank = Some(amount),
        }
        Ok(())
    }

    /// `true` once every account has a counted balance.
    pub fn is_ready(&self) -> bool {
        self.real_cash.is_some() && self.real_bank.is_some()
    }

    /// Signed `real - expected` per account, once both counts are in.
    pub fn differences(&self) -> Option<AccountBalances> {
        let real = self.real_balances()?;
        Some(AccountBalances {
            cash: real.cash - self.expected.cash,
            bank: real.bank - self.expected.bank,
        })
    }

    fn real_balances(&self) -> Option<AccountBalances> {
        Some(AccountBalances {
            cash: self.real_cash?,
            bank: self.real_bank?,
        })
    }
}

/// What finalize produced: the event as recorded locally, and the queue
/// operation persisting it (await the queue's idle state to observe
/// durability).
#[derive(Clone, Debug)]
pub struct ReconciliationOutcome {
    pub event: CashEvent,
    pub operation_id: Uuid,
}

/// Orchestrates the opening/closure day cycle over a transaction log and a
/// cash event store. One instance per business session.
pub struct CashEventCoordinator<L, S> {
    log: Arc<L>,
    events: Arc<S>,
    queue: OptimisticSyncQueue,
    day: BusinessDay,
    in_flight: Arc<Mutex<HashSet<(NaiveDate, CashEventKind)>>>,
    local_events: Arc<Mutex<HashMap<(NaiveDate, CashEventKind), CashEvent>>>,
    local_payments: Arc<Mutex<HashMap<Uuid, Vec<Payment>>>>,
}

impl<L, S> CashEventCoordinator<L, S>
where
    L: TransactionLog + 'static,
    S: CashEventStore + 'static,
{
    pub fn new(log: Arc<L>, events: Arc<S>, queue: OptimisticSyncQueue, day: BusinessDay) -> Self {
        Self {
            log,
            events,
            queue,
            day,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            local_events: Arc::new(Mutex::new(HashMap::new())),
            local_payments: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn business_day(&self) -> &BusinessDay {
        &self.day
    }

    /// The queue carrying this coordinator's remote writes. Await its idle
    /// state to observe durability.
    pub fn queue(&self) -> &OptimisticSyncQueue {
        &self.queue
    }

    /// Finalized events still awaiting delivery confirmation.
    pub fn unconfirmed_event_count(&self) -> usize {
        lock(&self.local_events).len()
    }

    /// Starts a reconciliation for `(date, kind)`: computes the expected
    /// balances and hands back the session awaiting the real counts.
    ///
    /// Rejected when that day/kind is already reconciled (history is never
    /// edited) or a finalize for it is still in flight.
    pub async fn start(
        &self,
        kind: CashEventKind,
        date: NaiveDate,
    ) -> Result<ReconciliationSession, LedgerError> {
        let key = (date, kind);
        if lock(&self.in_flight).contains(&key) {
            return Err(LedgerError::ReconciliationAlreadyInFlight(describe(key)));
        }
        if self.lookup_event(key).await?.is_some() {
            return Err(LedgerError::AlreadyReconciled(describe(key)));
        }

        let expected = match kind {
            CashEventKind::Opening => AccountBalances::ZERO,
            CashEventKind::Closure => {
                let seed = self
                    .lookup_event((date, CashEventKind::Opening))
                    .await?
                    .map(|opening| opening.real_balances())
                    .unwrap_or(AccountBalances::ZERO);
                let transactions = self.log.query_day(date).await?;
                expected_balances(seed, &transactions)
            }
        };

        tracing::debug!(
            date = %date,
            kind = kind.as_str(),
            cash = %expected.cash,
            bank = %expected.bank,
            "expected balances computed"
        );

        Ok(ReconciliationSession {
            date,
            kind,
            expected,
            real_cash: None,
            real_bank: None,
        })
    }

    /// Finalizes a session: computes differences, generates closure
    /// adjustments, records the cash event locally and schedules event +
    /// adjustments + audit row for delivery, in that order.
    ///
    /// The `(date, kind)` single-flight guard is held until the queued
    /// operation completes or rolls back, so a second finalize cannot race
    /// the first into a double adjustment.
    pub async fn finalize(
        &self,
        session: ReconciliationSession,
    ) -> Result<ReconciliationOutcome, LedgerError> {
        let real = session.real_balances().ok_or_else(|| {
            LedgerError::InvalidReconciliationInput(
                "both account counts are required before finalizing".to_string(),
            )
        })?;
        let key = (session.date, session.kind);
        if self.lookup_event(key).await?.is_some() {
            return Err(LedgerError::AlreadyReconciled(describe(key)));
        }
        if !lock(&self.in_flight).insert(key) {
            return Err(LedgerError::ReconciliationAlreadyInFlight(describe(key)));
        }

        let now = Utc::now();
        let mut status = CashEventStatus::Success;
        let mut adjustments = Vec::new();
        let mut lines = Vec::new();

        for account in [Account::Cash, Account::Bank] {
            let expected = session.expected.get(account);
            let counted = real.get(account);
            let difference = counted - expected;

            let mut adjustment_transaction_id = None;
            if session.kind == CashEventKind::Closure && !difference.is_zero() {
                status = CashEventStatus::SuccessWithAdjustments;
                let adjustment = adjustment_transaction(account, difference, now)?;
                tracing::info!(
                    account = account.as_str(),
                    difference = %difference,
                    adjustment = %adjustment.id,
                    "reconciliation difference, adjustment generated"
                );
                adjustment_transaction_id = Some(adjustment.id);
                adjustments.push(adjustment);
            }

            lines.push(AccountReconciliation {
                account,
                expected,
                real: counted,
                difference,
                adjustment_transaction_id,
            });
        }

        let event = CashEvent {
            id: Uuid::new_v4(),
            date: session.date,
            kind: session.kind,
            accounts: lines,
            status,
            created_at: now,
        };
        let summary = summary_transaction(session.kind, event.id, real, now)?;

        let operation_id = self.queue.submit(
            {
                let local_events = Arc::clone(&self.local_events);
                let event = event.clone();
                move || {
                    lock(&local_events).insert(key, event);
                }
            },
            {
                let log = Arc::clone(&self.log);
                let events = Arc::clone(&self.events);
                let in_flight = Arc::clone(&self.in_flight);
                let local_events = Arc::clone(&self.local_events);
                let event = event.clone();
                let adjustments = adjustments.clone();
                let summary = summary.clone();
                Box::new(move || {
                    let log = Arc::clone(&log);
                    let events = Arc::clone(&events);
                    let in_flight = Arc::clone(&in_flight);
                    let local_events = Arc::clone(&local_events);
                    let event = event.clone();
                    let adjustments = adjustments.clone();
                    let summary = summary.clone();
                    Box::pin(async move {
                        // The event goes first: an adjustment must never be
                        // durable before the event that references it.
                        events.put(&event).await?;
                        for adjustment in &adjustments {
                            log.append(adjustment).await?;
                        }
                        log.append(&summary).await?;
                        // Confirmed durable: the store answers from here on,
                        // the optimistic copy is no longer needed.
                        lock(&local_events).remove(&key);
                        lock(&in_flight).remove(&key);
                        Ok(())
                    })
                })
            },
            {
                let local_events = Arc::clone(&self.local_events);
                let in_flight = Arc::clone(&self.in_flight);
                Box::new(move || {
                    lock(&local_events).remove(&key);
                    lock(&in_flight).remove(&key);
                    Ok(())
                })
            },
            SyncMetadata::new(
                format!("cash_event_{}", session.kind.as_str()),
                format!(
                    "{} de caja del {}",
                    match session.kind {
                        CashEventKind::Opening => "Apertura",
                        CashEventKind::Closure => "Cierre",
                    },
                    session.date
                ),
            ),
        );

        Ok(ReconciliationOutcome {
            event,
            operation_id,
        })
    }

    /// Records a collection against an existing sale, through the payment
    /// gate and the sync queue. Returns the queue operation id.
    ///
    /// The gate validates against the durable payments plus the ones still
    /// queued for this sale, so two quick collections cannot both pass on
    /// the same stale balance. The queued payment is released again when
    /// its delivery is confirmed or rolled back.
    pub async fn record_sale_payment(
        &self,
        sale_id: Uuid,
        amount: Money,
        method: PaymentMethod,
        notes: Option<String>,
    ) -> Result<Uuid, LedgerError> {
        let mut sale = self
            .log
            .get(sale_id)
            .await?
            .ok_or_else(|| LedgerError::KeyNotFound(sale_id.to_string()))?;
        if let Some(queued) = lock(&self.local_payments).get(&sale_id) {
            for payment in queued {
                if !sale.payments.iter().any(|p| p.id == payment.id) {
                    sale.payments.push(payment.clone());
                }
            }
        }
        can_accept_payment(&sale, amount)?;

        let now = Utc::now();
        let payment = Payment::new(amount, method, now, notes)?;
        let payment_id = payment.id;
        let ledger_row = Transaction::payment(method.settles_to(), amount, sale_id, now)?
            .with_description(format!("Pago de venta {sale_id}"));

        let operation_id = self.queue.submit(
            {
                let local_payments = Arc::clone(&self.local_payments);
                let payment = payment.clone();
                move || {
                    lock(&local_payments).entry(sale_id).or_default().push(payment);
                }
            },
            {
                let log = Arc::clone(&self.log);
                let local_payments = Arc::clone(&self.local_payments);
                Box::new(move || {
                    let log = Arc::clone(&log);
                    let local_payments = Arc::clone(&local_payments);
                    let payment = payment.clone();
                    let ledger_row = ledger_row.clone();
                    Box::pin(async move {
                        log.append_payment(sale_id, &payment).await?;
                        log.append(&ledger_row).await?;
                        forget_local_payment(&local_payments, sale_id, payment_id);
                        Ok(())
                    })
                })
            },
            {
                let local_payments = Arc::clone(&self.local_payments);
                Box::new(move || {
                    forget_local_payment(&local_payments, sale_id, payment_id);
                    Ok(())
                })
            },
            SyncMetadata::new("sale_payment", format!("Pago de venta {sale_id}")),
        );

        Ok(operation_id)
    }

    /// Consecutive days closed, counting back from `today`.
    pub async fn closure_streak(&self, today: NaiveDate) -> Result<u32, LedgerError> {
        let events = self.events.list().await?;
        Ok(streak::closure_streak(&events, today))
    }

    /// Risk of losing the streak under the default allowed gap.
    pub async fn streak_risk(&self, today: NaiveDate) -> Result<StreakRisk, LedgerError> {
        let events = self.events.list().await?;
        Ok(streak::streak_risk(&events, today, DEFAULT_ALLOWED_GAP))
    }

    /// The event for `(date, kind)` as the session sees it: the optimistic
    /// local view first, then the durable store.
    pub async fn event_for(
        &self,
        date: NaiveDate,
        kind: CashEventKind,
    ) -> Result<Option<CashEvent>, LedgerError> {
        self.lookup_event((date, kind)).await
    }

    async fn lookup_event(
        &self,
        key: (NaiveDate, CashEventKind),
    ) -> Result<Option<CashEvent>, LedgerError> {
        if let Some(event) = lock(&self.local_events).get(&key) {
            return Ok(Some(event.clone()));
        }
        self.events.get(key.0, key.1).await
    }
}

fn forget_local_payment(
    pending: &Mutex<HashMap<Uuid, Vec<Payment>>>,
    sale_id: Uuid,
    payment_id: Uuid,
) {
    let mut pending = lock(pending);
    if let Some(queued) = pending.get_mut(&sale_id) {
        queued.retain(|payment| payment.id != payment_id);
        if queued.is_empty() {
            pending.remove(&sale_id);
        }
    }
}

fn describe(key: (NaiveDate, CashEventKind)) -> String {
    format!("{} {}", key.0, key.1.as_str())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
