//! Financial consistency core for a small-business cash/bank day ledger.
//!
//! Everything user-visible is derived from the append-only transaction log:
//! expected balances ([`expected_balances`]), settlement state of a sale
//! ([`payment_summary`]), closure streaks ([`closure_streak`]). The two
//! stateful pieces are the day-cycle orchestration
//! ([`CashEventCoordinator`]) and the delivery-guarantee layer
//! ([`OptimisticSyncQueue`]); both are explicit per-session values, not
//! globals.
//!
//! Storage is an external collaborator reached only through the
//! [`TransactionLog`] and [`CashEventStore`] traits; the sibling `store`
//! crate provides the SQLite implementation.

pub use balance::{AccountBalances, expected_balances};
pub use business_day::BusinessDay;
pub use cash_event::{
    AccountReconciliation, CashEvent, CashEventKind, CashEventStatus, adjustment_transaction,
    summary_transaction,
};
pub use coordinator::{CashEventCoordinator, ReconciliationOutcome, ReconciliationSession};
pub use error::LedgerError;
pub use money::Money;
pub use payments::{
    MethodTotals, PaymentStatus, PaymentSummary, can_accept_payment, group_by_method,
    paid_on_day, payment_summary,
};
pub use store::{CashEventStore, MemoryStore, TransactionLog};
pub use streak::{DEFAULT_ALLOWED_GAP, StreakRisk, closure_streak, streak_risk};
pub use sync::{
    FailedOperation, MAX_ATTEMPTS, OperationStatus, OptimisticSyncQueue, RemoteUpdate, Rollback,
    SyncMetadata, SyncNotice,
};
pub use transaction::{Account, Payment, PaymentMethod, Transaction, TransactionKind};

mod balance;
mod business_day;
mod cash_event;
mod coordinator;
mod error;
mod money;
mod payments;
mod store;
mod streak;
mod sync;
mod transaction;
