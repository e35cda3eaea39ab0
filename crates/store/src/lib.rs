//! SQLite persistence for the cash ledger.
//!
//! Maps the core's domain types onto sea-orm entities and implements its
//! [`ledger::TransactionLog`] and [`ledger::CashEventStore`] traits over a
//! [`sea_orm::DatabaseConnection`]. Schema management lives in the
//! `migration` crate.

pub mod cash_events;
pub mod event_accounts;
pub mod payments;
pub mod transactions;

mod sqlite;

pub use sqlite::SqliteStore;
