//! The module contains the errors the core can return.
//!
//! The taxonomy follows the failure classes of the reconciliation layer:
//!
//! - validation ([`InvalidPayment`], [`InvalidReconciliationInput`],
//!   [`InvalidAmount`]) — caller errors, surfaced immediately, never retried;
//! - concurrency ([`ReconciliationAlreadyInFlight`], [`AlreadyReconciled`]) —
//!   single-flight and audit-trail rejections;
//! - transport ([`Store`]) — collaborator failures, retried by the sync
//!   queue up to its attempt budget.
//!
//! [`InvalidPayment`]: LedgerError::InvalidPayment
//! [`InvalidReconciliationInput`]: LedgerError::InvalidReconciliationInput
//! [`InvalidAmount`]: LedgerError::InvalidAmount
//! [`ReconciliationAlreadyInFlight`]: LedgerError::ReconciliationAlreadyInFlight
//! [`AlreadyReconciled`]: LedgerError::AlreadyReconciled
//! [`Store`]: LedgerError::Store
use thiserror::Error;

/// Core custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid payment: {0}")]
    InvalidPayment(String),
    #[error("Invalid reconciliation input: {0}")]
    InvalidReconciliationInput(String),
    #[error("Reconciliation already in flight for {0}")]
    ReconciliationAlreadyInFlight(String),
    #[error("Already reconciled: {0}")]
    AlreadyReconciled(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Store error: {0}")]
    Store(String),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidPayment(a), Self::InvalidPayment(b)) => a == b,
            (Self::InvalidReconciliationInput(a), Self::InvalidReconciliationInput(b)) => a == b,
            (Self::ReconciliationAlreadyInFlight(a), Self::ReconciliationAlreadyInFlight(b)) => {
                a == b
            }
            (Self::AlreadyReconciled(a), Self::AlreadyReconciled(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Store(a), Self::Store(b)) => a == b,
            _ => false,
        }
    }
}
