//! Payment ledger: everything about a sale's settlement state is derived,
//! never stored.
//!
//! `status`, `total_paid` and `balance` are recomputed from the sale's
//! payment list on every call, so they can never drift from the ledger.

use chrono::NaiveDate;

use crate::{
    BusinessDay, LedgerError, Money,
    transaction::{Payment, PaymentMethod, Transaction},
};

/// Derived settlement state of a sale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Partial,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Completed => "completed",
        }
    }
}

/// `{status, total_paid, balance}` for one sale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaymentSummary {
    pub status: PaymentStatus,
    pub total_paid: Money,
    pub balance: Money,
}

/// Derives the settlement state of a sale from its payment list.
///
/// `total_paid` is clamped to the sale total and `balance` never goes
/// negative: an over-payment is a caller validation error (see
/// [`can_accept_payment`]), not something to absorb silently.
pub fn payment_summary(amount: Money, payments: &[Payment]) -> PaymentSummary {
    let collected: Money = payments.iter().map(|p| p.amount).sum();
    let total_paid = collected.min(amount);
    let balance = (amount - total_paid).max(Money::ZERO);

    let status = if balance <= Money::ZERO {
        PaymentStatus::Completed
    } else if total_paid.is_positive() {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    };

    PaymentSummary {
        status,
        total_paid,
        balance,
    }
}

/// Validates that `new_amount` can be recorded against `transaction`.
///
/// This is the single gate for payment mutations; it is what keeps
/// `sum(payments) <= amount` true for every settled sale.
pub fn can_accept_payment(
    transaction: &Transaction,
    new_amount: Money,
) -> Result<(), LedgerError> {
    if !new_amount.is_positive() {
        return Err(LedgerError::InvalidPayment(
            "payment amount must be > 0".to_string(),
        ));
    }

    let summary = payment_summary(transaction.amount, &transaction.payments);
    if new_amount > summary.balance {
        return Err(LedgerError::InvalidPayment(format!(
            "payment ({new_amount}) exceeds the outstanding balance ({})",
            summary.balance
        )));
    }

    Ok(())
}

/// Per-method totals, used by day reports and the cash count helper.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MethodTotals {
    pub cash: Money,
    pub bank: Money,
    pub yape: Money,
    pub plin: Money,
}

impl MethodTotals {
    pub fn total(self) -> Money {
        self.cash + self.bank + self.yape + self.plin
    }
}

/// Groups payments by collection method.
pub fn group_by_method(payments: &[Payment]) -> MethodTotals {
    let mut totals = MethodTotals::default();
    for payment in payments {
        match payment.method {
            PaymentMethod::Cash => totals.cash += payment.amount,
            PaymentMethod::Bank => totals.bank += payment.amount,
            PaymentMethod::Yape => totals.yape += payment.amount,
            PaymentMethod::Plin => totals.plin += payment.amount,
        }
    }
    totals
}

/// Total collected on a given business day.
pub fn paid_on_day(payments: &[Payment], date: NaiveDate, day: &BusinessDay) -> Money {
    payments
        .iter()
        .filter(|p| day.local_date(p.date) == date)
        .map(|p| p.amount)
        .sum()
}
