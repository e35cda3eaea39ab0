//! Cash events: the record of a day-open or day-close reconciliation, and
//! the generator for the adjustment entries that close a counted gap.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AccountBalances, LedgerError, Money,
    transaction::{Account, Transaction, TransactionKind},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashEventKind {
    Opening,
    Closure,
}

impl CashEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Closure => "closure",
        }
    }

    pub fn transaction_kind(self) -> TransactionKind {
        match self {
            Self::Opening => TransactionKind::Opening,
            Self::Closure => TransactionKind::Closure,
        }
    }
}

impl TryFrom<&str> for CashEventKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "opening" => Ok(Self::Opening),
            "closure" => Ok(Self::Closure),
            other => Err(LedgerError::InvalidReconciliationInput(format!(
                "invalid cash event kind: {other}"
            ))),
        }
    }
}

/// Reconciliation differences are expected business outcomes, not errors;
/// they only change the recorded status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashEventStatus {
    Success,
    SuccessWithAdjustments,
}

impl CashEventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::SuccessWithAdjustments => "success_with_adjustments",
        }
    }
}

impl TryFrom<&str> for CashEventStatus {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "success" => Ok(Self::Success),
            "success_with_adjustments" => Ok(Self::SuccessWithAdjustments),
            other => Err(LedgerError::InvalidReconciliationInput(format!(
                "invalid cash event status: {other}"
            ))),
        }
    }
}

/// One account's line in a cash event.
///
/// Invariant: `difference = real - expected`, and a non-zero difference on a
/// closure carries the id of the adjustment transaction that offsets it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReconciliation {
    pub account: Account,
    pub expected: Money,
    pub real: Money,
    pub difference: Money,
    pub adjustment_transaction_id: Option<Uuid>,
}

/// One per day per kind; immutable once stored. Corrections happen by
/// reconciling again the next cycle, never by editing history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashEvent {
    pub id: Uuid,
    pub date: NaiveDate,
    pub kind: CashEventKind,
    pub accounts: Vec<AccountReconciliation>,
    pub status: CashEventStatus,
    pub created_at: DateTime<Utc>,
}

impl CashEvent {
    /// Counted (real) balances, which seed the next calculation.
    pub fn real_balances(&self) -> AccountBalances {
        let mut balances = AccountBalances::ZERO;
        for line in &self.accounts {
            match line.account {
                Account::Cash => balances.cash = line.real,
                Account::Bank => balances.bank = line.real,
            }
        }
        balances
    }
}

/// Emits the transaction that exactly offsets a reconciliation difference:
/// an income for a surplus, an expense for a shortage.
///
/// This is the only mechanism allowed to alter the ledger total on behalf of
/// the system; every other mutation is user-attributed.
pub fn adjustment_transaction(
    account: Account,
    difference: Money,
    created_at: DateTime<Utc>,
) -> Result<Transaction, LedgerError> {
    if difference.is_zero() {
        return Err(LedgerError::InvalidReconciliationInput(
            "no adjustment needed for a zero difference".to_string(),
        ));
    }

    let (kind, reason) = if difference.is_positive() {
        (TransactionKind::Income, "Sobrante")
    } else {
        (TransactionKind::Expense, "Faltante")
    };

    let mut tx = match kind {
        TransactionKind::Income => Transaction::income(account, difference.abs(), created_at)?,
        _ => Transaction::expense(account, difference.abs(), created_at)?,
    };
    tx.adjustment = true;
    Ok(tx.with_description(format!("Ajuste de cierre de caja - {reason}")))
}

/// Builds the `opening`/`closure` audit row that carries the counted totals.
///
/// Ignored by the expected-balance fold; its amount may be zero (an empty
/// drawer is a valid count).
pub fn summary_transaction(
    kind: CashEventKind,
    event_id: Uuid,
    real: AccountBalances,
    created_at: DateTime<Utc>,
) -> Result<Transaction, LedgerError> {
    if real.total().is_negative() {
        return Err(LedgerError::InvalidReconciliationInput(
            "counted totals must not be negative".to_string(),
        ));
    }

    Ok(Transaction {
        id: Uuid::new_v4(),
        kind: kind.transaction_kind(),
        account: None,
        amount: real.total(),
        created_at,
        description: Some(format!(
            "Totales contados: efectivo {}, banco {}",
            real.cash, real.bank
        )),
        payments: Vec::new(),
        adjustment: false,
        related_transaction_id: Some(event_id),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn surplus_becomes_income_shortage_becomes_expense() {
        let surplus = adjustment_transaction(Account::Cash, Money::new(500), Utc::now()).unwrap();
        assert_eq!(surplus.kind, TransactionKind::Income);
        assert_eq!(surplus.amount, Money::new(500));
        assert!(surplus.adjustment);
        assert!(surplus.description.as_deref().unwrap().contains("Sobrante"));

        let shortage =
            adjustment_transaction(Account::Bank, Money::new(-1_250), Utc::now()).unwrap();
        assert_eq!(shortage.kind, TransactionKind::Expense);
        assert_eq!(shortage.amount, Money::new(1_250));
        assert!(shortage.description.as_deref().unwrap().contains("Faltante"));
    }

    #[test]
    fn zero_difference_is_rejected() {
        assert!(adjustment_transaction(Account::Cash, Money::ZERO, Utc::now()).is_err());
    }

    #[test]
    fn summary_row_carries_totals_and_event_link() {
        let event_id = Uuid::new_v4();
        let real = AccountBalances {
            cash: Money::new(2_500),
            bank: Money::new(1_000),
        };
        let tx =
            summary_transaction(CashEventKind::Closure, event_id, real, Utc::now()).unwrap();
        assert_eq!(tx.kind, TransactionKind::Closure);
        assert_eq!(tx.amount, Money::new(3_500));
        assert_eq!(tx.related_transaction_id, Some(event_id));
    }

    #[test]
    fn real_balances_reads_counted_lines() {
        let event = CashEvent {
            id: Uuid::new_v4(),
            date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            kind: CashEventKind::Opening,
            accounts: vec![
                AccountReconciliation {
                    account: Account::Cash,
                    expected: Money::ZERO,
                    real: Money::new(4_000),
                    difference: Money::new(4_000),
                    adjustment_transaction_id: None,
                },
                AccountReconciliation {
                    account: Account::Bank,
                    expected: Money::ZERO,
                    real: Money::new(10_000),
                    difference: Money::new(10_000),
                    adjustment_transaction_id: None,
                },
            ],
            status: CashEventStatus::Success,
            created_at: Utc::now(),
        };
        let real = event.real_balances();
        assert_eq!(real.cash, Money::new(4_000));
        assert_eq!(real.bank, Money::new(10_000));
    }
}
