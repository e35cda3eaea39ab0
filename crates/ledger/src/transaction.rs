//! Transaction primitives.
//!
//! A `Transaction` is an append-only monetary event on the day ledger.
//! Settled transactions are immutable except for their `payments`
//! sub-ledger, which only ever grows through [`Transaction::record_payment`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, Money, payments};

/// Ledger account a monetary event settles against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Account {
    Cash,
    Bank,
}

impl Account {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Bank => "bank",
        }
    }
}

impl TryFrom<&str> for Account {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash" => Ok(Self::Cash),
            "bank" => Ok(Self::Bank),
            other => Err(LedgerError::InvalidAmount(format!(
                "invalid account: {other}"
            ))),
        }
    }
}

/// How a payment was collected.
///
/// Yape and Plin are mobile wallets; for expected-balance purposes they
/// settle to the bank account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Bank,
    Yape,
    Plin,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Bank => "bank",
            Self::Yape => "yape",
            Self::Plin => "plin",
        }
    }

    /// The ledger account this method settles against.
    pub fn settles_to(self) -> Account {
        match self {
            Self::Cash => Account::Cash,
            Self::Bank | Self::Yape | Self::Plin => Account::Bank,
        }
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash" => Ok(Self::Cash),
            "bank" => Ok(Self::Bank),
            "yape" => Ok(Self::Yape),
            "plin" => Ok(Self::Plin),
            other => Err(LedgerError::InvalidAmount(format!(
                "invalid payment method: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
    Payment,
    Opening,
    Closure,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
            Self::Payment => "payment",
            Self::Opening => "opening",
            Self::Closure => "closure",
        }
    }

    /// `true` for the day-boundary audit rows (`opening`/`closure`), which
    /// carry counted totals and never contribute to expected balances.
    pub fn is_day_summary(self) -> bool {
        matches!(self, Self::Opening | Self::Closure)
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            "payment" => Ok(Self::Payment),
            "opening" => Ok(Self::Opening),
            "closure" => Ok(Self::Closure),
            other => Err(LedgerError::InvalidAmount(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

/// A partial or full settlement recorded against an `income` transaction.
///
/// Payments are append-only; corrections append new payments rather than
/// editing history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Payment {
    pub fn new(
        amount: Money,
        method: PaymentMethod,
        date: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Self, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidPayment(
                "payment amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            amount,
            method,
            date,
            notes,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    /// `None` only for split-payment incomes, whose account split is carried
    /// by `payments`.
    pub account: Option<Account>,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
    pub payments: Vec<Payment>,
    /// Set only by the reconciliation adjustment generator.
    pub adjustment: bool,
    /// For `payment` rows, the settled sale; for `opening`/`closure` rows,
    /// the cash event they summarize.
    pub related_transaction_id: Option<Uuid>,
}

impl Transaction {
    fn base(
        kind: TransactionKind,
        account: Option<Account>,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            account,
            amount,
            created_at,
            description: None,
            payments: Vec::new(),
            adjustment: false,
            related_transaction_id: None,
        }
    }

    fn validated(self) -> Result<Self, LedgerError> {
        if !self.kind.is_day_summary() && !self.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(
                "amount must be > 0".to_string(),
            ));
        }
        if self.kind.is_day_summary() && self.amount.is_negative() {
            return Err(LedgerError::InvalidAmount(
                "summary amount must be >= 0".to_string(),
            ));
        }
        Ok(self)
    }

    /// A sale with nothing collected yet (accounts receivable).
    pub fn income(
        account: Account,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        Self::base(TransactionKind::Income, Some(account), amount, created_at).validated()
    }

    /// A sale collected in full at registration: one covering payment is
    /// recorded so the derived status is `Completed` from the start.
    pub fn settled_on_creation(
        method: PaymentMethod,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let mut tx = Self::base(
            TransactionKind::Income,
            Some(method.settles_to()),
            amount,
            created_at,
        )
        .validated()?;
        tx.payments
            .push(Payment::new(amount, method, created_at, None)?);
        Ok(tx)
    }

    /// A sale whose collection is split across payment methods up front.
    pub fn split_income(
        amount: Money,
        initial_payments: Vec<Payment>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let collected: Money = initial_payments.iter().map(|p| p.amount).sum();
        if collected > amount {
            return Err(LedgerError::InvalidPayment(format!(
                "payments ({collected}) exceed the sale total ({amount})"
            )));
        }
        let mut tx = Self::base(TransactionKind::Income, None, amount, created_at).validated()?;
        tx.payments = initial_payments;
        Ok(tx)
    }

    pub fn expense(
        account: Account,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        Self::base(TransactionKind::Expense, Some(account), amount, created_at).validated()
    }

    /// Funds moved into `account` from outside the day ledger.
    pub fn transfer(
        account: Account,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        Self::base(TransactionKind::Transfer, Some(account), amount, created_at).validated()
    }

    /// A later collection against an existing sale, recorded as its own
    /// ledger row so the day's cash movement stays visible.
    pub fn payment(
        account: Account,
        amount: Money,
        sale_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let mut tx =
            Self::base(TransactionKind::Payment, Some(account), amount, created_at).validated()?;
        tx.related_transaction_id = Some(sale_id);
        Ok(tx)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a payment to this sale's sub-ledger.
    ///
    /// This is the single gate for payment mutations: the amount is
    /// validated against the outstanding balance before anything changes.
    pub fn record_payment(&mut self, payment: Payment) -> Result<(), LedgerError> {
        if self.kind != TransactionKind::Income {
            return Err(LedgerError::InvalidPayment(format!(
                "payments can only be recorded against income, not {}",
                self.kind.as_str()
            )));
        }
        payments::can_accept_payment(self, payment.amount)?;
        self.payments.push(payment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn kind_codec_round_trips() {
        for kind in [
            TransactionKind::Income,
            TransactionKind::Expense,
            TransactionKind::Transfer,
            TransactionKind::Payment,
            TransactionKind::Opening,
            TransactionKind::Closure,
        ] {
            assert_eq!(TransactionKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert!(TransactionKind::try_from("refund").is_err());
    }

    #[test]
    fn constructors_reject_non_positive_amounts() {
        assert!(Transaction::income(Account::Cash, Money::ZERO, at()).is_err());
        assert!(Transaction::expense(Account::Bank, Money::new(-100), at()).is_err());
        assert!(Payment::new(Money::ZERO, PaymentMethod::Cash, at(), None).is_err());
    }

    #[test]
    fn settled_on_creation_carries_a_covering_payment() {
        let tx =
            Transaction::settled_on_creation(PaymentMethod::Yape, Money::new(10_000), at())
                .unwrap();
        assert_eq!(tx.account, Some(Account::Bank));
        assert_eq!(tx.payments.len(), 1);
        assert_eq!(tx.payments[0].amount, Money::new(10_000));
    }

    #[test]
    fn split_income_rejects_overcollection() {
        let payments = vec![
            Payment::new(Money::new(6_000), PaymentMethod::Cash, at(), None).unwrap(),
            Payment::new(Money::new(6_000), PaymentMethod::Plin, at(), None).unwrap(),
        ];
        assert!(Transaction::split_income(Money::new(10_000), payments, at()).is_err());
    }

    #[test]
    fn record_payment_goes_through_the_gate() {
        let mut sale = Transaction::income(Account::Cash, Money::new(10_000), at()).unwrap();
        let payment = Payment::new(Money::new(4_000), PaymentMethod::Cash, at(), None).unwrap();
        sale.record_payment(payment).unwrap();

        let too_much = Payment::new(Money::new(7_000), PaymentMethod::Cash, at(), None).unwrap();
        assert!(matches!(
            sale.record_payment(too_much),
            Err(LedgerError::InvalidPayment(_))
        ));
        assert_eq!(sale.payments.len(), 1);
    }

    #[test]
    fn payments_against_expenses_are_rejected() {
        let mut expense = Transaction::expense(Account::Cash, Money::new(500), at()).unwrap();
        let payment = Payment::new(Money::new(100), PaymentMethod::Cash, at(), None).unwrap();
        assert!(expense.record_payment(payment).is_err());
    }
}
