//! Expected-balance calculator.
//!
//! Folds a business day's transactions (plus the carried-over opening
//! balance) into the per-account balances the drawer *should* hold. Pure and
//! deterministic: reconciliation can re-run it any number of times against
//! the same log and get the same answer.

use crate::{
    Money,
    transaction::{Account, Transaction, TransactionKind},
};

/// Per-account balances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccountBalances {
    pub cash: Money,
    pub bank: Money,
}

impl AccountBalances {
    pub const ZERO: AccountBalances = AccountBalances {
        cash: Money::ZERO,
        bank: Money::ZERO,
    };

    pub fn get(&self, account: Account) -> Money {
        match account {
            Account::Cash => self.cash,
            Account::Bank => self.bank,
        }
    }

    fn add(&mut self, account: Account, amount: Money) {
        match account {
            Account::Cash => self.cash += amount,
            Account::Bank => self.bank += amount,
        }
    }

    pub fn total(&self) -> Money {
        self.cash + self.bank
    }
}

/// Signed contribution of one transaction to its account.
///
/// Income, transfers-in and payments add; expenses subtract; the
/// `opening`/`closure` audit rows contribute nothing.
fn signed_amount(tx: &Transaction) -> Money {
    match tx.kind {
        TransactionKind::Income | TransactionKind::Transfer | TransactionKind::Payment => {
            tx.amount
        }
        TransactionKind::Expense => -tx.amount,
        TransactionKind::Opening | TransactionKind::Closure => Money::ZERO,
    }
}

/// Reduces a day's transactions into expected per-account balances.
///
/// A split-payment income (`account == None`) contributes through its
/// payment list, each payment settling to its method's account.
pub fn expected_balances(opening: AccountBalances, transactions: &[Transaction]) -> AccountBalances {
    let mut balances = opening;

    for tx in transactions {
        match tx.account {
            Some(account) => balances.add(account, signed_amount(tx)),
            None => {
                if tx.kind == TransactionKind::Income {
                    for payment in &tx.payments {
                        balances.add(payment.method.settles_to(), payment.amount);
                    }
                }
            }
        }
    }

    balances
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::transaction::{Payment, PaymentMethod};

    fn income(account: Account, cents: i64) -> Transaction {
        Transaction::income(account, Money::new(cents), Utc::now()).unwrap()
    }

    fn expense(account: Account, cents: i64) -> Transaction {
        Transaction::expense(account, Money::new(cents), Utc::now()).unwrap()
    }

    #[test]
    fn day_example_folds_to_expected() {
        // Income of 50 and expense of 20 on cash, nothing on bank.
        let txs = vec![income(Account::Cash, 5_000), expense(Account::Cash, 2_000)];
        let expected = expected_balances(AccountBalances::ZERO, &txs);
        assert_eq!(expected.cash, Money::new(3_000));
        assert_eq!(expected.bank, Money::ZERO);
    }

    #[test]
    fn fold_is_order_independent() {
        let mut txs = vec![
            income(Account::Cash, 5_000),
            expense(Account::Cash, 2_000),
            income(Account::Bank, 7_550),
            Transaction::payment(
                Account::Cash,
                Money::new(1_200),
                uuid::Uuid::new_v4(),
                Utc::now(),
            )
            .unwrap(),
            Transaction::transfer(Account::Bank, Money::new(900), Utc::now()).unwrap(),
        ];

        let forward = expected_balances(AccountBalances::ZERO, &txs);
        txs.reverse();
        let backward = expected_balances(AccountBalances::ZERO, &txs);
        assert_eq!(forward, backward);

        let signed_sum: Money = txs.iter().map(signed_amount).sum();
        assert_eq!(forward.total(), signed_sum);
    }

    #[test]
    fn opening_balance_seeds_the_fold() {
        let opening = AccountBalances {
            cash: Money::new(10_000),
            bank: Money::new(2_000),
        };
        let txs = vec![expense(Account::Cash, 2_500)];
        let expected = expected_balances(opening, &txs);
        assert_eq!(expected.cash, Money::new(7_500));
        assert_eq!(expected.bank, Money::new(2_000));
    }

    #[test]
    fn day_summary_rows_do_not_contribute() {
        let summary = crate::cash_event::summary_transaction(
            crate::cash_event::CashEventKind::Opening,
            uuid::Uuid::new_v4(),
            AccountBalances {
                cash: Money::new(5_000),
                bank: Money::ZERO,
            },
            Utc::now(),
        )
        .unwrap();
        let expected = expected_balances(AccountBalances::ZERO, &[summary]);
        assert_eq!(expected, AccountBalances::ZERO);
    }

    #[test]
    fn split_income_contributes_through_payment_methods() {
        let payments = vec![
            Payment::new(Money::new(3_000), PaymentMethod::Cash, Utc::now(), None).unwrap(),
            Payment::new(Money::new(2_000), PaymentMethod::Yape, Utc::now(), None).unwrap(),
        ];
        let tx = Transaction::split_income(Money::new(5_000), payments, Utc::now()).unwrap();
        let expected = expected_balances(AccountBalances::ZERO, &[tx]);
        assert_eq!(expected.cash, Money::new(3_000));
        assert_eq!(expected.bank, Money::new(2_000));
    }

    #[test]
    fn recompute_is_idempotent() {
        let txs = vec![income(Account::Cash, 123), expense(Account::Bank, 45)];
        let a = expected_balances(AccountBalances::ZERO, &txs);
        let b = expected_balances(AccountBalances::ZERO, &txs);
        assert_eq!(a, b);
    }
}
