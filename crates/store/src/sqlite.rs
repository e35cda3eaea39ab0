//! SQLite-backed implementation of the core's storage traits.

use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    TransactionTrait, sea_query::OnConflict,
};
use uuid::Uuid;

use ledger::{
    AccountReconciliation, BusinessDay, CashEvent, CashEventKind, CashEventStore, LedgerError,
    Payment, Transaction, TransactionLog,
};

use crate::{cash_events, event_accounts, payments, transactions};

/// Document store over a SQLite database. Clones share the connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: DatabaseConnection,
    day: BusinessDay,
}

impl SqliteStore {
    pub fn new(db: DatabaseConnection, day: BusinessDay) -> Self {
        Self { db, day }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn event_lines(
        &self,
        model: &cash_events::Model,
    ) -> Result<Vec<AccountReconciliation>, LedgerError> {
        let rows = model
            .find_related(event_accounts::Entity)
            .order_by_asc(event_accounts::Column::Position)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(AccountReconciliation::try_from).collect()
    }
}

fn db_err(err: DbErr) -> LedgerError {
    LedgerError::Store(err.to_string())
}

/// Treats a conflict-skipped insert as success; retried deliveries re-append
/// rows that already landed.
fn idempotent<T>(result: Result<T, DbErr>) -> Result<(), LedgerError> {
    match result {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(err) => Err(db_err(err)),
    }
}

impl TransactionLog for SqliteStore {
    async fn query_day(&self, date: NaiveDate) -> Result<Vec<Transaction>, LedgerError> {
        let (start, end) = self.day.day_bounds(date);
        let rows = transactions::Entity::find()
            .filter(transactions::Column::CreatedAt.gte(start))
            .filter(transactions::Column::CreatedAt.lt(end))
            .order_by_asc(transactions::Column::CreatedAt)
            .find_with_related(payments::Entity)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(model, payment_models)| {
                let mut tx = Transaction::try_from(model)?;
                tx.payments = payment_models
                    .into_iter()
                    .map(Payment::try_from)
                    .collect::<Result<_, _>>()?;
                Ok(tx)
            })
            .collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Transaction>, LedgerError> {
        let Some(model) = transactions::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let payment_models = model
            .find_related(payments::Entity)
            .order_by_asc(payments::Column::PaidAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut tx = Transaction::try_from(model)?;
        tx.payments = payment_models
            .into_iter()
            .map(Payment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Some(tx))
    }

    async fn append(&self, transaction: &Transaction) -> Result<Uuid, LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        idempotent(
            transactions::Entity::insert(transactions::ActiveModel::from(transaction))
                .on_conflict(
                    OnConflict::column(transactions::Column::Id)
                        .do_nothing()
                        .to_owned(),
                )
                .exec(&txn)
                .await,
        )?;
        for payment in &transaction.payments {
            idempotent(
                payments::Entity::insert(payments::active_model(transaction.id, payment))
                    .on_conflict(
                        OnConflict::column(payments::Column::Id)
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec(&txn)
                    .await,
            )?;
        }

        txn.commit().await.map_err(db_err)?;
        Ok(transaction.id)
    }

    async fn append_payment(
        &self,
        transaction_id: Uuid,
        payment: &Payment,
    ) -> Result<(), LedgerError> {
        let exists = transactions::Entity::find_by_id(transaction_id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some();
        if !exists {
            return Err(LedgerError::KeyNotFound(transaction_id.to_string()));
        }

        idempotent(
            payments::Entity::insert(payments::active_model(transaction_id, payment))
                .on_conflict(
                    OnConflict::column(payments::Column::Id)
                        .do_nothing()
                        .to_owned(),
                )
                .exec(&self.db)
                .await,
        )
    }
}

impl CashEventStore for SqliteStore {
    async fn get(
        &self,
        date: NaiveDate,
        kind: CashEventKind,
    ) -> Result<Option<CashEvent>, LedgerError> {
        let Some(model) = cash_events::Entity::find()
            .filter(cash_events::Column::Date.eq(date))
            .filter(cash_events::Column::Kind.eq(kind.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let lines = self.event_lines(&model).await?;
        Ok(Some(cash_events::assemble(model, lines)?))
    }

    async fn put(&self, event: &CashEvent) -> Result<(), LedgerError> {
        let existing = cash_events::Entity::find()
            .filter(cash_events::Column::Date.eq(event.date))
            .filter(cash_events::Column::Kind.eq(event.kind.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        match existing {
            Some(model) if model.id != event.id.to_string() => {
                return Err(LedgerError::AlreadyReconciled(format!(
                    "{} {}",
                    event.date,
                    event.kind.as_str()
                )));
            }
            Some(_) => return Ok(()),
            None => {}
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        idempotent(
            cash_events::Entity::insert(cash_events::ActiveModel::from(event))
                .on_conflict(
                    OnConflict::column(cash_events::Column::Id)
                        .do_nothing()
                        .to_owned(),
                )
                .exec(&txn)
                .await,
        )?;
        for (position, line) in event.accounts.iter().enumerate() {
            idempotent(
                event_accounts::Entity::insert(event_accounts::active_model(
                    event.id,
                    position as i32,
                    line,
                ))
                .on_conflict(
                    OnConflict::column(event_accounts::Column::Id)
                        .do_nothing()
                        .to_owned(),
                )
                .exec(&txn)
                .await,
            )?;
        }
        txn.commit().await.map_err(db_err)?;

        tracing::debug!(
            date = %event.date,
            kind = event.kind.as_str(),
            id = %event.id,
            "cash event stored"
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<CashEvent>, LedgerError> {
        let models = cash_events::Entity::find()
            .order_by_desc(cash_events::Column::Date)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut events = Vec::with_capacity(models.len());
        for model in models {
            let lines = self.event_lines(&model).await?;
            events.push(cash_events::assemble(model, lines)?);
        }
        Ok(events)
    }
}
