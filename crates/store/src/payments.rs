//! Row mapping for the `payments` sub-ledger.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use ledger::{LedgerError, Money, Payment, PaymentMethod};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub transaction_id: String,
    pub amount_minor: i64,
    pub method: String,
    pub paid_at: DateTimeUtc,
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id"
    )]
    Transaction,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn active_model(transaction_id: Uuid, payment: &Payment) -> ActiveModel {
    ActiveModel {
        id: ActiveValue::Set(payment.id.to_string()),
        transaction_id: ActiveValue::Set(transaction_id.to_string()),
        amount_minor: ActiveValue::Set(payment.amount.cents()),
        method: ActiveValue::Set(payment.method.as_str().to_string()),
        paid_at: ActiveValue::Set(payment.date),
        notes: ActiveValue::Set(payment.notes.clone()),
    }
}

impl TryFrom<Model> for Payment {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| LedgerError::KeyNotFound(model.id.clone()))?,
            amount: Money::new(model.amount_minor),
            method: PaymentMethod::try_from(model.method.as_str())?,
            date: model.paid_at,
            notes: model.notes,
        })
    }
}
