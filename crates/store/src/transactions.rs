//! Row mapping for the `transactions` table.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use ledger::{Account, LedgerError, Money, Transaction, TransactionKind};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub account: Option<String>,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub adjustment: bool,
    pub related_transaction_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            account: ActiveValue::Set(tx.account.map(|a| a.as_str().to_string())),
            amount_minor: ActiveValue::Set(tx.amount.cents()),
            description: ActiveValue::Set(tx.description.clone()),
            adjustment: ActiveValue::Set(tx.adjustment),
            related_transaction_id: ActiveValue::Set(
                tx.related_transaction_id.map(|id| id.to_string()),
            ),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

/// The payments sub-ledger lives in its own table; callers attach it after
/// loading the related rows.
impl TryFrom<Model> for Transaction {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| LedgerError::KeyNotFound(model.id.clone()))?,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            account: model
                .account
                .as_deref()
                .map(Account::try_from)
                .transpose()?,
            amount: Money::new(model.amount_minor),
            created_at: model.created_at,
            description: model.description,
            payments: Vec::new(),
            adjustment: model.adjustment,
            related_transaction_id: model
                .related_transaction_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
        })
    }
}
