//! Row mapping for the `cash_event_accounts` table: one reconciliation line
//! per account per cash event.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use ledger::{Account, AccountReconciliation, LedgerError, Money};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cash_event_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub event_id: String,
    /// Preserves the line order of the original event.
    pub position: i32,
    pub account: String,
    pub expected_minor: i64,
    pub real_minor: i64,
    pub difference_minor: i64,
    pub adjustment_transaction_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cash_events::Entity",
        from = "Column::EventId",
        to = "super::cash_events::Column::Id"
    )]
    Event,
}

impl Related<super::cash_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn active_model(event_id: Uuid, position: i32, line: &AccountReconciliation) -> ActiveModel {
    ActiveModel {
        id: ActiveValue::Set(format!("{event_id}:{}", line.account.as_str())),
        event_id: ActiveValue::Set(event_id.to_string()),
        position: ActiveValue::Set(position),
        account: ActiveValue::Set(line.account.as_str().to_string()),
        expected_minor: ActiveValue::Set(line.expected.cents()),
        real_minor: ActiveValue::Set(line.real.cents()),
        difference_minor: ActiveValue::Set(line.difference.cents()),
        adjustment_transaction_id: ActiveValue::Set(
            line.adjustment_transaction_id.map(|id| id.to_string()),
        ),
    }
}

impl TryFrom<Model> for AccountReconciliation {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            account: Account::try_from(model.account.as_str())?,
            expected: Money::new(model.expected_minor),
            real: Money::new(model.real_minor),
            difference: Money::new(model.difference_minor),
            adjustment_transaction_id: model
                .adjustment_transaction_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
        })
    }
}
