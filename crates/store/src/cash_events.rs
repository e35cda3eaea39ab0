//! Row mapping for the `cash_events` table.
//!
//! The per-account reconciliation lines live in `cash_event_accounts`; a
//! domain [`CashEvent`] is assembled from one event row plus its lines.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use ledger::{CashEvent, CashEventKind, CashEventStatus, LedgerError};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cash_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub date: Date,
    pub kind: String,
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::event_accounts::Entity")]
    Accounts,
}

impl Related<super::event_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CashEvent> for ActiveModel {
    fn from(event: &CashEvent) -> Self {
        Self {
            id: ActiveValue::Set(event.id.to_string()),
            date: ActiveValue::Set(event.date),
            kind: ActiveValue::Set(event.kind.as_str().to_string()),
            status: ActiveValue::Set(event.status.as_str().to_string()),
            created_at: ActiveValue::Set(event.created_at),
        }
    }
}

/// Assembles the domain event from its row and the already-converted
/// account lines.
pub fn assemble(
    model: Model,
    accounts: Vec<ledger::AccountReconciliation>,
) -> Result<CashEvent, LedgerError> {
    Ok(CashEvent {
        id: Uuid::parse_str(&model.id).map_err(|_| LedgerError::KeyNotFound(model.id.clone()))?,
        date: model.date,
        kind: CashEventKind::try_from(model.kind.as_str())?,
        accounts,
        status: CashEventStatus::try_from(model.status.as_str())?,
        created_at: model.created_at,
    })
}
