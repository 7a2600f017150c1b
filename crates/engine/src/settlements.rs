//! Settlement requests and their audit trail.
//!
//! A [`Settlement`] is a proposed real-world payment from a debtor
//! (`from_user_id`) to a creditor (`to_user_id`). It starts `Pending` and is
//! moved exactly once to a terminal state (`Confirmed` or `Rejected`). Rows are
//! never deleted.

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SettlementStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl SettlementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SettlementStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "rejected" => Ok(Self::Rejected),
            other => Err(EngineError::Validation(format!(
                "invalid settlement status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub group_id: Uuid,
    pub from_user_id: String,
    pub to_user_id: String,
    pub amount: MoneyCents,
    pub status: SettlementStatus,
    pub note: Option<String>,
    pub requested_by: String,
    pub idempotency_key: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Settlement {
    pub fn new(
        group_id: Uuid,
        from_user_id: String,
        to_user_id: String,
        amount: MoneyCents,
        note: Option<String>,
        requested_by: String,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(
                "settlement amount must be > 0".to_string(),
            ));
        }
        if from_user_id == to_user_id {
            return Err(EngineError::Validation(
                "cannot settle a debt with yourself".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            group_id,
            from_user_id,
            to_user_id,
            amount,
            status: SettlementStatus::Pending,
            note,
            requested_by,
            idempotency_key: None,
            version: 0,
            created_at,
            settled_at: None,
            confirmed_at: None,
            rejected_at: None,
        })
    }

    /// The party that did not issue the request.
    pub fn counterparty_of_requester(&self) -> &str {
        if self.requested_by == self.to_user_id {
            &self.from_user_id
        } else {
            &self.to_user_id
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub amount_minor: i64,
    pub status: String,
    pub note: Option<String>,
    pub requested_by: String,
    pub idempotency_key: Option<String>,
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub settled_at: Option<DateTimeUtc>,
    pub confirmed_at: Option<DateTimeUtc>,
    pub rejected_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Groups,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Settlement> for ActiveModel {
    fn from(settlement: &Settlement) -> Self {
        Self {
            id: ActiveValue::Set(settlement.id.to_string()),
            group_id: ActiveValue::Set(settlement.group_id.to_string()),
            from_user_id: ActiveValue::Set(settlement.from_user_id.clone()),
            to_user_id: ActiveValue::Set(settlement.to_user_id.clone()),
            amount_minor: ActiveValue::Set(settlement.amount.cents()),
            status: ActiveValue::Set(settlement.status.as_str().to_string()),
            note: ActiveValue::Set(settlement.note.clone()),
            requested_by: ActiveValue::Set(settlement.requested_by.clone()),
            idempotency_key: ActiveValue::Set(settlement.idempotency_key.clone()),
            version: ActiveValue::Set(settlement.version),
            created_at: ActiveValue::Set(settlement.created_at),
            settled_at: ActiveValue::Set(settlement.settled_at),
            confirmed_at: ActiveValue::Set(settlement.confirmed_at),
            rejected_at: ActiveValue::Set(settlement.rejected_at),
        }
    }
}

impl TryFrom<Model> for Settlement {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "settlement")?,
            group_id: parse_uuid(&model.group_id, "group")?,
            from_user_id: model.from_user_id,
            to_user_id: model.to_user_id,
            amount: MoneyCents::new(model.amount_minor),
            status: SettlementStatus::try_from(model.status.as_str())?,
            note: model.note,
            requested_by: model.requested_by,
            idempotency_key: model.idempotency_key,
            version: model.version,
            created_at: model.created_at,
            settled_at: model.settled_at,
            confirmed_at: model.confirmed_at,
            rejected_at: model.rejected_at,
        })
    }
}
