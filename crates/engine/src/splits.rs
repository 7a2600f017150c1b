//! Splits: the unit of obligation.
//!
//! A [`Split`] records that `owed_by_id` owes `payer_id` an amount for one
//! expense. Splits are created when an expense is divided among members and
//! are only mutated by settlement confirmation: either flagged paid or reduced
//! by a partial payment.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, MoneyCents, ResultEngine,
    util::{parse_optional_uuid, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub id: Uuid,
    pub group_id: Uuid,
    pub expense_id: String,
    pub payer_id: String,
    pub owed_by_id: String,
    pub amount: MoneyCents,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub settlement_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Split {
    pub fn new(
        group_id: Uuid,
        expense_id: String,
        payer_id: String,
        owed_by_id: String,
        amount: MoneyCents,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(
                "split amount must be > 0".to_string(),
            ));
        }
        if payer_id == owed_by_id {
            return Err(EngineError::Validation(
                "a member cannot owe themselves".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            group_id,
            expense_id,
            payer_id,
            owed_by_id,
            amount,
            is_paid: false,
            paid_at: None,
            settlement_id: None,
            created_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "splits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub expense_id: String,
    pub payer_id: String,
    pub owed_by_id: String,
    pub amount_minor: i64,
    pub is_paid: bool,
    pub paid_at: Option<DateTimeUtc>,
    pub settlement_id: Option<String>,
    pub created_at: DateTimeUtc,
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

impl From<&Split> for ActiveModel {
    fn from(split: &Split) -> Self {
        Self {
            id: ActiveValue::Set(split.id.to_string()),
            group_id: ActiveValue::Set(split.group_id.to_string()),
            expense_id: ActiveValue::Set(split.expense_id.clone()),
            payer_id: ActiveValue::Set(split.payer_id.clone()),
            owed_by_id: ActiveValue::Set(split.owed_by_id.clone()),
            amount_minor: ActiveValue::Set(split.amount.cents()),
            is_paid: ActiveValue::Set(split.is_paid),
            paid_at: ActiveValue::Set(split.paid_at),
            settlement_id: ActiveValue::Set(split.settlement_id.map(|id| id.to_string())),
            created_at: ActiveValue::Set(split.created_at),
        }
    }
}

impl TryFrom<Model> for Split {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "split")?,
            group_id: parse_uuid(&model.group_id, "group")?,
            expense_id: model.expense_id,
            payer_id: model.payer_id,
            owed_by_id: model.owed_by_id,
            amount: MoneyCents::new(model.amount_minor),
            is_paid: model.is_paid,
            paid_at: model.paid_at,
            settlement_id: parse_optional_uuid(model.settlement_id.as_deref(), "settlement")?,
            created_at: model.created_at,
        })
    }
}
