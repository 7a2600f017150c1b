use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, RecordSplitsCmd, ResultEngine, Settlement, Split, splits};

use super::{Engine, with_tx};

impl Engine {
    /// Records the splits of one expense.
    ///
    /// Shares owed by the payer are skipped. Every party must be an active
    /// member; `user_id` is the caller and must be one too.
    pub async fn record_expense_splits(
        &self,
        cmd: RecordSplitsCmd,
        user_id: &str,
    ) -> ResultEngine<Vec<Split>> {
        let RecordSplitsCmd {
            group_id,
            expense_id,
            payer_id,
            shares,
            created_at,
        } = cmd;
        let expense_id = expense_id.trim().to_string();
        if expense_id.is_empty() {
            return Err(EngineError::Validation(
                "expense id must not be empty".to_string(),
            ));
        }

        let mut new_splits = Vec::with_capacity(shares.len());
        for (owed_by, amount) in shares {
            if owed_by == payer_id {
                continue;
            }
            new_splits.push(Split::new(
                group_id,
                expense_id.clone(),
                payer_id.clone(),
                owed_by,
                amount,
                created_at,
            )?);
        }

        with_tx!(self, |db_tx| {
            self.lock_group(&db_tx, group_id).await?;
            self.require_active_member(&db_tx, group_id, user_id).await?;
            self.require_active_member(&db_tx, group_id, &payer_id).await?;
            for split in &new_splits {
                let active = self
                    .find_membership(&db_tx, group_id, &split.owed_by_id)
                    .await?
                    .is_some_and(|m| m.left_at.is_none());
                if !active {
                    return Err(EngineError::Validation(format!(
                        "\"{}\" is not an active member of the group",
                        split.owed_by_id
                    )));
                }
            }

            // Every balance, edge and transfer is bounded by the unpaid total.
            let unpaid = self.unpaid_splits(&db_tx, group_id).await?;
            let total = unpaid
                .iter()
                .chain(&new_splits)
                .try_fold(MoneyCents::ZERO, |acc, split| acc.checked_add(split.amount));
            if total.is_none() {
                return Err(EngineError::Validation(
                    "split amounts exceed the representable group total".to_string(),
                ));
            }

            for split in &new_splits {
                splits::ActiveModel::from(split).insert(&db_tx).await?;
            }

            tracing::debug!(%group_id, %expense_id, count = new_splits.len(), "expense splits recorded");
            Ok(new_splits)
        })
    }

    /// Unpaid splits of the group in settlement order.
    pub(super) async fn unpaid_splits(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Split>> {
        splits::Entity::find()
            .filter(splits::Column::GroupId.eq(group_id.to_string()))
            .filter(splits::Column::IsPaid.eq(false))
            .order_by_asc(splits::Column::CreatedAt)
            .order_by_asc(splits::Column::ExpenseId)
            .order_by_asc(splits::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Split::try_from)
            .collect()
    }

    /// Unpaid splits where `owed_by_id` owes `payer_id`, oldest first.
    pub(super) async fn unpaid_splits_for_pair(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        payer_id: &str,
        owed_by_id: &str,
    ) -> ResultEngine<Vec<Split>> {
        splits::Entity::find()
            .filter(splits::Column::GroupId.eq(group_id.to_string()))
            .filter(splits::Column::PayerId.eq(payer_id.to_string()))
            .filter(splits::Column::OwedById.eq(owed_by_id.to_string()))
            .filter(splits::Column::IsPaid.eq(false))
            .order_by_asc(splits::Column::CreatedAt)
            .order_by_asc(splits::Column::ExpenseId)
            .order_by_asc(splits::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Split::try_from)
            .collect()
    }

    /// Applies a confirmed settlement to the splits of its pair.
    ///
    /// Splits are consumed oldest first: a split fully covered by the
    /// remaining amount is marked paid; the first split that is only partly
    /// covered is reduced and a paid split for the covered part is inserted
    /// next to it. Fails with `AmountExceedsDebt` when the pair no longer owes
    /// enough, leaving the caller to roll back.
    pub(super) async fn apply_settlement_payment(
        &self,
        db: &DatabaseTransaction,
        settlement: &Settlement,
        paid_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let unpaid = self
            .unpaid_splits_for_pair(
                db,
                settlement.group_id,
                &settlement.to_user_id,
                &settlement.from_user_id,
            )
            .await?;
        let available: MoneyCents = unpaid.iter().map(|s| s.amount).sum();
        if available < settlement.amount {
            return Err(EngineError::AmountExceedsDebt {
                requested: settlement.amount,
                available,
            });
        }

        let mut remaining = settlement.amount;
        for split in unpaid {
            if remaining.is_zero() {
                break;
            }
            if split.amount <= remaining {
                remaining -= split.amount;
                splits::ActiveModel {
                    id: ActiveValue::Set(split.id.to_string()),
                    is_paid: ActiveValue::Set(true),
                    paid_at: ActiveValue::Set(Some(paid_at)),
                    settlement_id: ActiveValue::Set(Some(settlement.id.to_string())),
                    ..Default::default()
                }
                .update(db)
                .await?;
                continue;
            }

            splits::ActiveModel {
                id: ActiveValue::Set(split.id.to_string()),
                amount_minor: ActiveValue::Set((split.amount - remaining).cents()),
                ..Default::default()
            }
            .update(db)
            .await?;
            let settled_part = Split {
                id: Uuid::new_v4(),
                amount: remaining,
                is_paid: true,
                paid_at: Some(paid_at),
                settlement_id: Some(settlement.id),
                ..split
            };
            splits::ActiveModel::from(&settled_part).insert(db).await?;
            remaining = MoneyCents::ZERO;
        }

        Ok(())
    }
}
