//! Settlement workflow: `Pending -> Confirmed | Rejected`.
//!
//! - create: the pending-pair guard is a partial unique index, so two racing
//!   requests cannot both insert; the loser gets `DuplicatePendingSettlement`.
//! - confirm/reject: a compare-and-set on `(status, version)` inside the same
//!   transaction that mutates the splits, so the transition and the split
//!   changes commit together or not at all.
//! - notifications are emitted only after commit.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    CreateSettlementCmd, EngineError, MoneyCents, ResultEngine, Settlement, SettlementAction,
    SettlementEvent, SettlementEventKind, SettlementStatus, settlements,
    util::{is_unique_violation, normalize_optional_text},
};

use super::{Engine, with_tx};

impl Engine {
    /// Requests a settlement between two active members.
    ///
    /// The amount must be covered by the direct unpaid debt of the pair.
    /// Repeating a request with the same idempotency key returns the original
    /// settlement.
    pub async fn create_settlement(&self, cmd: CreateSettlementCmd) -> ResultEngine<Settlement> {
        let CreateSettlementCmd {
            group_id,
            from_user_id,
            to_user_id,
            amount,
            requested_by,
            note,
            idempotency_key,
            created_at,
        } = cmd;
        let mut settlement = Settlement::new(
            group_id,
            from_user_id,
            to_user_id,
            amount,
            normalize_optional_text(note.as_deref()),
            requested_by,
            created_at,
        )?;
        settlement.idempotency_key = normalize_optional_text(idempotency_key.as_deref());
        if settlement.requested_by != settlement.from_user_id
            && settlement.requested_by != settlement.to_user_id
        {
            return Err(EngineError::Forbidden(
                "only the payer or the receiver can request a settlement".to_string(),
            ));
        }

        let (settlement, event) = with_tx!(self, |db_tx| {
            self.lock_group(&db_tx, group_id).await?;
            self.require_active_member(&db_tx, group_id, &settlement.requested_by)
                .await?;
            let counterparty = settlement.counterparty_of_requester();
            let counterparty_active = self
                .find_membership(&db_tx, group_id, counterparty)
                .await?
                .is_some_and(|m| m.left_at.is_none());
            if !counterparty_active {
                return Err(EngineError::Validation(format!(
                    "\"{counterparty}\" is not an active member of the group"
                )));
            }

            if let Some(existing) = self.find_by_idempotency_key(&db_tx, &settlement).await? {
                return Ok(existing);
            }
            if self
                .find_pending_for_pair(&db_tx, &settlement)
                .await?
                .is_some()
            {
                return Err(duplicate_pending(&settlement));
            }

            let unpaid = self
                .unpaid_splits_for_pair(
                    &db_tx,
                    group_id,
                    &settlement.to_user_id,
                    &settlement.from_user_id,
                )
                .await?;
            if unpaid.is_empty() {
                return Err(EngineError::NoDebtFound {
                    debtor_id: settlement.from_user_id.clone(),
                    creditor_id: settlement.to_user_id.clone(),
                });
            }
            let available: MoneyCents = unpaid.iter().map(|s| s.amount).sum();
            if available < settlement.amount {
                return Err(EngineError::AmountExceedsDebt {
                    requested: settlement.amount,
                    available,
                });
            }

            if let Err(err) = settlements::ActiveModel::from(&settlement)
                .insert(&db_tx)
                .await
            {
                if !is_unique_violation(&err) {
                    return Err(err.into());
                }
                if let Some(existing) = self.find_by_idempotency_key(&db_tx, &settlement).await? {
                    return Ok(existing);
                }
                return Err(duplicate_pending(&settlement));
            }

            let names = self
                .display_names(
                    &db_tx,
                    &[
                        settlement.from_user_id.as_str(),
                        settlement.to_user_id.as_str(),
                    ],
                )
                .await?;
            let event = settlement_event(
                SettlementEventKind::SettlementRequested,
                &settlement,
                settlement.counterparty_of_requester(),
                &settlement.requested_by,
                &names,
            );
            Ok((settlement, event))
        })?;

        tracing::info!(
            settlement_id = %settlement.id,
            group_id = %settlement.group_id,
            from = %settlement.from_user_id,
            to = %settlement.to_user_id,
            amount = %settlement.amount,
            "settlement requested"
        );
        self.notify(event);
        Ok(settlement)
    }

    /// Confirms a pending settlement and pays off the splits it covers.
    ///
    /// Only the receiver may confirm. Confirming an already confirmed
    /// settlement returns it unchanged.
    pub async fn confirm_settlement(
        &self,
        group_id: Uuid,
        settlement_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Settlement> {
        self.finish_settlement(group_id, settlement_id, user_id, SettlementAction::Confirm)
            .await
    }

    /// Rejects a pending settlement. Splits are left untouched.
    pub async fn reject_settlement(
        &self,
        group_id: Uuid,
        settlement_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Settlement> {
        self.finish_settlement(group_id, settlement_id, user_id, SettlementAction::Reject)
            .await
    }

    /// Applies `action` to a pending settlement.
    pub async fn finish_settlement(
        &self,
        group_id: Uuid,
        settlement_id: Uuid,
        user_id: &str,
        action: SettlementAction,
    ) -> ResultEngine<Settlement> {
        let target = action.target_status();
        let (settlement, event) = with_tx!(self, |db_tx| {
            self.lock_group(&db_tx, group_id).await?;
            let current = self
                .require_settlement(&db_tx, group_id, settlement_id)
                .await?;
            if current.to_user_id != user_id {
                return Err(EngineError::Forbidden(format!(
                    "only the receiver can {} a settlement",
                    match action {
                        SettlementAction::Confirm => "confirm",
                        SettlementAction::Reject => "reject",
                    }
                )));
            }
            if current.status == target {
                return Ok(current);
            }
            if current.status.is_terminal() {
                return Err(EngineError::InvalidStateTransition {
                    settlement_id,
                    status: current.status,
                });
            }
            self.require_active_member(&db_tx, group_id, user_id).await?;

            let now = Utc::now();
            let stamp = match action {
                SettlementAction::Confirm => settlements::Column::ConfirmedAt,
                SettlementAction::Reject => settlements::Column::RejectedAt,
            };
            let result = settlements::Entity::update_many()
                .col_expr(settlements::Column::Status, Expr::value(target.as_str()))
                .col_expr(settlements::Column::SettledAt, Expr::value(now))
                .col_expr(stamp, Expr::value(now))
                .col_expr(
                    settlements::Column::Version,
                    Expr::col(settlements::Column::Version).add(1),
                )
                .filter(settlements::Column::Id.eq(settlement_id.to_string()))
                .filter(settlements::Column::Status.eq(SettlementStatus::Pending.as_str()))
                .filter(settlements::Column::Version.eq(current.version))
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                // Another request moved the settlement first.
                let latest = self
                    .require_settlement(&db_tx, group_id, settlement_id)
                    .await?;
                if latest.status == target {
                    return Ok(latest);
                }
                return Err(EngineError::InvalidStateTransition {
                    settlement_id,
                    status: latest.status,
                });
            }

            if action == SettlementAction::Confirm {
                self.apply_settlement_payment(&db_tx, &current, now).await?;
            }

            let updated = self
                .require_settlement(&db_tx, group_id, settlement_id)
                .await?;
            let names = self
                .display_names(
                    &db_tx,
                    &[updated.from_user_id.as_str(), updated.to_user_id.as_str()],
                )
                .await?;
            let kind = match action {
                SettlementAction::Confirm => SettlementEventKind::SettlementConfirmed,
                SettlementAction::Reject => SettlementEventKind::SettlementRejected,
            };
            let event = settlement_event(kind, &updated, &updated.from_user_id, user_id, &names);
            Ok((updated, event))
        })?;

        tracing::info!(
            settlement_id = %settlement.id,
            group_id = %settlement.group_id,
            status = %settlement.status,
            amount = %settlement.amount,
            "settlement finished"
        );
        self.notify(event);
        Ok(settlement)
    }

    /// Returns a settlement of the group; the caller must be an active member.
    pub async fn get_settlement(
        &self,
        group_id: Uuid,
        settlement_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Settlement> {
        with_tx!(self, |db_tx| {
            self.require_active_member(&db_tx, group_id, user_id).await?;
            self.require_settlement(&db_tx, group_id, settlement_id)
                .await
        })
    }

    pub(super) async fn require_settlement(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        settlement_id: Uuid,
    ) -> ResultEngine<Settlement> {
        let model = settlements::Entity::find_by_id(settlement_id.to_string())
            .filter(settlements::Column::GroupId.eq(group_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("settlement not exists".to_string()))?;
        Settlement::try_from(model)
    }

    /// Pending settlements of the group, newest first.
    pub(super) async fn pending_settlements(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Settlement>> {
        settlements::Entity::find()
            .filter(settlements::Column::GroupId.eq(group_id.to_string()))
            .filter(settlements::Column::Status.eq(SettlementStatus::Pending.as_str()))
            .order_by_desc(settlements::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(Settlement::try_from)
            .collect()
    }

    /// Most recent confirmed or rejected settlements of the group.
    pub(super) async fn settlement_history(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        limit: u64,
    ) -> ResultEngine<Vec<Settlement>> {
        settlements::Entity::find()
            .filter(settlements::Column::GroupId.eq(group_id.to_string()))
            .filter(settlements::Column::Status.ne(SettlementStatus::Pending.as_str()))
            .order_by_desc(settlements::Column::SettledAt)
            .order_by_desc(settlements::Column::CreatedAt)
            .limit(limit)
            .all(db)
            .await?
            .into_iter()
            .map(Settlement::try_from)
            .collect()
    }

    async fn find_by_idempotency_key(
        &self,
        db: &DatabaseTransaction,
        settlement: &Settlement,
    ) -> ResultEngine<Option<Settlement>> {
        let Some(key) = settlement.idempotency_key.as_deref() else {
            return Ok(None);
        };
        settlements::Entity::find()
            .filter(settlements::Column::GroupId.eq(settlement.group_id.to_string()))
            .filter(settlements::Column::RequestedBy.eq(settlement.requested_by.clone()))
            .filter(settlements::Column::IdempotencyKey.eq(key.to_string()))
            .one(db)
            .await?
            .map(Settlement::try_from)
            .transpose()
    }

    async fn find_pending_for_pair(
        &self,
        db: &DatabaseTransaction,
        settlement: &Settlement,
    ) -> ResultEngine<Option<settlements::Model>> {
        settlements::Entity::find()
            .filter(settlements::Column::GroupId.eq(settlement.group_id.to_string()))
            .filter(settlements::Column::FromUserId.eq(settlement.from_user_id.clone()))
            .filter(settlements::Column::ToUserId.eq(settlement.to_user_id.clone()))
            .filter(settlements::Column::Status.eq(SettlementStatus::Pending.as_str()))
            .one(db)
            .await
            .map_err(Into::into)
    }
}

fn duplicate_pending(settlement: &Settlement) -> EngineError {
    EngineError::DuplicatePendingSettlement {
        from_user_id: settlement.from_user_id.clone(),
        to_user_id: settlement.to_user_id.clone(),
    }
}

fn settlement_event(
    kind: SettlementEventKind,
    settlement: &Settlement,
    recipient_id: &str,
    actor_id: &str,
    names: &HashMap<String, String>,
) -> SettlementEvent {
    let name_of = |id: &str| names.get(id).cloned().unwrap_or_else(|| id.to_string());
    SettlementEvent {
        kind,
        settlement_id: settlement.id,
        group_id: settlement.group_id,
        recipient_id: recipient_id.to_string(),
        actor_id: actor_id.to_string(),
        payer_id: settlement.from_user_id.clone(),
        payer_name: name_of(&settlement.from_user_id),
        receiver_id: settlement.to_user_id.clone(),
        receiver_name: name_of(&settlement.to_user_id),
        amount: settlement.amount,
    }
}
