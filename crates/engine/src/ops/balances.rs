use std::collections::HashMap;

use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    BalanceCalculator, BalanceSheet, CounterpartyAmount, DebtSimplifier, EngineError, Member,
    MemberPosition, MoneyCents, ResultEngine, Settlement, Transfer,
};

use super::{Engine, HISTORY_LIMIT, with_tx};

/// Net balance of one active member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceLine {
    pub member_id: String,
    pub display_name: String,
    pub net: MoneyCents,
}

/// Direct debt between the viewer and one counterparty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtLine {
    pub counterparty_id: String,
    pub counterparty_name: String,
    pub amount: MoneyCents,
    pub split_ids: Vec<Uuid>,
}

/// Everything a member needs to decide what to settle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementsView {
    pub group_id: Uuid,
    pub user_id: String,
    pub you_owe: Vec<DebtLine>,
    pub owes_you: Vec<DebtLine>,
    pub net_balance: MoneyCents,
    pub balances: Vec<BalanceLine>,
    /// Advisory: settling still goes through direct pairwise debts.
    pub suggestions: Vec<Transfer>,
    pub pending_settlements: Vec<Settlement>,
    pub history: Vec<Settlement>,
}

impl Engine {
    /// Balances and debt edges of the group computed from its unpaid splits.
    pub async fn group_balances(&self, group_id: Uuid, user_id: &str) -> ResultEngine<BalanceSheet> {
        with_tx!(self, |db_tx| {
            self.require_active_member(&db_tx, group_id, user_id).await?;
            let (_, sheet) = self.balance_sheet(&db_tx, group_id).await?;
            Ok(sheet)
        })
    }

    /// What `user_id` owes and is owed, restricted to direct debts.
    pub async fn balances_for_user(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<MemberPosition> {
        with_tx!(self, |db_tx| {
            self.require_active_member(&db_tx, group_id, user_id).await?;
            let (_, sheet) = self.balance_sheet(&db_tx, group_id).await?;
            Ok(sheet.position_of(user_id))
        })
    }

    /// Minimal list of transfers that would zero every balance.
    pub async fn suggested_transfers(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<Transfer>> {
        with_tx!(self, |db_tx| {
            self.require_active_member(&db_tx, group_id, user_id).await?;
            let (_, sheet) = self.balance_sheet(&db_tx, group_id).await?;
            Ok(DebtSimplifier.simplify(&sheet.balances))
        })
    }

    /// Settlement page of `user_id`: direct debts, group balances,
    /// suggestions, pending requests and recent history.
    pub async fn settlements_view(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<SettlementsView> {
        with_tx!(self, |db_tx| {
            self.require_active_member(&db_tx, group_id, user_id)
                .await
                .map_err(|err| match err {
                    EngineError::NotAMember { .. } => EngineError::Forbidden(
                        "only active members can view settlements".to_string(),
                    ),
                    other => other,
                })?;

            let (members, sheet) = self.balance_sheet(&db_tx, group_id).await?;
            let names: HashMap<&str, &str> = members
                .iter()
                .map(|m| (m.member_id.as_str(), m.display_name.as_str()))
                .collect();
            let position = sheet.position_of(user_id);
            let debt_line = |line: CounterpartyAmount| DebtLine {
                counterparty_name: names
                    .get(line.counterparty_id.as_str())
                    .map_or_else(|| line.counterparty_id.clone(), |name| name.to_string()),
                counterparty_id: line.counterparty_id,
                amount: line.amount,
                split_ids: line.split_ids,
            };

            let balances = sheet
                .active_balances(&members)
                .into_iter()
                .map(|balance| BalanceLine {
                    display_name: names
                        .get(balance.member_id.as_str())
                        .map_or_else(|| balance.member_id.clone(), |name| name.to_string()),
                    member_id: balance.member_id,
                    net: balance.net,
                })
                .collect();

            Ok(SettlementsView {
                group_id,
                user_id: user_id.to_string(),
                you_owe: position.owes.into_iter().map(debt_line).collect(),
                owes_you: position.owed.into_iter().map(debt_line).collect(),
                net_balance: position.net,
                balances,
                suggestions: DebtSimplifier.simplify(&sheet.balances),
                pending_settlements: self.pending_settlements(&db_tx, group_id).await?,
                history: self
                    .settlement_history(&db_tx, group_id, HISTORY_LIMIT)
                    .await?,
            })
        })
    }

    async fn balance_sheet(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<(Vec<Member>, BalanceSheet)> {
        let members = self.group_members(db, group_id).await?;
        let unpaid = self.unpaid_splits(db, group_id).await?;
        let sheet = BalanceCalculator.compute(group_id, &members, &unpaid);
        Ok((members, sheet))
    }
}
