//! Balance calculation.
//!
//! Reduces the unpaid splits of a group into:
//! - one net [`Balance`] per member (positive = is owed, negative = owes);
//! - one [`DebtEdge`] per ordered `(debtor, creditor)` pair.
//!
//! Everything here is derived on demand and never persisted, so it cannot
//! diverge from the splits it was computed from. The sum of all nets is zero
//! for every input because each split adds its amount to one member and
//! removes it from another.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Member, MoneyCents, Split};

/// Net position of a member in a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub member_id: String,
    pub net: MoneyCents,
}

/// Aggregated debt from `from_id` (debtor) to `to_id` (creditor).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtEdge {
    pub from_id: String,
    pub to_id: String,
    pub amount: MoneyCents,
    /// Splits composing the edge, in input order.
    pub split_ids: Vec<Uuid>,
}

/// One line of a member's position: how much flows to/from a counterparty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyAmount {
    pub counterparty_id: String,
    pub amount: MoneyCents,
    pub split_ids: Vec<Uuid>,
}

/// What a single member owes and is owed, restricted to direct edges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPosition {
    pub owes: Vec<CounterpartyAmount>,
    pub owed: Vec<CounterpartyAmount>,
    pub net: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub group_id: Uuid,
    /// Sorted by `member_id`.
    pub balances: Vec<Balance>,
    /// Sorted by `(from_id, to_id)`.
    pub edges: Vec<DebtEdge>,
}

impl BalanceSheet {
    pub fn net_of(&self, member_id: &str) -> MoneyCents {
        self.balances
            .iter()
            .find(|b| b.member_id == member_id)
            .map(|b| b.net)
            .unwrap_or_default()
    }

    /// Sum of every net balance; zero for any well-formed sheet.
    pub fn total(&self) -> MoneyCents {
        self.balances.iter().map(|b| b.net).sum()
    }

    /// Balances of members that have not left the group.
    ///
    /// Departed members keep contributing to `edges` (and to `balances`, so
    /// the sheet stays zero-sum) but are hidden from UI summaries.
    pub fn active_balances(&self, members: &[Member]) -> Vec<Balance> {
        self.balances
            .iter()
            .filter(|b| {
                members
                    .iter()
                    .any(|m| m.member_id == b.member_id && m.is_active())
            })
            .cloned()
            .collect()
    }

    /// Direct debts touching `member_id`.
    pub fn position_of(&self, member_id: &str) -> MemberPosition {
        let mut position = MemberPosition::default();
        for edge in &self.edges {
            if edge.from_id == member_id {
                position.net -= edge.amount;
                position.owes.push(CounterpartyAmount {
                    counterparty_id: edge.to_id.clone(),
                    amount: edge.amount,
                    split_ids: edge.split_ids.clone(),
                });
            } else if edge.to_id == member_id {
                position.net += edge.amount;
                position.owed.push(CounterpartyAmount {
                    counterparty_id: edge.from_id.clone(),
                    amount: edge.amount,
                    split_ids: edge.split_ids.clone(),
                });
            }
        }
        position
    }
}

/// Pure reducer from splits to a [`BalanceSheet`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BalanceCalculator;

impl BalanceCalculator {
    /// Compute balances and debt edges for `group_id`.
    ///
    /// Every member in `members` gets a balance (zero if untouched). Splits
    /// that are already paid or belong to another group are ignored. Splits
    /// referencing users outside `members` still count, so historical debts of
    /// departed members remain visible.
    pub fn compute(&self, group_id: Uuid, members: &[Member], unpaid_splits: &[Split]) -> BalanceSheet {
        let mut nets: BTreeMap<String, MoneyCents> = members
            .iter()
            .map(|m| (m.member_id.clone(), MoneyCents::ZERO))
            .collect();
        // debtor -> creditor -> (amount, splits)
        let mut debts: BTreeMap<&str, BTreeMap<&str, (MoneyCents, Vec<Uuid>)>> = BTreeMap::new();

        for split in unpaid_splits {
            if split.is_paid || split.group_id != group_id {
                tracing::debug!(split_id = %split.id, "skipping split outside unpaid set");
                continue;
            }
            *nets.entry(split.payer_id.clone()).or_default() += split.amount;
            *nets.entry(split.owed_by_id.clone()).or_default() -= split.amount;

            let entry = debts
                .entry(split.owed_by_id.as_str())
                .or_default()
                .entry(split.payer_id.as_str())
                .or_insert_with(|| (MoneyCents::ZERO, Vec::new()));
            entry.0 += split.amount;
            entry.1.push(split.id);
        }

        let edges = debts
            .into_iter()
            .flat_map(|(from_id, creditors)| {
                creditors
                    .into_iter()
                    .map(move |(to_id, (amount, split_ids))| DebtEdge {
                        from_id: from_id.to_string(),
                        to_id: to_id.to_string(),
                        amount,
                        split_ids,
                    })
            })
            .collect();

        let balances = nets
            .into_iter()
            .map(|(member_id, net)| Balance { member_id, net })
            .collect();

        BalanceSheet {
            group_id,
            balances,
            edges,
        }
    }
}
