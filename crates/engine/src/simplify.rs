//! Debt simplification.
//!
//! Collapses a many-to-many debt graph into a short list of payment
//! instructions that zero every balance, ignoring who originally owed whom.
//! The greedy "largest creditor meets largest debtor" matching settles at
//! least one party per step, so `n` parties with a nonzero balance need at
//! most `n - 1` transfers.
//!
//! The output is advisory: settlement requests are still checked against
//! direct pairwise debts.

use std::{cmp::Reverse, collections::BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Balance, MoneyCents};

/// Suggested payment `from_id -> to_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from_id: String,
    pub to_id: String,
    pub amount: MoneyCents,
}

/// Ordered by largest magnitude first, then lowest member id.
type Queue = BTreeSet<(Reverse<MoneyCents>, String)>;

#[derive(Clone, Copy, Debug, Default)]
pub struct DebtSimplifier;

impl DebtSimplifier {
    pub fn simplify(&self, balances: &[Balance]) -> Vec<Transfer> {
        let mut creditors = Queue::new();
        let mut debtors = Queue::new();
        for balance in balances {
            if balance.net.is_positive() {
                creditors.insert((Reverse(balance.net), balance.member_id.clone()));
            } else if balance.net.is_negative() {
                debtors.insert((Reverse(-balance.net), balance.member_id.clone()));
            }
        }

        let mut transfers = Vec::new();
        while !creditors.is_empty() && !debtors.is_empty() {
            let Some((Reverse(credit), creditor)) = creditors.pop_first() else {
                break;
            };
            let Some((Reverse(debt), debtor)) = debtors.pop_first() else {
                break;
            };

            let amount = credit.min(debt);
            transfers.push(Transfer {
                from_id: debtor.clone(),
                to_id: creditor.clone(),
                amount,
            });

            if credit > amount {
                creditors.insert((Reverse(credit - amount), creditor));
            }
            if debt > amount {
                debtors.insert((Reverse(debt - amount), debtor));
            }
        }

        let leftover: MoneyCents = creditors
            .iter()
            .chain(debtors.iter())
            .map(|(Reverse(amount), _)| *amount)
            .sum();
        if !leftover.is_zero()
            && let Some(last) = transfers.last_mut()
        {
            tracing::warn!(
                residual = %leftover,
                from = %last.from_id,
                to = %last.to_id,
                "balances do not sum to zero, last transfer absorbs the residual"
            );
            last.amount += leftover;
        }

        transfers
    }
}
