//! Shared-expense ledger engine.
//!
//! Splits record who owes whom; balances and simplified transfers are derived
//! from the unpaid splits on demand; settlements move through
//! `Pending -> Confirmed | Rejected` and pay off splits when confirmed.

pub use balances::{
    Balance, BalanceCalculator, BalanceSheet, CounterpartyAmount, DebtEdge, MemberPosition,
};
pub use commands::{CreateSettlementCmd, RecordSplitsCmd, SettlementAction};
pub use error::EngineError;
pub use group_members::Member;
pub use groups::Group;
pub use money::MoneyCents;
pub use notifications::{
    INBOX_CAPACITY, InboxNotifier, LogNotifier, NotificationSink, NotifyError, SettlementEvent,
    SettlementEventKind,
};
pub use ops::{BalanceLine, DebtLine, Engine, EngineBuilder, HISTORY_LIMIT, SettlementsView};
pub use settlements::{Settlement, SettlementStatus};
pub use simplify::{DebtSimplifier, Transfer};
pub use splits::Split;

mod balances;
mod commands;
mod error;
mod group_members;
mod groups;
mod money;
mod notifications;
mod ops;
mod settlements;
mod simplify;
mod splits;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
