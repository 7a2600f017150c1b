use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{LogNotifier, NotificationSink, ResultEngine, SettlementEvent};

mod access;
mod balances;
mod memberships;
mod settlements;
mod splits;

pub use balances::{BalanceLine, DebtLine, SettlementsView};

/// Settlements shown in the history section of the view.
pub const HISTORY_LIMIT: u64 = 20;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    notifier: Arc<dyn NotificationSink>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Hand an event to the notification sink.
    ///
    /// Called only after the ledger transaction committed: a failing sink is
    /// logged and otherwise ignored.
    fn notify(&self, event: SettlementEvent) {
        let kind = event.kind.as_str();
        let settlement_id = event.settlement_id;
        let recipient = event.recipient_id.clone();
        if let Err(err) = self.notifier.emit(event) {
            tracing::warn!(
                kind,
                %settlement_id,
                %recipient,
                "failed to deliver settlement notification: {err}"
            );
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    notifier: Option<Arc<dyn NotificationSink>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Sink receiving settlement events. Defaults to [`LogNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> EngineBuilder {
        self.notifier = Some(notifier);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(LogNotifier) as Arc<dyn NotificationSink>),
        })
    }
}
