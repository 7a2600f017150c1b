use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{
    CreateSettlementCmd, Engine, EngineError, InboxNotifier, MoneyCents, NotificationSink,
    NotifyError, RecordSplitsCmd, SettlementEvent, SettlementEventKind, SettlementStatus,
};
use migration::MigratorTrait;

const USERS: [(&str, &str); 4] = [
    ("alice", "Alice"),
    ("bob", "Bob"),
    ("carol", "Carol"),
    ("dave", "Dave"),
];

async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    seed(&db).await;
    db
}

async fn seed(db: &DatabaseConnection) {
    migration::Migrator::up(db, None).await.unwrap();
    let backend = db.get_database_backend();
    for (username, name) in USERS {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password, display_name) VALUES (?, ?, ?)",
            vec![username.into(), "password".into(), name.into()],
        ))
        .await
        .unwrap();
    }
}

/// SQLite file removed (with its journal files) on drop.
struct DbFile(std::path::PathBuf);

impl DbFile {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("splitledger-{}.db", Uuid::new_v4())))
    }

    fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.0.display())
    }
}

impl Drop for DbFile {
    fn drop(&mut self) {
        for suffix in ["", "-journal", "-wal", "-shm"] {
            let mut path = self.0.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Engine over a file database served by a pool of several connections.
async fn pooled_engine(file: &DbFile) -> Arc<Engine> {
    let mut options = ConnectOptions::new(file.url());
    options.max_connections(4).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    seed(&db).await;
    Arc::new(
        Engine::builder()
            .database(db)
            .notifier(Arc::new(InboxNotifier::new()))
            .build()
            .await
            .unwrap(),
    )
}

async fn engine_with_inbox() -> (Engine, Arc<InboxNotifier>, DatabaseConnection) {
    let db = setup_db().await;
    let inbox = Arc::new(InboxNotifier::new());
    let engine = Engine::builder()
        .database(db.clone())
        .notifier(inbox.clone())
        .build()
        .await
        .unwrap();
    (engine, inbox, db)
}

/// Group with alice, bob and carol as active members.
async fn group(engine: &Engine) -> Uuid {
    let group = engine.create_group("Flat", "alice").await.unwrap();
    engine.join_group(group.id, "bob").await.unwrap();
    engine.join_group(group.id, "carol").await.unwrap();
    group.id
}

/// `owed_by` owes `payer` `amount` cents for a fresh expense.
async fn owes(engine: &Engine, group_id: Uuid, owed_by: &str, payer: &str, amount: i64) {
    let cmd = RecordSplitsCmd::new(group_id, Uuid::new_v4().to_string(), payer)
        .share(owed_by, MoneyCents::new(amount));
    engine.record_expense_splits(cmd, payer).await.unwrap();
}

fn request(group_id: Uuid, from: &str, to: &str, amount: i64, by: &str) -> CreateSettlementCmd {
    CreateSettlementCmd::new(group_id, from, to, MoneyCents::new(amount), by)
}

async fn edge(engine: &Engine, group_id: Uuid, from: &str, to: &str) -> Option<i64> {
    let sheet = engine.group_balances(group_id, "alice").await.unwrap();
    sheet
        .edges
        .iter()
        .find(|e| e.from_id == from && e.to_id == to)
        .map(|e| e.amount.cents())
}

async fn paid_amounts(db: &DatabaseConnection, settlement_id: Uuid) -> Vec<i64> {
    let rows = db
        .query_all(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT amount_minor FROM splits WHERE settlement_id = ? AND is_paid = 1 ORDER BY amount_minor",
            vec![settlement_id.to_string().into()],
        ))
        .await
        .unwrap();
    rows.iter()
        .map(|row| row.try_get::<i64>("", "amount_minor").unwrap())
        .collect()
}

#[tokio::test]
async fn request_then_confirm_pays_off_the_pair() {
    let (engine, inbox, db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 300).await;

    let settlement = engine
        .create_settlement(request(group_id, "alice", "bob", 300, "alice").note(" rent "))
        .await
        .unwrap();
    assert_eq!(settlement.status, SettlementStatus::Pending);
    assert_eq!(settlement.note.as_deref(), Some("rent"));
    // Nothing is paid until confirmation.
    assert_eq!(edge(&engine, group_id, "alice", "bob").await, Some(300));

    let confirmed = engine
        .confirm_settlement(group_id, settlement.id, "bob")
        .await
        .unwrap();
    assert_eq!(confirmed.status, SettlementStatus::Confirmed);
    assert!(confirmed.confirmed_at.is_some());
    assert!(confirmed.settled_at.is_some());
    assert_eq!(confirmed.version, settlement.version + 1);

    assert_eq!(edge(&engine, group_id, "alice", "bob").await, None);
    assert_eq!(paid_amounts(&db, settlement.id).await, vec![300]);

    let view = engine.settlements_view(group_id, "alice").await.unwrap();
    assert!(view.pending_settlements.is_empty());
    assert_eq!(view.history.len(), 1);
    assert!(view.net_balance.is_zero());

    let bob_events = inbox.drain("bob");
    assert_eq!(bob_events.len(), 1);
    assert_eq!(bob_events[0].kind, SettlementEventKind::SettlementRequested);
    let alice_events = inbox.drain("alice");
    assert_eq!(alice_events.len(), 1);
    assert_eq!(alice_events[0].kind, SettlementEventKind::SettlementConfirmed);
    assert_eq!(
        alice_events[0].message(),
        "Bob confirmed receiving your payment of 3.00"
    );
}

#[tokio::test]
async fn confirming_twice_is_a_no_op() {
    let (engine, inbox, db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 200).await;
    owes(&engine, group_id, "alice", "bob", 200).await;

    let settlement = engine
        .create_settlement(request(group_id, "alice", "bob", 200, "alice"))
        .await
        .unwrap();
    let first = engine
        .confirm_settlement(group_id, settlement.id, "bob")
        .await
        .unwrap();
    let second = engine
        .confirm_settlement(group_id, settlement.id, "bob")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(edge(&engine, group_id, "alice", "bob").await, Some(200));
    assert_eq!(paid_amounts(&db, settlement.id).await, vec![200]);
    // Only the first confirmation notifies.
    assert_eq!(inbox.drain("alice").len(), 1);
}

#[tokio::test]
async fn confirm_touches_only_the_settled_pair() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 300).await;
    owes(&engine, group_id, "bob", "alice", 120).await;
    owes(&engine, group_id, "carol", "bob", 80).await;
    owes(&engine, group_id, "alice", "carol", 50).await;

    let settlement = engine
        .create_settlement(request(group_id, "alice", "bob", 300, "bob"))
        .await
        .unwrap();
    engine
        .confirm_settlement(group_id, settlement.id, "bob")
        .await
        .unwrap();

    assert_eq!(edge(&engine, group_id, "alice", "bob").await, None);
    assert_eq!(edge(&engine, group_id, "bob", "alice").await, Some(120));
    assert_eq!(edge(&engine, group_id, "carol", "bob").await, Some(80));
    assert_eq!(edge(&engine, group_id, "alice", "carol").await, Some(50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_the_same_pair_leave_one_pending() {
    let file = DbFile::new();
    let engine = pooled_engine(&file).await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 800).await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            let by = if i % 2 == 0 { "alice" } else { "bob" };
            tokio::spawn(async move {
                engine
                    .create_settlement(request(group_id, "alice", "bob", 100, by))
                    .await
            })
        })
        .collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(
                r,
                Err(EngineError::DuplicatePendingSettlement { from_user_id, to_user_id })
                    if from_user_id == "alice" && to_user_id == "bob"
            ))
            .count(),
        7
    );

    let view = engine.settlements_view(group_id, "alice").await.unwrap();
    assert_eq!(view.pending_settlements.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirm_and_reject_settle_on_one_outcome() {
    let file = DbFile::new();
    let engine = pooled_engine(&file).await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 500).await;
    let settlement = engine
        .create_settlement(request(group_id, "alice", "bob", 500, "alice"))
        .await
        .unwrap();
    let settlement_id = settlement.id;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    engine.confirm_settlement(group_id, settlement_id, "bob").await
                } else {
                    engine.reject_settlement(group_id, settlement_id, "bob").await
                }
            })
        })
        .collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    let stored = engine
        .get_settlement(group_id, settlement_id, "alice")
        .await
        .unwrap();
    assert_ne!(stored.status, SettlementStatus::Pending);
    for result in &results {
        match result {
            Ok(finished) => assert_eq!(finished.status, stored.status),
            Err(err) => assert!(
                matches!(err, EngineError::InvalidStateTransition { .. }),
                "unexpected error: {err:?}"
            ),
        }
    }

    let expected_debt = match stored.status {
        SettlementStatus::Confirmed => None,
        _ => Some(500),
    };
    assert_eq!(edge(&engine, group_id, "alice", "bob").await, expected_debt);
}

#[tokio::test]
async fn splits_beyond_the_representable_total_are_rejected() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    let half = i64::MAX / 2 + 1;
    owes(&engine, group_id, "bob", "alice", half).await;

    let same_pair = RecordSplitsCmd::new(group_id, "second", "alice")
        .share("bob", MoneyCents::new(half));
    assert!(matches!(
        engine.record_expense_splits(same_pair, "alice").await,
        Err(EngineError::Validation(_))
    ));
    let other_pair = RecordSplitsCmd::new(group_id, "third", "carol")
        .share("alice", MoneyCents::new(half));
    assert!(matches!(
        engine.record_expense_splits(other_pair, "carol").await,
        Err(EngineError::Validation(_))
    ));

    let view = engine.settlements_view(group_id, "bob").await.unwrap();
    assert_eq!(view.net_balance, MoneyCents::new(-half));
    assert_eq!(edge(&engine, group_id, "bob", "alice").await, Some(half));
    assert_eq!(edge(&engine, group_id, "alice", "carol").await, None);
}

#[tokio::test]
async fn balances_for_user_lists_direct_debts_and_net() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "bob", "alice", 300).await;
    owes(&engine, group_id, "bob", "alice", 200).await;
    owes(&engine, group_id, "alice", "carol", 150).await;
    owes(&engine, group_id, "carol", "bob", 40).await;

    let sheet = engine.group_balances(group_id, "alice").await.unwrap();
    let bob_to_alice = sheet
        .edges
        .iter()
        .find(|e| e.from_id == "bob" && e.to_id == "alice")
        .unwrap();

    let alice = engine.balances_for_user(group_id, "alice").await.unwrap();
    assert_eq!(alice.owed.len(), 1);
    assert_eq!(alice.owed[0].counterparty_id, "bob");
    assert_eq!(alice.owed[0].amount, MoneyCents::new(500));
    assert_eq!(alice.owed[0].split_ids, bob_to_alice.split_ids);
    assert_eq!(alice.owed[0].split_ids.len(), 2);
    assert_eq!(alice.owes.len(), 1);
    assert_eq!(alice.owes[0].counterparty_id, "carol");
    assert_eq!(alice.owes[0].amount, MoneyCents::new(150));
    assert_eq!(alice.net, MoneyCents::new(350));

    let bob = engine.balances_for_user(group_id, "bob").await.unwrap();
    assert_eq!(bob.net, MoneyCents::new(-460));
    assert_eq!(bob.owed[0].counterparty_id, "carol");

    assert!(matches!(
        engine.balances_for_user(group_id, "dave").await,
        Err(EngineError::NotAMember { .. })
    ));
}

#[tokio::test]
async fn pending_guard_is_per_ordered_pair() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 500).await;
    owes(&engine, group_id, "bob", "alice", 100).await;

    engine
        .create_settlement(request(group_id, "alice", "bob", 200, "alice"))
        .await
        .unwrap();
    engine
        .create_settlement(request(group_id, "bob", "alice", 100, "bob"))
        .await
        .unwrap();

    let err = engine
        .create_settlement(request(group_id, "alice", "bob", 100, "alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicatePendingSettlement { .. }));
}

#[tokio::test]
async fn a_new_request_is_allowed_once_the_previous_one_is_finished() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 500).await;

    let first = engine
        .create_settlement(request(group_id, "alice", "bob", 200, "alice"))
        .await
        .unwrap();
    engine
        .reject_settlement(group_id, first.id, "bob")
        .await
        .unwrap();

    let second = engine
        .create_settlement(request(group_id, "alice", "bob", 200, "alice"))
        .await
        .unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn partial_settlement_reduces_the_split() {
    let (engine, _inbox, db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 500).await;

    let settlement = engine
        .create_settlement(request(group_id, "alice", "bob", 200, "alice"))
        .await
        .unwrap();
    engine
        .confirm_settlement(group_id, settlement.id, "bob")
        .await
        .unwrap();

    let sheet = engine.group_balances(group_id, "alice").await.unwrap();
    let remaining = sheet
        .edges
        .iter()
        .find(|e| e.from_id == "alice" && e.to_id == "bob")
        .unwrap();
    assert_eq!(remaining.amount, MoneyCents::new(300));
    assert_eq!(remaining.split_ids.len(), 1);
    assert_eq!(paid_amounts(&db, settlement.id).await, vec![200]);
}

#[tokio::test]
async fn settlement_consumes_oldest_splits_first() {
    let (engine, _inbox, db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    let start = Utc::now() - Duration::hours(2);
    for (offset, amount) in [(0, 100), (1, 250), (2, 400)] {
        let cmd = RecordSplitsCmd::new(group_id, format!("expense-{offset}"), "bob")
            .share("alice", MoneyCents::new(amount))
            .created_at(start + Duration::minutes(offset));
        engine.record_expense_splits(cmd, "bob").await.unwrap();
    }

    let settlement = engine
        .create_settlement(request(group_id, "alice", "bob", 450, "alice"))
        .await
        .unwrap();
    engine
        .confirm_settlement(group_id, settlement.id, "bob")
        .await
        .unwrap();

    // 100 and 250 fully paid, 100 taken from the 400 split.
    assert_eq!(paid_amounts(&db, settlement.id).await, vec![100, 100, 250]);
    assert_eq!(edge(&engine, group_id, "alice", "bob").await, Some(300));
}

#[tokio::test]
async fn rejection_leaves_splits_untouched() {
    let (engine, inbox, db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 500).await;
    owes(&engine, group_id, "carol", "bob", 70).await;
    let before = engine.group_balances(group_id, "alice").await.unwrap();

    let settlement = engine
        .create_settlement(request(group_id, "alice", "bob", 400, "alice"))
        .await
        .unwrap();
    let rejected = engine
        .reject_settlement(group_id, settlement.id, "bob")
        .await
        .unwrap();
    assert_eq!(rejected.status, SettlementStatus::Rejected);
    assert!(rejected.rejected_at.is_some());
    assert!(rejected.confirmed_at.is_none());

    let after = engine.group_balances(group_id, "alice").await.unwrap();
    assert_eq!(before, after);
    assert!(paid_amounts(&db, settlement.id).await.is_empty());

    let alice_events = inbox.drain("alice");
    assert_eq!(
        alice_events.last().map(|e| e.kind),
        Some(SettlementEventKind::SettlementRejected)
    );
}

#[tokio::test]
async fn terminal_settlements_cannot_change_state() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 500).await;

    let rejected = engine
        .create_settlement(request(group_id, "alice", "bob", 100, "alice"))
        .await
        .unwrap();
    engine
        .reject_settlement(group_id, rejected.id, "bob")
        .await
        .unwrap();
    let err = engine
        .confirm_settlement(group_id, rejected.id, "bob")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidStateTransition {
            settlement_id: rejected.id,
            status: SettlementStatus::Rejected,
        }
    );

    let confirmed = engine
        .create_settlement(request(group_id, "alice", "bob", 100, "alice"))
        .await
        .unwrap();
    engine
        .confirm_settlement(group_id, confirmed.id, "bob")
        .await
        .unwrap();
    let err = engine
        .reject_settlement(group_id, confirmed.id, "bob")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidStateTransition {
            status: SettlementStatus::Confirmed,
            ..
        }
    ));
}

#[tokio::test]
async fn only_the_receiver_can_confirm_or_reject() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 500).await;
    let settlement = engine
        .create_settlement(request(group_id, "alice", "bob", 100, "alice"))
        .await
        .unwrap();

    for user in ["alice", "carol"] {
        assert!(matches!(
            engine.confirm_settlement(group_id, settlement.id, user).await,
            Err(EngineError::Forbidden(_))
        ));
        assert!(matches!(
            engine.reject_settlement(group_id, settlement.id, user).await,
            Err(EngineError::Forbidden(_))
        ));
    }

    let other_group = engine.create_group("Other", "bob").await.unwrap();
    assert!(matches!(
        engine
            .confirm_settlement(other_group.id, settlement.id, "bob")
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn create_validates_input_and_standing() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 500).await;

    assert!(matches!(
        engine
            .create_settlement(request(group_id, "alice", "bob", 0, "alice"))
            .await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine
            .create_settlement(request(group_id, "alice", "alice", 100, "alice"))
            .await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine
            .create_settlement(request(group_id, "alice", "bob", 100, "carol"))
            .await,
        Err(EngineError::Forbidden(_))
    ));
    assert_eq!(
        engine
            .create_settlement(request(group_id, "dave", "bob", 100, "dave"))
            .await
            .unwrap_err(),
        EngineError::NotAMember {
            group_id,
            user_id: "dave".to_string(),
        }
    );
    assert!(matches!(
        engine
            .create_settlement(request(group_id, "alice", "dave", 100, "alice"))
            .await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn create_checks_direct_debt_coverage() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 150).await;
    owes(&engine, group_id, "alice", "bob", 100).await;

    assert_eq!(
        engine
            .create_settlement(request(group_id, "bob", "alice", 10, "bob"))
            .await
            .unwrap_err(),
        EngineError::NoDebtFound {
            debtor_id: "bob".to_string(),
            creditor_id: "alice".to_string(),
        }
    );
    assert_eq!(
        engine
            .create_settlement(request(group_id, "alice", "bob", 251, "alice"))
            .await
            .unwrap_err(),
        EngineError::AmountExceedsDebt {
            requested: MoneyCents::new(251),
            available: MoneyCents::new(250),
        }
    );
    engine
        .create_settlement(request(group_id, "alice", "bob", 250, "alice"))
        .await
        .unwrap();
}

#[tokio::test]
async fn idempotency_key_returns_the_original_request() {
    let (engine, inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 500).await;

    let first = engine
        .create_settlement(request(group_id, "alice", "bob", 200, "alice").idempotency_key("k-1"))
        .await
        .unwrap();
    let retry = engine
        .create_settlement(request(group_id, "alice", "bob", 200, "alice").idempotency_key("k-1"))
        .await
        .unwrap();

    assert_eq!(first.id, retry.id);
    assert_eq!(retry.idempotency_key.as_deref(), Some("k-1"));
    assert_eq!(inbox.drain("bob").len(), 1);
    let view = engine.settlements_view(group_id, "bob").await.unwrap();
    assert_eq!(view.pending_settlements.len(), 1);
}

#[tokio::test]
async fn request_notifies_the_party_that_did_not_initiate() {
    let (engine, inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 500).await;
    owes(&engine, group_id, "carol", "alice", 80).await;

    // creditor asks the debtor
    engine
        .create_settlement(request(group_id, "alice", "bob", 100, "bob"))
        .await
        .unwrap();
    // debtor offers to pay
    engine
        .create_settlement(request(group_id, "carol", "alice", 80, "carol"))
        .await
        .unwrap();

    let alice = inbox.drain("alice");
    assert_eq!(alice.len(), 2);
    assert_eq!(alice[0].actor_id, "bob");
    assert_eq!(alice[0].message(), "Bob asks you to settle a debt of 1.00");
    assert_eq!(alice[1].actor_id, "carol");
    assert_eq!(
        alice[1].message(),
        "Carol wants to settle a debt of 0.80 with you"
    );
    assert!(inbox.drain("bob").is_empty());
    assert!(inbox.drain("carol").is_empty());
}

#[tokio::test]
async fn triangle_suggestion_is_advisory_only() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    // a owes b 300, b owes c 300, c owes a 100
    owes(&engine, group_id, "alice", "bob", 300).await;
    owes(&engine, group_id, "bob", "carol", 300).await;
    owes(&engine, group_id, "carol", "alice", 100).await;

    let sheet = engine.group_balances(group_id, "alice").await.unwrap();
    assert_eq!(sheet.net_of("alice"), MoneyCents::new(-200));
    assert_eq!(sheet.net_of("bob"), MoneyCents::ZERO);
    assert_eq!(sheet.net_of("carol"), MoneyCents::new(200));

    let suggestions = engine.suggested_transfers(group_id, "bob").await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].from_id, "alice");
    assert_eq!(suggestions[0].to_id, "carol");
    assert_eq!(suggestions[0].amount, MoneyCents::new(200));

    // alice has no direct debt towards carol: the simplified figure cannot be settled.
    assert_eq!(
        engine
            .create_settlement(request(group_id, "alice", "carol", 200, "alice"))
            .await
            .unwrap_err(),
        EngineError::NoDebtFound {
            debtor_id: "alice".to_string(),
            creditor_id: "carol".to_string(),
        }
    );
    // The direct edges can.
    engine
        .create_settlement(request(group_id, "alice", "bob", 300, "alice"))
        .await
        .unwrap();
    engine
        .create_settlement(request(group_id, "carol", "alice", 100, "carol"))
        .await
        .unwrap();
}

#[tokio::test]
async fn settlements_view_lists_debts_with_names() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 300).await;
    owes(&engine, group_id, "carol", "alice", 120).await;
    engine
        .create_settlement(request(group_id, "alice", "bob", 100, "alice"))
        .await
        .unwrap();

    let view = engine.settlements_view(group_id, "alice").await.unwrap();
    assert_eq!(view.you_owe.len(), 1);
    assert_eq!(view.you_owe[0].counterparty_name, "Bob");
    assert_eq!(view.you_owe[0].amount, MoneyCents::new(300));
    assert_eq!(view.owes_you.len(), 1);
    assert_eq!(view.owes_you[0].counterparty_name, "Carol");
    assert_eq!(view.net_balance, MoneyCents::new(-180));
    assert_eq!(view.balances.len(), 3);
    assert_eq!(view.pending_settlements.len(), 1);
    assert!(view.history.is_empty());

    assert!(matches!(
        engine.settlements_view(group_id, "dave").await,
        Err(EngineError::Forbidden(_))
    ));
}

#[tokio::test]
async fn departed_member_keeps_history_but_leaves_summaries() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;
    owes(&engine, group_id, "carol", "alice", 120).await;
    engine.leave_group(group_id, "carol").await.unwrap();

    let view = engine.settlements_view(group_id, "alice").await.unwrap();
    assert_eq!(view.owes_you.len(), 1);
    assert!(view.balances.iter().all(|b| b.member_id != "carol"));

    assert!(matches!(
        engine
            .create_settlement(request(group_id, "carol", "alice", 120, "alice"))
            .await,
        Err(EngineError::Validation(_))
    ));

    engine.join_group(group_id, "carol").await.unwrap();
    engine
        .create_settlement(request(group_id, "carol", "alice", 120, "alice"))
        .await
        .unwrap();
}

#[tokio::test]
async fn record_splits_skips_payer_share_and_checks_members() {
    let (engine, _inbox, _db) = engine_with_inbox().await;
    let group_id = group(&engine).await;

    let splits = engine
        .record_expense_splits(
            RecordSplitsCmd::new(group_id, "groceries", "alice")
                .share("alice", MoneyCents::new(100))
                .share("bob", MoneyCents::new(100))
                .share("carol", MoneyCents::new(100)),
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(splits.len(), 2);
    assert!(splits.iter().all(|s| s.payer_id == "alice" && !s.is_paid));

    assert!(matches!(
        engine
            .record_expense_splits(
                RecordSplitsCmd::new(group_id, "taxi", "alice").share("dave", MoneyCents::new(10)),
                "alice",
            )
            .await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine
            .record_expense_splits(
                RecordSplitsCmd::new(group_id, "taxi", "alice").share("bob", MoneyCents::new(-10)),
                "alice",
            )
            .await,
        Err(EngineError::Validation(_))
    ));
    // Nothing from the failed commands was stored.
    assert_eq!(edge(&engine, group_id, "bob", "alice").await, Some(100));
}

#[derive(Debug)]
struct BrokenSink;

impl NotificationSink for BrokenSink {
    fn emit(&self, _event: SettlementEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable("offline".to_string()))
    }
}

#[tokio::test]
async fn failing_notifier_does_not_undo_the_ledger() {
    let db = setup_db().await;
    let engine = Engine::builder()
        .database(db.clone())
        .notifier(Arc::new(BrokenSink))
        .build()
        .await
        .unwrap();
    let group_id = group(&engine).await;
    owes(&engine, group_id, "alice", "bob", 100).await;

    let settlement = engine
        .create_settlement(request(group_id, "alice", "bob", 100, "alice"))
        .await
        .unwrap();
    let confirmed = engine
        .confirm_settlement(group_id, settlement.id, "bob")
        .await
        .unwrap();

    assert_eq!(confirmed.status, SettlementStatus::Confirmed);
    assert_eq!(edge(&engine, group_id, "alice", "bob").await, None);
}
