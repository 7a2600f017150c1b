use std::sync::Arc;

use engine::InboxNotifier;
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "splitledger={level},server={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let server = settings.server;
    tracing::info!(database = ?server.database, "starting splitledger");
    let db = parse_database(&server.database).await?;

    let inbox = Arc::new(InboxNotifier::new());
    let engine = engine::Engine::builder()
        .database(db.clone())
        .notifier(inbox.clone())
        .build()
        .await?;

    let state = server::ServerState {
        engine: Arc::new(engine),
        db,
        inbox,
    };
    let addr = format!("{}:{}", server.bind, server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    server::run_with_listener(state, listener).await?;

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
