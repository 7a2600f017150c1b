use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal::{self, ClearType},
};
use engine::Engine;
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub username: String,
        pub password: String,
        pub display_name: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "splitledger_admin")]
#[command(about = "Admin utilities for splitledger (bootstrap users and groups)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./splitledger.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user; the password is prompted for.
    User(UserCreateArgs),
    #[command(subcommand)]
    Group(GroupCommand),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    /// Name shown to the other members; defaults to the username.
    #[arg(long)]
    display_name: Option<String>,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    /// Create a group owned by an existing user.
    Create {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        name: String,
    },
    /// Add an existing user to a group.
    Join {
        #[arg(long)]
        group: Uuid,
        #[arg(long)]
        username: String,
    },
}

/// Leaves raw mode when dropped, also on early returns.
struct RawMode;

impl RawMode {
    fn enable() -> CliResult<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn say(out: &mut impl Write, text: &str) -> CliResult<()> {
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(text)
    )?;
    out.flush()?;
    Ok(())
}

/// Reads a line without echoing it.
fn read_secret(prompt: &str) -> CliResult<String> {
    let _raw = RawMode::enable()?;
    let mut out = std::io::stderr();
    say(&mut out, prompt)?;

    let mut secret = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Enter => break,
            KeyCode::Char('c') if ctrl => {
                say(&mut out, "\r\n")?;
                return Err("interrupted".into());
            }
            KeyCode::Backspace => {
                secret.pop();
            }
            KeyCode::Char(ch) if !ctrl => secret.push(ch),
            _ => {}
        }
    }
    say(&mut out, "\r\n")?;

    Ok(secret)
}

fn read_new_password() -> CliResult<String> {
    for _ in 0..3 {
        let first = read_secret("Password: ")?;
        if first.is_empty() {
            eprintln!("Password must not be empty.");
            continue;
        }
        if read_secret("Confirm password: ")? == first {
            return Ok(first);
        }
        eprintln!("Passwords do not match. Try again.");
    }

    Err("too many attempts".into())
}

async fn connect_db(database_url: &str) -> CliResult<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn create_user(db: &DatabaseConnection, args: UserCreateArgs) -> CliResult<()> {
    if users::Entity::find_by_id(args.username.clone())
        .one(db)
        .await?
        .is_some()
    {
        return Err(format!("user already exists: {}", args.username).into());
    }

    let password = read_new_password()?;
    let display_name = args
        .display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    users::Entity::insert(users::ActiveModel {
        username: Set(args.username.clone()),
        password: Set(password),
        display_name: Set(display_name),
    })
    .exec(db)
    .await?;

    println!("created user: {}", args.username);
    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let db = connect_db(&cli.database_url).await?;

    match cli.command {
        Command::User(args) => create_user(&db, args).await?,
        Command::Group(command) => {
            let engine = Engine::builder().database(db).build().await?;
            match command {
                GroupCommand::Create { owner, name } => {
                    let group = engine.create_group(&name, &owner).await?;
                    println!("created group: {} ({})", group.name, group.id);
                }
                GroupCommand::Join { group, username } => {
                    let member = engine.join_group(group, &username).await?;
                    println!("{} joined group {group}", member.display_name);
                }
            }
        }
    }

    Ok(())
}
