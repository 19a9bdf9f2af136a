//! Create the first administrator account
//!
//! Reads the password twice from standard input. The new account is indexed
//! right away when no server holds the index; otherwise the server's next
//! reindex picks it up.

use anyhow::{bail, Context};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::io::{self, BufRead, Write};

use schoolib_server::{
    config::AppConfig,
    models::Rights,
    repository::Repository,
    search::{mirror_index, SearchIndexes},
    services::auth::hash_password,
};

/// Create an administrator account.
#[derive(Parser)]
#[command(name = "create-superuser")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Login of the new administrator (prompted when omitted)
    #[arg(short, long)]
    login: Option<String>,
}

fn prompt(lines: &mut impl BufRead, label: &str) -> anyhow::Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    if lines.read_line(&mut line)? == 0 {
        bail!("Unexpected end of input");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "schoolib_server=info,create_superuser=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;

    let stdin = io::stdin();
    let mut lines = stdin.lock();

    let login = match cli.login {
        Some(login) => login,
        None => prompt(&mut lines, "Login")?,
    };
    if login.trim().is_empty() {
        bail!("Login cannot be empty");
    }

    let password = prompt(&mut lines, "Password")?;
    let repeated = prompt(&mut lines, "Repeat password")?;
    if password != repeated {
        bail!("Passwords are different");
    }
    if password.len() < 4 {
        bail!("Password must be at least 4 characters");
    }

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let repository = Repository::new(pool);
    if repository.users.login_exists(&login).await? {
        bail!("User with login {} already exists", login);
    }

    let user = repository
        .users
        .create(&login, &hash_password(&password)?, Rights::Admin)
        .await?;
    println!("Superuser {} created (id {})", user.login, user.id);

    match SearchIndexes::open(&config.search) {
        Ok(indexes) => mirror_index(indexes.users.as_ref(), &user).await,
        Err(e) => tracing::warn!(
            error = %e,
            "Search index unavailable (server running?), the account will be indexed on the next reindex"
        ),
    }

    Ok(())
}
