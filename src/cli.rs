/*
 * Responsibility
 * - コマンドライン (デフォルトは serve、ほかに運用コマンド)
 * - コマンドの出力は stdout、診断は tracing
 */
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::app;
use crate::config::Config;
use crate::repos::{PgMessageRepo, PgRoomRepo, RoomRepo};
use crate::services::auth::AntiForgeryChecker;
use crate::services::auth::token::{AccessTokenClaims, sign_access_token};
use crate::services::moderation::scan_forbidden_words;

#[derive(Parser, Debug)]
#[command(name = "chat-api", version, about = "Membership-based chat API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Print every room with its owner and member count
    RoomList,

    /// Scan all messages for forbidden words
    ScanForbidden {
        /// Word to look for; repeatable. Defaults to FORBIDDEN_WORDS.
        #[arg(long = "word")]
        words: Vec<String>,

        /// Overall deadline for the scan
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },

    /// Mint a local access token and csrf token from the configured secrets
    DevToken {
        #[arg(long)]
        sub: String,

        #[arg(long, default_value = "")]
        email: String,

        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },

    /// Print the version
    Version,
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Command::Serve);
    if command == Command::Version {
        println!("chat-api {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::from_env()?;

    match command {
        Command::Serve => app::run(config).await,
        Command::RoomList => room_list(&config).await,
        Command::ScanForbidden {
            words,
            timeout_secs,
        } => {
            let words = if words.is_empty() {
                config.forbidden_words.clone()
            } else {
                words
            };
            scan_forbidden(&config, &words, Duration::from_secs(timeout_secs)).await
        }
        Command::DevToken {
            sub,
            email,
            ttl_secs,
        } => dev_token(&config, sub, email, ttl_secs),
        Command::Version => Ok(()),
    }
}

async fn room_list(config: &Config) -> Result<()> {
    let pool = app::connect_db(config).await?;
    let rooms = PgRoomRepo::new(pool)
        .list_all()
        .await
        .context("list rooms")?;

    for room in rooms {
        println!(
            "{}\t{}\towner={}\tmembers={}\tprivate={}",
            room.id,
            room.name,
            room.owner_id,
            room.members.len(),
            room.is_private
        );
    }
    Ok(())
}

async fn scan_forbidden(config: &Config, words: &[String], deadline: Duration) -> Result<()> {
    if words.is_empty() {
        anyhow::bail!("no forbidden words given (use --word or FORBIDDEN_WORDS)");
    }

    let pool = app::connect_db(config).await?;
    let findings = scan_forbidden_words(
        Arc::new(PgRoomRepo::new(pool.clone())),
        Arc::new(PgMessageRepo::new(pool)),
        words,
        deadline,
    )
    .await
    .context("forbidden word scan")?;

    for f in &findings {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            f.room_id,
            f.room_name,
            f.message_id,
            f.sender,
            f.words.join(",")
        );
    }
    println!("{} message(s) flagged", findings.len());
    Ok(())
}

fn dev_token(config: &Config, sub: String, email: String, ttl_secs: u64) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let claims = AccessTokenClaims {
        sub,
        email,
        exp: (now.max(0) as u64).saturating_add(ttl_secs),
        iat: Some(now.max(0) as u64),
    };
    let access = sign_access_token(&config.secrets.jwt_secret, &claims)?;
    let csrf = AntiForgeryChecker::new(&config.secrets.csrf_secret, config.csrf_token_ttl_seconds)
        .issue(now);

    println!("access_token={access}");
    println!("csrf_token={csrf}");
    Ok(())
}
