/*
 * Responsibility
 * - module 配線, tokio runtime, CLI dispatch (ロジックは置かない)
 */
use anyhow::Result;
use clap::Parser;

mod api;
mod app;
mod cli;
mod config;
mod error;
mod middleware;
mod repos;
mod services;
mod state;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    app::init_tracing();
    cli::dispatch(cli::Cli::parse()).await
}
