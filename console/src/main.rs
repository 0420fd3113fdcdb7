use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use aml_rule_store::{RuleId, RuleStatus, StoreError};
use anyhow::{bail, Context, Result};
use clap::Parser;
use console::app::{Console, ConsoleConfig};
use console::cli::{
    exit_status, render_rule, render_rules, Cli, Commands, LoginRequired, RuleCommand,
};
use console::effects::TerminalEffects;
use console::local_storage::LocalStorage;
use console::refresh::{shutdown_on, RefreshScheduler, RefreshService, SchedulerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The login hint has already been printed.
            if !e.is::<LoginRequired>() {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.console_config();

    match cli.command {
        Commands::Login { token } => {
            if token.trim().is_empty() {
                bail!("token must not be empty");
            }
            let storage = LocalStorage::open(config.storage)?;
            storage.set_token(&token)?;
            println!("Token saved.");
        }
        Commands::Logout => {
            let storage = LocalStorage::open(config.storage)?;
            if storage.clear_token()? {
                println!("Token removed.");
            } else {
                println!("No token was stored.");
            }
        }
        Commands::Rules(command) => run_rules(command, config).await?,
    }

    Ok(())
}

async fn run_rules(command: RuleCommand, config: ConsoleConfig) -> Result<()> {
    let effects = Arc::new(TerminalEffects::new());
    let console = Console::open(config, effects.clone()).context("failed to start console")?;

    let result = dispatch(command, &console).await;
    if effects.login_required() {
        if let Err(e) = &result {
            eprintln!("Error: {:#}", e);
        }
        return Err(LoginRequired.into());
    }
    result
}

async fn dispatch(command: RuleCommand, console: &Console) -> Result<()> {
    let store = console.store().clone();

    match command {
        RuleCommand::List { offline: true } => {
            print!("{}", render_rules(&store.rules()));
        }
        RuleCommand::List { offline: false } => {
            if let Err(e) = store.fetch_rules().await {
                if !store.rules().is_empty() {
                    eprintln!("Showing cached rules.");
                    print!("{}", render_rules(&store.rules()));
                }
                bail!(e);
            }
            print!("{}", render_rules(&store.rules()));
        }
        RuleCommand::Show { id } => {
            store.fetch_rules().await?;
            match store.rule(id) {
                Some(rule) => print!("{}", render_rule(&rule)),
                None => bail!("rule {} not found", id),
            }
        }
        RuleCommand::Enable { id } => set_status(console, id, RuleStatus::Enabled).await?,
        RuleCommand::Disable { id } => set_status(console, id, RuleStatus::Disabled).await?,
        RuleCommand::SetStatus { id, status } => set_status(console, id, status).await?,
        RuleCommand::Watch { interval } => {
            let service = Arc::new(RefreshService::new(store.clone()));
            let scheduler = RefreshScheduler::new(
                service,
                SchedulerConfig {
                    refresh_interval: Duration::from_secs(interval.max(1)),
                    enabled: true,
                },
            );
            let shutdown = shutdown_on(tokio::signal::ctrl_c());
            scheduler
                .run(
                    |result| match result {
                        Ok(_) => print!("{}", render_rules(&store.rules())),
                        Err(e) => eprintln!("{}", e),
                    },
                    shutdown,
                )
                .await;
        }
    }

    Ok(())
}

/// Refreshes (the rule must be known locally) and then changes its status.
async fn set_status(console: &Console, id: RuleId, status: RuleStatus) -> Result<()> {
    let store = console.store();
    store.fetch_rules().await?;

    if store.rule(id).map(|r| r.status) == Some(status) {
        println!("Rule {} is already {}.", id, status);
        return Ok(());
    }

    match store.toggle_rule_status(id, status).await {
        Ok(()) => {
            let name = store.rule(id).map(|r| r.name).unwrap_or_default();
            println!("Rule {} ({}) is now {}.", id, name, status);
            Ok(())
        }
        Err(StoreError::RuleNotFound(_)) => bail!("rule {} not found", id),
        Err(e) => Err(e.into()),
    }
}
