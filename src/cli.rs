//! Operator CLI: run the bot, or poke the pipeline from the terminal.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::bot::{Bot, TelegramApi};
use crate::checker::Checker;
use crate::config::{self, Config};
use crate::index::CodeIndex;
use crate::ledger::CheckLedger;
use crate::sheets::SheetsSource;
use crate::{Result, bot};

#[derive(Parser, Debug)]
#[command(
    name = "codecheck",
    version,
    about = "Product-code authenticity checker",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file (default: ./codecheck.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug output (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the Telegram bot with long polling.
    Run,

    /// Run the Telegram bot behind a webhook.
    Webhook,

    /// Check codes from the terminal (tallies like any other check).
    Check {
        #[arg(required = true, value_name = "CODE")]
        codes: Vec<String>,
    },

    /// Force a full index reload and print the load report.
    Reload,

    /// Print how many unique codes are indexed.
    Stats,
}

pub fn parse_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::parse_from(args)
}

pub fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Run => {
            config.validate_core()?;
            config.validate_bot()?;
            let bot = build_bot(&config)?;
            bot::run_polling(&bot)
        }
        Commands::Webhook => {
            config.validate_core()?;
            config.validate_webhook()?;
            let bot = build_bot(&config)?;
            bot::run_webhook(&bot, &config.webhook)?;
            Ok(())
        }
        Commands::Check { codes } => {
            config.validate_core()?;
            let checker = build_checker(&config)?;
            let outcomes = checker.check_all(codes);
            println!(
                "{}",
                bot::render::render_outcomes(&outcomes, config.display_offset()?)
            );
            Ok(())
        }
        Commands::Reload => {
            config.validate_core()?;
            let checker = build_checker(&config)?;
            let report = checker.index().load()?;
            println!(
                "reloaded: {} cells, {} unique codes",
                report.cells, report.unique
            );
            Ok(())
        }
        Commands::Stats => {
            config.validate_core()?;
            let checker = build_checker(&config)?;
            println!("{} unique codes indexed", checker.index().unique_len());
            Ok(())
        }
    }
}

fn build_bot(config: &Config) -> Result<Bot> {
    let checker = build_checker(config)?;
    Ok(Bot::new(
        TelegramApi::new(&config.bot.token),
        checker,
        config.bot.clone(),
        config.display_offset()?,
    ))
}

/// Build the core and perform the eager initial load. A failed first load is
/// fatal here: there is no previous snapshot to degrade to.
fn build_checker(config: &Config) -> Result<Checker> {
    let key = config.service_account_key()?;
    let source = SheetsSource::new(
        key,
        config.sheet.spreadsheet_id.clone(),
        config.sheet.name.clone(),
    );
    let index = CodeIndex::new(Box::new(source), config.ttl());
    index.load()?;
    let ledger = CheckLedger::open(&config.store.path)?;
    Ok(Checker::new(index, ledger))
}
