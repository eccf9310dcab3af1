//! Command-line front end over one SQLite-backed ranked list.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use lexorank_core::{
    default_log_level, init_logging, open_db, ListConfig, RankedItem, RebalanceWorker,
    ScopedList, SqliteRankStore, SqliteScheduleStore,
};
use log::error;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep stdout output readable when logs share the terminal.
    let fallback_level = match cli.log_dir {
        Some(_) => default_log_level(),
        None => "warn",
    };
    let level = cli.log_level.as_deref().unwrap_or(fallback_level);
    if let Err(err) = init_logging(level, cli.log_dir.as_deref()) {
        eprintln!("lexorank: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("lexorank: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let conn = open_db(&cli.db)?;
    let store = SqliteRankStore::try_new(&conn)?;
    let schedule = SqliteScheduleStore::try_new(&conn)?;

    let mut config = ListConfig::new(cli.list);
    if cli.scoped {
        config = config.scoped();
    }
    if cli.insert_to_bottom {
        config = config.insert_to_bottom();
    }

    if let Commands::Drain { limit } = cli.command {
        let mut worker = RebalanceWorker::new(store, schedule);
        worker.register(config)?;
        let report = worker.run_pending(limit)?;
        for done in &report.rebalanced {
            println!("rebalanced {} items={}", done.scope, done.items);
        }
        for failure in &report.failed {
            println!("failed {} error={}", failure.scope, failure.error);
        }
        return Ok(());
    }

    let list = ScopedList::new(config, store, schedule)?;
    match cli.command {
        Commands::Insert {
            label,
            scope,
            position,
        } => {
            let item = list.insert(scope.as_deref(), position.map(Into::into), &label)?;
            print_item(&item);
        }
        Commands::List { scope } => {
            for item in list.list(scope.as_deref())? {
                print_item(&item);
            }
        }
        Commands::MoveBefore { item, target } => println!("{}", list.move_before(item, target)?),
        Commands::MoveAfter { item, target } => println!("{}", list.move_after(item, target)?),
        Commands::Top { item } => println!("{}", list.move_to_top(item)?),
        Commands::Bottom { item } => println!("{}", list.move_to_bottom(item)?),
        Commands::Rescope { item, scope } => {
            println!("{}", list.reassign_on_scope_change(item, scope.as_deref())?)
        }
        Commands::Rebalance { scope } => {
            let items = list.rebalance_scope(scope.as_deref())?;
            println!("rebalanced items={items}");
        }
        Commands::Status { scope } => {
            let scope = scope.as_deref();
            println!(
                "rebalancing_required={} rebalancing_scheduled={}",
                list.needs_rebalancing(scope)?,
                list.rebalancing_scheduled(scope)?
            );
        }
        Commands::Drain { .. } => {}
    }
    Ok(())
}

fn print_item(item: &RankedItem) {
    let rank = item.rank.as_ref().map_or("-", |rank| rank.as_str());
    println!("{}\t{}\t{}", rank, item.item_uuid, item.label);
}
