use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tron_wallet::config::Config;
use tron_wallet::decoration::{DecorationManager, Trc20TransactionDecorator};
use tron_wallet::query::commands::{
    TransactionQuery, cmd_balances, cmd_status, cmd_transaction, cmd_transactions,
};
use tron_wallet::query::formatters::OutputFormat;
use tron_wallet::repository::{
    BalanceRepository, Database, SyncStateRepository, TransactionRepository,
};
use tron_wallet::transaction_manager::TransactionManager;

#[derive(Parser)]
#[command(name = "query")]
#[command(about = "Query the locally synced wallet data", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Transactions {
        /// Comma separated OR-group; repeat to AND several groups
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        from_hash: Option<String>,

        #[arg(long, default_value = "100")]
        limit: usize,
    },
    Transaction {
        hash: String,
    },
    Balances,
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format.as_str());

    let config = Config::from_env()?;
    let user_address = config.watch_address;

    let db = Arc::new(Database::new(&config.database_url)?);

    match cli.command {
        Commands::Transactions {
            tags,
            from_hash,
            limit,
        } => {
            let manager = transaction_manager(&db, &config);
            let query = TransactionQuery {
                tags,
                from_hash,
                limit: Some(limit),
            };
            cmd_transactions(&manager, &user_address, query, &format)?;
        }
        Commands::Transaction { hash } => {
            let manager = transaction_manager(&db, &config);
            cmd_transaction(&manager, &user_address, &hash, &format)?;
        }
        Commands::Balances => {
            let conn = db.conn()?;
            cmd_balances(
                &BalanceRepository::new(&conn),
                &TransactionRepository::new(&conn),
                &format,
            )?;
        }
        Commands::Status => {
            let conn = db.conn()?;
            cmd_status(
                &SyncStateRepository::new(&conn),
                &TransactionRepository::new(&conn),
                &format,
            )?;
        }
    }

    Ok(())
}

fn transaction_manager(db: &Arc<Database>, config: &Config) -> TransactionManager {
    let mut decoration_manager = DecorationManager::new(config.watch_address);
    decoration_manager.add_decorator(Box::new(Trc20TransactionDecorator::new(
        config.watch_address,
        config.network,
    )));
    TransactionManager::new(db.clone(), decoration_manager)
}
