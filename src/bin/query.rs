use anyhow::Result;
use clap::{Parser, Subcommand};
use token_price_indexer::config::Config;
use token_price_indexer::query::commands::{PageQuery, cmd_price, cmd_prices, cmd_stats, cmd_tokens};
use token_price_indexer::query::formatters::OutputFormat;
use token_price_indexer::repository::{Database, PriceRepository, TokenRepository};

#[derive(Parser)]
#[command(name = "query")]
#[command(about = "Query cached token prices", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price of one token
    Price {
        #[arg(long)]
        chain: u64,

        address: String,
    },
    /// Cached prices for a network
    Prices {
        #[arg(long)]
        chain: u64,

        #[arg(long, default_value = "100")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Discovered tokens for a network
    Tokens {
        #[arg(long)]
        chain: u64,

        #[arg(long, default_value = "100")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format.as_str());

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url)?;

    let output = db.with_conn(|conn| {
        let price_repo = PriceRepository::new(conn);
        let token_repo = TokenRepository::new(conn);

        match cli.command {
            Commands::Price { chain, address } => cmd_price(&price_repo, chain, &address, &format),
            Commands::Prices {
                chain,
                limit,
                offset,
            } => {
                let query = PageQuery {
                    chain_id: chain,
                    limit,
                    offset,
                };
                cmd_prices(&price_repo, query, &format)
            }
            Commands::Tokens {
                chain,
                limit,
                offset,
            } => {
                let query = PageQuery {
                    chain_id: chain,
                    limit,
                    offset,
                };
                cmd_tokens(&token_repo, query, &format)
            }
            Commands::Stats => cmd_stats(&price_repo, &format),
        }
    })?;

    println!("{output}");

    Ok(())
}
