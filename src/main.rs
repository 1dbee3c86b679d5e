use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vote_web3::ballot::BallotClient;
use vote_web3::config::AppConfig;
use vote_web3::format::format_address_default;
use vote_web3::network::NetworkRegistry;
use vote_web3::payment::{PaymentClient, PaymentToken};
use vote_web3::provider::HttpProvider;
use vote_web3::session::SessionManager;
use vote_web3::types::Address;

#[derive(Parser)]
#[command(author, version, about = "Ballot and payment client for the vote-web3 contracts")]
struct Cli {
    #[arg(short, long, global = true, default_value = "config/vote-web3.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    GenerateConfig,
    /// List the known networks
    Networks,
    /// Connect and print the wallet session
    Status,
    /// Print every proposal with its vote count
    Proposals,
    /// Print the voter record of an account (defaults to the connected one)
    Voter {
        #[arg(long)]
        account: Option<Address>,
    },
    /// Vote for the proposal at `index`
    Vote { index: usize },
    /// Print the current winning proposal
    Winner,
    /// Pay `amount` to the payment contract
    Pay {
        amount: String,
        #[arg(long, default_value = "ETH")]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::GenerateConfig => generate_config(&cli.config)?,
        Commands::Networks => list_networks(&AppConfig::load_or_init(&cli.config)?),
        Commands::Status => status(&cli.config).await?,
        Commands::Proposals => proposals(&cli.config).await?,
        Commands::Voter { account } => voter(&cli.config, account).await?,
        Commands::Vote { index } => vote(&cli.config, index).await?,
        Commands::Winner => winner(&cli.config).await?,
        Commands::Pay { amount, token } => pay(&cli.config, &amount, &token).await?,
    }

    Ok(())
}

fn generate_config(path: &Path) -> Result<()> {
    AppConfig::default().save(path)?;
    info!(?path, "wrote default configuration");
    Ok(())
}

fn list_networks(config: &AppConfig) {
    for network in config.registry().iter() {
        let testnet = if NetworkRegistry::is_testnet(network.chain_id) {
            " testnet"
        } else {
            ""
        };
        let support = if network.supported { "supported" } else { "unsupported" };
        println!(
            "{:>10}  {:<20} {}{}  {}",
            network.chain_id, network.name, support, testnet, network.rpc_url
        );
    }
}

async fn connect(config: &AppConfig) -> Result<SessionManager> {
    let provider = HttpProvider::from_endpoint(
        &config.provider.rpc_url,
        config.provider.auth_token.clone(),
        config.provider.request_timeout(),
    )?;
    let mut session = SessionManager::new(Some(Arc::new(provider)), config.registry());
    session
        .connect(config.session.required_chain_id)
        .await
        .context("unable to connect wallet")?;
    Ok(session)
}

async fn ballot_client(config: &AppConfig, session: &SessionManager) -> Result<BallotClient> {
    let mut ballot = BallotClient::new(config.ballot_address()?)?
        .with_poll_interval(config.session.confirmation_poll_interval());
    ballot
        .refresh(session)
        .await
        .context("unable to load ballot data")?;
    Ok(ballot)
}

async fn status(config_path: &Path) -> Result<()> {
    let config = AppConfig::load_or_init(config_path)?;
    let session = connect(&config).await?;
    let state = session.session();
    let account = state.account.map(|account| account.to_string()).unwrap_or_default();
    println!("account: {}", format_address_default(&account));
    println!("balance: {} ETH", state.balance.as_deref().unwrap_or("0.0"));
    if let Some(network) = &state.network {
        let support = if network.is_supported { "" } else { " (unsupported)" };
        println!("network: {} [{}]{}", network.name, network.chain_id, support);
    }
    Ok(())
}

async fn proposals(config_path: &Path) -> Result<()> {
    let config = AppConfig::load_or_init(config_path)?;
    let session = connect(&config).await?;
    let ballot = ballot_client(&config, &session).await?;
    for proposal in ballot.proposals() {
        println!(
            "{:>3}  {:<32} {}",
            proposal.index, proposal.name, proposal.vote_count
        );
    }
    Ok(())
}

async fn voter(config_path: &Path, account: Option<Address>) -> Result<()> {
    let config = AppConfig::load_or_init(config_path)?;
    let session = connect(&config).await?;
    let account = match account {
        Some(account) => account,
        None => session.require_account()?,
    };
    let mut ballot = BallotClient::new(config.ballot_address()?)?;
    let record = ballot.load_voter_record(&session, account).await?;
    if record.voted {
        println!("{account} voted for proposal {}", record.choice_index);
    } else {
        println!("{account} has not voted");
    }
    Ok(())
}

async fn vote(config_path: &Path, index: usize) -> Result<()> {
    let config = AppConfig::load_or_init(config_path)?;
    let session = connect(&config).await?;
    let mut ballot = ballot_client(&config, &session).await?;
    let receipt = ballot.vote(&session, index).await?;
    println!("vote confirmed in {}", receipt.transaction_hash);
    if let Some(proposal) = ballot.proposals().get(index) {
        println!("{} now has {} votes", proposal.name, proposal.vote_count);
    }
    Ok(())
}

async fn winner(config_path: &Path) -> Result<()> {
    let config = AppConfig::load_or_init(config_path)?;
    let session = connect(&config).await?;
    let ballot = BallotClient::new(config.ballot_address()?)?;
    let index = ballot.winning_proposal(&session).await?;
    let name = ballot.winner_name(&session).await?;
    println!("winning proposal {index}: {name}");
    Ok(())
}

async fn pay(config_path: &Path, amount: &str, symbol: &str) -> Result<()> {
    let config = AppConfig::load_or_init(config_path)?;
    let token =
        PaymentToken::by_symbol(symbol).ok_or_else(|| anyhow!("unknown token `{symbol}`"))?;
    let mut session = connect(&config).await?;
    let client = PaymentClient::new(config.payment_address()?)?
        .with_memo(config.session.payment_memo.clone())
        .with_poll_interval(config.session.confirmation_poll_interval());
    let receipt = client.pay(&session, amount, &token).await?;
    let balance = session.refresh_balance().await?;
    println!("paid {amount} {} in {}", token.symbol, receipt.transaction_hash);
    println!("balance: {balance} ETH");
    Ok(())
}
