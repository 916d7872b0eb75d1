//! CLI binary.
//!
//! Two subcommands on one binary, mirroring the upstream protocol's single
//! `main.go` that dispatches to a chain server or a wallet server:
//!
//! - `node chain --miners-address <addr> [--port <p>] [--remote-node <url>]`
//! - `node wallet --node-address <url> [--port <p>]`

mod chain_cmd;
mod wallet_cmd;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "node", about = "Minimal proof-of-work blockchain node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a chain node: HTTP API, miner, peer manager, and consensus loop.
    Chain(ChainArgs),
    /// Run the thin wallet gateway in front of a chain node.
    Wallet(WalletArgs),
}

#[derive(Args, Clone)]
pub struct ChainArgs {
    /// Port to bind this node's HTTP API to.
    #[arg(long, default_value_t = 5000)]
    pub port: u16,
    /// Address credited with mining rewards.
    #[arg(long)]
    pub miners_address: String,
    /// If set, bootstrap this node's state from a running peer instead of
    /// starting fresh with a genesis block.
    #[arg(long)]
    pub remote_node: Option<String>,
}

#[derive(Args, Clone)]
pub struct WalletArgs {
    /// Port to bind the wallet gateway's HTTP API to.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    /// Base URL of the node this gateway proxies to.
    #[arg(long)]
    pub node_address: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "cli=info,ledger=info".to_string()))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chain(args) => chain_cmd::run(args).await,
        Command::Wallet(args) => wallet_cmd::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}
