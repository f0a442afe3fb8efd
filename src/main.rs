use std::{
    path::PathBuf,
    process::ExitCode,
};

use clap::{
    Parser,
    Subcommand,
};
use tracing_subscriber::EnvFilter;

use shielded_vault::{
    ledger::devnet::DevLedger,
    ports::ledger::LedgerError,
    setup::{
        artefacts::ArtefactPaths,
        network::{
            EnvConfig,
            Network,
        },
        pipeline,
    },
};

#[derive(Parser)]
#[command(name = "shielded-vault")]
#[command(about = "Deploy pipeline for the shielded vault", long_about = None)]
struct Cli {
    /// Repository root holding contracts/, generated/ and deployed/.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile circuits and contracts, deploy and initialize the app, and
    /// export the frontend bundle for the given network.
    Create {
        /// mainnet, testnet or devnet
        network: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Create { network } => {
            let network: Network = match network.parse() {
                Ok(network) => network,
                Err(message) => {
                    eprintln!("{message}");
                    return ExitCode::FAILURE;
                }
            };
            match create(network, &cli.root).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(error) => {
                    tracing::error!(%error, "setup failed");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn create(network: Network, root: &PathBuf) -> Result<(), pipeline::SetupError> {
    let paths = ArtefactPaths::new(root);

    match network {
        Network::DevNet => {
            // the in-process devnet ledger; its genesis account stands in
            // for the key-management daemon's default wallet
            let ledger = DevLedger::new();
            let deployer = ledger.default_account();
            let record = pipeline::create_app(&ledger, &deployer, network, &paths).await?;
            tracing::info!(app_id = record.id, "devnet deployment complete");
            Ok(())
        }
        Network::MainNet | Network::TestNet => {
            // remote networks need the env file and an RPC transport
            let env_path = root.join(format!("{network}.env"));
            let env = EnvConfig::load(&env_path)?;
            let algod_path = env.require("ALGOD_PATH")?;
            env.require("DEFAULT_ACCOUNT_ENCRYPTED_PASSPHRASE")?;
            tracing::info!(%network, %algod_path, "loaded network configuration");
            Err(LedgerError::Unavailable(format!(
                "no RPC transport configured for {network}; \
                 wire a ports::ledger::LedgerClient for {algod_path}"
            ))
            .into())
        }
    }
}
