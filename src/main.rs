use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use quorum_signer::utils::logging;
use quorum_signer::{
    address_info_from_der, ChainAddress, Config, Pipeline, SessionStage, SigningSession,
};

#[derive(Parser)]
#[command(name = "quorum-signer", version, about = "Sign and send transactions through a custody approval quorum")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive the address for a DER public key (offline)
    DeriveAddress {
        /// Hex DER SubjectPublicKeyInfo
        der_hex: String,
    },
    /// Generate a new key in the vault and print its address
    CreateAddress(Endpoints),
    /// Show the configured vault
    VaultStatus(Endpoints),
    /// Sweep an address to a recipient through quorum signing
    Send {
        #[command(flatten)]
        endpoints: Endpoints,

        /// Recipient address (defaults to QUORUM_RECIPIENT)
        #[arg(long)]
        to: Option<ChainAddress>,

        /// Send from an existing key instead of generating one
        #[arg(long, value_name = "DER_HEX")]
        from_der: Option<String>,

        /// Load and save session progress here so a failed run can resume
        #[arg(long, value_name = "FILE")]
        session: Option<PathBuf>,

        /// Drop the saved transaction and signing round and build a new one,
        /// e.g. after a rejected operation or to change the recipient
        #[arg(long, requires = "session")]
        restart: bool,
    },
}

/// Overrides for the `QUORUM_*` environment settings
#[derive(Args)]
struct Endpoints {
    #[arg(long)]
    custody_url: Option<String>,
    #[arg(long)]
    ledger_url: Option<String>,
    #[arg(long)]
    vault_id: Option<String>,
    #[arg(long)]
    chain_id: Option<u64>,
}

impl Endpoints {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::from_env()?;
        if let Some(url) = &self.custody_url {
            config = config.with_custody_url(url.clone());
        }
        if let Some(url) = &self.ledger_url {
            config = config.with_ledger_url(url.clone());
        }
        if let Some(vault_id) = &self.vault_id {
            config = config.with_vault_id(vault_id.clone());
        }
        if let Some(chain_id) = self.chain_id {
            config = config.with_chain_id(chain_id);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.debug {
        logging::enable_debug();
    }

    match cli.command {
        Command::DeriveAddress { der_hex } => {
            let info = address_info_from_der(&der_hex)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{}", info.address.to_checksum());
            }
        }
        Command::CreateAddress(endpoints) => {
            let pipeline = Pipeline::from_config(endpoints.config()?)?;
            let mut session = SigningSession::new();
            let info = pipeline.create_address(&mut session).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{}", info.address.to_checksum());
            }
        }
        Command::VaultStatus(endpoints) => {
            let pipeline = Pipeline::from_config(endpoints.config()?)?;
            let vault = pipeline.vault_status().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&vault)?);
            } else {
                println!(
                    "{} ({}) active={}",
                    vault.name,
                    vault.id().unwrap_or("unknown id"),
                    vault.is_active
                );
            }
        }
        Command::Send {
            endpoints,
            to,
            from_der,
            session: session_path,
            restart,
        } => {
            let config = endpoints.config()?;
            let Some(to) = to.or(config.recipient) else {
                bail!("a recipient is required (--to or QUORUM_RECIPIENT)");
            };
            let pipeline = Pipeline::from_config(config)?;

            let mut session = match &session_path {
                Some(path) if path.exists() => load_session(path)?,
                _ => SigningSession::new(),
            };
            if restart {
                if session.stage() == SessionStage::Broadcast {
                    bail!(
                        "session was already broadcast as {}; refusing to restart it",
                        session.tx_hash.as_deref().unwrap_or("unknown hash")
                    );
                }
                session.abandon_pending();
            }
            if let Some(der) = from_der {
                if session.address_info.is_none() {
                    session.address_info = Some(address_info_from_der(&der)?);
                }
            }

            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = cancel_tx.send(true);
                }
            });

            let result = pipeline.run(&mut session, to, Some(cancel_rx)).await;

            if let Some(path) = &session_path {
                save_session(path, &session)?;
            }

            let tx_hash = result.with_context(|| {
                format!("send stopped at stage {:?}", session.stage())
            })?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                println!("{}", tx_hash);
            }
        }
    }

    Ok(())
}

fn load_session(path: &Path) -> anyhow::Result<SigningSession> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading session {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing session {}", path.display()))
}

fn save_session(path: &Path, session: &SigningSession) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(session)?;
    std::fs::write(path, json).with_context(|| format!("writing session {}", path.display()))
}
