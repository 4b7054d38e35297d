//! Veil CLI - Privacy-preserving compliance screening
//!
//! One-shot access to the compliance service: screening, firewall checks,
//! artifact storage and provenance export over the configured storage.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use veil_core::{AmountKey, BlindIndex, SealedAmount};
use veil_ledger::RefTag;
use veil_service::{
    ComplianceService, FileWatchlist, SecurityContract, ServiceConfig, StaticWatchlist,
    TransactionRecord, WatchlistSource,
};

/// Environment variable holding the hex amount key from the key service
const AMOUNT_KEY_ENV: &str = "VEIL_AMOUNT_KEY";

#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Privacy-preserving compliance screening", long_about = None)]
#[command(version)]
struct Cli {
    /// Security contract (JSON)
    #[arg(long, global = true)]
    contract: Option<PathBuf>,

    /// Watchlist of blind-indexed entries (JSON array)
    #[arg(long, global = true)]
    watchlist: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the blind index of a value under the configured salt
    BlindIndex { value: String },

    /// Screen an entity against the watchlist
    ScreenEntity {
        /// Plaintext name, blind-indexed locally before screening
        #[arg(long, conflicts_with = "index")]
        name: Option<String>,

        /// Precomputed blind index (hex)
        #[arg(long)]
        index: Option<String>,

        #[arg(long, default_value = "cli")]
        agent: String,
    },

    /// Seal an amount into a transaction record
    SealAmount {
        #[arg(long)]
        transaction_id: String,

        /// Amount in minor currency units
        #[arg(long)]
        amount: u64,

        /// Output record path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Screen sealed transaction records against the disclosure threshold
    ScreenAmount {
        /// Transaction record files
        #[arg(required = true)]
        records: Vec<PathBuf>,

        #[arg(long, default_value = "cli")]
        agent: String,
    },

    /// Run messages through a fresh session firewall, in order
    CheckMessage {
        #[arg(long, default_value = "cli-session")]
        session: String,

        #[arg(long, default_value = "cli")]
        agent: String,

        #[arg(required = true)]
        messages: Vec<String>,
    },

    /// Store a JSON artifact and print its reference tag
    CommitArtifact {
        file: PathBuf,

        #[arg(long, default_value = "document")]
        artifact_type: String,

        #[arg(long, default_value = "cli")]
        agent: String,
    },

    /// Print the artifact stored under a reference tag
    RetrieveArtifact {
        /// Tag in `[REF:<hex>]` form
        ref_tag: String,
    },

    /// Export the provenance ledger as JSONL
    ExportProvenance {
        /// Defaults to the configured export path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-derive the provenance hash chain
    VerifyLedger,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "veil_service=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli {
        contract,
        watchlist,
        command,
    } = Cli::parse();
    let config_path = config_path();
    let config = || load_or_create_config(&config_path);
    let open = |config: ServiceConfig| {
        open_service(contract.as_deref(), watchlist.as_deref(), config)
    };

    match command {
        Commands::InitConfig { force } => {
            if config_path.exists() && !force {
                bail!("{} already exists (use --force)", config_path.display());
            }
            ServiceConfig::default().save(&config_path)?;
            println!("Wrote default configuration to {}", config_path.display());
        }

        Commands::BlindIndex { value } => {
            let config = config()?;
            config.validate()?;
            let index = BlindIndex::create(&value, config.blind_index_salt.as_bytes());
            println!("{}", index.to_hex());
        }

        Commands::SealAmount {
            transaction_id,
            amount,
            output,
        } => {
            let key = amount_key()?.context("VEIL_AMOUNT_KEY must be set to seal amounts")?;
            let record = TransactionRecord {
                transaction_id,
                amount: SealedAmount::seal(&key, amount)?,
            };
            std::fs::write(&output, serde_json::to_string_pretty(&record)?)?;
            println!("Sealed record written to {}", output.display());
        }

        Commands::ScreenEntity { name, index, agent } => {
            let service = open(config()?)?;
            let candidate = match (name, index) {
                (Some(name), _) => service.blind_index(&name),
                (None, Some(hex)) => BlindIndex::from_hex(&hex)?,
                (None, None) => bail!("one of --name or --index is required"),
            };
            let outcome = service.screen_entity(&agent, &candidate)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            service.close()?;
        }

        Commands::ScreenAmount { records, agent } => {
            let service = open(config()?)?;
            let records = records
                .iter()
                .map(|path| read_json::<TransactionRecord>(path))
                .collect::<Result<Vec<_>>>()?;

            if records.len() == 1 {
                let outcome = service.screen_transaction(&agent, &records[0])?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                let flags = service.flag_transactions(&agent, &records)?;
                println!("{}", serde_json::to_string_pretty(&flags)?);
            }
            service.close()?;
        }

        Commands::CheckMessage {
            session,
            agent,
            messages,
        } => {
            let service = open(config()?)?;
            service.open_session(&session)?;
            for message in &messages {
                let decision = service.check_message(message, &agent, &session)?;
                println!("{}", serde_json::to_string(&decision)?);
            }
            service.close_session(&session);
            service.close()?;
        }

        Commands::CommitArtifact {
            file,
            artifact_type,
            agent,
        } => {
            let service = open(config()?)?;
            let content: serde_json::Value = read_json(&file)?;
            let tag = service.commit_artifact(&agent, &content, &artifact_type)?;
            println!("{}", tag);
            service.close()?;
        }

        Commands::RetrieveArtifact { ref_tag } => {
            let service = open(config()?)?;
            let content = service.retrieve_artifact(&RefTag::parse(&ref_tag)?)?;
            println!("{}", serde_json::to_string_pretty(&content)?);
            service.close()?;
        }

        Commands::ExportProvenance { output } => {
            let service = open(config()?)?;
            let (path, count) = service.export_provenance(output.as_deref())?;
            println!("Exported {} events to {}", count, path.display());
            service.close()?;
        }

        Commands::VerifyLedger => {
            let service = open(config()?)?;
            let count = service.verify_ledger()?;
            println!("Ledger chain intact ({} events)", count);
            service.close()?;
        }
    }

    Ok(())
}

fn config_path() -> PathBuf {
    std::env::var("VEIL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(unix)]
            let fallback = PathBuf::from("/etc");
            #[cfg(windows)]
            let fallback = PathBuf::from(r"C:\ProgramData");

            dirs::config_dir()
                .unwrap_or(fallback)
                .join("veil")
                .join("config.json")
        })
}

fn load_or_create_config(path: &Path) -> Result<ServiceConfig> {
    if path.exists() {
        return Ok(ServiceConfig::load(path)?);
    }
    let config = ServiceConfig::default();
    config.save(path)?;
    info!("Created default config at {:?}", path);
    Ok(config)
}

fn open_service(
    contract: Option<&Path>,
    watchlist: Option<&Path>,
    config: ServiceConfig,
) -> Result<ComplianceService> {
    let contract_path = contract.context("--contract is required for this command")?;
    let contract_json = std::fs::read_to_string(contract_path)
        .with_context(|| format!("reading contract {}", contract_path.display()))?;
    let contract = SecurityContract::from_json(&contract_json)?;

    let watchlist: Box<dyn WatchlistSource> = match watchlist {
        Some(path) => Box::new(FileWatchlist::new(path)),
        None => Box::new(StaticWatchlist::default()),
    };

    // Commands that never unseal still need a key; a throwaway one will do.
    let key = match amount_key()? {
        Some(key) => key,
        None => AmountKey::generate(&mut rand::thread_rng()),
    };

    Ok(ComplianceService::open(contract, config, watchlist, key)?)
}

fn amount_key() -> Result<Option<AmountKey>> {
    let Ok(hex_key) = std::env::var(AMOUNT_KEY_ENV) else {
        return Ok(None);
    };
    let bytes: [u8; 32] = hex::decode(hex_key.trim())
        .context("VEIL_AMOUNT_KEY is not valid hex")?
        .try_into()
        .map_err(|_| anyhow::anyhow!("VEIL_AMOUNT_KEY must be 32 bytes"))?;
    Ok(Some(AmountKey::from_bytes(bytes)))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}
