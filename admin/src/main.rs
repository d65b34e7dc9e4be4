//! Oracle admin CLI
//!
//! Synchronizes oracle program accounts with reference JSON files and runs
//! one-off maintenance commands against them.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use oracle_admin::{
    config::CONFIG_ENV,
    reference::{self, ReferencePublishers},
    Admin, Config, DumpTransport, KeyStore, Network, Reference, ReferencePaths, RpcTransport,
    Synchronizer, Transport,
};
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "oracle-admin", version, about = "Oracle account administration")]
struct Cli {
    /// Config file
    #[arg(long, env = CONFIG_ENV)]
    config: Option<String>,

    /// Override the configured network
    #[arg(long, value_enum)]
    network: Option<Network>,

    /// Write instructions to this file instead of sending transactions
    #[arg(long, global = true)]
    dump: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ReferenceArgs {
    #[arg(long, env = "PRODUCTS")]
    products: PathBuf,

    #[arg(long, env = "PUBLISHERS")]
    publishers: PathBuf,

    #[arg(long, env = "PERMISSIONS")]
    permissions: PathBuf,

    #[arg(long, env = "OVERRIDES")]
    overrides: Option<PathBuf>,

    #[arg(long, env = "AUTHORITY_PERMISSIONS")]
    authority_permissions: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Bring on-chain accounts in line with the reference files
    Sync(ReferenceArgs),

    /// Print the mapping chain with products, prices and publishers
    ListAccounts {
        #[arg(long, env = "PUBLISHERS")]
        publishers: Option<PathBuf>,
    },

    /// Recreate key label links from on-chain state
    RestoreLinks {
        #[arg(long, env = "PRODUCTS")]
        products: PathBuf,
    },

    DeletePrice {
        #[arg(long)]
        product: Pubkey,
        #[arg(long)]
        price: Pubkey,
    },

    DeleteProduct {
        #[arg(long)]
        mapping: Pubkey,
        #[arg(long)]
        product: Pubkey,
    },

    SetMinPublishers {
        #[arg(long)]
        price: Pubkey,
        #[arg(long)]
        value: u8,
    },

    ResizePriceAccount {
        #[arg(long)]
        price: Pubkey,
    },

    /// Write a default config file
    InitConfig {
        #[arg(default_value = oracle_admin::config::DEFAULT_CONFIG_PATH)]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Command::InitConfig { path } = &cli.command {
        return Config::write_default(path);
    }

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(network) = cli.network {
        config.network = network;
    }

    let endpoint = config.rpc_endpoint()?;
    log::info!("Network: {} ({})", config.network, endpoint);
    log::info!("Oracle program: {}", config.program_key);

    let rpc = RpcTransport::new(endpoint, config.commitment_config());
    let keys = KeyStore::new(config.key_dir(), config.generate_keys);

    match &cli.dump {
        Some(path) => {
            let dump = DumpTransport::new(rpc);
            run(&cli.command, &config, &dump, &keys).await?;
            dump.write(path)
                .await
                .context(format!("Failed to write {}", path.display()))?;
        }
        None => run(&cli.command, &config, &rpc, &keys).await?,
    }

    Ok(())
}

async fn run(
    command: &Command,
    config: &Config,
    transport: &dyn Transport,
    keys: &KeyStore,
) -> Result<()> {
    let admin = Admin::new(transport, keys, config.program_key);

    match command {
        Command::Sync(args) => {
            let paths = ReferencePaths {
                products: args.products.clone(),
                publishers: args.publishers.clone(),
                permissions: args.permissions.clone(),
                overrides: args.overrides.clone(),
                authority_permissions: args.authority_permissions.clone(),
            };
            let reference =
                Reference::load(&paths, config.network).context("Invalid reference files")?;

            let synchronizer = Synchronizer::new(
                transport,
                keys,
                config.program_key,
                config.price_account_version.into(),
            );
            let report = synchronizer.sync(&reference).await.context("Sync failed")?;
            log::info!("{:?}", report);
        }
        Command::ListAccounts { publishers } => {
            let publishers = match publishers {
                Some(path) => load_publishers(path)?,
                None => ReferencePublishers::default(),
            };
            print!("{}", admin.list_accounts(&publishers).await?);
        }
        Command::RestoreLinks { products } => {
            let text = std::fs::read_to_string(products)
                .context(format!("Failed to read {}", products.display()))?;
            let products: BTreeMap<_, _> = reference::parse_products(&text, products)?
                .into_iter()
                .map(|product| (product.jump_symbol.clone(), product))
                .collect();
            admin.restore_links(&products).await?;
        }
        Command::DeletePrice { product, price } => {
            admin.delete_price(product, price).await?;
        }
        Command::DeleteProduct { mapping, product } => {
            admin.delete_product(mapping, product).await?;
        }
        Command::SetMinPublishers { price, value } => {
            admin.set_minimum_publishers(price, *value).await?;
        }
        Command::ResizePriceAccount { price } => {
            admin.resize_price_account(price).await?;
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}

fn load_publishers(path: &Path) -> Result<ReferencePublishers> {
    let text =
        std::fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    let entries: BTreeMap<String, String> =
        serde_json::from_str(&text).context("Failed to parse publishers JSON")?;
    Ok(ReferencePublishers::from_map(entries)?)
}
