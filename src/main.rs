use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use voice_feedback::config::{Config, MetadataBackend};
use voice_feedback::credentials::{self, Secret};
use voice_feedback::db::SqliteMetadataStore;
use voice_feedback::db_postgres::PgMetadataStore;
use voice_feedback::serve;

#[derive(Parser, Debug)]
#[command(author, version, about = "Record, transcribe and play back voice feedback about indoor spaces")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server
    Serve {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create the metadata table and index if they do not exist
    InitDb {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Serve { config, port } => {
            let config = Config::load(&config)?;
            let credentials = credentials::load_credentials()
                .map_err(|e| format!("Failed to load credentials: {}", e))?;
            serve::serve(config, credentials, port)
        }
        Command::InitDb { config } => init_db(config),
    }
}

fn init_db(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&config_path)?;
    let table = config.metadata_store.table.clone();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match config.metadata_store.backend {
            MetadataBackend::Sqlite => {
                // validate() guarantees the path for this backend
                let path = config
                    .metadata_store
                    .sqlite_path
                    .as_deref()
                    .ok_or("sqlite_path is required")?;
                let store = SqliteMetadataStore::open(path, &table).await?;
                info!(
                    "Table '{}' ready in {} ({} rows)",
                    table,
                    path.display(),
                    store.count().await?
                );
            }
            MetadataBackend::Postgres => {
                let credentials = credentials::load_credentials()
                    .map_err(|e| format!("Failed to load credentials: {}", e))?;
                let password = credentials::require(&credentials, Secret::PostgresPassword)?;
                let base_url = config
                    .metadata_store
                    .postgres_url
                    .as_deref()
                    .ok_or("postgres_url is required")?;
                let database = config
                    .metadata_store
                    .postgres_database
                    .as_deref()
                    .ok_or("postgres_database is required")?;
                PgMetadataStore::connect(base_url, &password, database, &table)
                    .await
                    .map_err(|e| format!("Failed to initialise postgres schema: {}", e))?;
                info!("Table '{}' ready in postgres database '{}'", table, database);
            }
            MetadataBackend::Supabase => {
                println!(
                    "Supabase tables are managed in the Supabase dashboard; nothing to do for '{}'",
                    table
                );
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
