use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "soundseek", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: <data-dir>/soundseek.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Root directory for audio, metadata, features and the index (default: data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Search Freesound and download sample previews
    ///
    /// Pages through Freesound text search results for the query, downloads
    /// each result's high-quality MP3 preview into <data-dir>/raw/audio and
    /// appends the raw search metadata to
    /// <data-dir>/raw/metadata/freesound_metadata.jsonl.
    ///
    /// Every result is recorded in the catalog with its tags, which later
    /// serve as labels for 'soundseek evaluate'. Previews already on disk
    /// are reused unless --overwrite is given. A failed download is reported
    /// and skipped; it never aborts the batch.
    ///
    /// Requires a Freesound API key (FREESOUND_API_KEY or
    /// 'soundseek config set freesound_api_key <key>').
    Fetch {
        /// Text to search for
        query: String,

        /// Maximum number of results to fetch
        #[arg(long, default_value_t = 20)]
        max_results: usize,

        /// Only return samples carrying this tag
        #[arg(long)]
        filter_tag: Option<String>,

        /// Re-download previews that already exist
        #[arg(long)]
        overwrite: bool,
    },
    /// Extract audio features from downloaded samples
    ///
    /// Decodes every MP3 and WAV file in the audio directory, resamples to
    /// the configured rate, and computes tempo, key, spectral statistics and
    /// 13 MFCC means. Results are written to <data-dir>/processed/features.csv
    /// and recorded in the catalog. Files that fail to decode are listed and
    /// skipped.
    Extract {
        /// Only process the first N files
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Build the similarity index from the features table
    Index {
        /// Standardise each feature column before indexing
        #[arg(long)]
        normalize: bool,
    },
    /// Find the samples most similar to an indexed sample
    Search {
        /// File name of the query sample, e.g. 12345_kick.mp3
        file_name: String,

        /// Number of neighbours to show
        #[arg(short, long, default_value_t = 5)]
        k: usize,

        /// Search the standardised index
        #[arg(long)]
        normalize: bool,
    },
    /// Score retrieval and tag prediction against Freesound tags
    Evaluate {
        /// Neighbours considered per query
        #[arg(short, long, default_value_t = 5)]
        k: usize,

        /// Evaluate the standardised index
        #[arg(long)]
        normalize: bool,
    },
    /// Run fetch, extract and index as one pipeline
    ///
    /// Without a query only extract and index run, over audio already on
    /// disk. Stage progress is tracked in <data-dir>/pipeline.db.
    Process {
        /// Text to search Freesound for
        query: Option<String>,

        /// Maximum number of results to fetch
        #[arg(long, default_value_t = 20)]
        max_results: usize,

        /// Only fetch samples carrying this tag
        #[arg(long)]
        filter_tag: Option<String>,

        /// Skip stages that already completed for this query
        #[arg(long)]
        resume: bool,
    },
    /// Show catalog counts and generated files
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a config value, or print the config file
    Get {
        /// Config key
        key: Option<String>,
    },
    /// Set a config value in the config file
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// Show config file path
    Path,
    /// Show example config file
    Example,
    /// Create the config file with defaults
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = soundseek_etl::Config::load_with_overrides(cli.db, cli.data_dir)?;

    // Ensure data and database directories exist
    if !matches!(cli.command, Commands::Config { .. }) {
        std::fs::create_dir_all(&config.data_dir)?;
        if let Some(parent) = config.database_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Fetch {
            query,
            max_results,
            filter_tag,
            overwrite,
        } => {
            commands::run_fetch(&config, &query, max_results, filter_tag, overwrite).await?;
        }
        Commands::Extract { limit } => commands::run_extract(&config, limit)?,
        Commands::Index { normalize } => commands::run_index(&config, normalize)?,
        Commands::Search {
            file_name,
            k,
            normalize,
        } => commands::run_search(&config, &file_name, k, normalize)?,
        Commands::Evaluate { k, normalize } => commands::run_evaluate(&config, k, normalize)?,
        Commands::Process {
            query,
            max_results,
            filter_tag,
            resume,
        } => commands::run_process(&config, query, max_results, filter_tag, resume).await?,
        Commands::Status => commands::show_status(&config)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config)?,
            ConfigAction::Get { key } => commands::config::get_config(&config, key)?,
            ConfigAction::Set { key, value } => commands::config::set_config(key, value)?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Example => commands::config::show_example()?,
            ConfigAction::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}
