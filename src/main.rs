use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ezmetafetch::columns::select_common_columns;
use ezmetafetch::config::{find_config_file, load_config, load_env_config, save_config};
use ezmetafetch::input::{read_ids_file, read_terms_file};
use ezmetafetch::orchestrator::DEFAULT_DB;
use ezmetafetch::output::write_results;
use ezmetafetch::{Config, FetchRequest, MetaFetcher, ResultSet};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// File written by `config init` when no path is given
const DEFAULT_CONFIG_PATH: &str = "ezmetafetch.toml";

/// ezmetafetch - Bulk metadata retrieval from NCBI Entrez
#[derive(Parser, Debug)]
#[command(name = "ezmetafetch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search NCBI Entrez and fetch record metadata as a flat table", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for terms and fetch metadata for every matching and given ID
    #[command(alias = "f")]
    Fetch {
        /// File with one search term per line
        #[arg(long, short = 't')]
        terms_file: Option<PathBuf>,

        /// File with one ID per line
        #[arg(long, short = 'i')]
        ids_file: Option<PathBuf>,

        /// Entrez database
        #[arg(long, default_value = DEFAULT_DB)]
        db: String,

        /// Directory receiving the result files
        #[arg(long, short, default_value = ".")]
        output: PathBuf,

        /// Also write the rows as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Keep only the common SRA columns, renamed, plus download links
        #[arg(long, default_value_t = false)]
        common_columns: bool,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a configuration file with every default filled in
    Init {
        /// Destination (default: ./ezmetafetch.toml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

/// Explicit path, then discovered file, then defaults; env overrides apply in every case
fn resolve_config(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    let path = explicit.map(Path::to_path_buf).or_else(find_config_file);
    let config = match &path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => load_env_config().context("Failed to read configuration from environment")?,
    };
    Ok((config, path))
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 if config.http.debug => "debug",
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("ezmetafetch={}", level)),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_deref() == Some("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Configuration as printed by `config show`, with the API key masked
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if shown.http.api_key.is_some() {
        shown.http.api_key = Some("********".to_string());
    }
    shown
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_path) = resolve_config(cli.config.as_deref())?;
    init_tracing(&cli, &config);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    match cli.command {
        Commands::Fetch {
            terms_file,
            ids_file,
            db,
            output,
            json,
            common_columns,
        } => {
            let terms = match &terms_file {
                Some(path) => read_terms_file(path)?,
                None => Vec::new(),
            };
            let ids = match &ids_file {
                Some(path) => read_ids_file(path)?,
                None => Vec::new(),
            };
            let request = FetchRequest::new(db).terms(terms).ids(ids);
            let searched = !request.terms.is_empty();

            let fetcher = MetaFetcher::new(config)?;
            let mut result = tokio::select! {
                result = fetcher.run(&request) => result?,
                _ = tokio::signal::ctrl_c() => anyhow::bail!("Interrupted"),
            };

            if common_columns {
                let (searched_ids, ids, metadata) = result.into_parts();
                result = ResultSet::new(searched_ids, ids, select_common_columns(&metadata));
            }

            let paths = write_results(&output, &result, searched, json)
                .with_context(|| format!("Failed to write results to {}", output.display()))?;

            if !cli.quiet {
                if let Some(path) = &paths.search_ids {
                    eprintln!(
                        "Found {} IDs, written to {}",
                        result.searched_ids().len(),
                        path.display()
                    );
                }
                eprintln!(
                    "Fetched {} records for {} IDs, written to {}",
                    result.metadata().len(),
                    result.ids().len(),
                    paths.table.display()
                );
                if let Some(path) = &paths.json {
                    eprintln!("JSON rows written to {}", path.display());
                }
            }
        }

        Commands::Config { command } => match command {
            ConfigCommands::Init { path, force } => {
                let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
                if path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
                save_config(&Config::default(), &path)?;
                if !cli.quiet {
                    eprintln!("Wrote default configuration to {}", path.display());
                }
            }
            ConfigCommands::Show => {
                let shown = toml::to_string_pretty(&redacted(&config))
                    .context("Failed to render configuration")?;
                print!("{}", shown);
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_fetch_defaults() {
        let cli = Cli::parse_from(["ezmetafetch", "fetch", "--terms-file", "terms.txt"]);
        match &cli.command {
            Commands::Fetch {
                terms_file,
                ids_file,
                db,
                output,
                json,
                common_columns,
            } => {
                assert_eq!(terms_file.as_deref(), Some(Path::new("terms.txt")));
                assert!(ids_file.is_none());
                assert_eq!(db, "sra");
                assert_eq!(output, &PathBuf::from("."));
                assert!(!json);
                assert!(!common_columns);
            }
            _ => panic!("Expected Fetch command"),
        }
    }

    #[test]
    fn test_cli_fetch_with_options() {
        let cli = Cli::parse_from([
            "ezmetafetch",
            "-vv",
            "fetch",
            "-i",
            "ids.txt",
            "--db",
            "biosample",
            "-o",
            "out",
            "--json",
            "--common-columns",
        ]);
        assert_eq!(cli.verbose, 2);
        match &cli.command {
            Commands::Fetch {
                ids_file,
                db,
                output,
                json,
                common_columns,
                ..
            } => {
                assert_eq!(ids_file.as_deref(), Some(Path::new("ids.txt")));
                assert_eq!(db, "biosample");
                assert_eq!(output, &PathBuf::from("out"));
                assert!(*json);
                assert!(*common_columns);
            }
            _ => panic!("Expected Fetch command"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "ezmetafetch",
            "config",
            "show",
            "--config",
            "/path/to/config.toml",
            "-q",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Show
            }
        ));
    }

    #[test]
    fn test_cli_config_init() {
        let cli = Cli::parse_from(["ezmetafetch", "config", "init", "my.toml", "--force"]);
        match cli.command {
            Commands::Config {
                command: ConfigCommands::Init { path, force },
            } => {
                assert_eq!(path, Some(PathBuf::from("my.toml")));
                assert!(force);
            }
            _ => panic!("Expected config init"),
        }
    }

    #[test]
    fn test_resolve_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        std::fs::write(&path, "[fetch]\nids_per_request = 7\n").unwrap();

        let (config, used) = resolve_config(Some(&path)).unwrap();
        assert_eq!(config.fetch.ids_per_request, 7);
        assert_eq!(used, Some(path));

        assert!(resolve_config(Some(Path::new("/nonexistent/c.toml"))).is_err());
    }

    #[test]
    fn test_redacted_hides_key() {
        let mut config = Config::default();
        config.http.api_key = Some("secret".to_string());
        let shown = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(!shown.contains("secret"));
    }
}
