use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

use cdsetool::auth::Credentials;
use cdsetool::collection::describe;
use cdsetool::config::Config;
use cdsetool::download::{download_features, DownloadOptions};
use cdsetool::monitor::{Monitor, StatusMonitor};
use cdsetool::query::{FeatureQuery, FeatureQueryOptions, SearchTermValue};

#[derive(Parser)]
#[command(name = "cdsetool", about = "Search and download from the Copernicus Data Space Ecosystem")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Catalogue search operations
    Query {
        #[command(subcommand)]
        command: QueryCommand,
    },
    /// Download the features matched by a search
    Download {
        collection: String,
        path: PathBuf,
        #[arg(long = "search-term", value_parser = parse_term)]
        search_terms: Vec<(String, SearchTermValue)>,
        /// Defaults to CDSETOOL_CONCURRENCY (or 1) when not given.
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        overwrite_existing: bool,
        #[arg(long)]
        filter_pattern: Option<String>,
        #[arg(long)]
        exclude: bool,
    },
}

#[derive(Subcommand)]
enum QueryCommand {
    /// List the valid search terms for a collection
    SearchTerms { collection: String },
    /// Run a search and print matching features
    Search {
        collection: String,
        #[arg(long = "search-term", value_parser = parse_term)]
        search_terms: Vec<(String, SearchTermValue)>,
        #[arg(long)]
        json: bool,
    },
}

fn parse_term(s: &str) -> Result<(String, SearchTermValue), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    Ok((key.to_string(), SearchTermValue::from(value.to_string())))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Query { command } => run_query(command).await?,
        Command::Download {
            collection,
            path,
            search_terms,
            concurrency,
            overwrite_existing,
            filter_pattern,
            exclude,
        } => {
            run_download(
                &config,
                &collection,
                &path,
                search_terms,
                concurrency.unwrap_or(config.concurrency),
                overwrite_existing,
                filter_pattern,
                exclude,
            )
            .await?
        }
    }

    Ok(())
}

async fn run_query(command: QueryCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        QueryCommand::SearchTerms { collection } => {
            let descriptor = describe(&collection).await?;
            let mut keys: Vec<&String> = descriptor.keys().collect();
            keys.sort();
            for key in keys {
                println!("{}", key);
            }
        }
        QueryCommand::Search {
            collection,
            search_terms,
            json,
        } => {
            let query = FeatureQuery::new(&collection, &search_terms, FeatureQueryOptions::default())
                .await?;
            let mut stream = Box::pin(query.stream());
            while let Some(feature) = stream.next().await {
                let feature = feature?;
                if json {
                    println!("{}", feature.as_json());
                } else {
                    println!("{}", feature.title().unwrap_or("-"));
                }
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_download(
    config: &Config,
    collection: &str,
    path: &PathBuf,
    search_terms: Vec<(String, SearchTermValue)>,
    concurrency: usize,
    overwrite_existing: bool,
    filter_pattern: Option<String>,
    exclude: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        eprintln!("destination path does not exist: {}", path.display());
        std::process::exit(1);
    }

    let mut credentials = Credentials::with_discovery_url(
        config.username.clone(),
        config.password.clone(),
        config.discovery_url.clone(),
    );
    if let Some(path) = config.credentials_file.clone() {
        credentials = credentials.with_credentials_file(path);
    }
    let credentials = Arc::new(credentials);

    let query = FeatureQuery::new(collection, &search_terms, FeatureQueryOptions::default()).await?;
    let features = query.stream().filter_map(|f| async move { f.ok() });

    let monitor: Arc<dyn Monitor> = Arc::new(StatusMonitor::new());
    monitor.start().await;

    let options = Arc::new(DownloadOptions {
        concurrency,
        overwrite_existing,
        filter_pattern,
        exclude,
        tmpdir: None,
        monitor: monitor.clone(),
    });

    let mut outcomes = Box::pin(download_features(
        Box::pin(features),
        path.clone(),
        credentials,
        options,
    ));

    let mut failures = 0;
    while let Some(outcome) = outcomes.next().await {
        match outcome {
            Some(Ok(success)) => println!("downloaded {} -> {}", success.title, success.output.display()),
            Some(Err(failure)) => {
                failures += 1;
                eprintln!(
                    "failed {}: {}",
                    failure.title.as_deref().unwrap_or("<unknown>"),
                    failure.reason
                );
            }
            None => {}
        }
    }

    monitor.stop().await;

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
