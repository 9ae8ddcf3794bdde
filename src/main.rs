//! Otomoto-Harvest main entry point
//!
//! This is the command-line interface for the car-listing harvester.

use anyhow::{bail, Context};
use clap::Parser;
use otomoto_harvest::config::{load_config_with_hash, Config};
use otomoto_harvest::crawler::{read_slug_list, Coordinator, CrawlTarget};
use otomoto_harvest::output::RunReport;
use otomoto_harvest::store::{publish_outputs, BlobStore, DatasetCache, FsBlobStore};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Otomoto-Harvest: a car-listing marketplace harvester
///
/// Crawls manufacturer search results, follows every advertisement, and
/// writes one fixed-column CSV file per manufacturer or model.
#[derive(Parser, Debug)]
#[command(name = "otomoto-harvest")]
#[command(version)]
#[command(about = "A car-listing marketplace harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Crawl a single manufacturer
    #[arg(
        long,
        value_name = "SLUG",
        conflicts_with_all = ["models_of", "all", "combine", "refresh_catalog", "publish", "stats"]
    )]
    maker: Option<String>,

    /// Narrow --maker to one model
    #[arg(long, value_name = "SLUG", requires = "maker")]
    model: Option<String>,

    /// Crawl every listed model of a manufacturer, one file per model
    #[arg(
        long,
        value_name = "SLUG",
        conflicts_with_all = ["all", "combine", "refresh_catalog", "publish", "stats"]
    )]
    models_of: Option<String>,

    /// Crawl every manufacturer in the makers list (default)
    #[arg(long, conflicts_with_all = ["combine", "refresh_catalog", "publish", "stats"])]
    all: bool,

    /// Concatenate the per-target files and exit
    #[arg(long, conflicts_with_all = ["refresh_catalog", "publish", "stats"])]
    combine: bool,

    /// Rewrite the makers and models lists from the marketplace catalog
    #[arg(long, conflicts_with_all = ["publish", "stats"])]
    refresh_catalog: bool,

    /// Upload every CSV of the data directory to the configured store
    #[arg(long, conflicts_with = "stats")]
    publish: bool,

    /// Show price statistics of the harvested datasets and exit
    #[arg(long)]
    stats: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        return handle_dry_run(&config, &cli).await;
    }

    if cli.combine {
        handle_combine(config)
    } else if cli.refresh_catalog {
        handle_refresh_catalog(config).await
    } else if cli.publish {
        handle_publish(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("otomoto_harvest=info,warn"),
            1 => EnvFilter::new("otomoto_harvest=debug,info"),
            2 => EnvFilter::new("otomoto_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Targets selected by the crawl flags, with the makers list read from disk
fn planned_targets(config: &Config, cli: &Cli) -> anyhow::Result<Vec<CrawlTarget>> {
    if let Some(maker) = &cli.maker {
        return Ok(vec![match &cli.model {
            Some(model) => CrawlTarget::model(maker, model),
            None => CrawlTarget::maker(maker),
        }]);
    }

    if let Some(maker) = &cli.models_of {
        let path = Path::new(&config.resources.models_dir).join(format!("{}.txt", maker.trim()));
        let models = read_slug_list(&path)
            .with_context(|| format!("cannot read model list {}", path.display()))?;
        return Ok(models.iter().map(|m| CrawlTarget::model(maker, m)).collect());
    }

    let path = Path::new(&config.resources.makers_path);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let makers = read_slug_list(path)
        .with_context(|| format!("cannot read makers list {}", path.display()))?;
    Ok(makers.iter().map(|m| CrawlTarget::maker(m)).collect())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
async fn handle_dry_run(config: &Config, cli: &Cli) -> anyhow::Result<()> {
    println!("=== Otomoto-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Base URL: {}", config.crawler.base_url);
    println!("  Catalog URL: {}", config.crawler.catalog_url);
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.crawler.request_timeout_secs, config.crawler.connect_timeout_secs
    );

    println!("\nResources:");
    println!("  Makers: {}", config.resources.makers_path);
    println!("  Features: {}", config.resources.features_path);
    println!("  Models: {}", config.resources.models_dir);

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_directory);
    println!("  Combined file: {}", config.output.combined_filename);
    if let Some(store) = &config.store {
        println!("  Store: {} (bucket {})", store.root, store.bucket);
    }

    let coordinator = Coordinator::new(config.clone())?;
    println!("\nSchema ({} columns):", coordinator.schema().columns().len());
    for column in coordinator.schema().columns() {
        println!("  - {}", column);
    }

    let targets = planned_targets(config, cli)?;
    println!("\nTargets ({}):", targets.len());
    for target in &targets {
        match target.root_url(&config.crawler.base_url) {
            Ok(url) => println!("  - {} ({})", target.label(), url),
            Err(e) => println!("  - {} (invalid: {})", target.label(), e),
        }
    }

    println!("\n✓ Configuration is valid");
    if targets.is_empty() {
        println!("✓ Makers list missing; a real run would fetch the catalog first");
    }

    Ok(())
}

/// Handles the crawl modes: --maker, --models-of, and --all
async fn handle_crawl(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config)?;

    let report = if let Some(maker) = &cli.maker {
        let target = match &cli.model {
            Some(model) => CrawlTarget::model(maker, model),
            None => CrawlTarget::maker(maker),
        };
        let mut report = RunReport::default();
        report.push(coordinator.crawl_target(&target).await);
        report
    } else if let Some(maker) = &cli.models_of {
        coordinator.crawl_maker_models(maker).await?
    } else {
        if !cli.all {
            tracing::debug!("No mode flag given, crawling every manufacturer");
        }
        coordinator.crawl_all_makers().await?
    };

    let aborted = report.aborted();
    if !aborted.is_empty() {
        tracing::warn!("Aborted targets: {}", aborted.join(", "));
    }
    if report.completed() == 0 && !report.summaries.is_empty() {
        bail!("every target aborted");
    }

    Ok(())
}

/// Handles the --combine mode
fn handle_combine(config: Config) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config)?;
    let combined = coordinator.combine_data()?;
    println!(
        "✓ Combined {} files into {} ({} rows, {} columns)",
        combined.files,
        combined.path.display(),
        combined.rows,
        combined.columns
    );
    Ok(())
}

/// Handles the --refresh-catalog mode
async fn handle_refresh_catalog(config: Config) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config)?;
    let makers = coordinator
        .refresh_catalog()
        .await
        .context("catalog refresh failed")?;
    println!("✓ Catalog refreshed: {} manufacturers", makers.len());
    Ok(())
}

/// Handles the --publish mode
fn handle_publish(config: &Config) -> anyhow::Result<()> {
    let Some(store_config) = &config.store else {
        bail!("--publish needs a [store] section in the configuration");
    };
    let store = FsBlobStore::new(&store_config.root);
    let keys = publish_outputs(
        &store,
        &store_config.bucket,
        Path::new(&config.output.data_directory),
    )?;
    println!(
        "✓ Published {} files to {}/{}",
        keys.len(),
        store.root().display(),
        store_config.bucket
    );
    Ok(())
}

/// Handles the --stats mode: price statistics per dataset
///
/// Reads through the configured store, or treats the data directory itself as
/// a bucket when no store is configured.
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let (store, bucket) = match &config.store {
        Some(store) => (FsBlobStore::new(&store.root), store.bucket.clone()),
        None => local_bucket(Path::new(&config.output.data_directory))?,
    };

    let keys = store.list(&bucket, "")?;
    let mut cache = DatasetCache::new(store, &bucket);

    println!(
        "{:<24} {:>7} {:>10} {:>10} {:>10} {:>10}",
        "dataset", "rows", "min", "median", "mean", "max"
    );
    for key in keys {
        let Some(slug) = key.strip_suffix(".csv") else {
            continue;
        };
        let table = cache.get_or_load(slug)?;
        match table.price_stats() {
            Some(stats) => println!(
                "{:<24} {:>7} {:>10} {:>10.0} {:>10.0} {:>10}",
                slug, stats.count, stats.min, stats.median, stats.mean, stats.max
            ),
            None => println!("{:<24} {:>7} {:>10}", slug, table.rows.len(), "-"),
        }
    }

    Ok(())
}

fn local_bucket(data_dir: &Path) -> anyhow::Result<(FsBlobStore, String)> {
    let bucket = data_dir
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("data directory {} has no usable name", data_dir.display()))?;
    let root = match data_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((FsBlobStore::new(root), bucket.to_string()))
}
