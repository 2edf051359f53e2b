//! Band Scanner - identify a cigar from a photo of its band
//!
//! Command-line front end over the scan pipeline and the catalog resolver.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use band_scanner::capture::FileCamera;
use band_scanner::catalog::{load_catalog, CigarRecord};
use band_scanner::config::{load_config, save_config, AppConfig};
use band_scanner::matching::{CatalogResolver, ResolverSettings};
use band_scanner::scanner::{PipelineSettings, ScanPipeline};
use band_scanner::shared::ScanMessage;
use band_scanner::storage;
use band_scanner::vision::CloudVisionClient;

/// Band Scanner - cigar band identification
#[derive(Parser, Debug)]
#[command(name = "band-scanner")]
#[command(about = "Identify a cigar from a photo of its band")]
struct Args {
    /// Configuration file (defaults to config.toml in the config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalog JSON file (defaults to catalog.json in the data directory)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Scan a band photo
    #[arg(short, long, conflicts_with_all = ["resolve", "barcode"])]
    image: Option<PathBuf>,

    /// Resolve band text against the catalog without a photo
    #[arg(short, long, conflicts_with = "barcode")]
    resolve: Option<String>,

    /// Route a decoded barcode to manual search
    #[arg(long)]
    barcode: Option<String>,

    /// Write the default configuration and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => storage::default_config_path()?,
    };

    if args.init_config {
        save_config(&AppConfig::default(), &config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let config = if config_path.exists() {
        load_config(&config_path)?
    } else {
        info!("No config at {:?}, using defaults", config_path);
        AppConfig::default()
    };

    let catalog_path = match args.catalog.clone().or_else(|| config.catalog.path.clone()) {
        Some(path) => path,
        None => storage::default_catalog_path()?,
    };
    let catalog = load_catalog(&catalog_path)?;

    let settings = ResolverSettings::from(&config.catalog);
    let resolver = CatalogResolver::with_settings(Arc::new(catalog), settings);

    if let Some(text) = &args.resolve {
        match resolver.resolve_to_cigar(text).await? {
            Some(record) => print_record(&record),
            None => println!("No match for {:?}", text),
        }
        return Ok(());
    }

    let extractor = Arc::new(CloudVisionClient::new(&config.vision)?);
    let (pipeline, outcomes) =
        ScanPipeline::new(resolver, extractor, PipelineSettings::from(&config));

    if let Some(code) = &args.barcode {
        if !pipeline.handle_barcode(code) {
            anyhow::bail!("Barcode was not accepted");
        }
    } else if let Some(image) = &args.image {
        pipeline
            .start_scan(Arc::new(FileCamera::new(image)))
            .await
            .context("Scan task failed")?;
    } else {
        anyhow::bail!("Nothing to do: pass --image, --resolve or --barcode");
    }

    for outcome in outcomes.try_iter() {
        print_outcome(&outcome);
    }

    Ok(())
}

fn print_outcome(outcome: &ScanMessage) {
    match outcome {
        ScanMessage::Resolved(record) => print_record(record),
        ScanMessage::Fallback { prefill, ocr_clues } => {
            println!("No catalog match. Search manually for: {}", prefill);
            if let Some(clues) = ocr_clues {
                println!("Text on band:\n{}", clues);
            }
        }
        ScanMessage::Failed {
            category,
            message,
            fallback_prefill,
        } => {
            println!("Scan failed ({}): {}", category, message);
            if let Some(prefill) = fallback_prefill {
                println!("Search manually for: {}", prefill);
            }
            if category.is_retryable() {
                println!("This may succeed if you try again.");
            }
        }
    }
}

fn print_record(record: &CigarRecord) {
    println!("{} ({})", record.name, record.brand);
    let details = [
        ("Origin", &record.origin),
        ("Wrapper", &record.wrapper),
        ("Strength", &record.strength),
        ("Vitola", &record.vitola),
    ];
    for (label, value) in details {
        if let Some(value) = value {
            println!("  {}: {}", label, value);
        }
    }
    if let Some(rating) = record.rating {
        println!("  Rating: {:.1} ({} reviews)", rating, record.review_count);
    }
}
