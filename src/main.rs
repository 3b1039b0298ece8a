use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use catalog_tracker::config::Config;
use catalog_tracker::crawler::fetcher::HttpFetcher;
use catalog_tracker::models::ChangeEvent;
use catalog_tracker::scrape::{AllStoresSummary, ScrapeSummary, Scraper};

#[derive(Parser)]
#[command(name = "catalog_tracker", about = "Track product catalogs and price changes across stores")]
struct Cli {
    /// Directory holding catalog snapshots and change logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured stores
    Stores,
    /// Scrape one store and report what changed
    Scrape {
        /// Store key (see `stores`)
        store: String,
    },
    /// Scrape every configured store
    Run {
        /// Stores scraped at once (default: sequential)
        #[arg(short = 'c', long)]
        concurrency: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let result = match cli.command {
        Commands::Stores => {
            if cli.json {
                let stores: Vec<_> = config
                    .stores
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "key": s.key,
                            "name": s.display_name,
                            "url": s.base_url,
                            "file": s.file_name,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&stores)?);
            } else {
                println!("{:<12} | {:<16} | {}", "Key", "Name", "URL");
                println!("{}", "-".repeat(60));
                for s in config.stores.iter() {
                    println!("{:<12} | {:<16} | {}", s.key, s.display_name, s.base_url);
                }
            }
            Ok(())
        }
        Commands::Scrape { store } => {
            let fetcher = fetcher_for(config.user_agent.clone())?;
            let scraper = Scraper::new(config, fetcher);
            let summary = scraper.scrape_store(&store).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_store(&summary);
            }
            Ok(())
        }
        Commands::Run { concurrency } => {
            if let Some(n) = concurrency {
                config.concurrency = n.max(1);
            }
            let fetcher = fetcher_for(config.user_agent.clone())?;
            let scraper = Arc::new(Scraper::new(config, fetcher));
            let summary = scraper.scrape_all().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_all(&summary);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 && !cli.json {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn fetcher_for(user_agent: Option<String>) -> anyhow::Result<HttpFetcher> {
    match user_agent {
        Some(ua) => HttpFetcher::with_user_agent(&ua),
        None => HttpFetcher::new(),
    }
    .context("Failed to build HTTP client")
}

fn print_store(s: &ScrapeSummary) {
    let source = if s.fallback_used { " (fallback)" } else { "" };
    println!(
        "{}: {} products{}, {} new, {} price changes, saved: {}",
        s.store, s.products_count, source, s.new_products_count, s.price_changes_count, s.saved
    );
    for change in &s.changes {
        match change {
            ChangeEvent::PriceChange(c) => {
                let pct = c
                    .change_percent
                    .map(|p| format!("{p:+.1}%"))
                    .unwrap_or_else(|| "from zero".into());
                println!("  ~ {}: {:.2} -> {:.2} ({})", c.name, c.old_price, c.new_price, pct);
            }
            ChangeEvent::NewProduct(p) => println!("  + {}: {:.2}", p.name, p.price),
        }
    }
}

fn print_all(summary: &AllStoresSummary) {
    println!(
        "{:<12} | {:>8} | {:>5} | {:>7} | {:<5} | {:<8}",
        "Store", "Products", "New", "Changes", "Saved", "Fallback"
    );
    println!("{}", "-".repeat(60));
    for s in &summary.stores {
        println!(
            "{:<12} | {:>8} | {:>5} | {:>7} | {:<5} | {:<8}",
            s.store,
            s.products_count,
            s.new_products_count,
            s.price_changes_count,
            if s.saved { "yes" } else { "NO" },
            if s.fallback_used { "yes" } else { "no" },
        );
    }
    for e in &summary.errors {
        println!("{:<12} | failed: {}", e.store, e.error);
    }
    println!(
        "\n{} products, {} new, {} price changes across {} stores",
        summary.total_products,
        summary.total_new_products,
        summary.total_price_changes,
        summary.stores.len()
    );
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
