use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod metrics;
mod models;
mod report;
mod session;
mod weekly;

use api::ApiClient;
use models::Session;
use session::{FileStore, SessionStore};

#[derive(Parser)]
#[command(name = "admin-insights")]
#[command(about = "Marketplace admin analytics over the storefront REST API", long_about = None)]
struct Cli {
    /// Base URL of the marketplace API
    #[arg(
        long,
        env = "MARKETPLACE_API_URL",
        default_value = "http://localhost:5000/api"
    )]
    api_url: String,
    /// Where the admin session is persisted
    #[arg(long, default_value = "session.json")]
    session: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate against the backend and persist the session
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Drop the persisted session
    Logout,
    /// Weekly buyer registration histogram
    Registrations {
        #[arg(long, default_value_t = 8)]
        weeks: usize,
        /// Print the series as JSON instead of text
        #[arg(long)]
        json: bool,
        /// Write the series to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Product category, condition and price distributions
    Catalog,
    /// Seller verification metrics
    Sellers,
    /// Generate a markdown report across all metrics
    Report {
        #[arg(long, default_value_t = 8)]
        weeks: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace_admin_insights=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let store = FileStore::new(&cli.session);
    let session = store.load()?.unwrap_or_default();
    let client = ApiClient::new(&cli.api_url, session.token.as_deref());

    match cli.command {
        Commands::Login { username, password } => {
            let login = client.login(&username, &password).await?;
            store.save(&Session {
                token: login.token,
                user: login.user,
            })?;
            println!("{}", login.message.as_deref().unwrap_or("Logged in."));
            println!("Session saved to {}.", store.path().display());
        }
        Commands::Logout => {
            store.clear()?;
            println!("Session cleared.");
        }
        Commands::Registrations { weeks, json, csv } => {
            let buyers = client.fetch_buyers().await?;
            let series = weekly::weekly_registrations(&buyers, weeks, Utc::now());

            if let Some(path) = csv {
                report::write_series_csv(&path, &series)?;
                println!("Series written to {}.", path.display());
            } else if json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                println!("New buyer registrations ({} buyers):", buyers.len());
                for point in series.series.iter() {
                    println!("- week of {}: {}", point.label, point.value);
                }
                if !series.note.is_empty() {
                    println!("{}", series.note);
                }
            }
        }
        Commands::Catalog => {
            let products = client.fetch_products().await?;
            println!("Catalog overview ({} products):", products.len());

            println!("Categories:");
            print_counts(&metrics::category_distribution(&products));
            println!("Conditions:");
            print_counts(&metrics::condition_distribution(&products));
            println!("Price bands:");
            print_counts(&metrics::price_distribution(&products));
        }
        Commands::Sellers => {
            let sellers = client.fetch_sellers().await?;
            let verification = metrics::seller_verification(&sellers);
            println!(
                "{} sellers: {} verified, {} pending",
                verification.total,
                verification.verified,
                verification.total - verification.verified
            );
        }
        Commands::Report { weeks, out } => {
            let buyers = client.fetch_buyers().await?;
            let sellers = client.fetch_sellers().await?;
            let products = client.fetch_products().await?;

            let registrations = weekly::weekly_registrations(&buyers, weeks, Utc::now());
            let document = report::build_report(
                Utc::now(),
                &registrations,
                &metrics::category_distribution(&products),
                &metrics::condition_distribution(&products),
                &metrics::price_distribution(&products),
                metrics::seller_verification(&sellers),
            );
            std::fs::write(&out, document)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn print_counts(counts: &[models::CategoryCount]) {
    if counts.is_empty() {
        println!("  (none)");
        return;
    }
    for count in counts {
        println!("  - {}: {}", count.name, count.value);
    }
}
