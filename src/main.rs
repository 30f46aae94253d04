use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use hostlink::analysis::periods::{next_weekend, upcoming_periods};
use hostlink::analysis::persistence::AnalysisDatabase;
use hostlink::analysis::pipeline::PricingPipeline;
use hostlink::analysis::service::AnalysisService;
use hostlink::analysis::state::AppState;
use hostlink::analysis::types::{AnalysisRecord, AnalysisRequest, FavoriteListing};
use hostlink::config::{Config, EnvConfig};
use hostlink::data::airbnb::AirbnbClient;
use hostlink::data::sources::CompetitorSource;
use hostlink::data::types::FetchOutcome;
use hostlink::data::weather::ClimateClient;
use hostlink::monitoring::logger::CsvLogger;
use hostlink::monitoring::report::ReportMailer;
use hostlink::monitoring::scheduler::Monitor;

/// Competitive nightly pricing for a beach rental listing
#[derive(Parser)]
#[command(name = "hostlink")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Suggests nightly prices from competitor listings and the weekend forecast")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Price the next weekend, or keep monitoring when enabled (default)
    Run,

    /// Price one stay
    Analyze {
        /// Check-in date (YYYY-MM-DD)
        checkin: String,

        /// Check-out date (YYYY-MM-DD)
        checkout: String,

        /// Number of adults (defaults to the configured listing)
        #[arg(short, long)]
        adults: Option<u32>,

        /// Own listing URL, overrides the configured one
        #[arg(long)]
        listing_url: Option<String>,
    },

    /// List upcoming weekend and weekday stays
    Periods {
        #[arg(short, long, default_value = "2")]
        months: u32,
    },

    /// Show recent analyses
    History {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Manage favorite reference listings
    Favorites {
        #[command(subcommand)]
        action: FavoriteAction,
    },
}

#[derive(Subcommand)]
enum FavoriteAction {
    /// List favorites
    List,

    /// Add a favorite. Without --price the listing page is fetched.
    Add {
        url: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        price: Option<f64>,

        #[arg(long)]
        beachfront: bool,
    },

    /// Remove a favorite
    Remove { url: String },

    /// Replace all favorites with a JSON array read from a file
    Sync { file: String },
}

struct App {
    config: Config,
    db: Arc<AnalysisDatabase>,
    state: Arc<AppState>,
    competitors: Arc<AirbnbClient>,
    service: Arc<AnalysisService>,
}

fn build(config: Config) -> Result<App> {
    let env_config = EnvConfig::load()?;
    tracing::debug!("SMTP configured: {}", env_config.smtp_configured());

    tracing::info!("Initializing database: {}", config.system.database_path);
    let db = Arc::new(AnalysisDatabase::new(&config.system.database_path)?);
    let state = Arc::new(AppState::with_database(config.monitoring.history_limit, db.clone())?);

    let competitors = Arc::new(AirbnbClient::new(config.scraper.clone())?);
    let weather = Arc::new(ClimateClient::new(&config.weather, &config.scraper.user_agent)?);
    let pipeline = PricingPipeline::new(competitors.clone(), weather, &config);

    let csv_logger = if config.system.csv_logging {
        Some(CsvLogger::new(config.system.csv_log_path.clone())?)
    } else {
        None
    };
    let mailer = ReportMailer::from_config(&config.report, &env_config)?;

    let service = Arc::new(AnalysisService::new(pipeline, state.clone(), csv_logger, mailer));

    Ok(App {
        config,
        db,
        state,
        competitors,
        service,
    })
}

fn print_record(record: &AnalysisRecord) {
    let pricing = &record.pricing;
    println!(
        "{} → {} ({} nights): R${:.2} per night",
        record.request.stay.checkin, record.request.stay.checkout, record.nights, pricing.suggested_price
    );
    println!("  {}", pricing.strategy_label);
    println!("  {}", pricing.justification);
    if pricing.is_fallback() {
        println!("  Note: base price used, no usable competitor prices ({})", record.market_source.as_str());
    }
    if let Some(adj) = &record.weather_adjustment {
        println!(
            "  Weekend/weather: R${:.2} (×{:.2}, {}, rain {:.0}%)",
            adj.adjusted_price,
            adj.multiplier,
            adj.factor.label(),
            adj.avg_rain_probability
        );
    }
}

async fn run(app: &App) -> Result<()> {
    let monitor = if app.config.monitoring.enabled {
        let monitor = Monitor::new(
            app.service.clone(),
            app.config.listing.clone(),
            Duration::from_secs(app.config.monitoring.interval_secs),
        );
        monitor.start()?;
        Some(monitor)
    } else {
        let weekend = next_weekend(Local::now().date_naive());
        let request = AnalysisRequest::for_stay(
            weekend.stay()?,
            app.config.listing.adults,
            app.config.listing.is_beachfront,
            app.config.listing.url.clone(),
        );

        match app.service.analyze(request).await {
            Ok(record) => print_record(&record),
            Err(e) => tracing::error!("Analysis failed: {:#}", e),
        }
        None
    };

    tracing::info!("✅ HostLink running, press Ctrl-C to exit");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    if let Some(monitor) = monitor {
        if monitor.is_active() {
            monitor.stop()?;
        }
    }
    Ok(())
}

async fn favorite_from_page(
    app: &App,
    url: &str,
    title: Option<String>,
    beachfront: bool,
) -> Result<FavoriteListing> {
    let stay = next_weekend(Local::now().date_naive()).stay()?;

    match app.competitors.fetch_listing(url, &stay).await {
        FetchOutcome::Available(page) if page.price_found => {
            let mut favorite = FavoriteListing::from_competitor(&page.listing);
            favorite.location = page.municipality.unwrap_or_default();
            favorite.is_beachfront |= beachfront;
            if let Some(title) = title {
                favorite.title = title;
            }
            Ok(favorite)
        }
        FetchOutcome::Available(_) => anyhow::bail!("No nightly price found on {}, pass --price", url),
        FetchOutcome::Unavailable(reason) => anyhow::bail!("Could not fetch {}: {}", url, reason),
    }
}

async fn favorites(app: &App, action: FavoriteAction) -> Result<()> {
    match action {
        FavoriteAction::List => {
            for f in app.state.favorites() {
                println!(
                    "{} - R${:.2}{} {}",
                    f.title,
                    f.price_per_night,
                    if f.is_beachfront { " (beachfront)" } else { "" },
                    f.listing_url
                );
            }
        }
        FavoriteAction::Add { url, title, price, beachfront } => {
            let favorite = match price {
                Some(price) => FavoriteListing::new(url.clone(), title.unwrap_or_else(|| url.clone()), price, beachfront),
                None => favorite_from_page(app, &url, title, beachfront).await?,
            };
            app.state.add_favorite(favorite)?;
            println!("Added {}", url);
        }
        FavoriteAction::Remove { url } => {
            let removed = app.state.remove_favorite(&url)?;
            println!("Removed {}", removed.title);
        }
        FavoriteAction::Sync { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read favorites file: {}", file))?;
            let listings: Vec<FavoriteListing> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse favorites file: {}", file))?;
            let count = app.state.sync_favorites(listings);
            println!("{} favorites stored", count);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    tracing::info!("🚀 HostLink starting...");
    let app = build(config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&app).await?,
        Commands::Analyze { checkin, checkout, adults, listing_url } => {
            let request = AnalysisRequest::new(
                &checkin,
                &checkout,
                adults.unwrap_or(app.config.listing.adults),
                app.config.listing.is_beachfront,
                listing_url.or_else(|| app.config.listing.url.clone()),
            )?;
            let record = app.service.analyze(request).await?;
            print_record(&record);
        }
        Commands::Periods { months } => {
            for period in upcoming_periods(Local::now().date_naive(), months) {
                println!("{} ({} → {}, priority {})", period.label, period.checkin, period.checkout, period.priority);
            }
        }
        Commands::History { limit } => {
            println!("{} analyses stored", app.db.count_analyses()?);
            for record in app.state.history(limit).await {
                print_record(&record);
            }
            if let Some(latest) = app.state.latest().await {
                println!("Latest run: {}", latest.created_at.with_timezone(&Local).format("%d/%m/%Y %H:%M"));
            }
        }
        Commands::Favorites { action } => favorites(&app, action).await?,
    }

    Ok(())
}
