use crate::cli::ServiceName;
use crate::config::Config;
use crate::data::vehicles::PgVehicleStore;
use crate::dealer::DealerClient;
use crate::scraper::batch::ScanTracker;
use crate::scraper::reconcile::Reconciler;
use crate::scraper::{ScanContext, ScraperService};
use crate::services::manager::ServiceManager;
use crate::services::web::WebService;
use crate::state::{AppState, ServiceStatus};
use crate::utils::fmt_duration;
use anyhow::Context;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info};

/// Open the process-wide pool and bring the schema up to date.
pub async fn connect_database(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required")?;

    let slow_threshold = Duration::from_millis(500);
    let connect_options = PgConnectOptions::from_str(database_url)
        .context("Failed to parse database URL")?
        .log_statements(tracing::log::LevelFilter::Debug)
        .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

    let db_pool = PgPoolOptions::new()
        .min_connections(0)
        .max_connections(4)
        .acquire_slow_threshold(slow_threshold)
        .acquire_timeout(Duration::from_secs(4))
        .idle_timeout(Duration::from_secs(60 * 2))
        .max_lifetime(Duration::from_secs(60 * 30))
        .connect_with(connect_options)
        .await
        .context("Failed to create database pool")?;

    info!(
        max_connections = 4,
        acquire_slow_threshold = fmt_duration(slow_threshold),
        "database pool established"
    );

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed successfully");

    Ok(db_pool)
}

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    db_pool: PgPool,
    app_state: AppState,
    service_manager: ServiceManager,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let db_pool = connect_database(&config).await?;

        let dealer = Arc::new(
            DealerClient::new(config.dealer_base_url()?).context("Failed to create dealer client")?,
        );
        let reconciler = Arc::new(Reconciler::new(Arc::new(PgVehicleStore::new(
            db_pool.clone(),
        ))));

        let scan = ScanContext {
            source: dealer.clone(),
            reconciler,
            options: config.scan_options(),
            tracker: ScanTracker::default(),
            trigger: Arc::new(Notify::new()),
        };

        let app_state = AppState::new(db_pool.clone(), dealer, scan, config.api_token.clone());
        if app_state.api_token.is_none() {
            info!("API_TOKEN not set, mutating routes are unauthenticated");
        }

        Ok(App {
            config,
            db_pool,
            app_state,
            service_manager: ServiceManager::new(),
        })
    }

    /// Setup and register services based on enabled service list
    pub fn setup_services(&mut self, services: &[ServiceName]) -> Result<(), anyhow::Error> {
        if services.contains(&ServiceName::Web) {
            self.app_state
                .service_statuses
                .set(ServiceName::Web.as_str(), ServiceStatus::Starting);
            let web_service = Box::new(WebService::new(self.config.port, self.app_state.clone()));
            self.service_manager
                .register_service(ServiceName::Web.as_str(), web_service);
        }

        if services.contains(&ServiceName::Scraper) {
            self.app_state
                .service_statuses
                .set(ServiceName::Scraper.as_str(), ServiceStatus::Starting);
            let scraper_service = Box::new(ScraperService::new(
                self.db_pool.clone(),
                self.app_state.scan.clone(),
                self.config.scan_interval,
                self.config.scan_on_startup,
                self.app_state.service_statuses.clone(),
            ));
            self.service_manager
                .register_service(ServiceName::Scraper.as_str(), scraper_service);
        }

        if !self.service_manager.has_services() {
            error!("No services enabled. Cannot start application.");
            return Err(anyhow::anyhow!("No services enabled"));
        }

        Ok(())
    }

    /// Start all registered services
    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    /// Run the application and handle shutdown signals
    pub async fn run(self) -> ExitCode {
        use crate::services::signals::handle_shutdown_signals;
        handle_shutdown_signals(self.service_manager, self.config.shutdown_timeout).await
    }
}
