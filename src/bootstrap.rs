use chrono::Duration as ChronoDuration;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tracing::info;

use crate::{
    api::handler::AppState,
    commission::FeeConfig,
    config::Config,
    error::{AppError, AppResult},
    gateway::HttpGatewayClient,
    ingestion::PaymentIngestionService,
    ledger::LedgerRepository,
    orders::PgOrderDirectory,
    reconciliation::{ReconcileScheduleConfig, ReconciliationScheduler, ReconciliationService},
    settlement::{ScheduleConfig, SettlementScheduler, SettlementService},
};

/// Construct every component once and wire them explicitly. The two
/// background schedulers are spawned here; the admin endpoints remain
/// the on-demand entry points for the same passes.
pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let pool = initialize_database(&config.database_url).await?;

    let default_fee = FeeConfig::new(config.platform_fee_rate)
        .map_err(|e| AppError::Config(format!("PLATFORM_FEE_RATE: {}", e)))?;

    // Core components
    let store = Arc::new(LedgerRepository::new(pool.clone()));
    let orders = Arc::new(PgOrderDirectory::new(pool.clone(), default_fee));
    info!("✅ Ledger repository and order directory initialized");

    let gateway = Arc::new(HttpGatewayClient::new(
        config.gateway_base_url.clone(),
        config.gateway_secret_key.clone(),
        Duration::from_secs(config.gateway_timeout_secs),
        config.gateway_page_limit,
    )?);
    info!("✅ Gateway client initialized for {}", config.gateway_base_url);

    let ingestion = Arc::new(PaymentIngestionService::new(store.clone(), orders.clone()));
    let settlement = Arc::new(SettlementService::new(store.clone()));
    let reconciliation = Arc::new(ReconciliationService::new(
        gateway.clone(),
        store.clone(),
        ingestion.clone(),
    ));
    info!("✅ Ingestion, settlement and reconciliation services initialized");

    let maturity_window = ChronoDuration::days(config.maturity_window_days);
    let reconcile_lookback = ChronoDuration::hours(config.reconcile_lookback_hours);

    let settlement_scheduler = SettlementScheduler::new(
        ScheduleConfig {
            execution_hour: config.settlement_hour_utc,
            maturity_window,
        },
        settlement.clone(),
    );
    let _settlement_job = settlement_scheduler.start();
    info!(
        "✅ Settlement scheduler started (daily at {:02}:00 UTC)",
        config.settlement_hour_utc
    );

    let reconciliation_scheduler = ReconciliationScheduler::new(
        ReconcileScheduleConfig {
            execution_hour: config.reconcile_hour_utc,
            lookback: reconcile_lookback,
        },
        reconciliation.clone(),
    );
    let _reconciliation_job = reconciliation_scheduler.start();
    info!(
        "✅ Reconciliation scheduler started (daily at {:02}:00 UTC, {}h lookback)",
        config.reconcile_hour_utc, config.reconcile_lookback_hours
    );

    Ok(AppState {
        store,
        ingestion,
        settlement,
        reconciliation,
        maturity_window,
        reconcile_lookback,
    })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(50)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
