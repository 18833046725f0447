//! Trafficwise: traffic dashboard service for Pakistani cities.
//!
//! Single-binary Tokio application that:
//! 1. Loads the city registry and provider settings
//! 2. Picks TomTom or the mock provider
//! 3. Serves merged per-city dashboards over HTTP, cached with
//!    stale-while-revalidate
//! 4. Logs cache health on a heartbeat

mod config;
mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use common::{CityRegistry, ServiceConfig};
use dashboard::DashboardService;
use tomtom_client::{MockTrafficProvider, SharedProvider, TomTomClient};

/// Traffic dashboard aggregation service
#[derive(Parser)]
#[command(name = "trafficwise", about = "Traffic dashboard service for Pakistani cities")]
struct Cli {
    /// TOML config file (defaults to ./config.toml when present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Fetch one flow sample for the first city, print it, then exit.
    #[arg(long)]
    check_upstream: bool,

    /// Print one dashboard for CITY as JSON, then exit.
    #[arg(long, value_name = "CITY")]
    once: Option<String>,
}

fn select_provider(cfg: &ServiceConfig, registry: Arc<CityRegistry>) -> SharedProvider {
    let client = TomTomClient::new(
        cfg.tomtom_api_key.clone(),
        cfg.providers.clone(),
        registry.clone(),
    );
    if client.is_configured() {
        info!(
            "Provider: TomTom ({}, {} req/s)",
            cfg.providers.base_url, cfg.providers.requests_per_second
        );
        Arc::new(client)
    } else {
        warn!("TOMTOM_API_KEY not set, serving mock traffic data");
        Arc::new(MockTrafficProvider::new(registry))
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => error!("Failed to serialize output: {}", e),
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trafficwise=info,dashboard=info,tomtom_client=info,common=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("🚦 Trafficwise starting up...");

    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let registry = match CityRegistry::from_config(&cfg.cities) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            error!("City registry error: {}", e);
            std::process::exit(1);
        }
    };
    info!("Cities: {:?}", registry.names());
    info!(
        "Cache: ttl={}s lock_timeout={}ms call_timeout={}ms",
        cfg.cache.ttl_secs, cfg.cache.lock_timeout_ms, cfg.timing.call_timeout_ms
    );

    let provider = select_provider(&cfg, registry.clone());
    let service = match DashboardService::from_config(&cfg, registry.clone(), provider) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to build dashboard service: {}", e);
            std::process::exit(1);
        }
    };

    // ── Check-upstream mode ──────────────────────────────────────────
    if cli.check_upstream {
        let Some(city) = registry.iter().next() else {
            error!("No cities configured");
            std::process::exit(1);
        };
        info!("Checking upstream with {}...", city.name);
        match service.get_flow(&city.name).await {
            Ok(sample) => {
                info!(
                    "✅ {} answered: {:.0} km/h ({:?})",
                    service.provider_name(),
                    sample.current_speed,
                    sample.traffic_level
                );
                print_json(&sample);
                return;
            }
            Err(e) => {
                error!("❌ Upstream check failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    // ── One-shot mode ────────────────────────────────────────────────
    if let Some(city) = cli.once.as_deref() {
        match service.get_dashboard(city).await {
            Ok(entry) => {
                print_json(&entry.dashboard);
                return;
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    // ── HTTP server ──────────────────────────────────────────────────
    let addr: SocketAddr = match cfg.server.bind_addr.parse() {
        Ok(a) => a,
        Err(e) => {
            error!("Invalid bind address {}: {}", cfg.server.bind_addr, e);
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    let app = routes::router(service.clone());
    let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

    // ── Heartbeat ────────────────────────────────────────────────────
    let hb_service = service.clone();
    let hb_interval = Duration::from_secs(cfg.timing.heartbeat_interval_secs);
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(hb_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let stats = hb_service.stats();
            info!(
                "HEARTBEAT: provider={} cached={} in_flight={} stale={}",
                hb_service.provider_name(),
                stats.cached,
                stats.in_flight,
                stats.stale
            );
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("🚀 Trafficwise listening on http://{}. Press Ctrl+C to stop.", addr);

    let shutdown_reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            "ctrl_c"
        }
        r = server_handle => {
            error!("HTTP server exited: {:?}", r);
            "server_exit"
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
            "heartbeat_task_exit"
        }
    };

    info!("Trafficwise shut down ({}).", shutdown_reason);
}
