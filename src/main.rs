use spot_watch::dispatch::UpdateDispatcher;
use spot_watch::dispatch::http::HttpTransport;
use spot_watch::indicator::IndicatorDriver;
use spot_watch::link::probe::RouteProbe;
use spot_watch::link::{ConnectivitySupervisor, ReadyOutcome};
use spot_watch::monitor::Monitor;
use spot_watch::occupancy::SlotClassifier;
use spot_watch::sensor::ranger::PulseRanger;
use spot_watch::state::AppState;
use spot_watch::{api, config, gpio, link, monitor};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::Level;

fn init_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let config = config::load_from_path(&config_path)?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = %config_path,
        app = %config.app.name,
        slots = config.len(),
        "spot-watch starting"
    );

    // Hardware first: without pins there is nothing to monitor.
    let ranger = PulseRanger::new(config.ranger_timing());
    let hardware = gpio::open_slot_hardware(config.slots(), ranger).inspect_err(|err| {
        tracing::error!(error = %err, "Failed to initialize slot hardware");
    })?;

    let stop_flag = Arc::new(AtomicBool::new(false));
    let supervisor = Arc::new(ConnectivitySupervisor::new(config.max_retry()));
    let probe = RouteProbe::for_collector(config.collector_base_url())?;
    let _link_handle = link::spawn_link_thread(
        probe,
        Arc::clone(&supervisor),
        config.link_timing(),
        Arc::clone(&stop_flag),
    );

    match supervisor.await_ready(config.ready_timeout()).await {
        ReadyOutcome::Ready => tracing::info!("Link ready"),
        ReadyOutcome::PermanentFailure => tracing::error!(
            max_retry = config.max_retry(),
            "Link failed permanently; updates will not be sent until restart"
        ),
        ReadyOutcome::TimedOut => tracing::warn!(
            timeout_secs = config.ready_timeout().as_secs(),
            "Link not ready in time; continuing without connectivity"
        ),
    }

    let app_state = Arc::new(RwLock::new(AppState::new()));
    let transport = HttpTransport::new(config.request_timeout(), config.connect_timeout());
    match transport.prime(config.collector_base_url()) {
        Ok(addr) => tracing::info!(%addr, "Collector address resolved"),
        Err(err) => tracing::warn!(
            error = %err,
            "Collector address not resolved; retrying on first update"
        ),
    }
    let dispatcher = UpdateDispatcher::new(
        transport,
        Arc::clone(&supervisor),
        config.collector_base_url(),
        config.parking_path(),
    );
    tracing::info!(url = dispatcher.url(), "Collector endpoint");

    let monitor = Monitor::new(
        hardware,
        SlotClassifier::new(config.classifier()),
        IndicatorDriver::new(config.invalid_signal()),
        dispatcher,
        config.inter_slot_delay(),
        Arc::clone(&app_state),
    );
    tracing::info!(
        interval_ms = config.update_interval().as_millis(),
        "Starting monitoring thread"
    );
    let monitor_handle =
        monitor::spawn_monitor_thread(monitor, config.update_interval(), Arc::clone(&stop_flag));

    match config.server_port() {
        Some(port) => {
            let app = api::router(api::ApiState {
                app: Arc::clone(&app_state),
                link: Arc::clone(&supervisor),
            });
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!(%addr, "Status API listening");
            axum::serve(listener, app).await?;
        }
        None => {
            tracing::info!("Status API disabled");
            tokio::task::spawn_blocking(move || monitor_handle.join())
                .await?
                .map_err(|_| "monitoring thread panicked")?;
        }
    }

    stop_flag.store(true, Ordering::Relaxed);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::config;

    #[test]
    fn default_config_is_valid_toml() -> Result<(), Box<dyn std::error::Error>> {
        let _config = config::load_default()?;
        Ok(())
    }
}
