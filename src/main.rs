use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use healix_alert::app;
use healix_alert::config::Args;
use healix_alert::providers::{SupabaseClient, TwilioClient};
use healix_alert::rate_limit::{InMemoryRateLimiter, purge_worker};
use healix_alert::state::AppState;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // parse cli arguments
    let args = Args::parse();
    let settings = args.alert_settings();

    let missing = settings.secrets.missing();
    if !missing.is_empty() {
        warn!(?missing, "alerts will be refused until configuration is complete");
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(std::io::Error::other)?;

    let secrets = &settings.secrets;
    let supabase = Arc::new(SupabaseClient::new(
        http.clone(),
        secrets.supabase_url.as_deref().unwrap_or_default(),
        secrets.supabase_key.as_deref().unwrap_or_default(),
    ));
    let twilio = Arc::new(TwilioClient::new(
        http,
        &args.twilio_api_url,
        secrets.twilio_account_sid.as_deref().unwrap_or_default(),
        secrets.twilio_auth_token.as_deref().unwrap_or_default(),
    ));
    let limiter = Arc::new(InMemoryRateLimiter::new(
        settings.rate_limit,
        settings.rate_window,
    ));

    // spawn the purge worker
    tokio::spawn(purge_worker(
        limiter.clone(),
        Duration::from_secs(args.purge_interval.max(1)),
    ));

    let state = Arc::new(AppState {
        settings,
        identity: supabase.clone(),
        profiles: supabase,
        provider: twilio,
        rate_limiter: limiter,
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Healix alert service running on http://localhost:{}", args.port);
    info!(
        "Rate limit: {} alerts per {} seconds",
        args.rate_limit, args.rate_window
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
