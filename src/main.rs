// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relational_staking_server::{
    api::router,
    config::{env_optional, ServerConfig, StakingConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    providers::{FixedRates, HttpRateSource, InMemoryLedger, Ledger, LedgerHttpClient, MetadataStore, RateSource},
    staking::{StakingService, SystemClock},
    state::{AppState, AuthConfig, CollaboratorMode},
};

/// Grace period for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

type StartupError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match env_optional(LOG_FORMAT_ENV).as_deref() {
        Some("json") => builder.json().try_init(),
        _ => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {e}");
    }
}

struct Collaborators {
    store: Arc<dyn MetadataStore>,
    ledger: Arc<dyn Ledger>,
    rates: Arc<dyn RateSource>,
    ledger_mode: CollaboratorMode,
    rates_mode: CollaboratorMode,
}

/// HTTP collaborators when configured, otherwise in-process fakes.
fn collaborators() -> Result<Collaborators, StartupError> {
    let (store, ledger, ledger_mode): (Arc<dyn MetadataStore>, Arc<dyn Ledger>, _) =
        if LedgerHttpClient::is_configured() {
            let client = Arc::new(LedgerHttpClient::from_env()?);
            info!(base_url = %client.base_url(), "Using HTTP ledger");
            (client.clone(), client, CollaboratorMode::Http)
        } else {
            warn!("LEDGER_BASE_URL not set; using in-memory ledger (balances are lost on restart)");
            let ledger = Arc::new(InMemoryLedger::new());
            (ledger.clone(), ledger, CollaboratorMode::InMemory)
        };

    let (rates, rates_mode): (Arc<dyn RateSource>, _) = if HttpRateSource::is_configured() {
        (Arc::new(HttpRateSource::from_env()?), CollaboratorMode::Http)
    } else {
        warn!("RATES_BASE_URL not set; cross-wallet plans will be rejected");
        (Arc::new(FixedRates::new()), CollaboratorMode::InMemory)
    };

    Ok(Collaborators {
        store,
        ledger,
        rates,
        ledger_mode,
        rates_mode,
    })
}

/// Resolves on Ctrl-C or when `shutdown` is cancelled elsewhere.
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for shutdown signal");
                shutdown.cancelled().await;
            }
        },
        _ = shutdown.cancelled() => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    init_tracing();

    // Must happen before any TLS configuration is built.
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider was already installed");
    }

    let server = ServerConfig::from_env()?;
    let staking_config = StakingConfig::from_env()?;
    let auth_config = AuthConfig::from_env();
    if auth_config.jwks.is_none() {
        warn!("CLERK_JWKS_URL not set; bearer tokens are only accepted in dev builds");
    }

    let c = collaborators()?;
    let service = Arc::new(StakingService::new(
        c.store,
        c.ledger,
        c.rates,
        Arc::new(SystemClock),
        staking_config,
    ));
    let state = AppState::new(service, c.ledger_mode, c.rates_mode).with_auth_config(auth_config);
    let app = router(state);

    let addr: SocketAddr = server.bind_addr().parse()?;
    let shutdown = CancellationToken::new();
    let handle = Handle::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        let handle = handle.clone();
        async move {
            shutdown_signal(shutdown).await;
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    match &server.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
            info!(%addr, "Relational Staking listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            warn!("TLS_CERT_PATH/TLS_KEY_PATH not set; serving plain HTTP");
            info!(%addr, "Relational Staking listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    shutdown.cancel();
    info!("Server stopped");
    Ok(())
}
