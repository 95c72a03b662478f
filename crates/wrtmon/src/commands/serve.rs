//! `wrtmon serve` — the pull-driven exporter loop.
//!
//! Nothing polls on a timer: every GET /metrics takes the fleet mutex,
//! runs one sequential polling pass over all routers, and encodes a
//! fresh registry. Concurrent scrapes serialize on the mutex.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router as HttpRouter;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tracing::{error, info};

use wrtmon_core::{Fleet, MacAddress};

use crate::cli::{GlobalOpts, ServeArgs};
use crate::error::CliError;
use crate::exporter;

struct AppState {
    fleet: Mutex<Fleet>,
    client_names: BTreeMap<MacAddress, String>,
}

type SharedState = Arc<AppState>;

pub async fn handle(args: ServeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::load_config(global)?;
    let listen = args
        .listen
        .unwrap_or_else(|| config.exporter.listen.clone());

    let identities = wrtmon_config::router_identities(&config);
    if identities.is_empty() {
        return Err(CliError::NoRouters);
    }

    // Connecting and probing is blocking ssh2 I/O.
    let fleet = tokio::task::spawn_blocking(move || Fleet::connect(&identities))
        .await
        .map_err(|e| CliError::Task {
            reason: e.to_string(),
        })?;
    if fleet.is_empty() {
        return Err(CliError::NoRouters);
    }

    let state: SharedState = Arc::new(AppState {
        fleet: Mutex::new(fleet),
        client_names: config.client_names(),
    });
    let app = HttpRouter::new()
        .route("/metrics", get(metrics))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|source| CliError::Bind {
            listen: listen.clone(),
            source,
        })?;
    info!(%listen, "serving /metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CliError::Serve)?;
    info!("shut down");
    Ok(())
}

async fn metrics(State(state): State<SharedState>) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let mut fleet = state.fleet.lock().unwrap_or_else(PoisonError::into_inner);
        let results = fleet.poll();
        exporter::encode_snapshots(&results, &state.client_names)
    })
    .await;

    match result {
        Ok(Ok(body)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "metric encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!(error = %e, "polling task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install shutdown handler");
    }
}
