//! `serve` command: runs the HTTP adapter.

use crate::Result;
use crate::config::ClassbookConfig;

/// Serves the HTTP adapter until the process is stopped.
///
/// # Errors
///
/// Returns an error if the service cannot be built or the address cannot be
/// bound.
#[cfg(feature = "http")]
pub async fn cmd_serve(config: &ClassbookConfig, port: Option<u16>) -> Result<()> {
    let service = std::sync::Arc::new(super::build_service(config)?);
    let state = crate::http::AppState::new(service, config.reports.default_rank_limit);
    let addr = format!("{}:{}", config.http.host, port.unwrap_or(config.http.port));
    crate::http::serve(state, &addr).await
}

/// Serves the HTTP adapter until the process is stopped.
///
/// # Errors
///
/// Always returns [`crate::Error::FeatureNotEnabled`]; the adapter is
/// compiled out.
#[cfg(not(feature = "http"))]
#[allow(clippy::unused_async)]
pub async fn cmd_serve(_config: &ClassbookConfig, _port: Option<u16>) -> Result<()> {
    Err(crate::Error::FeatureNotEnabled("http".to_string()))
}
