// src/enrichment/mod.rs
//! Bulk retail check: per-row chained enrichment against the vehicle-data API.

pub mod extract;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod row_enricher;

pub use models::{InputRow, RetailRecord, RowOutcome, RowResult, VehicleInfo, NOT_AVAILABLE, RETAIL_REPORT_HEADER};
pub use orchestrator::BatchOrchestrator;
pub use progress::BatchProgress;
pub use row_enricher::RowEnricher;

use crate::{
    api::{http_client_from_config, AutoTraderClient, RateLimitConfig, RateLimiter, TokenManager, VehicleDataApi},
    config::Config,
    error::EnrichError,
    report::{output_file_name, read_input_rows, ReportWriter},
};
use log::info;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

pub const RETAIL_OUTPUT_PREFIX: &str = "Vehicles_API_Output";
pub const RETAIL_OUTPUT_TIMESTAMP: &str = "%Y%m%d_%H%M";

/// Builds the shared session pieces and the orchestrator around `api`.
pub fn build_orchestrator(api: Arc<dyn VehicleDataApi>, config: &Config) -> BatchOrchestrator {
    let limiter = Arc::new(RateLimiter::new(
        "vehicle-data",
        RateLimitConfig {
            permits: config.rate_limit_permits,
            window: config.rate_limit_window(),
        },
    ));
    let enricher = Arc::new(RowEnricher::new(api, Arc::new(TokenManager::new()), limiter));
    BatchOrchestrator::new(enricher, config.max_in_flight_rows)
}

/// Reads `input`, enriches every row and writes the report into `output_dir`.
///
/// Returns the report path and the number of data rows written.
pub async fn run_bulk_retail_check(
    config: &Config,
    input: &Path,
    output_dir: &Path,
) -> Result<(PathBuf, usize), EnrichError> {
    let http = http_client_from_config(config)?;
    let api: Arc<dyn VehicleDataApi> = Arc::new(AutoTraderClient::from_config(http, config)?);
    run_with_api(api, config, input, output_dir).await
}

/// Same as [`run_bulk_retail_check`] with a caller-supplied upstream.
pub async fn run_with_api(
    api: Arc<dyn VehicleDataApi>,
    config: &Config,
    input: &Path,
    output_dir: &Path,
) -> Result<(PathBuf, usize), EnrichError> {
    let rows = read_input_rows(input)?;
    info!("Loaded {} rows from {}", rows.len(), input.display());

    let orchestrator = build_orchestrator(api, config);
    let outcomes = orchestrator.process_rows(&rows).await;

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(output_file_name(RETAIL_OUTPUT_PREFIX, RETAIL_OUTPUT_TIMESTAMP));
    let written = ReportWriter::retail().write(&outcomes, &path)?;
    info!("Wrote {} of {} rows to {}", written, rows.len(), path.display());
    Ok((path, written))
}
