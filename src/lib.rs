pub mod api;
pub mod cap; // CAP monthly + live valuations
pub mod config;
pub mod enrichment;
pub mod error;
pub mod mot; // DVSA MOT history
pub mod report;
pub mod utils;

// Re-export the batch entry points for the binary and integration tests
pub use enrichment::{
    run_bulk_retail_check, run_with_api, BatchOrchestrator, BatchProgress, InputRow, RowEnricher,
    RowOutcome, RowResult,
};
pub use error::EnrichError;
pub use report::{read_input_rows, ReportWriter};
