// src/mot/mod.rs
//! MOT history lookup: one sequential call per registration, no token or rate limit.

use crate::{
    api::types::value_to_field,
    config::Config,
    enrichment::progress::BatchProgress,
    error::EnrichError,
    report::{output_file_name, read_vrm_column, write_csv},
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use log::{error, info, warn};
use reqwest::Client;
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    time::Instant,
};

pub const MOT_REPORT_HEADER: [&str; 4] = [
    "Registration",
    "Most Recent MOT Test Date",
    "Most Recent MOT Expiry Date",
    "MOT Mileage",
];
pub const MOT_OUTPUT_PREFIX: &str = "MOT_Output";
pub const MOT_OUTPUT_TIMESTAMP: &str = "%Y%m%d_%H%M";

#[async_trait]
pub trait MotApi: Send + Sync {
    /// Decoded MOT history, or `None` when the service did not answer 200.
    async fn fetch_mot_history(&self, registration: &str) -> Result<Option<Value>, EnrichError>;
}

pub struct DvsaMotClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl DvsaMotClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(http: Client, config: &Config) -> Result<Self, EnrichError> {
        Ok(Self::new(http, config.mot_api_url.clone(), config.require_mot()?))
    }
}

#[async_trait]
impl MotApi for DvsaMotClient {
    async fn fetch_mot_history(&self, registration: &str) -> Result<Option<Value>, EnrichError> {
        let response = self
            .http
            .get(self.base_url.as_str())
            .query(&[("registration", registration)])
            .header("Content-type", "application/json")
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            warn!("VRM {}: MOT history request returned status {}", registration, status);
            return Ok(None);
        }
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| EnrichError::malformed("mot-tests", e))
    }
}

/// `YYYY.MM.DD` or `YYYY.MM.DD HH:MM:SS` as `DD/MM/YYYY`; anything else is empty.
pub fn convert_mot_date(raw: &str) -> String {
    let parsed = if raw.contains(' ') {
        NaiveDateTime::parse_from_str(raw, "%Y.%m.%d %H:%M:%S").map(|dt| dt.date())
    } else {
        NaiveDate::parse_from_str(raw, "%Y.%m.%d")
    };
    parsed
        .map(|date| date.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

/// Report line for one registration from its MOT history. The first vehicle's first
/// test is taken as the most recent.
pub fn mot_record(registration: &str, history: Option<&Value>) -> Vec<String> {
    let latest = history
        .and_then(|h| h.get(0))
        .and_then(|vehicle| vehicle.get("motTests"))
        .and_then(|tests| tests.get(0));

    match latest {
        Some(test) => {
            let text = |key: &str| test.get(key).map(value_to_field).unwrap_or_default();
            vec![
                registration.to_string(),
                convert_mot_date(&text("completedDate")),
                convert_mot_date(&text("expiryDate")),
                text("odometerValue"),
            ]
        }
        None => vec![registration.to_string(), String::new(), String::new(), String::new()],
    }
}

/// Looks up every registration in order. Every registration gets a line, blank when
/// no history was found or the call failed. `on_progress` runs after each one.
pub async fn process_mot_checks<F>(api: &dyn MotApi, vrms: &[String], mut on_progress: F) -> Vec<Vec<String>>
where
    F: FnMut(&BatchProgress),
{
    let started = Instant::now();
    let mut progress = BatchProgress::new(vrms.len());
    let mut records = Vec::with_capacity(vrms.len());

    for vrm in vrms {
        let registration = vrm.trim();
        let (history, success) = match api.fetch_mot_history(registration).await {
            Ok(history) => {
                let found = history.is_some();
                (history, found)
            }
            Err(e) => {
                error!("VRM {}: {} error fetching MOT history: {}", registration, e.kind(), e);
                (None, false)
            }
        };
        records.push(mot_record(registration, history.as_ref()));

        progress.record(success, started.elapsed());
        on_progress(&progress);
    }
    records
}

/// Reads the VRM column of `input`, runs the MOT checks and writes the report.
pub async fn run_mot_checks(config: &Config, input: &Path, output_dir: &Path) -> Result<(PathBuf, usize), EnrichError> {
    let http = crate::api::http_client_from_config(config)?;
    let api = DvsaMotClient::from_config(http, config)?;
    let vrms = read_vrm_column(input)?;
    info!("Loaded {} registrations from {}", vrms.len(), input.display());

    let records = process_mot_checks(&api, &vrms, |progress| info!("Progress: {}", progress)).await;

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(output_file_name(MOT_OUTPUT_PREFIX, MOT_OUTPUT_TIMESTAMP));
    let written = write_csv(&path, &MOT_REPORT_HEADER, &records)?;
    Ok((path, written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    struct FixedMot {
        replies: HashMap<&'static str, Value>,
    }

    #[async_trait]
    impl MotApi for FixedMot {
        async fn fetch_mot_history(&self, registration: &str) -> Result<Option<Value>, EnrichError> {
            if registration == "BROKEN" {
                return Err(EnrichError::Transport("connection reset".to_string()));
            }
            Ok(self.replies.get(registration).cloned())
        }
    }

    #[test]
    fn dates_are_rendered_day_first() {
        assert_eq!(convert_mot_date("2023.05.17"), "17/05/2023");
        assert_eq!(convert_mot_date("2023.05.17 14:02:11"), "17/05/2023");
        assert_eq!(convert_mot_date("2023-05-17"), "");
        assert_eq!(convert_mot_date(""), "");
    }

    #[test]
    fn record_uses_first_test_of_first_vehicle() {
        let history = json!([{
            "registration": "AB12CDE",
            "motTests": [
                {"completedDate": "2023.05.17 14:02:11", "expiryDate": "2024.05.16", "odometerValue": "48211"},
                {"completedDate": "2022.05.10 09:00:00", "expiryDate": "2023.05.16", "odometerValue": "40100"}
            ]
        }]);
        assert_eq!(
            mot_record("AB12CDE", Some(&history)),
            vec!["AB12CDE", "17/05/2023", "16/05/2024", "48211"]
        );
    }

    #[test]
    fn vehicle_without_tests_gets_blank_fields() {
        let history = json!([{"registration": "NEW1"}]);
        assert_eq!(mot_record("NEW1", Some(&history)), vec!["NEW1", "", "", ""]);
        assert_eq!(mot_record("NONE", None), vec!["NONE", "", "", ""]);
    }

    #[tokio::test]
    async fn every_registration_gets_a_line_and_progress() {
        let mut replies = HashMap::new();
        replies.insert(
            "AB12CDE",
            json!([{"motTests": [{"completedDate": "2023.05.17", "expiryDate": "2024.05.16", "odometerValue": 1000}]}]),
        );
        let api = FixedMot { replies };
        let vrms = vec![" AB12CDE ".to_string(), "BROKEN".to_string(), "UNKNOWN".to_string()];

        let mut seen = Vec::new();
        let records = process_mot_checks(&api, &vrms, |p| seen.push((p.processed, p.total))).await;

        assert_eq!(
            records,
            vec![
                vec!["AB12CDE", "17/05/2023", "16/05/2024", "1000"],
                vec!["BROKEN", "", "", ""],
                vec!["UNKNOWN", "", "", ""],
            ]
        );
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }
}
