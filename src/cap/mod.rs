// src/cap/mod.rs
//! CAP valuation lookup: a monthly VRM valuation whose CAPID and registration date
//! feed a live valuation call. No token or rate-limit coordination.

use crate::{
    config::Config,
    enrichment::models::InputRow,
    error::EnrichError,
    report::{output_file_name, read_input_rows, write_csv},
    utils::timing::Timer,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use reqwest::Client;
use roxmltree::Document;
use std::path::{Path, PathBuf};

pub const VRM_NAMESPACE: &str = "https://soap.cap.co.uk/vrm";
pub const LIVE_NAMESPACE: &str = "https://soap.cap.co.uk/usedvalueslive";
pub const NOT_FOUND: &str = "Not Found";
pub const CAP_OUTPUT_PREFIX: &str = "CAP_VRM_Output";
pub const CAP_OUTPUT_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

pub const CAP_REPORT_HEADER: [&str; 33] = [
    "VRM", "Unused1", "CAPMan", "CAPMod", "CAPDer", "RegisteredDate", "CAPID", "Mileage",
    "Unused2", "Unused3", "Unused4", "Unused5", "Unused6", "Unused7", "Unused8", "Unused9",
    "Monthly_Clean", "Unused10", "Unused11", "Monthly_Retail", "Unused12", "Unused13",
    "Unused14", "Database", "Unused16", "Unused17", "Unused18", "Unused19", "Unused20",
    "Live_Clean", "Unused21", "Unused22", "Live_Retail",
];

#[async_trait]
pub trait CapApi: Send + Sync {
    /// Monthly valuation XML for a registration.
    async fn vrm_valuation(&self, vrm: &str, mileage: u64) -> Result<String, EnrichError>;

    /// Live valuation XML. `reg_date` is `YYYY-MM-DD`.
    async fn live_valuation(&self, capid: &str, reg_date: &str, mileage: u64) -> Result<String, EnrichError>;
}

pub struct CapClient {
    http: Client,
    vrm_url: String,
    live_url: String,
    subscriber_id: String,
    password: String,
}

impl CapClient {
    pub fn new(
        http: Client,
        vrm_url: impl Into<String>,
        live_url: impl Into<String>,
        subscriber_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http,
            vrm_url: vrm_url.into(),
            live_url: live_url.into(),
            subscriber_id: subscriber_id.into(),
            password: password.into(),
        }
    }

    pub fn from_config(http: Client, config: &Config) -> Result<Self, EnrichError> {
        let (subscriber_id, password) = config.require_cap()?;
        Ok(Self::new(
            http,
            config.cap_vrm_url.clone(),
            config.cap_live_url.clone(),
            subscriber_id,
            password,
        ))
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, EnrichError> {
        let response = self.http.post(url).form(form).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if status != 200 {
            debug!("CAP call to {} returned status {}", url, status);
        }
        Ok(body)
    }
}

#[async_trait]
impl CapApi for CapClient {
    async fn vrm_valuation(&self, vrm: &str, mileage: u64) -> Result<String, EnrichError> {
        let mileage = mileage.to_string();
        self.post_form(
            &self.vrm_url,
            &[
                ("SubscriberID", self.subscriber_id.as_str()),
                ("Password", self.password.as_str()),
                ("VRM", vrm),
                ("Mileage", mileage.as_str()),
                ("StandardEquipmentRequired", "false"),
            ],
        )
        .await
    }

    async fn live_valuation(&self, capid: &str, reg_date: &str, mileage: u64) -> Result<String, EnrichError> {
        let mileage = mileage.to_string();
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        self.post_form(
            &self.live_url,
            &[
                ("subscriberId", self.subscriber_id.as_str()),
                ("password", self.password.as_str()),
                ("database", "CAR"),
                ("capid", capid),
                ("valuationDate", today.as_str()),
                ("regDate", reg_date),
                ("mileage", mileage.as_str()),
            ],
        )
        .await
    }
}

/// Nearest thousand, halves rounded up.
pub fn round_mileage(raw: &str) -> Result<u64, EnrichError> {
    let miles: u64 = raw
        .trim()
        .parse()
        .map_err(|_| EnrichError::Csv(format!("mileage {:?} is not a whole number", raw)))?;
    let rounded = miles
        .checked_add(500)
        .ok_or_else(|| EnrichError::Csv(format!("mileage {:?} is out of range", raw)))?;
    Ok(rounded / 1000 * 1000)
}

/// Monthly valuation fields. Absent elements hold `Not Found`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyValues {
    pub database: String,
    pub capid: String,
    pub cap_man: String,
    pub cap_range: String,
    pub cap_mod: String,
    pub cap_der: String,
    pub clean: String,
    pub retail: String,
    /// `DD/MM/YYYY`, or `Not Found`.
    pub registered_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveValues {
    pub clean: String,
    pub retail: String,
}

fn parse_xml<'a>(endpoint: &'static str, body: &'a str) -> Result<Document<'a>, EnrichError> {
    Document::parse(body).map_err(|e| EnrichError::malformed(endpoint, e))
}

/// Text of the first `path[0]/path[1]/...` element chain anywhere in `doc`.
fn find_text(doc: &Document, ns: &str, path: &[&str]) -> Option<String> {
    let (first, rest) = path.split_first()?;
    doc.descendants()
        .filter(|node| node.has_tag_name((ns, *first)))
        .find_map(|start| {
            rest.iter()
                .try_fold(start, |node, name| node.children().find(|c| c.has_tag_name((ns, *name))))
        })
        .map(|node| node.text().unwrap_or("").to_string())
}

fn text_or_not_found(doc: &Document, ns: &str, path: &[&str]) -> String {
    find_text(doc, ns, path).unwrap_or_else(|| NOT_FOUND.to_string())
}

pub fn parse_monthly_values(body: &str) -> Result<MonthlyValues, EnrichError> {
    let doc = parse_xml("cap-vrm", body)?;
    let lookup = |name: &str| text_or_not_found(&doc, VRM_NAMESPACE, &["VRMLookup", name]);

    let registered_date = match find_text(&doc, VRM_NAMESPACE, &["VRMLookup", "RegisteredDate"]) {
        Some(raw) if !raw.trim().is_empty() => NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| EnrichError::malformed("cap-vrm", format!("RegisteredDate {:?}: {}", raw, e)))?
            .format("%d/%m/%Y")
            .to_string(),
        _ => NOT_FOUND.to_string(),
    };

    Ok(MonthlyValues {
        database: lookup("Database"),
        capid: lookup("CAPID"),
        cap_man: lookup("CAPMan"),
        cap_range: lookup("CAPRange"),
        cap_mod: lookup("CAPMod"),
        cap_der: lookup("CAPDer"),
        clean: text_or_not_found(&doc, VRM_NAMESPACE, &["Valuation", "Clean"]),
        retail: text_or_not_found(&doc, VRM_NAMESPACE, &["Valuation", "Retail"]),
        registered_date,
    })
}

pub fn parse_live_values(body: &str) -> Result<LiveValues, EnrichError> {
    let doc = parse_xml("cap-live", body)?;
    let valuation = |name: &str| {
        text_or_not_found(
            &doc,
            LIVE_NAMESPACE,
            &["ValuationDate", "Valuations", "Valuation", name],
        )
    };
    Ok(LiveValues {
        clean: valuation("Clean"),
        retail: valuation("Retail"),
    })
}

/// `DD/MM/YYYY` to `YYYY-MM-DD`.
fn live_reg_date(display_date: &str) -> Option<String> {
    chrono::NaiveDate::parse_from_str(display_date, "%d/%m/%Y")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// One line of the CAP report, in `CAP_REPORT_HEADER` order.
pub fn cap_record(row: &InputRow, monthly: &MonthlyValues, live: &LiveValues) -> Vec<String> {
    let mut fields = vec![String::new(); CAP_REPORT_HEADER.len()];
    let mut set = |column: &str, value: &str| {
        if let Some(idx) = CAP_REPORT_HEADER.iter().position(|h| *h == column) {
            fields[idx] = value.to_string();
        }
    };
    set("VRM", &row.vrm);
    set("CAPMan", &monthly.cap_man);
    set("CAPMod", &monthly.cap_mod);
    set("CAPDer", &monthly.cap_der);
    set("RegisteredDate", &monthly.registered_date);
    set("CAPID", &monthly.capid);
    set("Mileage", &row.mileage);
    set("Monthly_Clean", &monthly.clean);
    set("Monthly_Retail", &monthly.retail);
    set("Database", &monthly.database);
    set("Live_Clean", &live.clean);
    set("Live_Retail", &live.retail);
    fields
}

async fn value_row(api: &dyn CapApi, row: &InputRow) -> Result<Vec<String>, EnrichError> {
    let mut timer = Timer::start(format!("CAP {}", row.vrm));
    let mileage = round_mileage(&row.mileage)?;

    let monthly = parse_monthly_values(&api.vrm_valuation(&row.vrm, mileage).await?)?;
    timer.checkpoint("monthly");
    if monthly.capid == NOT_FOUND {
        error!("VRM {}: CAPID not found in monthly valuation", row.vrm);
    }

    let reg_date = live_reg_date(&monthly.registered_date).ok_or_else(|| {
        EnrichError::malformed("cap-vrm", format!("Invalid date format for VRM {}", row.vrm))
    })?;
    let live = parse_live_values(&api.live_valuation(&monthly.capid, &reg_date, mileage).await?)?;
    timer.checkpoint("live");
    timer.finish();

    Ok(cap_record(row, &monthly, &live))
}

/// Values every row with at most `max_in_flight` rows outstanding. Failed rows are
/// logged and left out; the rest come back in input order.
pub async fn process_cap_rows(api: &dyn CapApi, rows: &[InputRow], max_in_flight: usize) -> Vec<Vec<String>> {
    let mut results: Vec<(usize, Vec<String>)> = stream::iter(rows.iter().enumerate())
        .map(|(index, row)| async move {
            match value_row(api, row).await {
                Ok(record) => Some((index, record)),
                Err(e) => {
                    error!("VRM {}: {} error in CAP lookup: {}", row.vrm, e.kind(), e);
                    None
                }
            }
        })
        .buffer_unordered(max_in_flight.max(1))
        .filter_map(|result| async move { result })
        .collect()
        .await;

    results.sort_by_key(|(index, _)| *index);
    info!("CAP lookup finished: {} of {} rows valued", results.len(), rows.len());
    results.into_iter().map(|(_, record)| record).collect()
}

/// Reads `input`, values every row and writes the 33-column report.
pub async fn run_cap_lookup(config: &Config, input: &Path, output_dir: &Path) -> Result<(PathBuf, usize), EnrichError> {
    let http = crate::api::http_client_from_config(config)?;
    let api = CapClient::from_config(http, config)?;
    let rows = read_input_rows(input)?;
    info!("Loaded {} rows from {}", rows.len(), input.display());

    let records = process_cap_rows(&api, &rows, config.max_in_flight_rows).await;

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(output_file_name(CAP_OUTPUT_PREFIX, CAP_OUTPUT_TIMESTAMP));
    let written = write_csv(&path, &CAP_REPORT_HEADER, &records)?;
    Ok((path, written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MONTHLY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<VRMValuation xmlns="https://soap.cap.co.uk/vrm">
  <Success>true</Success>
  <VRMLookup>
    <Database>CAR</Database>
    <CAPID>81234</CAPID>
    <CAPMan>FORD</CAPMan>
    <CAPRange>FOCUS</CAPRange>
    <CAPMod>FOCUS HATCHBACK</CAPMod>
    <CAPDer>1.0 EcoBoost Titanium 5dr</CAPDer>
    <RegisteredDate>2019-03-01T00:00:00</RegisteredDate>
  </VRMLookup>
  <Valuation>
    <Clean>9875</Clean>
    <Retail>11250</Retail>
  </Valuation>
</VRMValuation>"#;

    const LIVE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<UsedLive xmlns="https://soap.cap.co.uk/usedvalueslive">
  <ValuationDate>
    <Valuations>
      <Valuation><Clean>9700</Clean><Retail>11100</Retail></Valuation>
    </Valuations>
  </ValuationDate>
</UsedLive>"#;

    #[test]
    fn mileage_rounds_to_nearest_thousand() {
        assert_eq!(round_mileage("0").unwrap(), 0);
        assert_eq!(round_mileage("1499").unwrap(), 1000);
        assert_eq!(round_mileage(" 1500 ").unwrap(), 2000);
        assert_eq!(round_mileage("42380").unwrap(), 42000);
        assert!(round_mileage("lots").is_err());
        assert_eq!(round_mileage("18446744073709551115").unwrap(), 18446744073709551000);
        assert!(round_mileage(&u64::MAX.to_string()).is_err());
    }

    #[test]
    fn monthly_values_are_read_from_namespace() {
        let values = parse_monthly_values(MONTHLY).unwrap();
        assert_eq!(values.capid, "81234");
        assert_eq!(values.cap_der, "1.0 EcoBoost Titanium 5dr");
        assert_eq!(values.clean, "9875");
        assert_eq!(values.retail, "11250");
        assert_eq!(values.registered_date, "01/03/2019");
    }

    #[test]
    fn absent_elements_are_not_found() {
        let values = parse_monthly_values(r#"<VRMValuation xmlns="https://soap.cap.co.uk/vrm"/>"#).unwrap();
        assert_eq!(values.capid, NOT_FOUND);
        assert_eq!(values.registered_date, NOT_FOUND);

        // Same element names outside the namespace do not count.
        let live = parse_live_values("<ValuationDate><Valuations><Valuation><Clean>1</Clean></Valuation></Valuations></ValuationDate>").unwrap();
        assert_eq!(live.clean, NOT_FOUND);
    }

    #[test]
    fn malformed_xml_is_a_malformed_response() {
        assert!(parse_live_values("<not closed").unwrap_err().is_malformed());
    }

    #[test]
    fn record_places_values_in_their_columns() {
        let row = InputRow::new("AB12CDE", "42380");
        let record = cap_record(
            &row,
            &parse_monthly_values(MONTHLY).unwrap(),
            &parse_live_values(LIVE).unwrap(),
        );
        assert_eq!(record.len(), 33);
        assert_eq!(record[0], "AB12CDE");
        assert_eq!(record[1], "");
        assert_eq!(record[6], "81234");
        assert_eq!(record[7], "42380");
        assert_eq!(record[16], "9875");
        assert_eq!(record[19], "11250");
        assert_eq!(record[23], "CAR");
        assert_eq!(record[29], "9700");
        assert_eq!(record[32], "11100");
    }
}
