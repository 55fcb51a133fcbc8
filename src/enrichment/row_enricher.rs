// src/enrichment/row_enricher.rs
//! Chained upstream calls for one input row.
//!
//! token -> vehicle lookup -> valuation -> competitor count. Only token, transport,
//! 429-on-lookup and wrong-shape failures abandon the row; the other non-200 replies
//! degrade the affected fields and processing continues.

use crate::{
    api::{
        types::{
            decode_object, mileage_value, value_to_field, StockSearchResponse,
            ValuationFeature, ValuationRequest, ValuationResponse, ValuationVehicle,
            VehicleLookupResponse,
        },
        RateLimiter, TokenManager, VehicleDataApi,
    },
    enrichment::{
        extract::{competitor_link, normalize_competitor_link},
        models::{
            EnrichStage, InputRow, RetailRecord, RowOutcome, RowResult, VehicleInfo, NOT_AVAILABLE,
        },
    },
    error::EnrichError,
    utils::timing::Timer,
};
use log::{error, info, warn};
use std::sync::Arc;

pub struct RowEnricher {
    api: Arc<dyn VehicleDataApi>,
    tokens: Arc<TokenManager>,
    limiter: Arc<RateLimiter>,
}

impl RowEnricher {
    pub fn new(api: Arc<dyn VehicleDataApi>, tokens: Arc<TokenManager>, limiter: Arc<RateLimiter>) -> Self {
        Self { api, tokens, limiter }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Processes one row. Never fails: errors are logged here and turn into an
    /// outcome without a result.
    pub async fn enrich(&self, index: usize, total: usize, row: &InputRow) -> RowOutcome {
        let mut timer = Timer::start(format!("row {} ({})", index + 1, row.vrm));
        let mut stage = EnrichStage::Start;

        match self.run_stages(row, &mut stage, &mut timer).await {
            Ok(record) => {
                let elapsed = timer.finish();
                RowOutcome {
                    index,
                    result: Some(RowResult {
                        index,
                        fields: record.into_fields(),
                        message: format!("Processing row {} of {} - VRM: {}", index + 1, total, row.vrm),
                        elapsed,
                    }),
                }
            }
            Err(err) => {
                log_row_failure(index, row, stage, &err);
                RowOutcome::failed(index)
            }
        }
    }

    async fn run_stages(
        &self,
        row: &InputRow,
        stage: &mut EnrichStage,
        timer: &mut Timer,
    ) -> Result<RetailRecord, EnrichError> {
        let token = self.tokens.ensure_valid_token(self.api.as_ref()).await?;
        *stage = EnrichStage::TokenValid;
        timer.checkpoint("token");

        let (vehicle, link) = self.fetch_vehicle(&token, row).await?;
        *stage = EnrichStage::VehicleFetched;
        timer.checkpoint("vehicle");

        let retail_valuation = self.fetch_valuation(&token, row, &vehicle).await?;
        *stage = EnrichStage::ValuationFetched;
        timer.checkpoint("valuation");

        let national_competitors = match link {
            Some(link) => self.fetch_competitor_count(&token, &row.vrm, &link).await?,
            None => NOT_AVAILABLE.to_string(),
        };
        *stage = EnrichStage::CompetitorsFetched;
        timer.checkpoint("competitors");

        Ok(RetailRecord {
            description: vehicle.description(),
            vrm: row.vrm.clone(),
            mileage: row.mileage.clone(),
            retail_valuation,
            rating: vehicle.rating,
            days_to_sell: vehicle.days_to_sell,
            market_condition: vehicle.market_condition,
            national_competitors,
            factory_fitted_features: vehicle.factory_fitted_features.join(", "),
        })
    }

    async fn fetch_vehicle(
        &self,
        token: &str,
        row: &InputRow,
    ) -> Result<(VehicleInfo, Option<String>), EnrichError> {
        self.limiter.acquire_permit().await;
        let response = self.api.lookup_vehicle(token, &row.vrm, &row.mileage).await?;

        match response.status {
            200 => {
                let lookup: VehicleLookupResponse = decode_object("vehicles", &response.body)?;
                info!("VRM {}: Vehicles API call succeeded", row.vrm);
                Ok((VehicleInfo::from_lookup(&lookup), competitor_link(&lookup)))
            }
            429 => Err(EnrichError::RateLimitExceeded { endpoint: "vehicles" }),
            status => {
                error!(
                    "VRM {}: Vehicles API call failed with status {} and response: {}",
                    row.vrm, status, response.body
                );
                Ok((VehicleInfo::default(), None))
            }
        }
    }

    /// Retail amount, `N/A` when the reply has none, or empty when the call failed.
    async fn fetch_valuation(
        &self,
        token: &str,
        row: &InputRow,
        vehicle: &VehicleInfo,
    ) -> Result<String, EnrichError> {
        let request = ValuationRequest {
            vehicle: ValuationVehicle {
                derivative_id: vehicle.derivative_id.clone(),
                first_registration_date: vehicle.first_registration_date.clone(),
                odometer_reading_miles: mileage_value(&row.mileage),
            },
            features: vehicle
                .factory_fitted_features
                .iter()
                .map(|name| ValuationFeature { name: name.clone() })
                .collect(),
        };

        self.limiter.acquire_permit().await;
        let response = self.api.value_vehicle(token, &request).await?;

        if !response.is_success() {
            error!(
                "VRM {}: Valuations API call failed with status code: {} and response body: {}",
                row.vrm, response.status, response.body
            );
            return Ok(String::new());
        }

        let valuation: ValuationResponse = decode_object("valuations", &response.body)?;
        Ok(valuation
            .valuations
            .retail
            .amount_gbp
            .as_ref()
            .map(value_to_field)
            .filter(|amount| !amount.is_empty())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()))
    }

    /// The competitor-stock link is not rate limited.
    async fn fetch_competitor_count(&self, token: &str, vrm: &str, link: &str) -> Result<String, EnrichError> {
        let url = match normalize_competitor_link(link, self.api.advertiser_id()) {
            Ok(url) => url,
            Err(e) => {
                warn!("VRM {}: unusable competitor link {:?}: {}", vrm, link, e);
                return Ok(NOT_AVAILABLE.to_string());
            }
        };

        let response = self.api.count_competitors(token, &url).await?;
        if !response.is_success() {
            warn!("VRM {}: competitor count returned status {}", vrm, response.status);
            return Ok(NOT_AVAILABLE.to_string());
        }

        let stock: StockSearchResponse = decode_object("stock", &response.body)?;
        Ok(stock
            .total_results
            .as_ref()
            .map(value_to_field)
            .filter(|count| !count.is_empty())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()))
    }
}

fn log_row_failure(index: usize, row: &InputRow, stage: EnrichStage, err: &EnrichError) {
    match err {
        EnrichError::MalformedResponse { endpoint, detail } => {
            error!(
                "VRM {}: unexpected {} response shape after {} stage (row {}): {}",
                row.vrm,
                endpoint,
                stage,
                index + 1,
                detail
            );
            error!("VRM {}: Row Data: {:?}", row.vrm, row.raw);
        }
        EnrichError::RateLimitExceeded { endpoint } => {
            error!("VRM {}: Rate limit exceeded for {} API call, row skipped", row.vrm, endpoint);
        }
        other => {
            error!(
                "VRM {}: {} error processing row {} {:?} after {} stage: {}",
                row.vrm,
                other.kind(),
                index + 1,
                row.raw,
                stage,
                other
            );
        }
    }
}
