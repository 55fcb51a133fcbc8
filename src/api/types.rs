//! Request and response bodies for the vehicle-data endpoints.
//!
//! Response structs are lenient: every field is optional so that a partially populated
//! body still decodes. Only a body of the wrong overall shape (for example a JSON array
//! where an object is expected) fails to decode.

use crate::error::EnrichError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw upstream reply, interpreted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VehicleLookupResponse {
    pub vehicle: VehicleSection,
    #[serde(rename = "vehicleMetrics")]
    pub vehicle_metrics: VehicleMetricsSection,
    /// Expected to be an array of objects; any other shape is ignored downstream.
    pub features: Option<Value>,
    pub links: LinksSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VehicleSection {
    pub make: Option<String>,
    pub model: Option<String>,
    pub derivative: Option<String>,
    pub derivative_id: Option<String>,
    pub first_registration_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VehicleMetricsSection {
    pub retail: RetailMetrics,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetailMetrics {
    pub market_condition: MetricValue,
    pub rating: MetricValue,
    pub days_to_sell: MetricValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricValue {
    pub value: Option<Value>,
}

impl MetricValue {
    pub fn display(&self) -> String {
        self.value.as_ref().map(value_to_field).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinksSection {
    pub competitors: Option<Link>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Link {
    pub href: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValuationRequest {
    pub vehicle: ValuationVehicle,
    pub features: Vec<ValuationFeature>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValuationVehicle {
    pub derivative_id: String,
    pub first_registration_date: String,
    pub odometer_reading_miles: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValuationFeature {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValuationResponse {
    pub valuations: ValuationSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValuationSection {
    pub retail: RetailValuation,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetailValuation {
    #[serde(rename = "amountGBP")]
    pub amount_gbp: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StockSearchResponse {
    #[serde(rename = "totalResults")]
    pub total_results: Option<Value>,
}

/// Decodes a body that must be a JSON object into `T`.
pub fn decode_object<T: serde::de::DeserializeOwned>(
    endpoint: &'static str,
    body: &str,
) -> Result<T, EnrichError> {
    let value: Value = serde_json::from_str(body).map_err(|e| EnrichError::malformed(endpoint, e))?;
    if !value.is_object() {
        let found = match &value {
            Value::Array(_) => "an array",
            Value::String(_) => "a string",
            Value::Number(_) => "a number",
            Value::Bool(_) => "a boolean",
            _ => "null",
        };
        return Err(EnrichError::malformed(
            endpoint,
            format!("expected a JSON object, found {}", found),
        ));
    }
    serde_json::from_value(value).map_err(|e| EnrichError::malformed(endpoint, e))
}

/// Renders a scalar JSON value as a report field (strings unquoted, null empty).
pub fn value_to_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Mileage is sent as a number when it parses, otherwise as the raw string.
pub fn mileage_value(mileage: &str) -> Value {
    let trimmed = mileage.trim();
    match trimmed.parse::<u64>() {
        Ok(miles) => Value::from(miles),
        Err(_) => Value::from(trimmed),
    }
}
