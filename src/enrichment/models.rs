use std::time::Duration;

/// Placeholder for a value the upstream could not supply.
pub const NOT_AVAILABLE: &str = "N/A";

pub const RETAIL_REPORT_HEADER: [&str; 9] = [
    "Description",
    "VRM",
    "Mileage",
    "Retail Valuation",
    "Rating",
    "Days to sell",
    "Market Condition",
    "National Competitors",
    "Factory Fitted Features",
];

/// One line of the input file. Its position in the file is its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    pub vrm: String,
    pub mileage: String,
    /// The full input record, kept for failure diagnostics.
    pub raw: Vec<String>,
}

impl InputRow {
    pub fn new(vrm: impl Into<String>, mileage: impl Into<String>) -> Self {
        let vrm = vrm.into();
        let mileage = mileage.into();
        Self {
            raw: vec![vrm.clone(), mileage.clone()],
            vrm,
            mileage,
        }
    }
}

/// What the vehicle lookup told us about one registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleInfo {
    pub make: String,
    pub model: String,
    pub derivative: String,
    pub derivative_id: String,
    pub first_registration_date: String,
    pub market_condition: String,
    pub rating: String,
    pub days_to_sell: String,
    pub factory_fitted_features: Vec<String>,
}

/// Stages of the per-row call chain, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnrichStage {
    Start,
    TokenValid,
    VehicleFetched,
    ValuationFetched,
    CompetitorsFetched,
}

impl std::fmt::Display for EnrichStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EnrichStage::Start => "start",
            EnrichStage::TokenValid => "token",
            EnrichStage::VehicleFetched => "vehicle lookup",
            EnrichStage::ValuationFetched => "valuation",
            EnrichStage::CompetitorsFetched => "competitor count",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetailRecord {
    pub description: String,
    pub vrm: String,
    pub mileage: String,
    pub retail_valuation: String,
    pub rating: String,
    pub days_to_sell: String,
    pub market_condition: String,
    pub national_competitors: String,
    pub factory_fitted_features: String,
}

impl RetailRecord {
    /// Field values in report column order.
    pub fn into_fields(self) -> Vec<String> {
        vec![
            self.description,
            self.vrm,
            self.mileage,
            self.retail_valuation,
            self.rating,
            self.days_to_sell,
            self.market_condition,
            self.national_competitors,
            self.factory_fitted_features,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowResult {
    pub index: usize,
    pub fields: Vec<String>,
    pub message: String,
    pub elapsed: Duration,
}

/// A processed row. `result` is `None` when the row failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome {
    pub index: usize,
    pub result: Option<RowResult>,
}

impl RowOutcome {
    pub fn failed(index: usize) -> Self {
        Self { index, result: None }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}
