//! Pure reductions from upstream responses to report fields.

use crate::{
    api::types::VehicleLookupResponse,
    enrichment::models::VehicleInfo,
};
use serde_json::Value;
use url::Url;

pub const ADVERTISER_ID_PARAM: &str = "advertiserId";
pub const ADVERTISER_TYPE_PARAM: &str = "advertiserType";
pub const WRITE_OFF_FILTER_PARAM: &str = "!insuranceWriteoffCategory";
pub const TRADE_ADVERTISER_TYPE: &str = "Trade";

/// Joins the non-empty parts with single spaces.
pub fn concatenate_description(make: &str, model: &str, derivative: &str) -> String {
    [make, model, derivative]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Names of entries flagged `factoryFitted: true`, in the order they appear.
pub fn factory_fitted_names(features: &[Value]) -> Vec<String> {
    features
        .iter()
        .filter_map(Value::as_object)
        .filter(|feature| feature.get("factoryFitted").and_then(Value::as_bool) == Some(true))
        .filter_map(|feature| feature.get("name").and_then(Value::as_str))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

impl VehicleInfo {
    pub fn from_lookup(lookup: &VehicleLookupResponse) -> Self {
        let vehicle = &lookup.vehicle;
        let retail = &lookup.vehicle_metrics.retail;
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            make: text(&vehicle.make),
            model: text(&vehicle.model),
            derivative: text(&vehicle.derivative),
            derivative_id: text(&vehicle.derivative_id),
            first_registration_date: text(&vehicle.first_registration_date),
            market_condition: retail.market_condition.display(),
            rating: retail.rating.display(),
            days_to_sell: retail.days_to_sell.display(),
            factory_fitted_features: lookup
                .features
                .as_ref()
                .and_then(Value::as_array)
                .map(|features| factory_fitted_names(features))
                .unwrap_or_default(),
        }
    }

    pub fn description(&self) -> String {
        concatenate_description(&self.make, &self.model, &self.derivative)
    }
}

/// Competitor link from a lookup response, if one was supplied.
pub fn competitor_link(lookup: &VehicleLookupResponse) -> Option<String> {
    lookup
        .links
        .competitors
        .as_ref()
        .and_then(|link| link.href.clone())
        .filter(|href| !href.trim().is_empty())
}

/// Rewrites a competitor-stock link so that it carries `advertiserId`,
/// `advertiserType=Trade` and an empty write-off filter exactly once each.
///
/// An `advertiserId` already on the link is kept; otherwise `advertiser_id` is used.
/// Every other query parameter is preserved in its original order.
pub fn normalize_competitor_link(link: &str, advertiser_id: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(link.trim())?;

    let existing: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let advertiser = existing
        .iter()
        .find(|(key, value)| key == ADVERTISER_ID_PARAM && !value.is_empty())
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| advertiser_id.to_string());

    let managed = [ADVERTISER_ID_PARAM, ADVERTISER_TYPE_PARAM, WRITE_OFF_FILTER_PARAM];
    url.query_pairs_mut()
        .clear()
        .extend_pairs(existing.iter().filter(|(key, _)| !managed.contains(&key.as_str())))
        .append_pair(ADVERTISER_ID_PARAM, &advertiser)
        .append_pair(ADVERTISER_TYPE_PARAM, TRADE_ADVERTISER_TYPE)
        .append_pair(WRITE_OFF_FILTER_PARAM, "");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs().into_owned().collect()
    }

    fn count(url: &Url, key: &str) -> usize {
        url.query_pairs().filter(|(k, _)| k == key).count()
    }

    #[test]
    fn description_skips_empty_parts() {
        assert_eq!(concatenate_description("Ford", "", "Focus"), "Ford Focus");
        assert_eq!(concatenate_description("", "", ""), "");
        assert_eq!(concatenate_description(" Ford ", "Focus", " "), "Ford Focus");
        assert_eq!(
            concatenate_description("Ford", "Focus", "1.0 EcoBoost Titanium"),
            "Ford Focus 1.0 EcoBoost Titanium"
        );
    }

    #[test]
    fn only_factory_fitted_features_are_kept_in_order() {
        let features = vec![
            json!({"name": "Sat Nav", "factoryFitted": true}),
            json!({"name": "Tow Bar", "factoryFitted": false}),
            json!({"name": "Mats"}),
            json!("not an object"),
            json!({"name": " Heated Seats ", "factoryFitted": true}),
            json!({"name": "", "factoryFitted": true}),
            json!({"name": "Parking Sensors", "factoryFitted": true}),
        ];
        assert_eq!(
            factory_fitted_names(&features),
            vec!["Sat Nav", "Heated Seats", "Parking Sensors"]
        );
    }

    #[test]
    fn vehicle_info_reads_lookup_sections() {
        let lookup: VehicleLookupResponse = serde_json::from_value(json!({
            "vehicle": {
                "make": "Ford",
                "model": "Focus",
                "derivative": "Titanium",
                "derivativeId": "d-1",
                "firstRegistrationDate": "2019-03-01"
            },
            "vehicleMetrics": {"retail": {
                "marketCondition": {"value": 12.5},
                "rating": {"value": 81},
                "daysToSell": {"value": 23}
            }},
            "features": [{"name": "Sat Nav", "factoryFitted": true}],
            "links": {"competitors": {"href": "https://api.example.test/stock?x=1"}}
        }))
        .unwrap();

        let info = VehicleInfo::from_lookup(&lookup);
        assert_eq!(info.description(), "Ford Focus Titanium");
        assert_eq!(info.derivative_id, "d-1");
        assert_eq!(info.market_condition, "12.5");
        assert_eq!(info.rating, "81");
        assert_eq!(info.days_to_sell, "23");
        assert_eq!(info.factory_fitted_features, vec!["Sat Nav"]);
        assert_eq!(
            competitor_link(&lookup).as_deref(),
            Some("https://api.example.test/stock?x=1")
        );
    }

    #[test]
    fn link_without_query_gets_all_three_parameters() {
        let url = normalize_competitor_link("https://api.example.test/stock", "10001").unwrap();
        assert_eq!(
            pairs(&url),
            vec![
                ("advertiserId".to_string(), "10001".to_string()),
                ("advertiserType".to_string(), "Trade".to_string()),
                ("!insuranceWriteoffCategory".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn existing_parameters_are_kept_and_managed_ones_not_duplicated() {
        let link = "https://api.example.test/stock?searchType=competitor&advertiserId=555\
                    &advertiserType=Private&valuations=true&advertiserType=Trade";
        let url = normalize_competitor_link(link, "10001").unwrap();

        assert_eq!(count(&url, "advertiserId"), 1);
        assert_eq!(count(&url, "advertiserType"), 1);
        assert_eq!(count(&url, "!insuranceWriteoffCategory"), 1);
        assert_eq!(
            pairs(&url),
            vec![
                ("searchType".to_string(), "competitor".to_string()),
                ("valuations".to_string(), "true".to_string()),
                ("advertiserId".to_string(), "555".to_string()),
                ("advertiserType".to_string(), "Trade".to_string()),
                ("!insuranceWriteoffCategory".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let once = normalize_competitor_link("https://api.example.test/stock?a=b", "1").unwrap();
        let twice = normalize_competitor_link(once.as_str(), "2").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn relative_link_is_rejected() {
        assert!(normalize_competitor_link("/stock?a=b", "1").is_err());
    }
}
