use crate::error::EnrichError;
use std::env;
use std::time::Duration;

pub const DEFAULT_AUTOTRADER_BASE_URL: &str = "https://api.autotrader.co.uk";
pub const DEFAULT_MOT_API_URL: &str = "https://beta.check-mot.service.gov.uk/trade/vehicles/mot-tests";
pub const DEFAULT_CAP_VRM_URL: &str = "https://soap.cap.co.uk/vrm/capvrm.asmx/VRMValuation";
pub const DEFAULT_CAP_LIVE_URL: &str =
    "https://soap.cap.co.uk/usedvalueslive/capusedvalueslive.asmx/GetUsedLive_IdRegDateMileage";

#[derive(Clone)]
pub struct Config {
    pub autotrader_key: Option<String>,
    pub autotrader_secret: Option<String>,
    pub advertiser_id: Option<String>,
    pub autotrader_base_url: String,
    pub rate_limit_permits: usize,
    pub rate_limit_window_ms: u64,
    pub http_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_in_flight_rows: usize,
    pub output_dir: String,
    pub log_level: String,
    pub mot_api_key: Option<String>,
    pub mot_api_url: String,
    pub cap_subscriber_id: Option<String>,
    pub cap_password: Option<String>,
    pub cap_vrm_url: String,
    pub cap_live_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            autotrader_key: non_empty_var("AUTOTRADER_KEY"),
            autotrader_secret: non_empty_var("AUTOTRADER_SECRET"),
            advertiser_id: non_empty_var("AUTOTRADER_ADVERTISER_ID"),
            autotrader_base_url: env::var("AUTOTRADER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_AUTOTRADER_BASE_URL.to_string()),
            rate_limit_permits: env::var("RATE_LIMIT_PERMITS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            rate_limit_window_ms: env::var("RATE_LIMIT_WINDOW_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            max_in_flight_rows: env::var("MAX_IN_FLIGHT_ROWS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            output_dir: env::var("OUTPUT_DIR").unwrap_or_else(|_| "output_files".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            mot_api_key: non_empty_var("MOT_API_KEY"),
            mot_api_url: env::var("MOT_API_URL").unwrap_or_else(|_| DEFAULT_MOT_API_URL.to_string()),
            cap_subscriber_id: non_empty_var("CAP_SUBSCRIBER_ID"),
            cap_password: non_empty_var("CAP_PASSWORD"),
            cap_vrm_url: env::var("CAP_VRM_URL").unwrap_or_else(|_| DEFAULT_CAP_VRM_URL.to_string()),
            cap_live_url: env::var("CAP_LIVE_URL").unwrap_or_else(|_| DEFAULT_CAP_LIVE_URL.to_string()),
        }
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), EnrichError> {
        if self.rate_limit_permits == 0 {
            return Err(EnrichError::Config("RATE_LIMIT_PERMITS must be at least 1".to_string()));
        }
        if self.rate_limit_window_ms == 0 {
            return Err(EnrichError::Config("RATE_LIMIT_WINDOW_MS must be at least 1".to_string()));
        }
        if self.autotrader_base_url.is_empty() {
            return Err(EnrichError::Config("AUTOTRADER_BASE_URL cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Credentials for the bulk retail check, in (key, secret, advertiser id) order.
    pub fn require_autotrader(&self) -> Result<(String, String, String), EnrichError> {
        Ok((
            required(&self.autotrader_key, "AUTOTRADER_KEY")?,
            required(&self.autotrader_secret, "AUTOTRADER_SECRET")?,
            required(&self.advertiser_id, "AUTOTRADER_ADVERTISER_ID")?,
        ))
    }

    pub fn require_mot(&self) -> Result<String, EnrichError> {
        required(&self.mot_api_key, "MOT_API_KEY")
    }

    pub fn require_cap(&self) -> Result<(String, String), EnrichError> {
        Ok((
            required(&self.cap_subscriber_id, "CAP_SUBSCRIBER_ID")?,
            required(&self.cap_password, "CAP_PASSWORD")?,
        ))
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
    }

    pub fn test_default() -> Self {
        Self {
            autotrader_key: Some("test-key".to_string()),
            autotrader_secret: Some("test-secret".to_string()),
            advertiser_id: Some("10001".to_string()),
            autotrader_base_url: "http://localhost:8080".to_string(),
            rate_limit_permits: 10,
            rate_limit_window_ms: 1000,
            http_timeout_secs: 60,
            request_timeout_secs: 10,
            max_in_flight_rows: 8,
            output_dir: "output_files".to_string(),
            log_level: "debug".to_string(),
            mot_api_key: Some("mot-key".to_string()),
            mot_api_url: "http://localhost:8081/mot-tests".to_string(),
            cap_subscriber_id: Some("123".to_string()),
            cap_password: Some("cap-pass".to_string()),
            cap_vrm_url: "http://localhost:8082/VRMValuation".to_string(),
            cap_live_url: "http://localhost:8082/GetUsedLive".to_string(),
        }
    }
}

// Secrets are masked so the config can be logged at startup.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(v: &Option<String>) -> &'static str {
            if v.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Config")
            .field("autotrader_key", &mask(&self.autotrader_key))
            .field("autotrader_secret", &mask(&self.autotrader_secret))
            .field("advertiser_id", &self.advertiser_id)
            .field("autotrader_base_url", &self.autotrader_base_url)
            .field("rate_limit_permits", &self.rate_limit_permits)
            .field("rate_limit_window_ms", &self.rate_limit_window_ms)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_in_flight_rows", &self.max_in_flight_rows)
            .field("output_dir", &self.output_dir)
            .field("log_level", &self.log_level)
            .field("mot_api_key", &mask(&self.mot_api_key))
            .field("mot_api_url", &self.mot_api_url)
            .field("cap_subscriber_id", &mask(&self.cap_subscriber_id))
            .field("cap_password", &mask(&self.cap_password))
            .field("cap_vrm_url", &self.cap_vrm_url)
            .field("cap_live_url", &self.cap_live_url)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(value: &Option<String>, name: &str) -> Result<String, EnrichError> {
    value
        .clone()
        .ok_or_else(|| EnrichError::Config(format!("{} must be set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_name_the_variable() {
        let mut config = Config::test_default();
        config.autotrader_secret = None;
        let err = config.require_autotrader().unwrap_err();
        assert_eq!(err.to_string(), "Config Error: AUTOTRADER_SECRET must be set");
    }

    #[test]
    fn zero_permit_rate_limit_is_rejected() {
        let mut config = Config::test_default();
        config.rate_limit_permits = 0;
        assert!(config.validate().is_err());
        assert!(Config::test_default().validate().is_ok());
    }

    #[test]
    fn debug_output_masks_secrets() {
        let rendered = format!("{:?}", Config::test_default());
        assert!(!rendered.contains("test-secret"));
        assert!(!rendered.contains("cap-pass"));
        assert!(rendered.contains("<set>"));
    }
}
