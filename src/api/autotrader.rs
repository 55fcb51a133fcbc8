// src/api/autotrader.rs
//! Vehicle-data upstream: the trait the enrichment pipeline talks to, and its
//! reqwest-backed implementation.

use crate::{
    api::types::{AuthResponse, UpstreamResponse, ValuationRequest},
    config::Config,
    error::EnrichError,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use url::Url;

/// Token lifetime assumed when the auth response omits `expires_in`.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 900;

/// A bearer token and the instant it stops being usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Fails when `expires_in` puts the expiry outside the representable range.
    pub fn from_grant(value: String, expires_in: Option<i64>, now: DateTime<Utc>) -> Result<Self, EnrichError> {
        let ttl = expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let expires_at = ChronoDuration::try_seconds(ttl)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| EnrichError::malformed("authenticate", format!("expires_in {} is out of range", ttl)))?;
        Ok(Self { value, expires_at })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.value.is_empty() && now < self.expires_at
    }
}

#[async_trait]
pub trait VehicleDataApi: Send + Sync {
    /// Exchanges the configured credentials for a fresh token.
    async fn authenticate(&self) -> Result<AccessToken, EnrichError>;

    /// Vehicle attributes, retail metrics, features and competitor link in one call.
    async fn lookup_vehicle(
        &self,
        token: &str,
        vrm: &str,
        mileage: &str,
    ) -> Result<UpstreamResponse, EnrichError>;

    async fn value_vehicle(
        &self,
        token: &str,
        request: &ValuationRequest,
    ) -> Result<UpstreamResponse, EnrichError>;

    /// Follows a (normalized) competitor-stock link.
    async fn count_competitors(&self, token: &str, link: &Url) -> Result<UpstreamResponse, EnrichError>;

    fn advertiser_id(&self) -> &str;
}

#[derive(Clone)]
pub struct AutoTraderClient {
    http: Client,
    base_url: String,
    key: String,
    secret: String,
    advertiser_id: String,
    request_timeout: Duration,
}

impl AutoTraderClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        key: impl Into<String>,
        secret: impl Into<String>,
        advertiser_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            secret: secret.into(),
            advertiser_id: advertiser_id.into(),
            request_timeout,
        }
    }

    pub fn from_config(http: Client, config: &Config) -> Result<Self, EnrichError> {
        let (key, secret, advertiser_id) = config.require_autotrader()?;
        Ok(Self::new(
            http,
            config.autotrader_base_url.clone(),
            key,
            secret,
            advertiser_id,
            config.request_timeout(),
        ))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(request: RequestBuilder) -> Result<UpstreamResponse, EnrichError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(UpstreamResponse { status, body })
    }
}

#[async_trait]
impl VehicleDataApi for AutoTraderClient {
    async fn authenticate(&self) -> Result<AccessToken, EnrichError> {
        info!("Refreshing access token...");
        let response = Self::send(
            self.http
                .post(self.endpoint("authenticate"))
                .form(&[("key", self.key.as_str()), ("secret", self.secret.as_str())]),
        )
        .await?;

        if !response.is_success() {
            return Err(EnrichError::Auth {
                status: response.status,
                body: response.body,
            });
        }

        let grant: AuthResponse = serde_json::from_str(&response.body)
            .map_err(|e| EnrichError::malformed("authenticate", e))?;
        let value = grant
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EnrichError::malformed("authenticate", "response has no access_token"))?;
        AccessToken::from_grant(value, grant.expires_in, Utc::now())
    }

    async fn lookup_vehicle(
        &self,
        token: &str,
        vrm: &str,
        mileage: &str,
    ) -> Result<UpstreamResponse, EnrichError> {
        debug!("VRM {}: vehicle lookup", vrm);
        Self::send(
            self.http
                .get(self.endpoint("vehicles"))
                .bearer_auth(token)
                .timeout(self.request_timeout)
                .query(&[
                    ("advertiserId", self.advertiser_id.as_str()),
                    ("registration", vrm),
                    ("valuations", "true"),
                    ("vehicleMetrics", "true"),
                    ("odometerReadingMiles", mileage),
                    ("includeFirstRegistrationDate", "true"),
                    ("competitors", "true"),
                    ("features", "true"),
                ]),
        )
        .await
    }

    async fn value_vehicle(
        &self,
        token: &str,
        request: &ValuationRequest,
    ) -> Result<UpstreamResponse, EnrichError> {
        Self::send(
            self.http
                .post(self.endpoint("valuations"))
                .bearer_auth(token)
                .timeout(self.request_timeout)
                .query(&[("advertiserId", self.advertiser_id.as_str())])
                .json(request),
        )
        .await
    }

    async fn count_competitors(&self, token: &str, link: &Url) -> Result<UpstreamResponse, EnrichError> {
        Self::send(self.http.get(link.clone()).bearer_auth(token)).await
    }

    fn advertiser_id(&self) -> &str {
        &self.advertiser_id
    }
}
