// src/api/token_manager.rs
//! Shared access token with at most one refresh in flight.
//!
//! Readers take the `RwLock` briefly to check validity. A caller that finds the token
//! missing or expired queues on `refresh_lock`, re-checks (another caller may have
//! refreshed while it waited) and only then authenticates. The new token replaces the
//! old one in a single write.

use crate::{
    api::autotrader::{AccessToken, VehicleDataApi},
    error::EnrichError,
};
use chrono::Utc;
use log::{debug, error, info};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
pub struct TokenManager {
    current: RwLock<Option<AccessToken>>,
    refresh_lock: Mutex<()>,
    refreshes: AtomicU64,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token value that is valid now, refreshing it first if needed.
    pub async fn ensure_valid_token(&self, api: &dyn VehicleDataApi) -> Result<String, EnrichError> {
        if let Some(token) = self.valid_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.valid_token().await {
            debug!("Token was refreshed by another task while waiting");
            return Ok(token);
        }

        let fresh = api.authenticate().await.map_err(|e| {
            error!("Error during authentication: {}", e);
            e
        })?;
        let value = fresh.value.clone();
        info!("Access token refreshed, valid until {}", fresh.expires_at);
        *self.current.write().await = Some(fresh);
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    async fn valid_token(&self) -> Option<String> {
        let now = Utc::now();
        self.current
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_valid_at(now))
            .map(|t| t.value.clone())
    }

    /// Number of successful refreshes so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}
