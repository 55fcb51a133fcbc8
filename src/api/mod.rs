// src/api/mod.rs
//! Upstream API plumbing shared by every row worker:
//! - one pooled HTTP client
//! - the access token and its single-flight refresh
//! - the rate limiter guarding the throttled endpoints

pub mod autotrader;
pub mod rate_limiter;
pub mod session;
pub mod token_manager;
pub mod types;

pub use autotrader::{AccessToken, AutoTraderClient, VehicleDataApi, DEFAULT_TOKEN_TTL_SECS};
pub use rate_limiter::{RateLimitConfig, RateLimitStats, RateLimiter};
pub use session::{build_http_client, http_client_from_config};
pub use token_manager::TokenManager;
pub use types::{UpstreamResponse, ValuationRequest};
