pub mod settings;

pub use settings::Config;

use crate::error::EnrichError;
use std::sync::Arc;

/// Loads `.env` (if present), reads the environment and validates the result.
/// Logging is not set up yet at this point; callers log the config themselves.
pub fn load_config() -> Result<Arc<settings::Config>, EnrichError> {
    dotenv::dotenv().ok();

    let config = settings::Config::from_env();
    config.validate()?;

    Ok(Arc::new(config))
}
