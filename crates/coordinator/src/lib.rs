//! Upload coordinator clients for porter.
//!
//! The gateway never runs the tus session state machine itself. It hands
//! each authorized upload request to the coordinator instance addressed by
//! the request's derived key.

pub mod error;
pub mod remote;
pub mod traits;

pub use error::{CoordinatorError, CoordinatorResult};
pub use remote::{HttpCoordinator, UPLOAD_KEY_HEADER};
pub use traits::{CoordinatorRequest, CoordinatorResponse, UploadCoordinator};

use porter_core::config::CoordinatorConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create a coordinator client from configuration.
pub fn from_config(config: &CoordinatorConfig) -> CoordinatorResult<Arc<dyn UploadCoordinator>> {
    config.validate().map_err(CoordinatorError::Config)?;

    match config {
        CoordinatorConfig::Http {
            base_url,
            connect_timeout_secs,
        } => {
            let coordinator =
                HttpCoordinator::new(base_url, Duration::from_secs(*connect_timeout_secs))?;
            Ok(Arc::new(coordinator))
        }
    }
}
