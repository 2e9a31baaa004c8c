//! Host platform utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The environment variable giving the root of the software repository.
pub const SW_ROOT_ENV_VAR: &str = "DEIMOS_SW_ROOT";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur when querying the host environment.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("The software root environment variable (DEIMOS_SW_ROOT) is not set")]
    SwRootNotSet
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the path to the root of the software repository.
///
/// The root is given by the `DEIMOS_SW_ROOT` environment variable, which must
/// be set before any executable is run.
pub fn get_deimos_sw_root() -> Result<PathBuf, HostError> {
    match std::env::var(SW_ROOT_ENV_VAR) {
        Ok(p) => Ok(PathBuf::from(p)),
        Err(_) => Err(HostError::SwRootNotSet)
    }
}
