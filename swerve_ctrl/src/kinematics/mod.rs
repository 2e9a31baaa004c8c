//! # Swerve kinematics module
//!
//! This module implements the geometric transforms between the chassis
//! velocity (vx, vy, omega) and the states of the individual wheel modules
//! (speed, angle, angular velocity). The inverse transform is second order:
//! as well as each module's speed and heading it produces the rate at which
//! the module heading must change, accounting for the centripetal
//! acceleration induced by a nonzero chassis rotation rate.
//!
//! The transforms here are pure geometry. Conversion of module states into
//! actuator demands, and the application of drivetrain capability limits from
//! the parameter file, is handled by the [`crate::SwerveCtrl`] module.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod chassis;
mod desaturate;
mod model;
mod module_state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use chassis::*;
pub use desaturate::*;
pub use model::*;
pub use module_state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The minimum number of wheel modules needed for a valid drivetrain.
pub const MIN_NUM_MODULES: usize = 2;

/// Module speeds with a magnitude below this value are treated as stationary
/// when computing the module's angular velocity, avoiding a degenerate
/// division. A stationary module gets a zero steer rate demand.
///
/// Units: meters/second
pub const SPEED_EPSILON_MS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during kinematics processing.
#[derive(Debug, thiserror::Error)]
pub enum KinematicsError {
    #[error("A swerve drivetrain requires at least two modules, found {0}")]
    TooFewModules(usize),

    #[error("Expected {expected} module entries but found {found}")]
    WrongModuleCount {
        expected: usize,
        found: usize
    },

    #[error("Failed to compute the forward kinematics pseudo-inverse: {0}")]
    PseudoInverseFailed(&'static str),
}
