//! # Swerve drivetrain control library
//!
//! Converts chassis-level motion demands into individual wheel module
//! commands for a drivetrain of independently steered, independently driven
//! wheel modules, and recovers the chassis velocity from measured module
//! states for use by position tracking.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cmd;
mod params;
mod state;

/// Swerve kinematics - the transforms between chassis motion and module
/// motion, speed desaturation and module state optimisation.
pub mod kinematics;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cmd::*;
pub use params::*;
pub use state::*;

use kinematics::KinematicsError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during SwerveCtrl initialisation.
#[derive(Debug, thiserror::Error)]
pub enum SwerveCtrlInitError {
    #[error("Failed to load parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("Failed to build the kinematics model: {0}")]
    KinematicsError(#[from] KinematicsError),
}

/// Possible errors that can occur during SwerveCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum SwerveCtrlError {
    #[error("Module has not been initialised")]
    NotInitialised,

    #[error("Expected there to be a drive command but couldn't find one")]
    NoDriveCmd,

    #[error("Recieved an invalid drive command: {0:#?}")]
    InvalidDriveCmd(DriveCommand),

    #[error("Kinematics processing failed: {0}")]
    KinematicsError(#[from] KinematicsError),
}
