//! Chassis velocity structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The instantaneous planar velocity of the chassis, used both as a demand
/// (inverse kinematics) and as an estimate recovered from measured module
/// states (forward kinematics).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisSpeeds {

    /// Linear velocity along the vehicle body X axis (forward).
    ///
    /// Units: meters/second
    pub vx_ms: f64,

    /// Linear velocity along the vehicle body Y axis (left).
    ///
    /// Units: meters/second
    pub vy_ms: f64,

    /// Angular velocity about the vehicle body Z axis (counter-clockwise
    /// positive).
    ///
    /// Units: radians/second
    pub omega_rads: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ChassisSpeeds {

    /// Create a new chassis velocity from its components.
    pub fn new(vx_ms: f64, vy_ms: f64, omega_rads: f64) -> Self {
        Self { vx_ms, vy_ms, omega_rads }
    }

    /// True if all components are exactly zero.
    ///
    /// An all-zero demand is the signal for the inverse kinematics to hold
    /// the previously commanded module headings.
    pub fn is_zero(&self) -> bool {
        self.vx_ms == 0.0 && self.vy_ms == 0.0 && self.omega_rads == 0.0
    }
}
