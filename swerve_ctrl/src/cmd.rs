//! Commands passed into SwerveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::kinematics::ChassisSpeeds;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command to execute a particular manouvre
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DriveCommand {

    /// The type of manouvre to perform
    pub mnvr_type: MnvrType,

    /// The chassis velocity demand. Used for Velocity only.
    ///
    /// Units: meters/second (linear), radians/second (angular)
    pub speeds_ms: Option<ChassisSpeeds>,

    /// The centre of rotation to use, relative to the vehicle reference
    /// point. `None` is interpreted as the reference point itself. Used for
    /// Velocity only.
    ///
    /// Units: meters,
    /// Frame: Vehicle body
    pub cor_m_vb: Option<[f64; 2]>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible manouvres to be executed by SwerveCtrl.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum MnvrType {
    /// No manouvre - interpreted as continue with last manouvre.
    None,
    /// Stop - bring the vehicle to a full stop, holding module headings.
    Stop,
    /// Velocity - drive the chassis at a demanded planar velocity, optionally
    /// about an offset centre of rotation.
    Velocity
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCommand {

    /// Determine if the command is valid (i.e. contains all required data and
    /// all of it is finite).
    pub fn is_valid(&self) -> bool {
        match self.mnvr_type {
            MnvrType::Stop | MnvrType::None => true,
            MnvrType::Velocity => {
                let speeds_valid = match self.speeds_ms {
                    Some(s) =>
                        s.vx_ms.is_finite()
                        && s.vy_ms.is_finite()
                        && s.omega_rads.is_finite(),
                    None => false
                };

                let cor_valid = match self.cor_m_vb {
                    Some(c) => c[0].is_finite() && c[1].is_finite(),
                    None => true
                };

                speeds_valid && cor_valid
            }
        }
    }
}
