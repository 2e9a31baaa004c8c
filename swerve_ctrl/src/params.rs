//! Parameters structure for SwerveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::kinematics::SpeedLimits;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Swerve drivetrain control.
#[derive(Debug, Default, Deserialize)]
pub struct Params {

    // ---- GEOMETRY ----

    /// The positions of the wheel modules in the vehicle body frame. The
    /// order of this array fixes the order of every per-module array passed
    /// into or out of the controller.
    ///
    /// Units: meters,
    /// Frame: Vehicle body
    pub module_pos_m_vb: Vec<[f64; 2]>,

    /// The radius of the modules' wheels.
    ///
    /// Units: meters.
    pub wheel_radius_m: f64,

    // ---- CAPABILITIES ----

    /// Maximum attainable speed of a single module.
    ///
    /// Units: meters/second
    pub max_module_speed_ms: f64,

    /// Maximum attainable translational speed of the vehicle.
    ///
    /// Units: meters/second
    pub max_translational_speed_ms: f64,

    /// Maximum attainable rotational rate of the vehicle.
    ///
    /// Units: radians/second
    pub max_rotational_rate_rads: f64,

    /// Maximum drive axis rate (highest positive value)
    ///
    /// Units: radians/second
    pub drv_max_abs_rate_rads: f64,

    /// Minimum drive axis rate (lowest negative value)
    ///
    /// Units: radians/second
    pub drv_min_abs_rate_rads: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {

    /// Get the drivetrain's speed capability limits.
    pub fn speed_limits(&self) -> SpeedLimits {
        SpeedLimits {
            max_module_speed_ms: self.max_module_speed_ms,
            max_translational_speed_ms: self.max_translational_speed_ms,
            max_rotational_rate_rads: self.max_rotational_rate_rads
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_param_file() {
        // Parse the workspace parameter file directly, proving it matches the
        // structure expected here.
        let params: Params = toml::from_str(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../params/swerve_ctrl.toml"
        )))
        .unwrap();

        assert!(params.module_pos_m_vb.len() >= 2);
        assert!(params.wheel_radius_m > 0.0);
        assert!(params.max_module_speed_ms > 0.0);
        assert!(params.max_translational_speed_ms > 0.0);
        assert!(params.max_rotational_rate_rads > 0.0);
        assert!(params.drv_max_abs_rate_rads > params.drv_min_abs_rate_rads);
    }
}
