//! Wheel module state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::UnitComplex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The state of one wheel module: wheel speed, module heading and module
/// angular velocity. Used both as a commanded output of the inverse
/// kinematics and as a measured input to the forward kinematics.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ModuleState {

    /// Signed speed of the module's wheel along its direction of travel.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// The module's heading (direction of travel) in the vehicle body frame.
    #[serde(with = "angle_rads")]
    pub angle: UnitComplex<f64>,

    /// The rate at which the module's heading must change beyond the
    /// vehicle's bulk rotation.
    ///
    /// Units: radians/second
    pub omega_rads: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModuleState {

    /// Create a new module state.
    pub fn new(speed_ms: f64, angle: UnitComplex<f64>, omega_rads: f64) -> Self {
        Self { speed_ms, angle, omega_rads }
    }

    /// Minimise the steer rotation needed to reach this state by potentially
    /// reversing the wheel's drive direction.
    ///
    /// If the shortest rotation from `current_angle` to the desired angle is
    /// more than 90 degrees the returned state has the speed negated and the
    /// heading rotated by 180 degrees, which commands the same module
    /// velocity vector with less steering travel. The angular velocity is
    /// unchanged.
    pub fn optimize(&self, current_angle: &UnitComplex<f64>) -> Self {
        let delta = current_angle.rotation_to(&self.angle);

        if delta.cos_angle() < 0.0 {
            Self {
                speed_ms: -self.speed_ms,
                angle: self.angle * UnitComplex::new(std::f64::consts::PI),
                omega_rads: self.omega_rads
            }
        }
        else {
            *self
        }
    }
}

impl Default for ModuleState {
    fn default() -> Self {
        Self {
            speed_ms: 0.0,
            angle: UnitComplex::identity(),
            omega_rads: 0.0
        }
    }
}

// ---------------------------------------------------------------------------
// SERDE HELPERS
// ---------------------------------------------------------------------------

/// (De)serialise a module heading as its angle in radians.
mod angle_rads {
    use nalgebra::UnitComplex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        angle: &UnitComplex<f64>, ser: S
    ) -> Result<S::Ok, S::Error> {
        ser.serialize_f64(angle.angle())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D
    ) -> Result<UnitComplex<f64>, D::Error> {
        f64::deserialize(de).map(UnitComplex::new)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::f64::consts::{FRAC_PI_2, PI};

    use util::maths::get_ang_dist_2pi;

    use super::*;

    #[test]
    fn test_optimize_fixed_point() {
        let desired = ModuleState::new(1.5, UnitComplex::new(0.3), 0.2);

        let optimised = desired.optimize(&UnitComplex::new(0.3));

        assert_eq!(optimised.speed_ms, desired.speed_ms);
        assert_eq!(optimised.angle, desired.angle);
        assert_eq!(optimised.omega_rads, desired.omega_rads);
    }

    #[test]
    fn test_optimize_opposite() {
        let desired = ModuleState::new(2.0, UnitComplex::new(0.3), 0.7);

        let optimised = desired.optimize(&UnitComplex::new(0.3 + PI));

        assert_eq!(optimised.speed_ms, -2.0);
        assert!((optimised.angle.angle_to(&UnitComplex::new(0.3 + PI))).abs() < 1e-9);
        assert_eq!(optimised.omega_rads, 0.7);
    }

    #[test]
    fn test_optimize_steering_travel_bounded() {
        // Whatever the combination of current and desired headings, the
        // optimised state never demands more than 90 degrees of steering
        // travel.
        for i in 0..24 {
            for j in 0..24 {
                let desired_rad = i as f64 * PI / 12.0;
                let current_rad = j as f64 * PI / 12.0;

                let optimised = ModuleState::new(1.0, UnitComplex::new(desired_rad), 0.0)
                    .optimize(&UnitComplex::new(current_rad));

                let travel_rad =
                    get_ang_dist_2pi(optimised.angle.angle(), current_rad).abs();

                assert!(
                    travel_rad <= FRAC_PI_2 + 1e-9,
                    "steering travel {} rad exceeds 90 degrees (desired {}, current {})",
                    travel_rad, desired_rad, current_rad
                );
            }
        }
    }
}
