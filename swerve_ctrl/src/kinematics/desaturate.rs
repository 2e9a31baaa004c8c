//! Wheel speed desaturation
//!
//! After inverse kinematics the requested speed of one or more modules may be
//! above what the drive motors can achieve. These functions scale all module
//! speeds down uniformly, preserving the direction of travel and the ratio of
//! speeds between modules, so the commanded motion stays geometrically
//! consistent.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::{ChassisSpeeds, ModuleState};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The speed capability limits of the drivetrain, used by
/// [`desaturate_speeds_with_limits`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SpeedLimits {

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
    pub max_rotational_rate_rads: f64
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Scale all module speeds down so that none exceeds the attainable maximum.
///
/// If the largest speed magnitude is within the limit the states are left
/// untouched.
pub fn desaturate_speeds(
    module_states: &mut [ModuleState],
    attainable_max_speed_ms: f64,
) {
    let max_speed_ms = max_abs_speed(module_states);

    if max_speed_ms > attainable_max_speed_ms {
        for state in module_states.iter_mut() {
            state.speed_ms = state.speed_ms / max_speed_ms * attainable_max_speed_ms;
        }
    }
}

/// Scale all module speeds down to respect the module, translational and
/// rotational capability limits together.
///
/// A combined translation plus rotation demand can saturate the drivetrain's
/// capability even when no single module individually exceeds its limit. The
/// demanded chassis velocity is compared against the translational and
/// rotational capabilities, and the module speeds are scaled so that the
/// commanded motion is the same fraction of the module capability.
///
/// If any of the translational limit, rotational limit or current maximum
/// module speed is zero the states are left untouched, avoiding a division by
/// zero.
pub fn desaturate_speeds_capacity(
    module_states: &mut [ModuleState],
    desired_speeds: &ChassisSpeeds,
    attainable_max_module_speed_ms: f64,
    attainable_max_translational_speed_ms: f64,
    attainable_max_rotational_rate_rads: f64,
) {
    let max_speed_ms = max_abs_speed(module_states);

    if attainable_max_translational_speed_ms == 0.0
        || attainable_max_rotational_rate_rads == 0.0
        || max_speed_ms == 0.0
    {
        return;
    }

    let translational_k = desired_speeds.vx_ms.hypot(desired_speeds.vy_ms)
        / attainable_max_translational_speed_ms;
    let rotational_k =
        desired_speeds.omega_rads.abs() / attainable_max_rotational_rate_rads;
    let k = translational_k.max(rotational_k);

    let scale = clamp(
        &(k * attainable_max_module_speed_ms / max_speed_ms),
        &0.0,
        &1.0,
    );

    for state in module_states.iter_mut() {
        state.speed_ms *= scale;
    }
}

/// Scale all module speeds down to respect the drivetrain's capability
/// limits.
///
/// Convenience form of [`desaturate_speeds_capacity`] taking the limits as a
/// [`SpeedLimits`] value, for instance from the parameter file.
pub fn desaturate_speeds_with_limits(
    module_states: &mut [ModuleState],
    desired_speeds: &ChassisSpeeds,
    limits: &SpeedLimits,
) {
    desaturate_speeds_capacity(
        module_states,
        desired_speeds,
        limits.max_module_speed_ms,
        limits.max_translational_speed_ms,
        limits.max_rotational_rate_rads,
    )
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the largest speed magnitude across the modules.
fn max_abs_speed(module_states: &[ModuleState]) -> f64 {
    module_states
        .iter()
        .map(|s| s.speed_ms.abs())
        .fold(0.0, f64::max)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use nalgebra::UnitComplex;

    use super::*;

    fn states_with_speeds(speeds_ms: &[f64]) -> Vec<ModuleState> {
        speeds_ms
            .iter()
            .map(|&s| ModuleState::new(s, UnitComplex::identity(), 0.0))
            .collect()
    }

    #[test]
    fn test_simple_desaturation() {
        let mut states = states_with_speeds(&[3.0, 4.0, 5.0]);

        desaturate_speeds(&mut states, 2.5);

        assert_eq!(states[0].speed_ms, 1.5);
        assert_eq!(states[1].speed_ms, 2.0);
        assert_eq!(states[2].speed_ms, 2.5);
    }

    #[test]
    fn test_simple_desaturation_noop_below_limit() {
        let mut states = states_with_speeds(&[1.0, 2.0]);

        desaturate_speeds(&mut states, 2.5);

        assert_eq!(states[0].speed_ms, 1.0);
        assert_eq!(states[1].speed_ms, 2.0);
    }

    #[test]
    fn test_simple_desaturation_idempotent() {
        let mut once = states_with_speeds(&[3.0, 4.0, 5.0]);
        desaturate_speeds(&mut once, 2.5);

        let mut twice = once.clone();
        desaturate_speeds(&mut twice, 2.5);

        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.speed_ms, b.speed_ms);
        }
    }

    #[test]
    fn test_desaturation_preserves_ratios() {
        let mut states = states_with_speeds(&[-3.0, 4.0, 5.0]);

        desaturate_speeds(&mut states, 2.5);

        // Signs are preserved and the ratio between any two modules is
        // unchanged
        assert!(states[0].speed_ms < 0.0);
        assert!((states[0].speed_ms / states[2].speed_ms - (-0.6)).abs() < 1e-9);
        assert!((states[1].speed_ms / states[2].speed_ms - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_capacity_desaturation() {
        let mut states = states_with_speeds(&[5.0, 5.0, 5.0, 5.0]);

        // Full translational demand: the modules are commanded to the module
        // capability, not the raw 5 m/s
        desaturate_speeds_capacity(
            &mut states,
            &ChassisSpeeds::new(4.0, 0.0, 0.0),
            4.5,
            4.0,
            8.0,
        );

        for state in &states {
            assert!((state.speed_ms - 4.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_capacity_desaturation_zero_limits_noop() {
        let original = states_with_speeds(&[3.0, 4.0]);

        for (max_trans, max_rot) in [(0.0, 8.0), (4.0, 0.0)].iter() {
            let mut states = original.clone();

            desaturate_speeds_capacity(
                &mut states,
                &ChassisSpeeds::new(1.0, 0.0, 1.0),
                4.5,
                *max_trans,
                *max_rot,
            );

            for (a, b) in states.iter().zip(original.iter()) {
                assert_eq!(a.speed_ms, b.speed_ms);
            }
        }
    }

    #[test]
    fn test_capacity_desaturation_zero_speeds_noop() {
        let mut states = states_with_speeds(&[0.0, 0.0]);

        desaturate_speeds_capacity(
            &mut states,
            &ChassisSpeeds::default(),
            4.5,
            4.0,
            8.0,
        );

        assert_eq!(states[0].speed_ms, 0.0);
        assert_eq!(states[1].speed_ms, 0.0);
    }

    #[test]
    fn test_limits_wrapper_matches_capacity() {
        let limits = SpeedLimits {
            max_module_speed_ms: 4.5,
            max_translational_speed_ms: 4.0,
            max_rotational_rate_rads: 8.0,
        };
        let cmd = ChassisSpeeds::new(2.0, 0.0, 2.0);

        let mut with_limits = states_with_speeds(&[1.4, 3.2, 1.4, 3.2]);
        let mut with_args = with_limits.clone();

        desaturate_speeds_with_limits(&mut with_limits, &cmd, &limits);
        desaturate_speeds_capacity(&mut with_args, &cmd, 4.5, 4.0, 8.0);

        for (a, b) in with_limits.iter().zip(with_args.iter()) {
            assert_eq!(a.speed_ms, b.speed_ms);
        }
    }
}
