//! Swerve kinematics model
//!
//! Implements the inverse (chassis velocity to module states, second order)
//! and forward (measured module states to chassis velocity) transforms.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{
    DMatrix, DVector, RowVector3, RowVector4, UnitComplex, Vector2, Vector3, Vector4,
};

// Internal
use super::{
    ChassisSpeeds, KinematicsError, ModuleState, MIN_NUM_MODULES, SPEED_EPSILON_MS,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The kinematics engine for a swerve drivetrain.
///
/// Holds the drivetrain geometry, the matrices derived from it, and a small
/// cross-call cache: the centre of rotation the matrices were last built for,
/// and the last commanded per-module heading and angular velocity (used to
/// hold headings when an all-zero demand arrives).
///
/// The cache is mutated on every inverse kinematics call, so an instance must
/// not be shared between threads without external synchronisation. Expected
/// use is one instance owned by the control thread for the lifetime of the
/// drivetrain.
pub struct SwerveKinematics {

    /// Module positions in the vehicle body frame.
    ///
    /// Units: meters,
    /// Frame: Vehicle body
    module_pos_m_vb: Vec<Vector2<f64>>,

    /// First order inverse kinematics matrix (2N x 3), mapping
    /// (vx, vy, omega) to the planar velocity of each module. Rebuilt when
    /// the centre of rotation changes.
    inv_kin: DMatrix<f64>,

    /// Second order inverse kinematics matrix (2N x 4), mapping the chassis
    /// acceleration vector (ax, ay, omega^2, alpha) to the planar
    /// acceleration of each module. Rebuilt together with `inv_kin`.
    second_order_inv_kin: DMatrix<f64>,

    /// Forward kinematics matrix (3 x 2N), the pseudo-inverse of the first
    /// order matrix about the vehicle reference point. Built once at
    /// construction and never rebuilt - the forward transform deliberately
    /// recovers only the first order chassis velocity.
    fwd_kin: DMatrix<f64>,

    /// The centre of rotation the inverse matrices are currently built for.
    ///
    /// Units: meters,
    /// Frame: Vehicle body
    prev_cor_m_vb: Vector2<f64>,

    /// The last commanded heading of each module, held when an all-zero
    /// demand arrives.
    module_headings: Vec<UnitComplex<f64>>,

    /// The last commanded angular velocity of each module.
    ///
    /// Units: radians/second
    module_omegas_rads: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwerveKinematics {

    /// Build the kinematics engine from the module positions.
    ///
    /// The order of `module_pos_m_vb` fixes the index order used by every
    /// other function on the engine: module states are returned in this
    /// order, and measured states must be passed in this order.
    pub fn new(module_pos_m_vb: Vec<Vector2<f64>>) -> Result<Self, KinematicsError> {
        let num_modules = module_pos_m_vb.len();

        if num_modules < MIN_NUM_MODULES {
            return Err(KinematicsError::TooFewModules(num_modules));
        }

        let mut inv_kin = DMatrix::zeros(2 * num_modules, 3);
        let mut second_order_inv_kin = DMatrix::zeros(2 * num_modules, 4);

        set_cor_rows(
            &mut inv_kin,
            &mut second_order_inv_kin,
            &module_pos_m_vb,
            &Vector2::zeros(),
        );

        // The forward matrix is the least-squares inverse of the first order
        // matrix about the reference point, so that an overdetermined set of
        // module measurements maps back to the best-fit chassis velocity.
        let fwd_kin = inv_kin
            .clone()
            .pseudo_inverse(f64::EPSILON)
            .map_err(KinematicsError::PseudoInverseFailed)?;

        Ok(Self {
            inv_kin,
            second_order_inv_kin,
            fwd_kin,
            prev_cor_m_vb: Vector2::zeros(),
            module_headings: vec![UnitComplex::identity(); num_modules],
            module_omegas_rads: vec![0.0; num_modules],
            module_pos_m_vb,
        })
    }

    /// The number of wheel modules in the drivetrain.
    pub fn num_modules(&self) -> usize {
        self.module_pos_m_vb.len()
    }

    /// The last commanded heading of each module.
    pub fn module_headings(&self) -> &[UnitComplex<f64>] {
        &self.module_headings
    }

    /// Replace the cached module headings with measured ones, so that a
    /// subsequent all-zero demand holds the modules where they actually are
    /// rather than where they were last commanded to be.
    pub fn reset_headings(
        &mut self,
        module_headings: &[UnitComplex<f64>],
    ) -> Result<(), KinematicsError> {
        if module_headings.len() != self.num_modules() {
            return Err(KinematicsError::WrongModuleCount {
                expected: self.num_modules(),
                found: module_headings.len(),
            });
        }

        self.module_headings.copy_from_slice(module_headings);

        Ok(())
    }

    /// Perform inverse kinematics about the vehicle reference point.
    ///
    /// See [`SwerveKinematics::to_module_states_about`].
    pub fn to_module_states(&mut self, speeds: &ChassisSpeeds) -> Vec<ModuleState> {
        self.to_module_states_about(speeds, Vector2::zeros())
    }

    /// Perform inverse kinematics to get the module states which achieve the
    /// demanded chassis velocity about the given centre of rotation.
    ///
    /// The centre of rotation is normally the vehicle reference point, but
    /// may be offset for pivot-style manouvres, for instance turning about
    /// one corner of the wheelbase.
    ///
    /// If the demand is all-zero each module keeps its previously commanded
    /// heading and angular velocity with zero speed, avoiding an undefined
    /// steering demand while stationary.
    ///
    /// The returned speeds are not limited in any way - a large demand can
    /// produce speeds beyond what the modules can achieve. Pass the result
    /// through one of the desaturation functions (for instance
    /// [`super::desaturate_speeds`]) before commanding hardware.
    pub fn to_module_states_about(
        &mut self,
        speeds: &ChassisSpeeds,
        cor_m_vb: Vector2<f64>,
    ) -> Vec<ModuleState> {
        let num_modules = self.num_modules();

        // An all-zero demand holds the previous headings
        if speeds.is_zero() {
            return (0..num_modules)
                .map(|i| ModuleState {
                    speed_ms: 0.0,
                    angle: self.module_headings[i],
                    omega_rads: self.module_omegas_rads[i],
                })
                .collect();
        }

        // Rebuild the matrix rows only when the centre of rotation moves
        if cor_m_vb != self.prev_cor_m_vb {
            set_cor_rows(
                &mut self.inv_kin,
                &mut self.second_order_inv_kin,
                &self.module_pos_m_vb,
                &cor_m_vb,
            );
            self.prev_cor_m_vb = cor_m_vb;
        }

        let chassis_vel = Vector3::new(speeds.vx_ms, speeds.vy_ms, speeds.omega_rads);

        // Only the centripetal (omega^2) term of the chassis acceleration is
        // known here, angular acceleration is not modelled as an input.
        let chassis_accel = Vector4::new(0.0, 0.0, speeds.omega_rads.powi(2), 0.0);

        let module_vels = &self.inv_kin * chassis_vel;
        let module_accels = &self.second_order_inv_kin * chassis_accel;

        let mut module_states = Vec::with_capacity(num_modules);

        for i in 0..num_modules {
            let vx_ms = module_vels[2 * i];
            let vy_ms = module_vels[2 * i + 1];
            let ax_ms2 = module_accels[2 * i];
            let ay_ms2 = module_accels[2 * i + 1];

            let speed_ms = vx_ms.hypot(vy_ms);
            let angle = UnitComplex::new(vy_ms.atan2(vx_ms));

            // Rotate the acceleration into the module's own frame. Its
            // component orthogonal to the direction of travel, divided by the
            // speed, is the rate at which the velocity vector's direction is
            // turning; subtracting the chassis rate leaves the module's own
            // required steer rate.
            let accel_module_ms2 = angle.inverse() * Vector2::new(ax_ms2, ay_ms2);

            let omega_rads = if speed_ms < SPEED_EPSILON_MS {
                // Stationary module, no steer rate demand
                0.0
            }
            else {
                accel_module_ms2.y / speed_ms - speeds.omega_rads
            };

            self.module_headings[i] = angle;
            self.module_omegas_rads[i] = omega_rads;

            module_states.push(ModuleState {
                speed_ms,
                angle,
                omega_rads,
            });
        }

        module_states
    }

    /// Perform forward kinematics to recover the chassis velocity from the
    /// measured module states.
    ///
    /// The states must be in the same order as the module positions passed at
    /// construction. Module angular velocities are not used - the forward
    /// transform recovers only the first order chassis velocity.
    pub fn to_chassis_speeds(
        &self,
        module_states: &[ModuleState],
    ) -> Result<ChassisSpeeds, KinematicsError> {
        let num_modules = self.num_modules();

        if module_states.len() != num_modules {
            return Err(KinematicsError::WrongModuleCount {
                expected: num_modules,
                found: module_states.len(),
            });
        }

        let mut module_vels = DVector::zeros(2 * num_modules);

        for (i, state) in module_states.iter().enumerate() {
            module_vels[2 * i] = state.speed_ms * state.angle.cos_angle();
            module_vels[2 * i + 1] = state.speed_ms * state.angle.sin_angle();
        }

        let chassis_vel = &self.fwd_kin * module_vels;

        Ok(ChassisSpeeds {
            vx_ms: chassis_vel[0],
            vy_ms: chassis_vel[1],
            omega_rads: chassis_vel[2],
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Fill the rows of the first and second order inverse kinematics matrices
/// for the given centre of rotation.
///
/// Row pair `2i`/`2i + 1` maps the chassis motion onto module `i`'s planar
/// velocity (first order) or acceleration (second order) using the module's
/// lever arm about the centre of rotation.
fn set_cor_rows(
    inv_kin: &mut DMatrix<f64>,
    second_order_inv_kin: &mut DMatrix<f64>,
    module_pos_m_vb: &[Vector2<f64>],
    cor_m_vb: &Vector2<f64>,
) {
    for (i, pos) in module_pos_m_vb.iter().enumerate() {
        let arm = pos - cor_m_vb;

        inv_kin.set_row(2 * i, &RowVector3::new(1.0, 0.0, -arm.y));
        inv_kin.set_row(2 * i + 1, &RowVector3::new(0.0, 1.0, arm.x));

        second_order_inv_kin.set_row(2 * i, &RowVector4::new(1.0, 0.0, -arm.x, -arm.y));
        second_order_inv_kin.set_row(2 * i + 1, &RowVector4::new(0.0, 1.0, -arm.y, arm.x));
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
