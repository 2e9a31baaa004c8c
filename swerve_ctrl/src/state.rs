//! Implementations for the SwerveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::UnitComplex;
use serde::Serialize;

// Internal
use crate::kinematics::{
    desaturate_speeds_with_limits, ChassisSpeeds, ModuleState, SwerveKinematics,
};
use crate::{DriveCommand, MnvrType, Params, SwerveCtrlError, SwerveCtrlInitError};
use util::{
    archive::{Archived, Archiver},
    convert::Convert,
    maths::{clamp, lin_map},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Swerve drivetrain control module state
#[derive(Default)]
pub struct SwerveCtrl {

    pub(crate) params: Params,

    kinematics: Option<SwerveKinematics>,

    pub(crate) report: StatusReport,
    arch_report: Archiver,

    pub(crate) current_cmd: Option<DriveCommand>,
    arch_current_cmd: Archiver,

    pub(crate) target_states: Option<Vec<ModuleState>>,
    arch_target_states: Archiver,

    pub(crate) output: Option<OutputData>,
    arch_output: Archiver
}

/// Input data to Swerve drivetrain control.
#[derive(Default)]
pub struct InputData {
    /// The manouvre command to be executed, or `None` if there is no new
    /// command on this cycle.
    pub cmd: Option<DriveCommand>,

    /// The measured module states from the drive encoders and steer sensors,
    /// or `None` if no measurement is available this cycle. Order must match
    /// the module order in the parameter file.
    pub measured_states: Option<Vec<ModuleState>>
}

/// Output command from SwerveCtrl that the motor actuation collaborator must
/// execute, plus the latest chassis velocity estimate for position tracking.
#[derive(Clone, Serialize, Debug, Default)]
pub struct OutputData {
    /// Per-module actuation demands, in module order.
    pub wheel_cmds: Vec<WheelCommand>,

    /// The chassis velocity estimated from this cycle's measured module
    /// states, or `None` if no measurement was provided.
    pub chassis_vel_est_ms: Option<ChassisSpeeds>
}

/// Actuation demand for a single wheel module.
#[derive(Clone, Copy, Serialize, Debug, Default)]
pub struct WheelCommand {
    /// Steer axis absolute position demand.
    ///
    /// Units: radians
    pub str_abs_pos_rad: f64,

    /// Steer axis rate demand.
    ///
    /// Units: radians/second
    pub str_rate_rads: f64,

    /// Drive axis rate demand.
    ///
    /// Units: radians/second
    pub drv_rate_rads: f64,

    /// Drive axis rate demand normalised between -1 and +1.
    pub drv_rate_norm: f64
}

/// Status report for SwerveCtrl processing.
#[derive(Clone, Default, Serialize, Debug)]
pub struct StatusReport {
    /// True if the module speeds were scaled down to the drivetrain's
    /// capability limits this cycle.
    pub speeds_desaturated: bool,

    /// Per-module flag raised when the optimizer reversed the module's drive
    /// direction to reduce steering travel.
    pub drv_reversed: Vec<bool>,

    /// True if a chassis velocity estimate was produced this cycle.
    pub chassis_vel_est_updated: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for SwerveCtrl {
    type InitData = &'static str;
    type InitError = SwerveCtrlInitError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = SwerveCtrlError;

    /// Initialise the SwerveCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {

        // Load the parameters
        self.params = params::load(init_data)?;

        // Build the kinematics engine from the module geometry
        self.kinematics = Some(SwerveKinematics::new(
            self.params
                .module_pos_m_vb
                .iter()
                .map(|p| p.convert())
                .collect()
        )?);

        // Create the arch folder for swerve_ctrl
        let mut arch_path = session.arch_root.clone();
        arch_path.push("swerve_ctrl");
        std::fs::create_dir_all(arch_path).unwrap();

        // Initialise the archivers
        self.arch_report = Archiver::from_path(
            session, "swerve_ctrl/status_report.csv"
        ).unwrap();
        self.arch_current_cmd = Archiver::from_path(
            session, "swerve_ctrl/current_cmd.csv"
        ).unwrap();
        self.arch_target_states = Archiver::from_path(
            session, "swerve_ctrl/target_states.csv"
        ).unwrap();
        self.arch_output = Archiver::from_path(
            session, "swerve_ctrl/output.csv"
        ).unwrap();

        Ok(())
    }

    /// Perform cyclic processing of Swerve drivetrain control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Clear the status report
        self.report = StatusReport::default();

        // Estimate the chassis velocity from the measured module states, if
        // any were provided this cycle. This is independent of the command
        // flow and feeds the position tracking collaborator.
        let chassis_vel_est_ms = match input_data.measured_states {
            Some(ref measured) => {
                let kin = match self.kinematics {
                    Some(ref k) => k,
                    None => return Err(SwerveCtrlError::NotInitialised)
                };

                let est = kin.to_chassis_speeds(measured)?;
                self.report.chassis_vel_est_updated = true;
                Some(est)
            },
            None => None
        };

        // Check to see if there's a new command
        if let Some(cmd) = input_data.cmd {
            // Update the interal copy of the command
            self.current_cmd = Some(cmd);

            // Calculate the target module states based on this new command.
            self.calc_target_states(input_data.measured_states.as_deref())?;
        }

        let output: OutputData;

        // If there's a set of target states to achieve
        if let Some(ref target) = self.target_states {
            let mut wheel_cmds = Vec::with_capacity(target.len());

            // Convert each module state into the demands the motor actuation
            // collaborator expects
            for state in target.iter() {
                let drv_rate_rads = state.speed_ms / self.params.wheel_radius_m;

                wheel_cmds.push(WheelCommand {
                    str_abs_pos_rad: state.angle.angle(),
                    str_rate_rads: state.omega_rads,
                    drv_rate_rads,
                    drv_rate_norm: clamp(
                        &lin_map(
                            (
                                self.params.drv_min_abs_rate_rads,
                                self.params.drv_max_abs_rate_rads
                            ),
                            (-1f64, 1f64),
                            drv_rate_rads
                        ),
                        &-1f64,
                        &1f64
                    )
                });
            }

            output = OutputData {
                wheel_cmds,
                chassis_vel_est_ms
            }
        }
        else {
            // If no target keep the previous output with the drive rates
            // zeroed. If there is no previous output use the default (zero)
            // output.
            output = match self.output {
                Some(ref po) => {
                    let mut o = po.clone();
                    for wheel_cmd in o.wheel_cmds.iter_mut() {
                        wheel_cmd.drv_rate_rads = 0.0;
                        wheel_cmd.drv_rate_norm = 0.0;
                    }
                    o.chassis_vel_est_ms = chassis_vel_est_ms;
                    o
                },
                None => OutputData {
                    wheel_cmds: Vec::new(),
                    chassis_vel_est_ms
                }
            }
        }

        trace!("SwerveCtrl output:\n    wheel_cmds: {:?}\n    vel_est: {:?}",
            output.wheel_cmds,
            output.chassis_vel_est_ms);

        // Update the output in self
        self.output = Some(output.clone());

        Ok((output, self.report.clone()))
    }
}

impl Archived for SwerveCtrl {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Write each one individually
        self.arch_report.serialise(&self.report)?;
        self.arch_current_cmd.serialise(self.current_cmd)?;
        self.arch_target_states.serialise(&self.target_states)?;
        self.arch_output.serialise(&self.output)?;

        Ok(())
    }
}

impl SwerveCtrl {

    /// Build a SwerveCtrl directly from a parameter set, without a session.
    ///
    /// Archive records are discarded in a module built this way. Intended for
    /// tests and tooling which have no session directory.
    pub fn with_params(params: Params) -> Result<Self, SwerveCtrlInitError> {
        let kinematics = SwerveKinematics::new(
            params.module_pos_m_vb.iter().map(|p| p.convert()).collect()
        )?;

        Ok(Self {
            params,
            kinematics: Some(kinematics),
            ..Default::default()
        })
    }

    /// Based on the current command calculate the target module states for
    /// the drivetrain to achieve.
    ///
    /// A valid command should be set in `self.current_cmd` before calling
    /// this function. When measured module states are available they are used
    /// as the optimizer's reference headings, otherwise the engine's cached
    /// headings from the previous solve are used.
    fn calc_target_states(
        &mut self,
        measured_states: Option<&[ModuleState]>
    ) -> Result<(), SwerveCtrlError> {

        // Check we have a valid command
        let cmd = match self.current_cmd {
            Some(c) => match c.is_valid() {
                true => c,
                false => return Err(SwerveCtrlError::InvalidDriveCmd(c))
            },
            None => return Err(SwerveCtrlError::NoDriveCmd)
        };

        let kin = match self.kinematics {
            Some(ref mut k) => k,
            None => return Err(SwerveCtrlError::NotInitialised)
        };

        // The demanded chassis velocity for each command type. A None
        // command keeps the previous target.
        let speeds = match cmd.mnvr_type {
            MnvrType::None => return Ok(()),
            MnvrType::Stop => ChassisSpeeds::default(),
            MnvrType::Velocity => cmd.speeds_ms.unwrap()
        };

        // Reference headings for the optimizer, taken before the solve so
        // they reflect the modules' current positions rather than the new
        // demand.
        let current_angles: Vec<UnitComplex<f64>> = match measured_states {
            Some(measured) => measured.iter().map(|s| s.angle).collect(),
            None => kin.module_headings().to_vec()
        };

        // Solve the inverse kinematics about the commanded centre of
        // rotation
        let mut states = match cmd.cor_m_vb {
            Some(cor) => kin.to_module_states_about(&speeds, cor.convert()),
            None => kin.to_module_states(&speeds)
        };

        // Minimise steering travel per module, flagging any reversals
        let mut drv_reversed = vec![false; states.len()];

        for (i, state) in states.iter_mut().enumerate() {
            let optimised = state.optimize(&current_angles[i]);

            if optimised.angle != state.angle {
                drv_reversed[i] = true;
            }

            *state = optimised;
        }

        // Scale the speeds down to the drivetrain's capability limits
        let max_before_ms = states
            .iter()
            .map(|s| s.speed_ms.abs())
            .fold(0f64, f64::max);

        desaturate_speeds_with_limits(&mut states, &speeds, &self.params.speed_limits());

        let max_after_ms = states
            .iter()
            .map(|s| s.speed_ms.abs())
            .fold(0f64, f64::max);

        self.report.speeds_desaturated = max_after_ms < max_before_ms;
        self.report.drv_reversed = drv_reversed;

        // Update the target
        self.target_states = Some(states);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn test_params() -> Params {
        Params {
            module_pos_m_vb: vec![[0.5, 0.5], [0.5, -0.5], [-0.5, 0.5], [-0.5, -0.5]],
            wheel_radius_m: 0.05,
            max_module_speed_ms: 4.5,
            max_translational_speed_ms: 4.0,
            max_rotational_rate_rads: 8.0,
            drv_max_abs_rate_rads: 90.0,
            drv_min_abs_rate_rads: -90.0
        }
    }

    fn velocity_cmd(vx_ms: f64, vy_ms: f64, omega_rads: f64) -> DriveCommand {
        DriveCommand {
            mnvr_type: MnvrType::Velocity,
            speeds_ms: Some(ChassisSpeeds::new(vx_ms, vy_ms, omega_rads)),
            cor_m_vb: None
        }
    }

    #[test]
    fn test_proc_velocity_cmd() {
        let mut ctrl = SwerveCtrl::with_params(test_params()).unwrap();

        let (output, report) = ctrl
            .proc(&InputData {
                cmd: Some(velocity_cmd(1.0, 0.0, 0.0)),
                measured_states: None
            })
            .unwrap();

        assert_eq!(output.wheel_cmds.len(), 4);
        assert!(!report.speeds_desaturated);

        for wheel_cmd in &output.wheel_cmds {
            assert!(wheel_cmd.str_abs_pos_rad.abs() < 1e-9);
            // 1 m/s on a 0.05 m wheel is 20 rad/s, 2/9 of the 90 rad/s limit
            assert!((wheel_cmd.drv_rate_rads - 20.0).abs() < 1e-9);
            assert!((wheel_cmd.drv_rate_norm - 20.0 / 90.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_proc_desaturates() {
        let mut ctrl = SwerveCtrl::with_params(test_params()).unwrap();

        // Half the translational and a quarter of the rotational capability,
        // which scales the fastest module down to half the module limit
        let (output, report) = ctrl
            .proc(&InputData {
                cmd: Some(velocity_cmd(2.0, 0.0, 2.0)),
                measured_states: None
            })
            .unwrap();

        assert!(report.speeds_desaturated);

        let max_rate_rads = output
            .wheel_cmds
            .iter()
            .map(|c| c.drv_rate_rads.abs())
            .fold(0f64, f64::max);

        // Fastest module is commanded to k * max_module_speed = 0.5 * 4.5
        assert!((max_rate_rads - 2.25 / 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_proc_stop_holds_headings() {
        let mut ctrl = SwerveCtrl::with_params(test_params()).unwrap();

        ctrl.proc(&InputData {
            cmd: Some(velocity_cmd(0.0, 1.0, 0.0)),
            measured_states: None
        })
        .unwrap();

        let (output, _) = ctrl
            .proc(&InputData {
                cmd: Some(DriveCommand {
                    mnvr_type: MnvrType::Stop,
                    speeds_ms: None,
                    cor_m_vb: None
                }),
                measured_states: None
            })
            .unwrap();

        for wheel_cmd in &output.wheel_cmds {
            // Steer holds the 90 degree heading from the sideways drive,
            // drive rates are zero
            assert!((wheel_cmd.str_abs_pos_rad - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
            assert_eq!(wheel_cmd.drv_rate_rads, 0.0);
            assert_eq!(wheel_cmd.drv_rate_norm, 0.0);
        }
    }

    #[test]
    fn test_proc_no_cmd_continues_last_mnvr() {
        let mut ctrl = SwerveCtrl::with_params(test_params()).unwrap();

        // No command ever set: output is empty-default
        let (output, _) = ctrl.proc(&InputData::default()).unwrap();
        assert!(output.wheel_cmds.is_empty());

        // After a drive, a cycle without a new command continues the last
        // manouvre unchanged
        ctrl.proc(&InputData {
            cmd: Some(velocity_cmd(1.0, 0.0, 0.0)),
            measured_states: None
        })
        .unwrap();

        let (output, _) = ctrl.proc(&InputData::default()).unwrap();

        for wheel_cmd in &output.wheel_cmds {
            assert!(wheel_cmd.str_abs_pos_rad.abs() < 1e-9);
            assert!((wheel_cmd.drv_rate_rads - 20.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_proc_invalid_cmd() {
        let mut ctrl = SwerveCtrl::with_params(test_params()).unwrap();

        let result = ctrl.proc(&InputData {
            cmd: Some(DriveCommand {
                mnvr_type: MnvrType::Velocity,
                speeds_ms: None,
                cor_m_vb: None
            }),
            measured_states: None
        });

        assert!(matches!(result, Err(SwerveCtrlError::InvalidDriveCmd(_))));
    }

    #[test]
    fn test_proc_optimizer_reverses() {
        let mut ctrl = SwerveCtrl::with_params(test_params()).unwrap();

        // Drive forward to set the module headings to zero
        ctrl.proc(&InputData {
            cmd: Some(velocity_cmd(1.0, 0.0, 0.0)),
            measured_states: None
        })
        .unwrap();

        // Now demand the exact reverse: the optimizer should reverse the
        // drive direction of every module rather than steering 180 degrees
        let (output, report) = ctrl
            .proc(&InputData {
                cmd: Some(velocity_cmd(-1.0, 0.0, 0.0)),
                measured_states: None
            })
            .unwrap();

        assert!(report.drv_reversed.iter().all(|&r| r));

        for wheel_cmd in &output.wheel_cmds {
            assert!(wheel_cmd.str_abs_pos_rad.abs() < 1e-9);
            assert!((wheel_cmd.drv_rate_rads - (-20.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_proc_forward_kinematics_estimate() {
        let mut ctrl = SwerveCtrl::with_params(test_params()).unwrap();

        let measured = vec![
            ModuleState::new(1.0, UnitComplex::identity(), 0.0);
            4
        ];

        let (output, report) = ctrl
            .proc(&InputData {
                cmd: None,
                measured_states: Some(measured)
            })
            .unwrap();

        assert!(report.chassis_vel_est_updated);

        let est = output.chassis_vel_est_ms.unwrap();
        assert!((est.vx_ms - 1.0).abs() < 1e-9);
        assert!(est.vy_ms.abs() < 1e-9);
        assert!(est.omega_rads.abs() < 1e-9);
    }

    #[test]
    fn test_proc_wrong_measured_count() {
        let mut ctrl = SwerveCtrl::with_params(test_params()).unwrap();

        let result = ctrl.proc(&InputData {
            cmd: None,
            measured_states: Some(vec![ModuleState::default(); 2])
        });

        assert!(matches!(
            result,
            Err(SwerveCtrlError::KinematicsError(_))
        ));
    }

    #[test]
    fn test_with_params_too_few_modules() {
        let mut params = test_params();
        params.module_pos_m_vb.truncate(1);

        assert!(matches!(
            SwerveCtrl::with_params(params),
            Err(SwerveCtrlInitError::KinematicsError(_))
        ));
    }

    #[test]
    fn test_init_with_session() {
        // Build a software root under the system temp dir holding a copy of
        // the workspace parameter file, then run the full init path against a
        // real session directory.
        let root = std::env::temp_dir().join("swerve_ctrl_session_test");
        std::fs::create_dir_all(root.join("params")).unwrap();
        std::fs::write(
            root.join("params").join("swerve_ctrl.toml"),
            include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../params/swerve_ctrl.toml"
            ))
        )
        .unwrap();
        std::env::set_var(util::host::SW_ROOT_ENV_VAR, &root);

        let session = Session::new("swerve_ctrl_test", "sessions").unwrap();
        util::logger::logger_init(util::logger::LevelFilter::Info, &session)
            .unwrap();

        let mut ctrl = SwerveCtrl::default();
        ctrl.init("swerve_ctrl.toml", &session).unwrap();

        let (output, _) = ctrl
            .proc(&InputData {
                cmd: Some(velocity_cmd(1.0, 0.0, 0.0)),
                measured_states: None
            })
            .unwrap();

        assert_eq!(output.wheel_cmds.len(), 4);

        // The archive files were created under the session's archive root
        assert!(session.arch_root.join("swerve_ctrl/status_report.csv").exists());
        assert!(session.arch_root.join("swerve_ctrl/output.csv").exists());

        // The save thread writes session-relative JSON files, finishing any
        // pending saves before exit returns
        session.save("output.json", output);
        let session_root = session.session_root.clone();
        session.exit();
        assert!(session_root.join("output.json").exists());
    }

    #[test]
    fn test_output_serialisable() {
        let mut ctrl = SwerveCtrl::with_params(test_params()).unwrap();

        let (output, _) = ctrl
            .proc(&InputData {
                cmd: Some(velocity_cmd(1.0, 0.5, 0.2)),
                measured_states: None
            })
            .unwrap();

        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("wheel_cmds"));
    }
}
